pub mod external;
pub mod persistence;
