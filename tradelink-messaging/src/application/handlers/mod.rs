mod command_handler;
mod query_handler;

pub use command_handler::MessagingCommandHandler;
pub use query_handler::MessagingQueryHandler;
