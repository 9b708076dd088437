//! 领域服务

pub mod contact_inquiry_router;
pub mod conversation_orchestrator;
pub mod quote_notifier;
pub mod subscription_service;

pub use contact_inquiry_router::ContactInquiryRouter;
pub use conversation_orchestrator::ConversationOrchestrator;
pub use quote_notifier::QuoteLifecycleNotifier;
pub use subscription_service::{Subscription, SubscriptionService};
