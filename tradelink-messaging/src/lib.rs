//! TradeLink 消息与通知协调引擎
//!
//! 负责会话创建与去重、消息路由（双人会话、联系表单询盘、系统事件）、
//! 每参与者未读计数、报价生命周期与新用户审批的通知扇出，
//! 以及面向展示层的实时快照订阅。

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use application::handlers::{MessagingCommandHandler, MessagingQueryHandler};
pub use domain::event::{ChangeBus, ChangeEvent};
pub use domain::service::{
    ContactInquiryRouter, ConversationOrchestrator, QuoteLifecycleNotifier, Subscription,
    SubscriptionService,
};
pub use service::wire::{ApplicationContext, initialize};
