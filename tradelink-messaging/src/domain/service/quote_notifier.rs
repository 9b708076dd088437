//! 报价生命周期通知
//!
//! 报价提交/接受/拒绝只产生独立通知，不创建会话。通知的结构化负载
//! 携带足够的 id 供客户端深链到询价单与报价。

use std::sync::Arc;

use anyhow::ensure;
use tracing::{debug, info, instrument};

use tradelink_core::error::{MessagingError, Result};
use tradelink_core::utils::new_notification_id;
use tradelink_storage_model::{NotificationData, NotificationDocument, NotificationKind};

use crate::domain::model::{QuoteEvent, QuoteEventKind};
use crate::domain::repository::NotificationRepository;

/// 报价生命周期通知服务
pub struct QuoteLifecycleNotifier {
    notifications: Arc<dyn NotificationRepository>,
}

impl QuoteLifecycleNotifier {
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    /// 投递报价事件通知
    ///
    /// 属主给自己的询价单报价时跳过（返回 None）。
    #[instrument(skip(self, event), fields(
        kind = event.kind.as_str(),
        request_id = %event.request_id,
        quote_id = %event.quote_id,
    ))]
    pub async fn notify(&self, event: QuoteEvent) -> Result<Option<NotificationDocument>> {
        Self::validate(&event).map_err(|err| MessagingError::InvalidParameter(err.to_string()))?;

        let subject = event
            .product_name
            .clone()
            .unwrap_or_else(|| format!("request {}", event.request_id));

        let (recipient, kind, title, body) = match event.kind {
            QuoteEventKind::Submitted => {
                if event.owner_id == event.submitter_id {
                    debug!("Quote submitted by request owner, no notification");
                    return Ok(None);
                }
                let body = match (event.unit_price, event.currency.as_deref()) {
                    (Some(price), Some(currency)) => format!(
                        "A new quote of {} {} was submitted for {}",
                        price, currency, subject
                    ),
                    _ => format!("A new quote was submitted for {}", subject),
                };
                (
                    event.owner_id.clone(),
                    NotificationKind::QuoteReceived,
                    "New quote received".to_string(),
                    body,
                )
            }
            QuoteEventKind::Accepted => (
                event.submitter_id.clone(),
                NotificationKind::QuoteAccepted,
                "Quote accepted".to_string(),
                format!("Your quote for {} was accepted", subject),
            ),
            QuoteEventKind::Rejected => {
                let body = match event.reason.as_deref().filter(|r| !r.trim().is_empty()) {
                    Some(reason) => {
                        format!("Your quote for {} was rejected: {}", subject, reason)
                    }
                    None => format!("Your quote for {} was rejected", subject),
                };
                (
                    event.submitter_id.clone(),
                    NotificationKind::QuoteRejected,
                    "Quote rejected".to_string(),
                    body,
                )
            }
        };

        let data = NotificationData {
            request_id: Some(event.request_id.clone()),
            quote_id: Some(event.quote_id.clone()),
            unit_price: event.unit_price,
            currency: event.currency.clone(),
            ..NotificationData::default()
        };
        let notification =
            NotificationDocument::new(new_notification_id(), recipient, kind, title, body, data);
        self.notifications.create(&notification).await?;
        info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            "Quote lifecycle notification created"
        );
        Ok(Some(notification))
    }

    fn validate(event: &QuoteEvent) -> anyhow::Result<()> {
        ensure!(!event.request_id.trim().is_empty(), "request id is required");
        ensure!(!event.quote_id.trim().is_empty(), "quote id is required");
        ensure!(
            !event.submitter_id.trim().is_empty(),
            "quote submitter id is required"
        );
        Ok(())
    }
}
