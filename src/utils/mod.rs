//! 基础工具函数模块
//!
//! 提供时间戳转换、标识符生成、文本截断与邮箱格式校验

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use ulid::Ulid;
use uuid::Uuid;

/// 标准邮箱地址模式
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

/// 当前 UTC 时间戳（毫秒）
pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Some(Utc.timestamp_millis_opt(ms).single()?)
}

/// 生成会话标识（ULID，按创建时间可排序）
pub fn new_conversation_id() -> String {
    format!("conv_{}", Ulid::new())
}

/// 生成消息标识（ULID，同会话内可作为排序决胜键）
pub fn new_message_id() -> String {
    format!("msg_{}", Ulid::new())
}

/// 生成通知标识
pub fn new_notification_id() -> String {
    format!("ntf_{}", Uuid::new_v4())
}

/// 按字符数截断文本（按字符边界，不会截断多字节字符）
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// 校验邮箱地址格式
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "报价单".repeat(50);
        let truncated = truncate_chars(&text, 100);
        assert_eq!(truncated.chars().count(), 100);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn truncate_keeps_short_text_unchanged() {
        assert_eq!(truncate_chars("hello", 100), "hello");
    }

    #[test]
    fn email_pattern_accepts_standard_addresses() {
        assert!(is_valid_email("buyer@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
    }

    #[test]
    fn email_pattern_rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn generated_ids_carry_entity_prefixes() {
        assert!(new_conversation_id().starts_with("conv_"));
        assert!(new_message_id().starts_with("msg_"));
        assert!(new_notification_id().starts_with("ntf_"));
    }

    #[test]
    fn millis_roundtrip() {
        let now = current_millis();
        let dt = millis_to_datetime(now).expect("valid millis");
        assert_eq!(dt.timestamp_millis(), now);
    }
}
