//! 消息引擎集成测试（内存后端）
//!
//! 覆盖：direct 会话去重与范围区分、并发未读累加、已读回执单调性、
//! 联系表单全员扇出、报价通知自排除与拒绝原因、新用户审批扇出、
//! 以及快照订阅与取消。

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tradelink_core::error::MessagingError;
use tradelink_messaging::application::commands::{
    AddParticipantCommand, CreateConversationCommand, DeleteAllNotificationsCommand,
    MarkAllNotificationsReadCommand, MarkConversationReadCommand, MarkNotificationReadCommand,
    NotifyNewUserApprovalCommand, NotifyQuoteEventCommand, SendContactMessageCommand,
    SendMessageCommand,
};
use tradelink_messaging::config::MessagingConfig;
use tradelink_messaging::domain::model::{
    AccountStatus, ContactInquiry, CreateConversationRequest, OutgoingMessage, ParticipantProfile,
    QuoteEvent, QuoteEventKind, UserRole,
};
use tradelink_messaging::domain::repository::ParticipantDirectory;
use tradelink_messaging::infrastructure::external::StaticParticipantDirectory;
use tradelink_messaging::service::wire::{ApplicationContext, initialize_with_directory};
use tradelink_storage_model::{
    ConversationMetadata, ConversationType, NotificationKind, Sender,
};

fn memory_config() -> MessagingConfig {
    MessagingConfig {
        backend: "memory".to_string(),
        mongo_url: None,
        mongo_database: "tradelink".to_string(),
        conversation_collection: "conversations".to_string(),
        message_collection: "messages".to_string(),
        notification_collection: "notifications".to_string(),
        user_collection: "users".to_string(),
        change_bus_capacity: 1024,
    }
}

fn profile(
    user_id: &str,
    display_name: &str,
    role: UserRole,
    status: AccountStatus,
) -> ParticipantProfile {
    ParticipantProfile {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        photo_url: None,
        email: Some(format!("{}@example.com", user_id)),
        role,
        status,
        company_id: None,
        company_name: None,
    }
}

async fn seeded_directory(profiles: Vec<ParticipantProfile>) -> Arc<StaticParticipantDirectory> {
    let directory = Arc::new(StaticParticipantDirectory::new());
    for p in profiles {
        directory.insert(p).await;
    }
    directory
}

async fn engine(directory: Arc<dyn ParticipantDirectory>) -> ApplicationContext {
    let _ = tracing_subscriber::fmt::try_init();
    initialize_with_directory(&memory_config(), directory)
        .await
        .expect("wire engine")
}

fn direct_request(
    participants: [&str; 2],
    creator: &str,
    initial_message: Option<&str>,
    metadata: ConversationMetadata,
) -> CreateConversationRequest {
    CreateConversationRequest {
        conversation_type: ConversationType::Direct,
        participant_ids: participants.iter().map(|s| s.to_string()).collect(),
        creator_id: creator.to_string(),
        initial_message: initial_message.map(str::to_string),
        metadata,
    }
}

fn contact_inquiry(user_id: Option<&str>) -> ContactInquiry {
    ContactInquiry {
        name: "Wang Wei".to_string(),
        email: "wang.wei@example.com".to_string(),
        subject: Some("Bulk order".to_string()),
        message: "Interested in your steel catalog".to_string(),
        tag: None,
        user_id: user_id.map(str::to_string),
    }
}

/// 目录包装器：指定用户的档案查询固定失败
struct FlakyDirectory {
    inner: Arc<StaticParticipantDirectory>,
    fail_for: String,
}

#[async_trait]
impl ParticipantDirectory for FlakyDirectory {
    async fn get_by_id(&self, user_id: &str) -> anyhow::Result<Option<ParticipantProfile>> {
        if user_id == self.fail_for {
            bail!("directory lookup timed out");
        }
        self.inner.get_by_id(user_id).await
    }

    async fn list_administrators(&self) -> anyhow::Result<Vec<ParticipantProfile>> {
        self.inner.list_administrators().await
    }
}

#[tokio::test]
async fn direct_conversation_is_deduplicated_across_both_calls() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let first = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(
                ["u1", "u2"],
                "u1",
                Some("Hello"),
                ConversationMetadata::default(),
            ),
        })
        .await
        .expect("first call");
    assert_eq!(first.unread_for("u2"), 1);
    assert_eq!(first.unread_for("u1"), 0);

    // 参与者顺序颠倒也必须命中同一会话
    let second = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(
                ["u2", "u1"],
                "u2",
                Some("Hi again"),
                ConversationMetadata::default(),
            ),
        })
        .await
        .expect("second call");

    assert_eq!(first.id, second.id);
    assert_eq!(second.unread_for("u1"), 1);

    let thread = ctx.queries.list_messages(&first.id).await.expect("messages");
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].content, "Hello");
    assert_eq!(thread[1].content, "Hi again");
}

#[tokio::test]
async fn product_scope_distinguishes_direct_conversations() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let unscoped = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u1", "u2"], "u1", None, ConversationMetadata::default()),
        })
        .await
        .expect("unscoped");

    let scoped_metadata = ConversationMetadata {
        product_id: Some("prod_9".to_string()),
        ..ConversationMetadata::default()
    };
    let scoped = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u1", "u2"], "u1", None, scoped_metadata.clone()),
        })
        .await
        .expect("scoped");

    assert_ne!(unscoped.id, scoped.id);

    // 相同范围再次创建命中已有会话
    let scoped_again = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u2", "u1"], "u2", None, scoped_metadata),
        })
        .await
        .expect("scoped again");
    assert_eq!(scoped.id, scoped_again.id);
}

#[tokio::test]
async fn concurrent_senders_do_not_lose_unread_increments() {
    let senders = ["s1", "s2", "s3", "s4", "s5"];
    let mut profiles = vec![profile(
        "recipient",
        "Ada",
        UserRole::Buyer,
        AccountStatus::Active,
    )];
    for sender in senders {
        profiles.push(profile(sender, sender, UserRole::Seller, AccountStatus::Active));
    }
    let ctx = Arc::new(engine(seeded_directory(profiles).await).await);

    let mut participant_ids: Vec<String> = vec!["recipient".to_string()];
    participant_ids.extend(senders.iter().map(|s| s.to_string()));
    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: CreateConversationRequest {
                conversation_type: ConversationType::System,
                participant_ids,
                creator_id: "recipient".to_string(),
                initial_message: None,
                metadata: ConversationMetadata::default(),
            },
        })
        .await
        .expect("create conversation");

    let tasks: Vec<_> = senders
        .iter()
        .map(|sender| {
            let ctx = Arc::clone(&ctx);
            let conversation_id = conversation.id.clone();
            let sender = sender.to_string();
            tokio::spawn(async move {
                ctx.commands
                    .handle_send_message(SendMessageCommand {
                        message: OutgoingMessage {
                            conversation_id,
                            sender_id: sender.clone(),
                            content: format!("offer from {}", sender),
                            attachments: Vec::new(),
                        },
                    })
                    .await
                    .expect("send message")
            })
        })
        .collect();
    join_all(tasks).await;

    let stored = ctx
        .queries
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.unread_for("recipient"), senders.len() as i64);
}

#[tokio::test]
async fn read_receipts_are_monotonic_and_idempotent() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(
                ["u1", "u2"],
                "u1",
                Some("Hello"),
                ConversationMetadata::default(),
            ),
        })
        .await
        .expect("create");

    for _ in 0..2 {
        ctx.commands
            .handle_mark_conversation_read(MarkConversationReadCommand {
                conversation_id: conversation.id.clone(),
                user_id: "u2".to_string(),
            })
            .await
            .expect("mark read");
    }

    let thread = ctx.queries.list_messages(&conversation.id).await.expect("messages");
    let message = &thread[0];
    // 发送者播种 + 读者一条，重复标记不追加
    assert_eq!(message.read_by.len(), 2);
    assert!(message.is_read_by("u1"));
    assert!(message.is_read_by("u2"));

    let stored = ctx
        .queries
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.unread_for("u2"), 0);
}

#[tokio::test]
async fn contact_inquiry_fans_out_to_every_admin_even_if_one_lookup_fails() {
    let inner = seeded_directory(vec![
        profile("a1", "Admin One", UserRole::Administrator, AccountStatus::Active),
        profile("a2", "Admin Two", UserRole::Administrator, AccountStatus::Active),
        profile("a3", "Admin Three", UserRole::Administrator, AccountStatus::Active),
    ])
    .await;
    let flaky = Arc::new(FlakyDirectory {
        inner,
        fail_for: "a2".to_string(),
    });
    let ctx = engine(flaky).await;

    let conversation = ctx
        .commands
        .handle_send_contact_message(SendContactMessageCommand {
            inquiry: contact_inquiry(None),
        })
        .await
        .expect("contact message");

    assert_eq!(conversation.conversation_type, ConversationType::Contact);
    assert_eq!(conversation.participants.len(), 3);
    // a2 的档案查询失败只影响快照，不影响扇出
    assert_eq!(conversation.participant_details.len(), 2);

    for admin in ["a1", "a2", "a3"] {
        assert_eq!(conversation.unread_for(admin), 1, "unread for {}", admin);
        let notifications = ctx
            .queries
            .list_notifications(admin)
            .await
            .expect("notifications");
        assert_eq!(notifications.len(), 1, "notifications for {}", admin);
        assert_eq!(notifications[0].kind, NotificationKind::ConversationCreated);
        assert_eq!(notifications[0].title, "New contact inquiry");
    }

    let thread = ctx.queries.list_messages(&conversation.id).await.expect("messages");
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].sender_id, Sender::Anonymous);
    assert_eq!(thread[0].metadata.get("subject").map(String::as_str), Some("Bulk order"));
}

#[tokio::test]
async fn authenticated_submitter_joins_the_contact_conversation() {
    let directory = seeded_directory(vec![
        profile("a1", "Admin One", UserRole::Administrator, AccountStatus::Active),
        profile("u7", "Wang Wei", UserRole::Buyer, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let conversation = ctx
        .commands
        .handle_send_contact_message(SendContactMessageCommand {
            inquiry: contact_inquiry(Some("u7")),
        })
        .await
        .expect("contact message");

    assert!(conversation.participants.contains(&"u7".to_string()));
    let thread = ctx.queries.list_messages(&conversation.id).await.expect("messages");
    assert_eq!(thread[0].sender_id, Sender::user("u7"));
    // 投递人已读自己的询盘，不计未读
    assert_eq!(conversation.unread_for("u7"), 0);
    assert_eq!(conversation.unread_for("a1"), 1);
}

#[tokio::test]
async fn contact_validation_rejects_before_any_write() {
    let directory = seeded_directory(vec![profile(
        "a1",
        "Admin One",
        UserRole::Administrator,
        AccountStatus::Active,
    )])
    .await;
    let ctx = engine(directory).await;

    let mut bad_email = contact_inquiry(None);
    bad_email.email = "not-an-email".to_string();
    let err = ctx
        .commands
        .handle_send_contact_message(SendContactMessageCommand { inquiry: bad_email })
        .await
        .expect_err("malformed email");
    assert!(matches!(err, MessagingError::InvalidParameter(_)));

    let mut oversized = contact_inquiry(None);
    oversized.message = "x".repeat(5001);
    let err = ctx
        .commands
        .handle_send_contact_message(SendContactMessageCommand { inquiry: oversized })
        .await
        .expect_err("oversized message");
    assert!(matches!(err, MessagingError::InvalidParameter(_)));

    let contacts = ctx
        .queries
        .list_conversations_by_type(ConversationType::Contact)
        .await
        .expect("list");
    assert!(contacts.is_empty(), "no conversation may be written");
}

#[tokio::test]
async fn empty_admin_set_is_a_configuration_error() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    let err = ctx
        .commands
        .handle_send_contact_message(SendContactMessageCommand {
            inquiry: contact_inquiry(None),
        })
        .await
        .expect_err("no admins");
    assert!(matches!(err, MessagingError::Configuration(_)));
}

#[tokio::test]
async fn own_quote_submission_is_not_notified() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    let result = ctx
        .commands
        .handle_notify_quote_event(NotifyQuoteEventCommand {
            event: QuoteEvent {
                kind: QuoteEventKind::Submitted,
                request_id: "req_1".to_string(),
                quote_id: "quote_1".to_string(),
                owner_id: "u1".to_string(),
                submitter_id: "u1".to_string(),
                product_name: None,
                unit_price: None,
                currency: None,
                reason: None,
            },
        })
        .await
        .expect("notify");
    assert!(result.is_none());

    let notifications = ctx.queries.list_notifications("u1").await.expect("list");
    assert!(notifications.is_empty());
}

#[tokio::test]
async fn quote_submission_notifies_the_request_owner() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    let notification = ctx
        .commands
        .handle_notify_quote_event(NotifyQuoteEventCommand {
            event: QuoteEvent {
                kind: QuoteEventKind::Submitted,
                request_id: "req_1".to_string(),
                quote_id: "quote_1".to_string(),
                owner_id: "owner".to_string(),
                submitter_id: "supplier".to_string(),
                product_name: Some("cold-rolled steel".to_string()),
                unit_price: Some(412.5),
                currency: Some("USD".to_string()),
                reason: None,
            },
        })
        .await
        .expect("notify")
        .expect("created");

    assert_eq!(notification.user_id, "owner");
    assert_eq!(notification.kind, NotificationKind::QuoteReceived);
    assert!(notification.body.contains("cold-rolled steel"));
    assert_eq!(notification.data.request_id.as_deref(), Some("req_1"));
    assert_eq!(notification.data.quote_id.as_deref(), Some("quote_1"));
    assert_eq!(notification.data.unit_price, Some(412.5));
}

#[tokio::test]
async fn quote_rejection_embeds_the_reason_verbatim() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    let notification = ctx
        .commands
        .handle_notify_quote_event(NotifyQuoteEventCommand {
            event: QuoteEvent {
                kind: QuoteEventKind::Rejected,
                request_id: "req_1".to_string(),
                quote_id: "quote_1".to_string(),
                owner_id: "owner".to_string(),
                submitter_id: "supplier".to_string(),
                product_name: None,
                unit_price: None,
                currency: None,
                reason: Some("price too high".to_string()),
            },
        })
        .await
        .expect("notify")
        .expect("created");

    assert_eq!(notification.user_id, "supplier");
    assert_eq!(notification.kind, NotificationKind::QuoteRejected);
    assert!(notification.body.contains("price too high"));
}

#[tokio::test]
async fn new_user_approval_fans_out_to_all_admins() {
    let directory = seeded_directory(vec![
        profile("a1", "Admin One", UserRole::Administrator, AccountStatus::Active),
        profile("a2", "Admin Two", UserRole::Administrator, AccountStatus::Active),
        profile("a3", "Gone", UserRole::Administrator, AccountStatus::Deleted),
    ])
    .await;
    let ctx = engine(directory).await;

    let created = ctx
        .commands
        .handle_notify_new_user_approval(NotifyNewUserApprovalCommand {
            user_id: "u9".to_string(),
            display_name: "Zhang San".to_string(),
            company_name: Some("Hebei Metals".to_string()),
        })
        .await
        .expect("fan-out");
    assert_eq!(created, 2);

    for admin in ["a1", "a2"] {
        let notifications = ctx.queries.list_notifications(admin).await.expect("list");
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::NewUserApproval);
        assert!(notifications[0].body.contains("Hebei Metals"));
    }
    assert!(ctx.queries.list_notifications("a3").await.expect("list").is_empty());
}

#[tokio::test]
async fn last_message_preview_is_truncated_to_100_chars() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let long_content = "询价单明细".repeat(40);
    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(
                ["u1", "u2"],
                "u1",
                Some(&long_content),
                ConversationMetadata::default(),
            ),
        })
        .await
        .expect("create");

    let preview = conversation.last_message.expect("preview present");
    assert_eq!(preview.content.chars().count(), 100);
    assert!(long_content.starts_with(&preview.content));
    // 原始消息不截断
    let thread = ctx.queries.list_messages(&conversation.id).await.expect("messages");
    assert_eq!(thread[0].content, long_content);
}

#[tokio::test]
async fn missing_conversation_short_circuits_reads_and_rejects_sends() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    // 标记缺失会话已读是无操作
    ctx.commands
        .handle_mark_conversation_read(MarkConversationReadCommand {
            conversation_id: "conv_missing".to_string(),
            user_id: "u1".to_string(),
        })
        .await
        .expect("no-op");

    // 向缺失会话发消息需要存在性确认
    let err = ctx
        .commands
        .handle_send_message(SendMessageCommand {
            message: OutgoingMessage {
                conversation_id: "conv_missing".to_string(),
                sender_id: "u1".to_string(),
                content: "hello".to_string(),
                attachments: Vec::new(),
            },
        })
        .await
        .expect_err("missing conversation");
    assert!(matches!(err, MessagingError::NotFound(_)));
}

#[tokio::test]
async fn non_participant_sender_is_rejected() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u1", "u2"], "u1", None, ConversationMetadata::default()),
        })
        .await
        .expect("create");

    let err = ctx
        .commands
        .handle_send_message(SendMessageCommand {
            message: OutgoingMessage {
                conversation_id: conversation.id,
                sender_id: "intruder".to_string(),
                content: "let me in".to_string(),
                attachments: Vec::new(),
            },
        })
        .await
        .expect_err("intruder");
    assert!(matches!(err, MessagingError::InvalidParameter(_)));
}

#[tokio::test]
async fn notification_management_round_trip() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    for quote_id in ["quote_1", "quote_2"] {
        ctx.commands
            .handle_notify_quote_event(NotifyQuoteEventCommand {
                event: QuoteEvent {
                    kind: QuoteEventKind::Accepted,
                    request_id: "req_1".to_string(),
                    quote_id: quote_id.to_string(),
                    owner_id: "owner".to_string(),
                    submitter_id: "supplier".to_string(),
                    product_name: None,
                    unit_price: None,
                    currency: None,
                    reason: None,
                },
            })
            .await
            .expect("notify");
    }

    let all = ctx.queries.list_notifications("supplier").await.expect("list");
    assert_eq!(all.len(), 2);

    ctx.commands
        .handle_mark_notification_read(MarkNotificationReadCommand {
            notification_id: all[0].id.clone(),
        })
        .await
        .expect("mark one");
    assert_eq!(
        ctx.queries
            .list_unread_notifications("supplier")
            .await
            .expect("unread")
            .len(),
        1
    );

    let deleted = ctx
        .commands
        .handle_delete_all_notifications(DeleteAllNotificationsCommand {
            user_id: "supplier".to_string(),
        })
        .await
        .expect("delete all");
    assert_eq!(deleted, 2);
    assert!(ctx.queries.list_notifications("supplier").await.expect("list").is_empty());
}

#[tokio::test]
async fn added_participant_starts_with_zero_unread_and_then_counts() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
        profile("u3", "Carol", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: CreateConversationRequest {
                conversation_type: ConversationType::System,
                participant_ids: vec!["u1".to_string(), "u2".to_string()],
                creator_id: "u1".to_string(),
                initial_message: None,
                metadata: ConversationMetadata::default(),
            },
        })
        .await
        .expect("create");

    ctx.commands
        .handle_add_participant(AddParticipantCommand {
            conversation_id: conversation.id.clone(),
            user_id: "u3".to_string(),
        })
        .await
        .expect("add participant");

    let stored = ctx
        .queries
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert!(stored.is_participant("u3"));
    assert_eq!(stored.unread_for("u3"), 0);
    assert_eq!(
        stored
            .participant_details
            .get("u3")
            .map(|d| d.display_name.as_str()),
        Some("Carol")
    );

    ctx.commands
        .handle_send_message(SendMessageCommand {
            message: OutgoingMessage {
                conversation_id: conversation.id.clone(),
                sender_id: "u1".to_string(),
                content: "welcome aboard".to_string(),
                attachments: Vec::new(),
            },
        })
        .await
        .expect("send");

    let stored = ctx
        .queries
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.unread_for("u3"), 1);
    assert_eq!(stored.unread_for("u2"), 1);
    assert_eq!(stored.unread_for("u1"), 0);
}

/// 从订阅回调通道里一直取快照，直到谓词满足或超时
async fn wait_for_snapshot<T>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    predicate: impl Fn(&T) -> bool,
) -> T {
    timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.recv().await.expect("subscription channel open");
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("snapshot within timeout")
}

#[tokio::test]
async fn conversation_subscription_delivers_snapshots_until_unsubscribed() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
        profile("u3", "Carol", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = ctx.subscriptions.subscribe_conversations(
        "u1",
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |err| panic!("subscription error: {}", err),
    );

    // 初始快照为空
    let initial = wait_for_snapshot(&mut rx, |s: &Vec<_>| s.is_empty()).await;
    assert!(initial.is_empty());

    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(
                ["u1", "u2"],
                "u1",
                Some("Hello"),
                ConversationMetadata::default(),
            ),
        })
        .await
        .expect("create");

    let updated = wait_for_snapshot(&mut rx, |s: &Vec<_>| s.len() == 1).await;
    assert_eq!(updated[0].id, conversation.id);

    subscription.unsubscribe();
    // 取消后新的变更不再推送
    ctx.commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u1", "u3"], "u1", None, ConversationMetadata::default()),
        })
        .await
        .expect("create after unsubscribe");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut trailing = 0;
    while let Ok(_snapshot) = rx.try_recv() {
        trailing += 1;
        // 取消前在途的快照允许到达，但数量必然有限
        assert!(trailing < 16);
    }
}

#[tokio::test]
async fn unread_notification_count_is_derived_from_the_live_list() {
    let ctx = engine(seeded_directory(Vec::new()).await).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = ctx.subscriptions.subscribe_unread_notifications(
        "supplier",
        move |count| {
            let _ = tx.send(count);
        },
        |err| panic!("subscription error: {}", err),
    );

    assert_eq!(wait_for_snapshot(&mut rx, |c| *c == 0).await, 0);

    ctx.commands
        .handle_notify_quote_event(NotifyQuoteEventCommand {
            event: QuoteEvent {
                kind: QuoteEventKind::Accepted,
                request_id: "req_1".to_string(),
                quote_id: "quote_1".to_string(),
                owner_id: "owner".to_string(),
                submitter_id: "supplier".to_string(),
                product_name: None,
                unit_price: None,
                currency: None,
                reason: None,
            },
        })
        .await
        .expect("notify");

    assert_eq!(wait_for_snapshot(&mut rx, |c| *c == 1).await, 1);

    ctx.commands
        .handle_mark_all_notifications_read(MarkAllNotificationsReadCommand {
            user_id: "supplier".to_string(),
        })
        .await
        .expect("mark all");

    assert_eq!(wait_for_snapshot(&mut rx, |c| *c == 0).await, 0);
}

#[tokio::test]
async fn message_subscription_follows_the_thread() {
    let directory = seeded_directory(vec![
        profile("u1", "Alice", UserRole::Buyer, AccountStatus::Active),
        profile("u2", "Bob", UserRole::Seller, AccountStatus::Active),
    ])
    .await;
    let ctx = engine(directory).await;

    let conversation = ctx
        .commands
        .handle_create_conversation(CreateConversationCommand {
            request: direct_request(["u1", "u2"], "u1", None, ConversationMetadata::default()),
        })
        .await
        .expect("create");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = ctx.subscriptions.subscribe_messages(
        &conversation.id,
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |err| panic!("subscription error: {}", err),
    );

    wait_for_snapshot(&mut rx, |s: &Vec<_>| s.is_empty()).await;

    ctx.commands
        .handle_send_message(SendMessageCommand {
            message: OutgoingMessage {
                conversation_id: conversation.id.clone(),
                sender_id: "u2".to_string(),
                content: "quotation attached".to_string(),
                attachments: Vec::new(),
            },
        })
        .await
        .expect("send");

    let snapshot = wait_for_snapshot(&mut rx, |s: &Vec<_>| s.len() == 1).await;
    assert_eq!(snapshot[0].content, "quotation attached");
}
