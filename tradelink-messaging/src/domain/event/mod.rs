//! 领域变更事件与进程内变更总线
//!
//! 存储仓储在每次写入后发布变更事件；订阅服务消费事件并向调用方
//! 推送重新计算的快照。总线与具体存储技术无关，内存后端与 MongoDB
//! 后端发布同样的事件。

use tokio::sync::broadcast;

/// 变更总线默认缓冲容量
const DEFAULT_CAPACITY: usize = 1024;

/// 存储层变更事件
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// 会话文档变更（创建、预览更新、未读计数、参与者变更）
    Conversation {
        conversation_id: String,
        /// 用于订阅方按用户过滤，避免每个事件都回查存储
        participants: Vec<String>,
    },
    /// 会话内消息变更（新消息、回执、删除）
    Message { conversation_id: String },
    /// 某个用户的通知列表变更
    Notification { user_id: String },
}

/// 进程内变更总线
///
/// 没有订阅者时发布即丢弃；慢订阅者会观察到 `Lagged` 并由订阅服务
/// 重新同步快照。
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // 零订阅者时的 SendError 不是错误
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
