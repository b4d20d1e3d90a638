//! 死信存储（EventDeadLetters）
//!
//! 记录分组在重试耗尽后仍未能处理的事件，以 `(Group, EventId)` 为键：
//! - `store`/`remove` 均为幂等操作，不同键之间无需协调；
//! - 条目不会自动过期，只能由运维操作或重投成功后显式删除；
//! - `contain_events` 供健康检查使用。
//!
//! `InMemoryEventDeadLetters` 适用于测试与单机场景；持久化后端实现
//! `DeadLetterStorage` 并经 `StorageEventDeadLetters` 接入。
//!
mod in_memory;
mod storage;

pub use in_memory::InMemoryEventDeadLetters;
pub use storage::{
    DeadLetterStorage, InMemoryDeadLetterStorage, SerializedDeadLetter, StorageEventDeadLetters,
};

use crate::error::EventBusResult;
use crate::event::{Event, EventId};
use crate::group::Group;
use async_trait::async_trait;

/// 死信存储协议
#[async_trait]
pub trait EventDeadLetters: Send + Sync {
    /// 写入（或覆盖）某分组的失败事件
    async fn store(&self, group: &Group, event: &Event) -> EventBusResult<()>;

    /// 删除某分组的单个失败事件，不存在时什么也不做
    async fn remove(&self, group: &Group, event_id: EventId) -> EventBusResult<()>;

    /// 删除某分组的全部失败事件
    async fn remove_group(&self, group: &Group) -> EventBusResult<()>;

    async fn failed_event(&self, group: &Group, event_id: EventId)
    -> EventBusResult<Option<Event>>;

    async fn failed_event_ids(&self, group: &Group) -> EventBusResult<Vec<EventId>>;

    /// 当前至少有一条失败事件的分组
    async fn groups_with_failed_events(&self) -> EventBusResult<Vec<Group>>;

    async fn contain_events(&self) -> EventBusResult<bool>;
}
