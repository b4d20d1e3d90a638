//! 领域事件（Event）
//!
//! 邮件服务器中状态变化的不可变记录：邮箱创建/重命名/删除、消息追加/删除、
//! 标志位变更、ACL 变更、订阅变更与配额更新。每个事件携带全局唯一的 `EventId` 与所属用户，
//! 并通过 `is_noop` 提示是否存在可观察的变化。

mod event_id;
mod mailbox_event;
mod values;

pub use event_id::EventId;
pub use mailbox_event::{
    Added, Event, Expunged, FlagsUpdated, MailboxAclUpdated, MailboxAdded, MailboxDeletion,
    MailboxRenamed, MailboxSubscribed, MailboxUnsubscribed, QuotaUsageUpdated,
};
pub use values::{
    MailboxId, MailboxPath, MessageMetaData, MessageUid, QuotaUsage, UpdatedFlags, Username,
};
