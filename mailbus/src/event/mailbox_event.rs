use super::EventId;
use super::values::{
    MailboxId, MailboxPath, MessageMetaData, QuotaUsage, UpdatedFlags, Username,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 邮箱已创建
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxAdded {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
}

/// 邮箱重命名；新旧路径相同则为 no-op
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxRenamed {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub mailbox_id: MailboxId,
    pub old_path: MailboxPath,
    pub new_path: MailboxPath,
}

/// 邮箱已删除
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxDeletion {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
    pub quota_root: String,
    #[builder(default)]
    pub deleted_message_count: u64,
    #[builder(default)]
    pub total_deleted_size: u64,
}

/// 邮箱 ACL 变更；新旧 ACL 相同则为 no-op
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxAclUpdated {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
    /// 条目名 -> 权限串（如 `lrswipkxtecda`）
    #[builder(default)]
    pub old_acl: BTreeMap<String, String>,
    #[builder(default)]
    pub new_acl: BTreeMap<String, String>,
}

/// 用户订阅了邮箱
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxSubscribed {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
}

/// 用户取消订阅邮箱
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MailboxUnsubscribed {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
}

/// 消息已追加
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Added {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
    #[builder(default)]
    pub added: Vec<MessageMetaData>,
}

/// 消息已删除（或被移动到 `moved_to`）
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Expunged {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
    #[builder(default)]
    pub expunged: Vec<MessageMetaData>,
    pub moved_to: Option<MailboxId>,
}

/// 消息标志位变更
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct FlagsUpdated {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub path: MailboxPath,
    pub mailbox_id: MailboxId,
    #[builder(default)]
    pub updated: Vec<UpdatedFlags>,
}

/// 配额用量更新
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct QuotaUsageUpdated {
    #[builder(default = EventId::random())]
    pub event_id: EventId,
    pub username: Username,
    pub quota_root: String,
    pub count: QuotaUsage,
    pub size: QuotaUsage,
    #[builder(default = Utc::now())]
    pub instant: DateTime<Utc>,
}

/// 邮件服务器领域事件
///
/// 事件一经创建即不可变，总线与监听器只会读取或克隆它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    MailboxAdded(MailboxAdded),
    MailboxRenamed(MailboxRenamed),
    MailboxDeletion(MailboxDeletion),
    MailboxAclUpdated(MailboxAclUpdated),
    MailboxSubscribed(MailboxSubscribed),
    MailboxUnsubscribed(MailboxUnsubscribed),
    Added(Added),
    Expunged(Expunged),
    FlagsUpdated(FlagsUpdated),
    QuotaUsageUpdated(QuotaUsageUpdated),
}

impl Event {
    pub fn event_id(&self) -> EventId {
        match self {
            Event::MailboxAdded(e) => e.event_id,
            Event::MailboxRenamed(e) => e.event_id,
            Event::MailboxDeletion(e) => e.event_id,
            Event::MailboxAclUpdated(e) => e.event_id,
            Event::MailboxSubscribed(e) => e.event_id,
            Event::MailboxUnsubscribed(e) => e.event_id,
            Event::Added(e) => e.event_id,
            Event::Expunged(e) => e.event_id,
            Event::FlagsUpdated(e) => e.event_id,
            Event::QuotaUsageUpdated(e) => e.event_id,
        }
    }

    pub fn username(&self) -> &Username {
        match self {
            Event::MailboxAdded(e) => &e.username,
            Event::MailboxRenamed(e) => &e.username,
            Event::MailboxDeletion(e) => &e.username,
            Event::MailboxAclUpdated(e) => &e.username,
            Event::MailboxSubscribed(e) => &e.username,
            Event::MailboxUnsubscribed(e) => &e.username,
            Event::Added(e) => &e.username,
            Event::Expunged(e) => &e.username,
            Event::FlagsUpdated(e) => &e.username,
            Event::QuotaUsageUpdated(e) => &e.username,
        }
    }

    /// 事件是否不携带任何可观察的变化
    ///
    /// 仅供监听器参考，总线不会据此过滤事件。
    pub fn is_noop(&self) -> bool {
        match self {
            Event::MailboxAdded(_)
            | Event::MailboxDeletion(_)
            | Event::MailboxSubscribed(_)
            | Event::MailboxUnsubscribed(_)
            | Event::QuotaUsageUpdated(_) => false,
            Event::MailboxRenamed(e) => e.old_path == e.new_path,
            Event::MailboxAclUpdated(e) => e.old_acl == e.new_acl,
            Event::Added(e) => e.added.is_empty(),
            Event::Expunged(e) => e.expunged.is_empty(),
            Event::FlagsUpdated(e) => e.updated.is_empty(),
        }
    }

    /// 稳定的事件类型名（与序列化 tag 一致）
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::MailboxAdded(_) => "MailboxAdded",
            Event::MailboxRenamed(_) => "MailboxRenamed",
            Event::MailboxDeletion(_) => "MailboxDeletion",
            Event::MailboxAclUpdated(_) => "MailboxAclUpdated",
            Event::MailboxSubscribed(_) => "MailboxSubscribed",
            Event::MailboxUnsubscribed(_) => "MailboxUnsubscribed",
            Event::Added(_) => "Added",
            Event::Expunged(_) => "Expunged",
            Event::FlagsUpdated(_) => "FlagsUpdated",
            Event::QuotaUsageUpdated(_) => "QuotaUsageUpdated",
        }
    }

    /// 邮箱范围事件所属的邮箱
    pub fn mailbox_id(&self) -> Option<MailboxId> {
        match self {
            Event::MailboxAdded(e) => Some(e.mailbox_id),
            Event::MailboxRenamed(e) => Some(e.mailbox_id),
            Event::MailboxDeletion(e) => Some(e.mailbox_id),
            Event::MailboxAclUpdated(e) => Some(e.mailbox_id),
            Event::MailboxSubscribed(e) => Some(e.mailbox_id),
            Event::MailboxUnsubscribed(e) => Some(e.mailbox_id),
            Event::Added(e) => Some(e.mailbox_id),
            Event::Expunged(e) => Some(e.mailbox_id),
            Event::FlagsUpdated(e) => Some(e.mailbox_id),
            Event::QuotaUsageUpdated(_) => None,
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Event {
                fn from(value: $variant) -> Self {
                    Event::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(
    MailboxAdded,
    MailboxRenamed,
    MailboxDeletion,
    MailboxAclUpdated,
    MailboxSubscribed,
    MailboxUnsubscribed,
    Added,
    Expunged,
    FlagsUpdated,
    QuotaUsageUpdated,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MessageMetaData;

    fn inbox() -> MailboxPath {
        MailboxPath::for_user(Username::new("bob"), "INBOX")
    }

    #[test]
    fn rename_to_same_path_is_noop() {
        let mailbox_id = MailboxId::random();
        let same: Event = MailboxRenamed::builder()
            .username(Username::new("bob"))
            .mailbox_id(mailbox_id)
            .old_path(inbox())
            .new_path(inbox())
            .build()
            .into();
        assert!(same.is_noop());

        let moved: Event = MailboxRenamed::builder()
            .username(Username::new("bob"))
            .mailbox_id(mailbox_id)
            .old_path(inbox())
            .new_path(MailboxPath::for_user(Username::new("bob"), "Archive"))
            .build()
            .into();
        assert!(!moved.is_noop());
    }

    #[test]
    fn empty_expunge_is_noop() {
        let empty: Event = Expunged::builder()
            .username(Username::new("bob"))
            .path(inbox())
            .mailbox_id(MailboxId::random())
            .build()
            .into();
        assert!(empty.is_noop());

        let one: Event = Expunged::builder()
            .username(Username::new("bob"))
            .path(inbox())
            .mailbox_id(MailboxId::random())
            .expunged(vec![MessageMetaData::new(1, 42)])
            .build()
            .into();
        assert!(!one.is_noop());
        assert_eq!(one.event_type(), "Expunged");
    }

    #[test]
    fn json_tag_matches_event_type() {
        let event: Event = MailboxAdded::builder()
            .username(Username::new("bob"))
            .path(inbox())
            .mailbox_id(MailboxId::random())
            .build()
            .into();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn quota_events_have_no_mailbox() {
        let event: Event = QuotaUsageUpdated::builder()
            .username(Username::new("bob"))
            .quota_root("#private&bob".to_string())
            .count(QuotaUsage { used: 1, limit: None })
            .size(QuotaUsage { used: 10, limit: Some(100) })
            .build()
            .into();
        assert_eq!(event.mailbox_id(), None);
        assert!(!event.is_noop());
    }

    #[test]
    fn subscription_events_are_mailbox_scoped_changes() {
        let mailbox_id = MailboxId::random();
        let subscribed: Event = MailboxSubscribed::builder()
            .username(Username::new("bob"))
            .path(inbox())
            .mailbox_id(mailbox_id)
            .build()
            .into();
        let unsubscribed: Event = MailboxUnsubscribed::builder()
            .username(Username::new("bob"))
            .path(inbox())
            .mailbox_id(mailbox_id)
            .build()
            .into();

        assert_eq!(subscribed.event_type(), "MailboxSubscribed");
        assert_eq!(unsubscribed.event_type(), "MailboxUnsubscribed");
        for event in [subscribed, unsubscribed] {
            assert!(!event.is_noop());
            assert_eq!(event.mailbox_id(), Some(mailbox_id));
            assert_eq!(event.username(), &Username::new("bob"));
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
            assert_eq!(serde_json::from_value::<Event>(value).unwrap(), event);
        }
    }
}
