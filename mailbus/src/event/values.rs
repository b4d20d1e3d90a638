use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 用户名
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Username {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 邮箱标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailboxId(Uuid);

impl MailboxId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MailboxId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// 邮箱路径：命名空间 + 所属用户 + 名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxPath {
    pub namespace: String,
    pub user: Option<Username>,
    pub name: String,
}

impl MailboxPath {
    pub const PRIVATE_NAMESPACE: &'static str = "#private";

    pub fn for_user(user: Username, name: impl Into<String>) -> Self {
        Self {
            namespace: Self::PRIVATE_NAMESPACE.to_string(),
            user: Some(user),
            name: name.into(),
        }
    }
}

impl fmt::Display for MailboxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}:{}:{}", self.namespace, user, self.name),
            None => write!(f, "{}:{}", self.namespace, self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageUid(pub u32);

/// 消息元数据（新增/删除事件中携带）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetaData {
    pub uid: MessageUid,
    pub size: u64,
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl MessageMetaData {
    pub fn new(uid: u32, size: u64) -> Self {
        Self {
            uid: MessageUid(uid),
            size,
            flags: BTreeSet::new(),
        }
    }
}

/// 单条消息的标志位变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedFlags {
    pub uid: MessageUid,
    pub old_flags: BTreeSet<String>,
    pub new_flags: BTreeSet<String>,
}

impl UpdatedFlags {
    pub fn new(uid: u32, old_flags: BTreeSet<String>, new_flags: BTreeSet<String>) -> Self {
        Self {
            uid: MessageUid(uid),
            old_flags,
            new_flags,
        }
    }

    pub fn added(&self) -> impl Iterator<Item = &String> {
        self.new_flags.difference(&self.old_flags)
    }

    pub fn removed(&self) -> impl Iterator<Item = &String> {
        self.old_flags.difference(&self.new_flags)
    }
}

/// 配额用量，`limit` 为空表示不限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub used: u64,
    pub limit: Option<u64>,
}

impl QuotaUsage {
    pub fn new(used: u64, limit: Option<u64>) -> Self {
        Self { used, limit }
    }

    pub fn is_exceeded(&self) -> bool {
        self.limit.is_some_and(|limit| self.used > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updated_flags_diff() {
        let flags = UpdatedFlags {
            uid: MessageUid(1),
            old_flags: ["\\Seen".to_string(), "\\Draft".to_string()].into(),
            new_flags: ["\\Seen".to_string(), "\\Flagged".to_string()].into(),
        };
        assert_eq!(flags.added().collect::<Vec<_>>(), vec!["\\Flagged"]);
        assert_eq!(flags.removed().collect::<Vec<_>>(), vec!["\\Draft"]);
    }

    #[test]
    fn quota_exceeded_only_with_limit() {
        assert!(!QuotaUsage { used: 10, limit: None }.is_exceeded());
        assert!(QuotaUsage { used: 11, limit: Some(10) }.is_exceeded());
    }

    #[test]
    fn mailbox_path_display() {
        let path = MailboxPath::for_user(Username::new("bob"), "INBOX");
        assert_eq!(path.to_string(), "#private:bob:INBOX");
    }
}
