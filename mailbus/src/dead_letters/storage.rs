use super::EventDeadLetters;
use crate::error::{EventBusResult, GroupDeserializationError};
use crate::event::{Event, EventId};
use crate::group::{Group, GroupRegistry};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 死信在持久化层的标准形态
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedDeadLetter {
    /// 分组序列化名（`Group::as_string`）
    group: String,
    event_id: EventId,
    /// 事件类型，便于不反序列化负载直接查询
    event_type: String,
    /// 完整事件（JSON）
    payload: Value,
    #[builder(default = Utc::now())]
    stored_at: DateTime<Utc>,
}

impl SerializedDeadLetter {
    pub fn from_event(group: &Group, event: &Event) -> EventBusResult<Self> {
        Ok(Self::builder()
            .group(group.as_string())
            .event_id(event.event_id())
            .event_type(event.event_type().to_string())
            .payload(serde_json::to_value(event)?)
            .build())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn to_event(&self) -> EventBusResult<Event> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// 持久化死信后端（外部协作方），以分组序列化名为索引
#[async_trait]
pub trait DeadLetterStorage: Send + Sync {
    async fn put(&self, letter: SerializedDeadLetter) -> EventBusResult<()>;

    async fn delete(&self, group: &str, event_id: EventId) -> EventBusResult<()>;

    async fn delete_group(&self, group: &str) -> EventBusResult<()>;

    async fn get(&self, group: &str, event_id: EventId)
    -> EventBusResult<Option<SerializedDeadLetter>>;

    async fn event_ids(&self, group: &str) -> EventBusResult<Vec<EventId>>;

    /// 当前存有死信的全部分组名（未经解析）
    async fn group_names(&self) -> EventBusResult<Vec<String>>;
}

/// 内存版持久化后端，供测试与示例使用
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStorage {
    groups: DashMap<String, BTreeMap<EventId, SerializedDeadLetter>>,
}

impl InMemoryDeadLetterStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStorage for InMemoryDeadLetterStorage {
    async fn put(&self, letter: SerializedDeadLetter) -> EventBusResult<()> {
        self.groups
            .entry(letter.group.clone())
            .or_default()
            .insert(letter.event_id, letter);
        Ok(())
    }

    async fn delete(&self, group: &str, event_id: EventId) -> EventBusResult<()> {
        if let Entry::Occupied(mut entry) = self.groups.entry(group.to_string()) {
            entry.get_mut().remove(&event_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        Ok(())
    }

    async fn delete_group(&self, group: &str) -> EventBusResult<()> {
        self.groups.remove(group);
        Ok(())
    }

    async fn get(
        &self,
        group: &str,
        event_id: EventId,
    ) -> EventBusResult<Option<SerializedDeadLetter>> {
        Ok(self
            .groups
            .get(group)
            .and_then(|letters| letters.get(&event_id).cloned()))
    }

    async fn event_ids(&self, group: &str) -> EventBusResult<Vec<EventId>> {
        Ok(self
            .groups
            .get(group)
            .map(|letters| letters.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn group_names(&self) -> EventBusResult<Vec<String>> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

/// 基于持久化后端的死信存储
///
/// 分组名经 `GroupRegistry` 解析；无法解析的分组在列举时跳过并记录告警，
/// 可通过 `unresolved_groups` 单独查看，不影响其余分组的列举。
pub struct StorageEventDeadLetters<S> {
    storage: S,
    groups: GroupRegistry,
}

impl<S: DeadLetterStorage> StorageEventDeadLetters<S> {
    pub fn new(storage: S, groups: GroupRegistry) -> Self {
        Self { storage, groups }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 存储中无法解析为已知分组的名称
    pub async fn unresolved_groups(&self) -> EventBusResult<Vec<GroupDeserializationError>> {
        Ok(self
            .storage
            .group_names()
            .await?
            .iter()
            .filter_map(|name| self.groups.deserialize(name).err())
            .collect())
    }
}

#[async_trait]
impl<S: DeadLetterStorage> EventDeadLetters for StorageEventDeadLetters<S> {
    async fn store(&self, group: &Group, event: &Event) -> EventBusResult<()> {
        let letter = SerializedDeadLetter::from_event(group, event)?;
        self.storage.put(letter).await
    }

    async fn remove(&self, group: &Group, event_id: EventId) -> EventBusResult<()> {
        self.storage.delete(&group.as_string(), event_id).await
    }

    async fn remove_group(&self, group: &Group) -> EventBusResult<()> {
        self.storage.delete_group(&group.as_string()).await
    }

    async fn failed_event(
        &self,
        group: &Group,
        event_id: EventId,
    ) -> EventBusResult<Option<Event>> {
        self.storage
            .get(&group.as_string(), event_id)
            .await?
            .map(|letter| letter.to_event())
            .transpose()
    }

    async fn failed_event_ids(&self, group: &Group) -> EventBusResult<Vec<EventId>> {
        self.storage.event_ids(&group.as_string()).await
    }

    async fn groups_with_failed_events(&self) -> EventBusResult<Vec<Group>> {
        let names = self.storage.group_names().await?;
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            match self.groups.deserialize(&name) {
                Ok(group) => groups.push(group),
                Err(err) => tracing::warn!(group = %name, error = %err, "skipping unresolvable dead letter group"),
            }
        }
        Ok(groups)
    }

    async fn contain_events(&self) -> EventBusResult<bool> {
        Ok(!self.storage.group_names().await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Expunged, MailboxId, MailboxPath, MessageMetaData, Username};
    use crate::group;
    use crate::group::GroupType;

    #[group]
    struct IndexerGroup;

    fn event() -> Event {
        Expunged::builder()
            .username(Username::new("user"))
            .path(MailboxPath::for_user(Username::new("user"), "INBOX"))
            .mailbox_id(MailboxId::random())
            .expunged(vec![MessageMetaData::new(3, 1024)])
            .build()
            .into()
    }

    fn dead_letters() -> StorageEventDeadLetters<InMemoryDeadLetterStorage> {
        StorageEventDeadLetters::new(
            InMemoryDeadLetterStorage::new(),
            GroupRegistry::new().with::<IndexerGroup>(),
        )
    }

    #[tokio::test]
    async fn events_survive_serialization() {
        let store = dead_letters();
        let group = IndexerGroup::group();
        let e = event();
        store.store(&group, &e).await.unwrap();

        assert_eq!(store.failed_event(&group, e.event_id()).await.unwrap(), Some(e.clone()));
        let letter = store
            .storage()
            .get(&group.as_string(), e.event_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(letter.event_type(), "Expunged");
        assert_eq!(letter.group(), IndexerGroup::NAME);
    }

    #[tokio::test]
    async fn unresolvable_groups_do_not_break_listing() {
        let store = dead_letters();
        store.store(&IndexerGroup::group(), &event()).await.unwrap();
        store.store(&Group::generic("audit"), &event()).await.unwrap();
        let orphan = SerializedDeadLetter::from_event(&Group::Typed("removed.Listener"), &event()).unwrap();
        store.storage().put(orphan).await.unwrap();

        let groups = store.groups_with_failed_events().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&IndexerGroup::group()));
        assert!(groups.contains(&Group::generic("audit")));

        let unresolved = store.unresolved_groups().await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].name, "removed.Listener");
        assert!(store.contain_events().await.unwrap());
    }

    #[tokio::test]
    async fn remove_group_clears_only_that_group() {
        let store = dead_letters();
        store.store(&IndexerGroup::group(), &event()).await.unwrap();
        store.store(&Group::generic("audit"), &event()).await.unwrap();

        store.remove_group(&IndexerGroup::group()).await.unwrap();

        assert_eq!(
            store.groups_with_failed_events().await.unwrap(),
            vec![Group::generic("audit")]
        );
    }

    #[tokio::test]
    async fn empty_generic_group_stays_listed() {
        let store = dead_letters();
        let group = Group::generic("");
        let e = event();
        store.store(&group, &e).await.unwrap();

        assert_eq!(store.groups_with_failed_events().await.unwrap(), vec![group.clone()]);
        assert!(store.unresolved_groups().await.unwrap().is_empty());
        assert_eq!(
            store.failed_event_ids(&group).await.unwrap(),
            vec![e.event_id()]
        );
    }
}
