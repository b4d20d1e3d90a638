use super::EventDeadLetters;
use crate::error::EventBusResult;
use crate::event::{Event, EventId};
use crate::group::Group;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;

/// 内存版死信存储
///
/// 每个分组一条 `DashMap` 记录，只在该分组所在分片上加锁；分组的最后一条事件被删除时
/// 分组记录一并移除，使 `groups_with_failed_events` 只返回非空分组。
#[derive(Debug, Default)]
pub struct InMemoryEventDeadLetters {
    groups: DashMap<Group, BTreeMap<EventId, Event>>,
}

impl InMemoryEventDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventDeadLetters for InMemoryEventDeadLetters {
    async fn store(&self, group: &Group, event: &Event) -> EventBusResult<()> {
        self.groups
            .entry(group.clone())
            .or_default()
            .insert(event.event_id(), event.clone());
        Ok(())
    }

    async fn remove(&self, group: &Group, event_id: EventId) -> EventBusResult<()> {
        if let Entry::Occupied(mut entry) = self.groups.entry(group.clone()) {
            entry.get_mut().remove(&event_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        Ok(())
    }

    async fn remove_group(&self, group: &Group) -> EventBusResult<()> {
        self.groups.remove(group);
        Ok(())
    }

    async fn failed_event(
        &self,
        group: &Group,
        event_id: EventId,
    ) -> EventBusResult<Option<Event>> {
        Ok(self
            .groups
            .get(group)
            .and_then(|events| events.get(&event_id).cloned()))
    }

    async fn failed_event_ids(&self, group: &Group) -> EventBusResult<Vec<EventId>> {
        Ok(self
            .groups
            .get(group)
            .map(|events| events.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn groups_with_failed_events(&self) -> EventBusResult<Vec<Group>> {
        let mut groups: Vec<Group> = self.groups.iter().map(|e| e.key().clone()).collect();
        groups.sort();
        Ok(groups)
    }

    async fn contain_events(&self) -> EventBusResult<bool> {
        Ok(!self.groups.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MailboxAdded, MailboxId, MailboxPath, Username};
    use std::sync::Arc;

    fn event() -> Event {
        MailboxAdded::builder()
            .username(Username::new("user"))
            .path(MailboxPath::for_user(Username::new("user"), "INBOX"))
            .mailbox_id(MailboxId::random())
            .build()
            .into()
    }

    #[tokio::test]
    async fn store_is_idempotent() {
        let store = InMemoryEventDeadLetters::new();
        let group = Group::generic("a");
        let e = event();
        store.store(&group, &e).await.unwrap();
        store.store(&group, &e).await.unwrap();
        assert_eq!(store.failed_event_ids(&group).await.unwrap(), vec![e.event_id()]);
    }

    #[tokio::test]
    async fn removing_last_event_prunes_group() {
        let store = InMemoryEventDeadLetters::new();
        let group = Group::generic("a");
        let e = event();
        store.store(&group, &e).await.unwrap();
        store.remove(&group, e.event_id()).await.unwrap();
        store.remove(&group, e.event_id()).await.unwrap();
        assert!(store.groups_with_failed_events().await.unwrap().is_empty());
        assert!(!store.contain_events().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stores_keep_every_event() {
        let store = Arc::new(InMemoryEventDeadLetters::new());
        let groups: Vec<Group> = (0..10).map(|i| Group::generic(format!("g{i}"))).collect();

        let tasks: Vec<_> = groups
            .iter()
            .cloned()
            .map(|group| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    for _ in 0..50 {
                        let e = event();
                        store.store(&group, &e).await.unwrap();
                        ids.push(e.event_id());
                    }
                    ids.sort();
                    (group, ids)
                })
            })
            .collect();

        for task in tasks {
            let (group, ids) = task.await.unwrap();
            assert_eq!(store.failed_event_ids(&group).await.unwrap(), ids);
        }
        assert_eq!(store.groups_with_failed_events().await.unwrap().len(), 10);
    }
}
