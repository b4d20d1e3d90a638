//! 注册表（RegistrationRegistry）
//!
//! 进程内维护“键 -> 监听器集合”与“分组 -> 唯一监听器”两张表，是分发引擎中唯一
//! 的共享可变状态。两张表均基于 `DashMap`，单个键/分组的更新在其分片锁内原子完成。
//!
//! 分组独占只在本进程内保证，不是集群级别的锁。
//!
use crate::error::{EventBusError, EventBusResult};
use crate::group::Group;
use crate::key::{RegistrationKey, RoutingKey};
use crate::listener::{EventListener, ListenerRef};
use crate::registration::{Registration, RegistrationTarget};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct GroupSlot {
    registration_id: u64,
    listener: Arc<dyn EventListener>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    keys: DashMap<RoutingKey, Vec<ListenerRef>>,
    groups: DashMap<Group, GroupSlot>,
    next_registration_id: AtomicU64,
}

impl RegistryInner {
    pub(crate) fn remove_key(&self, key: &RoutingKey, listener: &ListenerRef) {
        if let Entry::Occupied(mut entry) = self.keys.entry(key.clone()) {
            entry.get_mut().retain(|l| l != listener);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub(crate) fn remove_group(&self, group: &Group, registration_id: u64) {
        // 旧句柄不得移除同一分组后来的注册
        self.groups
            .remove_if(group, |_, slot| slot.registration_id == registration_id);
    }
}

/// 监听器注册表
#[derive(Clone, Default)]
pub struct RegistrationRegistry {
    inner: Arc<RegistryInner>,
}

impl RegistrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将监听器加入键对应的集合；同一实例重复注册只保留一份
    pub fn register_key(
        &self,
        listener: Arc<dyn EventListener>,
        key: &dyn RegistrationKey,
    ) -> Registration {
        let routing_key = key.routing_key();
        let listener = ListenerRef(listener);
        {
            let mut listeners = self.inner.keys.entry(routing_key.clone()).or_default();
            if !listeners.contains(&listener) {
                listeners.push(listener.clone());
            }
        }
        Registration::new(
            RegistrationTarget::Key {
                key: routing_key,
                listener,
            },
            Arc::downgrade(&self.inner),
        )
    }

    /// 将监听器设为分组的唯一处理者；分组已被占用时失败且不改变任何状态
    pub fn register_group(
        &self,
        listener: Arc<dyn EventListener>,
        group: Group,
    ) -> EventBusResult<Registration> {
        let registration_id = match self.inner.groups.entry(group.clone()) {
            Entry::Occupied(_) => {
                return Err(EventBusError::GroupAlreadyRegistered {
                    group: group.as_string(),
                });
            }
            Entry::Vacant(vacant) => {
                let registration_id = self
                    .inner
                    .next_registration_id
                    .fetch_add(1, Ordering::Relaxed);
                vacant.insert(GroupSlot {
                    registration_id,
                    listener,
                });
                registration_id
            }
        };
        Ok(Registration::new(
            RegistrationTarget::Group {
                group,
                registration_id,
            },
            Arc::downgrade(&self.inner),
        ))
    }

    /// 给定键集合上所有监听器的并集（按实例去重）
    pub fn listeners_for<'a, I>(&self, keys: I) -> Vec<Arc<dyn EventListener>>
    where
        I: IntoIterator<Item = &'a dyn RegistrationKey>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in keys {
            let Some(listeners) = self.inner.keys.get(&key.routing_key()) else {
                continue;
            };
            for listener in listeners.iter() {
                if seen.insert(listener.clone()) {
                    out.push(listener.0.clone());
                }
            }
        }
        out
    }

    /// 当前所有分组及其监听器的快照
    pub fn all_group_listeners(&self) -> Vec<(Group, Arc<dyn EventListener>)> {
        self.inner
            .groups
            .iter()
            .map(|slot| (slot.key().clone(), slot.listener.clone()))
            .collect()
    }

    pub fn group_listener(&self, group: &Group) -> Option<Arc<dyn EventListener>> {
        self.inner.groups.get(group).map(|slot| slot.listener.clone())
    }

    /// 监听器实例是否仍注册在任意键上
    pub(crate) fn is_key_registered(&self, listener: &ListenerRef) -> bool {
        self.inner
            .keys
            .iter()
            .any(|entry| entry.value().contains(listener))
    }
}
