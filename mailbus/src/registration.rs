use crate::group::Group;
use crate::key::RoutingKey;
use crate::listener::ListenerRef;
use crate::registry::RegistryInner;
use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

type CleanupFn = Box<dyn Fn() + Send + Sync>;

pub(crate) enum RegistrationTarget {
    Key {
        key: RoutingKey,
        listener: ListenerRef,
    },
    Group {
        group: Group,
        registration_id: u64,
    },
}

/// 订阅句柄
///
/// 唯一的操作是取消：取消后后续的分发不再到达该监听器，
/// 但不会打断已经在进行中的投递。重复取消是安全的。
pub struct Registration {
    target: RegistrationTarget,
    registry: Weak<RegistryInner>,
    cancelled: AtomicBool,
    on_cancel: Option<CleanupFn>,
}

impl Registration {
    pub(crate) fn new(target: RegistrationTarget, registry: Weak<RegistryInner>) -> Self {
        Self {
            target,
            registry,
            cancelled: AtomicBool::new(false),
            on_cancel: None,
        }
    }

    /// 取消成功后执行的清理动作（例如回收异步投递通道）
    pub(crate) fn with_cleanup(mut self, cleanup: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Box::new(cleanup));
        self
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            match &self.target {
                RegistrationTarget::Key { key, listener } => registry.remove_key(key, listener),
                RegistrationTarget::Group {
                    group,
                    registration_id,
                } => registry.remove_group(group, *registration_id),
            }
        }
        if let Some(cleanup) = &self.on_cancel {
            cleanup();
        }
    }

    /// 句柄是否仍未被取消
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }

    pub fn group(&self) -> Option<&Group> {
        match &self.target {
            RegistrationTarget::Group { group, .. } => Some(group),
            RegistrationTarget::Key { .. } => None,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Registration");
        match &self.target {
            RegistrationTarget::Key { key, listener } => {
                s.field("key", key).field("listener", listener)
            }
            RegistrationTarget::Group { group, .. } => s.field("group", group),
        };
        s.field("active", &self.is_active()).finish()
    }
}
