//! 事件总线（EventBus）协议与进程内实现
//!
//! 两种订阅方式、两种可靠性约定：
//! - 键订阅：临时、动态，最多一次投递，不重试、不持久化；
//! - 分组订阅：持久、具名，每个分组收到所有匹配事件的广播，失败按退避重试，
//!   耗尽后写入死信。
//!
//! 协议本身与传输无关，跨进程传输可以实现同一 trait。
//!
mod in_flight;
mod in_vm;

pub use in_vm::InVmEventBus;

use crate::error::EventBusResult;
use crate::event::Event;
use crate::group::Group;
use crate::key::RegistrationKey;
use crate::listener::{EventListener, GroupEventListener};
use crate::registration::Registration;
use crate::retry::DeliveryOutcome;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// 在键上注册监听器，总是成功
    fn register_key(
        &self,
        listener: Arc<dyn EventListener>,
        key: &dyn RegistrationKey,
    ) -> Registration;

    /// 注册分组监听器；分组已被占用时返回 `GroupAlreadyRegistered`
    fn register_group(
        &self,
        listener: Arc<dyn EventListener>,
        group: Group,
    ) -> EventBusResult<Registration>;

    /// 以监听器的默认分组注册
    fn register_group_listener<L>(&self, listener: Arc<L>) -> EventBusResult<Registration>
    where
        L: GroupEventListener + 'static,
        Self: Sized,
    {
        let group = listener.default_group();
        self.register_group(listener, group)
    }

    /// 分发事件：同步键监听器执行完毕、分组投递被接收后返回
    ///
    /// 同步键监听器的失败汇总为 `KeyListenersFailed` 返回；分组失败不会反馈给调用方。
    async fn dispatch(&self, event: Event, keys: &[&dyn RegistrationKey]) -> EventBusResult<()>;

    async fn dispatch_one(&self, event: Event, key: &dyn RegistrationKey) -> EventBusResult<()> {
        self.dispatch(event, &[key]).await
    }

    /// 将事件重新投递给分组当前的监听器（同样经过重试与死信），等待投递结束
    ///
    /// 分组没有活跃监听器时返回 `GroupNotRegistered`。
    async fn re_deliver(&self, group: &Group, event: Event) -> EventBusResult<DeliveryOutcome>;
}
