use super::EventBus;
use super::in_flight::{InFlight, InFlightGuard};
use crate::config::EventBusConfig;
use crate::dead_letters::EventDeadLetters;
use crate::error::{EventBusError, EventBusResult, ListenerFailure};
use crate::event::Event;
use crate::group::Group;
use crate::key::RegistrationKey;
use crate::listener::{EventListener, ExecutionMode, ListenerRef};
use crate::registration::Registration;
use crate::registry::RegistrationRegistry;
use crate::retry::{DeliveryOutcome, GroupDelivery};
use async_trait::async_trait;
use bon::bon;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::task::TaskTracker;

type Lane = mpsc::UnboundedSender<(Event, InFlightGuard)>;

struct BusInner {
    config: EventBusConfig,
    registry: RegistrationRegistry,
    delivery: GroupDelivery,
    dead_letters: Arc<dyn EventDeadLetters>,
    permits: Arc<Semaphore>,
    /// 异步键监听器各自的串行通道，保证同一监听器按分发顺序处理
    lanes: DashMap<ListenerRef, Lane>,
    tracker: TaskTracker,
    in_flight: Arc<InFlight>,
}

/// 进程内事件总线
///
/// - 同步键监听器在 `dispatch` 调用方的任务上执行（最多 `max_concurrency` 个并发），
///   失败汇总后返回；
/// - 异步键监听器进入各自的 FIFO 通道，由后台任务依次处理，失败仅记录日志；
/// - 每个 `(分组, 事件)` 派生一个后台投递任务，经 `GroupDelivery` 重试并写死信。
///
/// 后台调用共用一个容量为 `max_concurrency` 的信号量。
#[derive(Clone)]
pub struct InVmEventBus {
    inner: Arc<BusInner>,
}

#[bon]
impl InVmEventBus {
    #[builder]
    pub fn new(
        dead_letters: Arc<dyn EventDeadLetters>,
        #[builder(default)] config: EventBusConfig,
    ) -> EventBusResult<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrency));
        let delivery = GroupDelivery::new(config.retry, dead_letters.clone(), permits.clone());
        Ok(Self {
            inner: Arc::new(BusInner {
                config,
                registry: RegistrationRegistry::new(),
                delivery,
                dead_letters,
                permits,
                lanes: DashMap::new(),
                tracker: TaskTracker::new(),
                in_flight: InFlight::new(),
            }),
        })
    }
}

impl InVmEventBus {
    pub fn config(&self) -> &EventBusConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &RegistrationRegistry {
        &self.inner.registry
    }

    pub fn dead_letters(&self) -> &Arc<dyn EventDeadLetters> {
        &self.inner.dead_letters
    }

    /// 当前尚未结束的后台调用数（异步键监听器与分组投递）
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.current()
    }

    /// 等待所有已接收的后台调用结束（包括分组重试）
    pub async fn drain(&self) {
        self.inner.in_flight.wait_idle().await;
    }

    /// 停止接收新事件，等待后台任务全部结束
    ///
    /// 之后的 `dispatch` 与 `re_deliver` 返回 `ShutDown`。
    pub async fn shutdown(&self) {
        self.inner.tracker.close();
        // 关闭通道，后台任务处理完积压后退出
        self.inner.lanes.clear();
        self.inner.tracker.wait().await;
        tracing::info!("event bus shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.tracker.is_closed()
    }

    fn ensure_running(&self) -> EventBusResult<()> {
        if self.is_shut_down() {
            return Err(EventBusError::ShutDown);
        }
        Ok(())
    }
}

impl BusInner {
    fn enqueue(&self, listener: Arc<dyn EventListener>, event: &Event) {
        if self.tracker.is_closed() {
            return;
        }
        let guard = self.in_flight.enter();
        let key = ListenerRef(listener.clone());
        let lane = self
            .lanes
            .entry(key.clone())
            .or_insert_with(|| self.spawn_lane(listener))
            .clone();
        // 与 shutdown 并发时，清理之后新建的通道不能留下
        if self.tracker.is_closed() {
            self.lanes.remove(&key);
        }
        // 发送失败时 guard 随消息一起析构
        let _ = lane.send((event.clone(), guard));
    }

    fn spawn_lane(&self, listener: Arc<dyn EventListener>) -> Lane {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Event, InFlightGuard)>();
        let permits = self.permits.clone();
        self.tracker.spawn(async move {
            while let Some((event, _guard)) = rx.recv().await {
                let _permit = permits.acquire().await.ok();
                if let Err(err) = listener.event(&event).await {
                    tracing::warn!(
                        listener = listener.listener_name(),
                        event_id = %event.event_id(),
                        error = %format!("{err:#}"),
                        "asynchronous key listener failed"
                    );
                }
            }
        });
        tx
    }

    fn submit_groups(&self, event: &Event) {
        if self.tracker.is_closed() {
            return;
        }
        for (group, listener) in self.registry.all_group_listeners() {
            if !listener.is_handling(event) {
                continue;
            }
            let guard = self.in_flight.enter();
            let delivery = self.delivery.clone();
            let event = event.clone();
            self.tracker.spawn(async move {
                let _guard = guard;
                if let Err(err) = delivery.deliver(&group, listener.as_ref(), &event).await {
                    tracing::error!(
                        %group,
                        event_id = %event.event_id(),
                        error = %err,
                        "failed to store dead letter"
                    );
                }
            });
        }
    }

    async fn run_synchronous(
        &self,
        listeners: Vec<Arc<dyn EventListener>>,
        event: &Event,
    ) -> Vec<ListenerFailure> {
        let calls: Vec<BoxFuture<'_, Option<ListenerFailure>>> = listeners
            .into_iter()
            .map(|listener| {
                Box::pin(async move {
                    let result = listener.event(event).await;
                    result
                        .err()
                        .map(|err| ListenerFailure::new(listener.listener_name(), &err))
                }) as BoxFuture<'_, Option<ListenerFailure>>
            })
            .collect();
        stream::iter(calls)
            .buffer_unordered(self.config.max_concurrency)
            .filter_map(future::ready)
            .collect()
            .await
    }
}

#[async_trait]
impl EventBus for InVmEventBus {
    fn register_key(
        &self,
        listener: Arc<dyn EventListener>,
        key: &dyn RegistrationKey,
    ) -> Registration {
        let registration = self.inner.registry.register_key(listener.clone(), key);
        if listener.execution_mode() != ExecutionMode::Asynchronous {
            return registration;
        }
        let inner = Arc::downgrade(&self.inner);
        let listener = ListenerRef(listener);
        registration.with_cleanup(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if !inner.registry.is_key_registered(&listener) {
                inner.lanes.remove(&listener);
            }
        })
    }

    fn register_group(
        &self,
        listener: Arc<dyn EventListener>,
        group: Group,
    ) -> EventBusResult<Registration> {
        let registration = self.inner.registry.register_group(listener, group)?;
        tracing::debug!(group = ?registration.group(), "group listener registered");
        Ok(registration)
    }

    async fn dispatch(&self, event: Event, keys: &[&dyn RegistrationKey]) -> EventBusResult<()> {
        self.ensure_running()?;
        let inner = &self.inner;
        tracing::trace!(
            event_id = %event.event_id(),
            event_type = event.event_type(),
            keys = keys.len(),
            "dispatching event"
        );

        let mut synchronous = Vec::new();
        for listener in inner.registry.listeners_for(keys.iter().copied()) {
            if !listener.is_handling(&event) {
                continue;
            }
            match listener.execution_mode() {
                ExecutionMode::Synchronous => synchronous.push(listener),
                ExecutionMode::Asynchronous => inner.enqueue(listener, &event),
            }
        }

        inner.submit_groups(&event);

        let failures = inner.run_synchronous(synchronous, &event).await;
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            tracing::warn!(event_id = %event.event_id(), error = %failure, "key listener failed");
        }
        Err(EventBusError::KeyListenersFailed {
            event_id: event.event_id(),
            failures,
        })
    }

    async fn re_deliver(&self, group: &Group, event: Event) -> EventBusResult<DeliveryOutcome> {
        self.ensure_running()?;
        let listener = self.inner.registry.group_listener(group).ok_or_else(|| {
            EventBusError::GroupNotRegistered {
                group: group.as_string(),
            }
        })?;
        let _guard = self.inner.in_flight.enter();
        self.inner
            .delivery
            .deliver(group, listener.as_ref(), &event)
            .await
    }
}
