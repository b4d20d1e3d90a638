//! 事件监听器（EventListener）
//!
//! 统一的能力接口：处理事件、声明关注哪些事件、声明执行方式。
//! “带默认分组”的监听器额外实现 `GroupEventListener`。
//!
//! 适配器以显式构造函数提供：
//! - `FnListener`：由闭包构造监听器；
//! - `GroupListener`：为任意监听器附加默认分组。
//!
use crate::event::Event;
use crate::group::Group;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// 监听器相对于 `dispatch` 调用方的执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// 在调用方路径上执行，失败会反馈给调用方
    #[default]
    Synchronous,
    /// 脱离调用方执行，失败仅记录日志
    Asynchronous,
}

/// 事件监听器
#[async_trait]
pub trait EventListener: Send + Sync {
    /// 处理事件；返回错误表示本次处理失败
    async fn event(&self, event: &Event) -> anyhow::Result<()>;

    /// 是否关注该事件；返回 false 时不会被调用，也不会重试或记录
    fn is_handling(&self, _event: &Event) -> bool {
        true
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Synchronous
    }

    /// 监听器名称（用于日志与失败报告）
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 带默认分组的监听器
pub trait GroupEventListener: EventListener {
    fn default_group(&self) -> Group;
}

type HandlerFn = dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;
type PredicateFn = dyn Fn(&Event) -> bool + Send + Sync;

/// 由闭包构造的监听器
#[derive(Clone)]
pub struct FnListener {
    name: String,
    handler: Arc<HandlerFn>,
    predicate: Option<Arc<PredicateFn>>,
    mode: ExecutionMode,
}

impl FnListener {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |event| Box::pin(handler(event))),
            predicate: None,
            mode: ExecutionMode::Synchronous,
        }
    }

    /// 只处理满足条件的事件
    pub fn handling<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.mode = ExecutionMode::Asynchronous;
        self
    }
}

impl fmt::Debug for FnListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventListener for FnListener {
    async fn event(&self, event: &Event) -> anyhow::Result<()> {
        (self.handler)(event.clone()).await
    }

    fn is_handling(&self, event: &Event) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(event))
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn listener_name(&self) -> &str {
        &self.name
    }
}

/// 为任意监听器附加默认分组
pub struct GroupListener<L> {
    group: Group,
    inner: L,
}

impl<L: EventListener> GroupListener<L> {
    pub fn new(group: Group, inner: L) -> Self {
        Self { group, inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: EventListener> EventListener for GroupListener<L> {
    async fn event(&self, event: &Event) -> anyhow::Result<()> {
        self.inner.event(event).await
    }

    fn is_handling(&self, event: &Event) -> bool {
        self.inner.is_handling(event)
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.inner.execution_mode()
    }

    fn listener_name(&self) -> &str {
        self.inner.listener_name()
    }
}

impl<L: EventListener> GroupEventListener for GroupListener<L> {
    fn default_group(&self) -> Group {
        self.group.clone()
    }
}

/// 按实例身份比较的监听器引用
///
/// 同一个监听器实例在同一个键上重复注册时只保留一份。
#[derive(Clone)]
pub(crate) struct ListenerRef(pub(crate) Arc<dyn EventListener>);

impl ListenerRef {
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ListenerRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ListenerRef {}

impl std::hash::Hash for ListenerRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerRef")
            .field(&self.0.listener_name())
            .finish()
    }
}
