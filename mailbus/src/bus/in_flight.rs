use std::sync::Arc;
use tokio::sync::watch;

/// 后台投递计数，用于等待总线空闲
#[derive(Debug)]
pub(crate) struct InFlight {
    count: watch::Sender<usize>,
}

impl InFlight {
    pub(crate) fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self { count })
    }

    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard(self.clone())
    }

    pub(crate) fn current(&self) -> usize {
        *self.count.borrow()
    }

    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // 发送端与 self 同生命周期，wait_for 不会因通道关闭而失败
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// 一项后台投递的生命周期，析构时计数减一
#[derive(Debug)]
pub(crate) struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
