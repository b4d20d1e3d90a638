//! 死信重投（Redelivery）
//!
//! 运维工具：把死信中的事件重新投递给对应分组当前的监听器。
//! 只有 `re_deliver` 返回 `Delivered` 时才从死信中移除；再次失败的事件已由重试策略
//! 重新写入死信，保持原样。
//!
use crate::bus::EventBus;
use crate::dead_letters::EventDeadLetters;
use crate::error::{EventBusError, EventBusResult};
use crate::event::EventId;
use crate::group::Group;
use crate::retry::DeliveryOutcome;
use std::ops::AddAssign;
use std::sync::Arc;

/// 一次重投的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedeliveryReport {
    pub successful: usize,
    pub failed: usize,
}

impl RedeliveryReport {
    fn success() -> Self {
        Self {
            successful: 1,
            failed: 0,
        }
    }

    fn failure() -> Self {
        Self {
            successful: 0,
            failed: 1,
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

impl AddAssign for RedeliveryReport {
    fn add_assign(&mut self, rhs: Self) {
        self.successful += rhs.successful;
        self.failed += rhs.failed;
    }
}

pub struct EventDeadLettersRedeliverer {
    bus: Arc<dyn EventBus>,
    dead_letters: Arc<dyn EventDeadLetters>,
}

impl EventDeadLettersRedeliverer {
    pub fn new(bus: Arc<dyn EventBus>, dead_letters: Arc<dyn EventDeadLetters>) -> Self {
        Self { bus, dead_letters }
    }

    /// 重投单个死信事件
    pub async fn redeliver_event(
        &self,
        group: &Group,
        event_id: EventId,
    ) -> EventBusResult<RedeliveryReport> {
        self.redeliver(group, event_id).await
    }

    /// 重投一个分组的全部死信
    pub async fn redeliver_group(&self, group: &Group) -> EventBusResult<RedeliveryReport> {
        let mut report = RedeliveryReport::default();
        for event_id in self.dead_letters.failed_event_ids(group).await? {
            report += self.redeliver(group, event_id).await?;
        }
        tracing::info!(
            %group,
            successful = report.successful,
            failed = report.failed,
            "group dead letters redelivered"
        );
        Ok(report)
    }

    /// 重投所有分组的全部死信
    pub async fn redeliver_all(&self) -> EventBusResult<RedeliveryReport> {
        let mut report = RedeliveryReport::default();
        for group in self.dead_letters.groups_with_failed_events().await? {
            report += self.redeliver_group(&group).await?;
        }
        Ok(report)
    }

    async fn redeliver(&self, group: &Group, event_id: EventId) -> EventBusResult<RedeliveryReport> {
        let Some(event) = self.dead_letters.failed_event(group, event_id).await? else {
            tracing::warn!(%group, %event_id, "dead letter not found");
            return Ok(RedeliveryReport::failure());
        };

        match self.bus.re_deliver(group, event).await {
            Ok(DeliveryOutcome::Delivered) => {
                self.dead_letters.remove(group, event_id).await?;
                Ok(RedeliveryReport::success())
            }
            Ok(outcome) => {
                tracing::warn!(%group, %event_id, ?outcome, "redelivery did not succeed, dead letter kept");
                Ok(RedeliveryReport::failure())
            }
            Err(EventBusError::GroupNotRegistered { .. }) => {
                tracing::warn!(%group, %event_id, "no active listener for group, dead letter kept");
                Ok(RedeliveryReport::failure())
            }
            Err(err) => Err(err),
        }
    }
}
