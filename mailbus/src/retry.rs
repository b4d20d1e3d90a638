//! 重试与退避（Retry & Backoff）
//!
//! 分组监听器的每次投递都经由 `GroupDelivery`：失败后按指数退避加随机抖动重试，
//! 连续失败 `max_retries` 次后（共调用 `1 + max_retries` 次）写入死信存储。
//! 监听器直接返回 `EventBusError` 时按结构性错误处理，不再重试，立即写入死信。
//! 这是事件进入死信的唯一路径。
//!
use crate::config::duration_millis;
use crate::dead_letters::EventDeadLetters;
use crate::error::{EventBusError, EventBusResult};
use crate::event::Event;
use crate::group::Group;
use crate::listener::EventListener;
use bon::Builder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_RETRIES: u32 = 8;
pub const DEFAULT_FIRST_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_JITTER_FACTOR: f64 = 0.5;

// 2^30 倍的首次退避已远超任何合理的等待
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// 重试退避策略
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBackoffConfiguration {
    /// 首次失败后的最大重试次数
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
    /// 第一次重试前的等待，之后每次翻倍
    #[builder(default = DEFAULT_FIRST_BACKOFF)]
    #[serde(rename = "first_backoff_ms", with = "duration_millis")]
    pub first_backoff: Duration,
    /// 抖动系数，0.5 表示实际等待在计算值的 ±50% 内浮动
    #[builder(default = DEFAULT_JITTER_FACTOR)]
    pub jitter_factor: f64,
}

impl Default for RetryBackoffConfiguration {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            first_backoff: DEFAULT_FIRST_BACKOFF,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryBackoffConfiguration {
    pub fn validate(&self) -> EventBusResult<()> {
        if self.first_backoff.is_zero() {
            return Err(EventBusError::invalid_config(
                "first_backoff must be strictly positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(EventBusError::invalid_config(format!(
                "jitter_factor must be within [0, 1], got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }

    /// 第 `attempt` 次重试（从 1 开始）前的等待时间
    pub fn backoff_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let base = self.first_backoff.saturating_mul(1u32 << exponent);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let factor = rng.gen_range((1.0 - self.jitter_factor)..=(1.0 + self.jitter_factor));
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

fn saturating_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// 一次分组投递的最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 监听器处理成功
    Delivered,
    /// 重试耗尽或遇到结构性错误，事件已写入死信
    DeadLettered,
    /// 监听器不关注该事件
    Skipped,
}

/// 分组监听器投递：调用、重试、写死信
#[derive(Clone)]
pub struct GroupDelivery {
    config: RetryBackoffConfiguration,
    dead_letters: Arc<dyn EventDeadLetters>,
    permits: Arc<Semaphore>,
}

impl GroupDelivery {
    pub fn new(
        config: RetryBackoffConfiguration,
        dead_letters: Arc<dyn EventDeadLetters>,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            config,
            dead_letters,
            permits,
        }
    }

    pub fn config(&self) -> &RetryBackoffConfiguration {
        &self.config
    }

    /// 投递单个 `(group, event)`，直到成功或写入死信
    ///
    /// 每次调用前获取一个并发许可，等待退避期间不占用许可。
    /// 仅当死信存储写入失败时返回错误。
    pub async fn deliver(
        &self,
        group: &Group,
        listener: &dyn EventListener,
        event: &Event,
    ) -> EventBusResult<DeliveryOutcome> {
        if !listener.is_handling(event) {
            return Ok(DeliveryOutcome::Skipped);
        }

        let mut retries = 0u32;
        loop {
            let result = {
                let _permit = self.permits.acquire().await.ok();
                listener.event(event).await
            };

            let err = match result {
                Ok(()) => {
                    if retries > 0 {
                        tracing::debug!(%group, event_id = %event.event_id(), retries, "group listener recovered");
                    }
                    return Ok(DeliveryOutcome::Delivered);
                }
                Err(err) => err,
            };

            let error = EventBusError::from_listener_error(listener.listener_name(), err);
            if !error.is_retryable() {
                tracing::error!(
                    %group,
                    event_id = %event.event_id(),
                    attempts = retries + 1,
                    %error,
                    "group listener failed with a non-retryable error, storing dead letter"
                );
                self.dead_letters.store(group, event).await?;
                return Ok(DeliveryOutcome::DeadLettered);
            }
            if retries >= self.config.max_retries {
                tracing::error!(
                    %group,
                    event_id = %event.event_id(),
                    attempts = retries + 1,
                    %error,
                    "group listener exhausted retries, storing dead letter"
                );
                self.dead_letters.store(group, event).await?;
                return Ok(DeliveryOutcome::DeadLettered);
            }

            retries += 1;
            let delay = self.config.backoff_delay(retries, &mut rand::thread_rng());
            tracing::warn!(
                %group,
                event_id = %event.event_id(),
                retry = retries,
                max_retries = self.config.max_retries,
                delay_ms = saturating_millis(delay),
                %error,
                "group listener failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
