//! 健康检查（HealthCheck）
//!
//! 死信存储为空时健康；存在死信时降级（有暂时性处理失败需要关注）；
//! 死信存储本身无法查询时不健康。健康检查不参与分发路径。
//!
use crate::dead_letters::EventDeadLetters;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// 一次健康检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    component: String,
    status: HealthStatus,
    cause: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            cause: None,
        }
    }

    pub fn degraded(component: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            cause: Some(cause.into()),
        }
    }

    pub fn unhealthy(component: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            cause: Some(cause.into()),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn is_degraded(&self) -> bool {
        self.status == HealthStatus::Degraded
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }
}

impl fmt::Display for HealthCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.component, self.status)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn component_name(&self) -> &str;

    async fn check(&self) -> HealthCheckResult;
}

/// 基于死信存储的健康检查
pub struct EventDeadLettersHealthCheck {
    dead_letters: Arc<dyn EventDeadLetters>,
}

impl EventDeadLettersHealthCheck {
    pub const COMPONENT_NAME: &'static str = "EventDeadLettersHealthCheck";

    pub fn new(dead_letters: Arc<dyn EventDeadLetters>) -> Self {
        Self { dead_letters }
    }
}

#[async_trait]
impl HealthCheck for EventDeadLettersHealthCheck {
    fn component_name(&self) -> &str {
        Self::COMPONENT_NAME
    }

    async fn check(&self) -> HealthCheckResult {
        match self.dead_letters.contain_events().await {
            Ok(false) => HealthCheckResult::healthy(Self::COMPONENT_NAME),
            Ok(true) => HealthCheckResult::degraded(
                Self::COMPONENT_NAME,
                "EventDeadLetters contain events. This might indicate transient failures on mailbox event processing.",
            ),
            Err(err) => {
                tracing::error!(error = %err, "event dead letters health check failed");
                HealthCheckResult::unhealthy(
                    Self::COMPONENT_NAME,
                    format!("Error checking EventDeadLetters: {err}"),
                )
            }
        }
    }
}
