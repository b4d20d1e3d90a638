//! 事件总线统一错误定义
//!
//! 区分两类失败：
//! - 可重试的监听器失败（`Listener`），仅在重试边界内部流转；
//! - 结构性错误（注册冲突、分组解析、配置非法等），直接返回给调用方。
//!
use crate::event::EventId;
use std::fmt;
use thiserror::Error;

/// 单个监听器一次调用的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: String,
    pub reason: String,
}

impl ListenerFailure {
    pub fn new(listener: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            listener: listener.into(),
            reason: format!("{error:#}"),
        }
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.listener, self.reason)
    }
}

/// 分组名称无法解析为已知分组
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot deserialize group `{name}`: {reason}")]
pub struct GroupDeserializationError {
    pub name: String,
    pub reason: String,
}

impl GroupDeserializationError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// 事件总线错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventBusError {
    // --- 注册 ---
    #[error("group already registered: {group}")]
    GroupAlreadyRegistered { group: String },
    #[error("group not registered: {group}")]
    GroupNotRegistered { group: String },
    #[error(transparent)]
    GroupDeserialization(#[from] GroupDeserializationError),
    #[error("invalid registration key `{value}`: {reason}")]
    InvalidRegistrationKey { value: String, reason: String },

    // --- 投递 ---
    #[error("listener failed: {0}")]
    Listener(ListenerFailure),
    #[error("{} key listener(s) failed for event {event_id}: {}", .failures.len(), join_failures(.failures))]
    KeyListenersFailed {
        event_id: EventId,
        failures: Vec<ListenerFailure>,
    },
    #[error("event bus is shut down")]
    ShutDown,

    // --- 死信存储 ---
    #[error("dead letters error: {reason}")]
    DeadLetters { reason: String },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 配置 ---
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl EventBusError {
    pub fn dead_letters(reason: impl Into<String>) -> Self {
        Self::DeadLetters {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// 把监听器返回的错误归类
    ///
    /// 监听器直接返回的 `EventBusError` 原样保留，其余错误视为一次监听器调用失败。
    pub fn from_listener_error(listener: &str, error: anyhow::Error) -> Self {
        match error.downcast::<EventBusError>() {
            Ok(structural) => structural,
            Err(error) => Self::Listener(ListenerFailure::new(listener, &error)),
        }
    }

    /// 仅监听器调用失败属于可重试范畴，其余均为结构性错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Listener(_))
    }
}

fn join_failures(failures: &[ListenerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 统一 Result 类型别名
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listener_failures_are_retryable() {
        let failure = ListenerFailure::new("l", &anyhow::anyhow!("boom"));
        assert!(EventBusError::Listener(failure).is_retryable());
        assert!(
            !EventBusError::GroupAlreadyRegistered {
                group: "g".into()
            }
            .is_retryable()
        );
        assert!(!EventBusError::invalid_config("x").is_retryable());
    }

    #[test]
    fn listener_errors_are_classified() {
        let plain = EventBusError::from_listener_error("l", anyhow::anyhow!("boom"));
        match &plain {
            EventBusError::Listener(failure) => {
                assert_eq!(failure.listener, "l");
                assert_eq!(failure.reason, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(plain.is_retryable());

        let structural = EventBusError::from_listener_error(
            "l",
            EventBusError::dead_letters("store offline").into(),
        );
        assert!(matches!(structural, EventBusError::DeadLetters { .. }));
        assert!(!structural.is_retryable());
    }

    #[test]
    fn key_listener_failures_are_listed_in_message() {
        let err = EventBusError::KeyListenersFailed {
            event_id: EventId::random(),
            failures: vec![
                ListenerFailure::new("a", &anyhow::anyhow!("first")),
                ListenerFailure::new("b", &anyhow::anyhow!("second")),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 key listener(s) failed"));
        assert!(msg.contains("a: first; b: second"));
    }
}
