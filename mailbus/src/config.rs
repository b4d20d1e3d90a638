//! 总线配置
//!
//! 可由 TOML/JSON 等格式反序列化，缺省字段取默认值：
//!
//! ```toml
//! max_concurrency = 10
//!
//! [retry]
//! max_retries = 8
//! first_backoff_ms = 100
//! jitter_factor = 0.5
//! ```
//!
use crate::error::{EventBusError, EventBusResult};
use crate::retry::RetryBackoffConfiguration;
use bon::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// 事件总线配置
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// 分组监听器的重试策略
    #[builder(default)]
    pub retry: RetryBackoffConfiguration,
    /// 同时进行中的后台监听器调用上限
    #[builder(default = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            retry: RetryBackoffConfiguration::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl EventBusConfig {
    pub fn validate(&self) -> EventBusResult<()> {
        if self.max_concurrency == 0 {
            return Err(EventBusError::invalid_config(
                "max_concurrency must be at least 1",
            ));
        }
        self.retry.validate()
    }
}

/// 以毫秒整数读写 `Duration`
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = EventBusConfig::default();
        assert_eq!(config.max_concurrency, 10);
        assert!(config.validate().is_ok());
        assert_eq!(EventBusConfig::builder().build(), config);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EventBusConfig =
            serde_json::from_str(r#"{"retry": {"first_backoff_ms": 20}}"#).unwrap();
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.retry.first_backoff, Duration::from_millis(20));
        assert_eq!(config.retry.max_retries, 8);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = EventBusConfig::builder().max_concurrency(0).build();
        assert!(matches!(
            config.validate(),
            Err(EventBusError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn serializes_backoff_as_millis() {
        let value = serde_json::to_value(EventBusConfig::default()).unwrap();
        assert_eq!(value["retry"]["first_backoff_ms"], 100);
    }
}
