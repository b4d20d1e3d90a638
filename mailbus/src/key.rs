//! 注册键（RegistrationKey）
//!
//! 描述“对某个动态对象感兴趣”（例如某个邮箱）。键本身没有生命周期，仅作为注册表的
//! 查找依据：同一 `key_type` 下字符串形式相同即视为同一主体。
//!
//! 每种键类型都带有一个能解析自身字符串形式的 `KeyFactory`，由 `RoutingKeyConverter`
//! 汇总，用于在 `"{key_type}:{value}"` 形式的路由键与具体键之间互相转换。
//!
use crate::error::{EventBusError, EventBusResult};
use crate::event::{MailboxId, Username};
use crate::registration_key;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const ROUTING_KEY_SEPARATOR: char = ':';

/// 动态订阅键
pub trait RegistrationKey: fmt::Debug + Send + Sync + 'static {
    /// 键类型名，同时是其工厂在 `RoutingKeyConverter` 中的索引
    fn key_type(&self) -> &'static str;

    /// 稳定的字符串形式，可由对应的 `KeyFactory` 解析回来
    fn as_string(&self) -> String;

    fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(self.key_type(), &self.as_string())
    }
}

/// 由具体键类型实现（通常经 `#[registration_key]` 生成）
pub trait KeyType: RegistrationKey + Sized {
    const KEY_TYPE: &'static str;

    fn factory() -> Arc<dyn KeyFactory>;
}

/// 键工厂：从字符串形式重建键
pub trait KeyFactory: Send + Sync {
    fn key_type(&self) -> &'static str;

    fn from_string(&self, value: &str) -> EventBusResult<Arc<dyn RegistrationKey>>;
}

/// 注册表内部使用的规范化键：`"{key_type}:{value}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key_type: &str, value: &str) -> Self {
        Self(format!("{key_type}{ROUTING_KEY_SEPARATOR}{value}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 路由键与具体注册键之间的转换器
#[derive(Clone, Default)]
pub struct RoutingKeyConverter {
    factories: HashMap<&'static str, Arc<dyn KeyFactory>>,
}

impl RoutingKeyConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置内置键类型（邮箱 ID、用户名）
    pub fn with_builtin_keys() -> Self {
        let mut converter = Self::new();
        converter.register::<MailboxIdRegistrationKey>();
        converter.register::<UsernameRegistrationKey>();
        converter
    }

    pub fn register<K: KeyType>(&mut self) -> &mut Self {
        self.register_factory(K::factory())
    }

    pub fn register_factory(&mut self, factory: Arc<dyn KeyFactory>) -> &mut Self {
        self.factories.insert(factory.key_type(), factory);
        self
    }

    pub fn to_routing_key(&self, key: &dyn RegistrationKey) -> RoutingKey {
        key.routing_key()
    }

    pub fn to_registration_key(&self, routing_key: &str) -> EventBusResult<Arc<dyn RegistrationKey>> {
        let Some((key_type, value)) = routing_key.split_once(ROUTING_KEY_SEPARATOR) else {
            return Err(EventBusError::InvalidRegistrationKey {
                value: routing_key.to_string(),
                reason: format!("expected `type{ROUTING_KEY_SEPARATOR}value`"),
            });
        };
        let factory =
            self.factories
                .get(key_type)
                .ok_or_else(|| EventBusError::InvalidRegistrationKey {
                    value: routing_key.to_string(),
                    reason: format!("unknown key type `{key_type}`"),
                })?;
        factory.from_string(value)
    }
}

impl fmt::Debug for RoutingKeyConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("RoutingKeyConverter")
            .field("key_types", &types)
            .finish()
    }
}

/// 以邮箱为主体的注册键
#[registration_key(key_type = "MailboxIdRegistrationKey")]
pub struct MailboxIdRegistrationKey(MailboxId);

/// 以用户为主体的注册键
#[registration_key(key_type = "UsernameRegistrationKey")]
pub struct UsernameRegistrationKey(Username);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn same_mailbox_keys_are_equal() {
        let id = MailboxId::random();
        let a = MailboxIdRegistrationKey::new(id);
        let b = MailboxIdRegistrationKey::new(id);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.routing_key(), b.routing_key());
    }

    #[test]
    fn routing_key_distinguishes_key_types() {
        let user = UsernameRegistrationKey::new(Username::new("bob"));
        let mailbox = MailboxIdRegistrationKey::new(MailboxId::random());
        assert_ne!(user.routing_key(), mailbox.routing_key());
        assert_eq!(user.routing_key().as_str(), "UsernameRegistrationKey:bob");
    }

    #[test]
    fn converter_round_trips_builtin_keys() {
        let converter = RoutingKeyConverter::with_builtin_keys();
        let key = MailboxIdRegistrationKey::new(MailboxId::random());
        let routing = converter.to_routing_key(&key);
        let back = converter.to_registration_key(routing.as_str()).unwrap();
        assert_eq!(back.routing_key(), routing);
        assert_eq!(back.as_string(), key.as_string());
    }

    #[test]
    fn converter_rejects_unknown_or_malformed() {
        let converter = RoutingKeyConverter::with_builtin_keys();
        assert!(matches!(
            converter.to_registration_key("Unknown:abc"),
            Err(EventBusError::InvalidRegistrationKey { .. })
        ));
        assert!(matches!(
            converter.to_registration_key("no-separator"),
            Err(EventBusError::InvalidRegistrationKey { .. })
        ));
        assert!(matches!(
            converter.to_registration_key("MailboxIdRegistrationKey:not-a-uuid"),
            Err(EventBusError::InvalidRegistrationKey { .. })
        ));
    }

    #[test]
    fn usernames_may_contain_separator() {
        let converter = RoutingKeyConverter::with_builtin_keys();
        let key = converter
            .to_registration_key("UsernameRegistrationKey:bob:work")
            .unwrap();
        assert_eq!(key.as_string(), "bob:work");
    }
}
