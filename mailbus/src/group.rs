//! 监听分组（Group）
//!
//! 分组标识一类持久的消费者（如“搜索索引”“配额更新”），在每个进程中至多只有
//! 一个活跃监听器。分组名会被持久化到死信存储等位置，因此必须可往返：
//! `registry.deserialize(&g.as_string()) == Ok(g)`。
//!
//! 具名分组由类型声明（见 `#[group]`），通用分组由调用方显式给出名称。
//! 名称解析只依赖显式注册的 `GroupRegistry`，未知名称一律拒绝。
//!
use crate::error::GroupDeserializationError;
use std::collections::HashMap;
use std::fmt;

const GENERIC_GROUP_PREFIX: &str = "GenericGroup-";

/// 分组标识，按身份（类型名或通用名）比较
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    /// 由类型声明的分组，值为类型的完整名称
    Typed(&'static str),
    /// 通用分组，值为调用方给出的名称
    Generic(String),
}

impl Group {
    pub fn generic(name: impl Into<String>) -> Self {
        Group::Generic(name.into())
    }

    pub fn of<G: GroupType>() -> Self {
        G::group()
    }

    pub fn as_string(&self) -> String {
        match self {
            Group::Typed(name) => (*name).to_string(),
            Group::Generic(name) => format!("{GENERIC_GROUP_PREFIX}{name}"),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Typed(name) => f.write_str(name),
            Group::Generic(name) => write!(f, "{GENERIC_GROUP_PREFIX}{name}"),
        }
    }
}

/// 具名分组类型（通常由 `#[group]` 生成）
pub trait GroupType {
    const NAME: &'static str;

    fn group() -> Group {
        Group::Typed(Self::NAME)
    }
}

/// 分组名称到分组构造函数的显式注册表
///
/// 由组装总线的一方在启动时填充，随后用于解析持久化的分组名。
#[derive(Clone, Default)]
pub struct GroupRegistry {
    factories: HashMap<&'static str, fn() -> Group>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: GroupType>(&mut self) -> &mut Self {
        self.factories.insert(G::NAME, G::group);
        self
    }

    pub fn with<G: GroupType>(mut self) -> Self {
        self.register::<G>();
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn deserialize(&self, serialized: &str) -> Result<Group, GroupDeserializationError> {
        // 空名称同样是合法的通用分组，保证 `Group::generic("")` 可以往返
        if let Some(name) = serialized.strip_prefix(GENERIC_GROUP_PREFIX) {
            return Ok(Group::Generic(name.to_string()));
        }

        self.factories
            .get(serialized)
            .map(|factory| factory())
            .ok_or_else(|| GroupDeserializationError::new(serialized, "unknown group"))
    }
}

impl fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("GroupRegistry").field("groups", &names).finish()
    }
}
