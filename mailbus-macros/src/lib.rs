//! mailbus 过程宏
//!
//! - `#[group]`：把单元结构体声明为具名监听分组
//! - `#[registration_key]`：把单字段元组结构体声明为注册键，并生成其键工厂
//!
use proc_macro::TokenStream;

mod attr;
mod derive_utils;
mod group;
mod registration_key;

/// 分组宏
/// - 仅支持单元结构体，合并派生：Debug, Clone, Copy, Default, PartialEq, Eq, Hash
/// - 实现 `::mailbus::group::GroupType`，名称默认为 `模块路径::类型名`
/// - 支持参数：`#[group(name = "...")]` 显式指定持久化名称
#[proc_macro_attribute]
pub fn group(attr: TokenStream, item: TokenStream) -> TokenStream {
    group::expand(attr, item)
}

/// 注册键宏
/// - 仅支持单字段元组结构体，内部值需实现 Display 与 FromStr
/// - 合并派生：Debug, Clone, PartialEq, Eq, Hash，并提供 `new(value)`
/// - 实现 `RegistrationKey`、`KeyType`，生成 `<类型名>Factory`
/// - 支持参数：`#[registration_key(key_type = "...")]`，默认取类型名
#[proc_macro_attribute]
pub fn registration_key(attr: TokenStream, item: TokenStream) -> TokenStream {
    registration_key::expand(attr, item)
}
