//! 邮件服务器事件总线（mailbus）
//!
//! 将邮箱与消息的领域事件从生产者传播给构建派生状态的观察者：
//! - 领域事件（`event`）与注册键（`key`）、分组（`group`）
//! - 监听器（`listener`）与注册表（`registry`、`registration`）
//! - 分发引擎（`bus`）：键订阅最多一次、分组订阅按退避重试（`retry`）
//! - 死信（`dead_letters`）、死信重投（`redelivery`）与健康检查（`health`）
//!
//! 典型用法：
//! 1. 以 `#[group]` 声明分组类型，以 `#[registration_key]` 声明键类型；
//! 2. 通过 `InVmEventBus::builder()` 构建总线，注入死信存储与配置；
//! 3. 注册键监听器与分组监听器，调用 `dispatch` 发布事件；
//! 4. 使用 `EventDeadLettersRedeliverer` 处理积压的死信。
//!
pub mod bus;
pub mod config;
pub mod dead_letters;
pub mod error;
pub mod event;
pub mod group;
pub mod health;
pub mod key;
pub mod listener;
pub mod redelivery;
pub mod registration;
pub mod registry;
pub mod retry;

pub use mailbus_macros::{group, registration_key};

// 允许在本 crate 内部通过 ::mailbus 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::mailbus 路径。
extern crate self as mailbus;
