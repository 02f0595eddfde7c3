//! 编排层 - 应用入口与资源管理
//!
//! 唯一持有 Browser 的层，向下委托 workflow

pub mod batch_runner;

pub use batch_runner::App;
