//! # Whisk Batch Submit
//!
//! 一个用于向不稳定 Web 应用批量提交图片的 Rust 自动化程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `PageDriver` - 唯一的 page owner，提供 eval / 点击 / 注入文件等能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只面向单个区域 / 单次生成
//! - `RegionLocator` - 按标签定位上传区域
//! - `VisualClassifier` - 颜色 / 几何启发式识别按钮
//! - `ElementResolver` - 五级策略级联上传、清空、开关保障
//! - `SessionManager` - 登录 / 关弹窗 / 展开侧栏
//! - `GenerationMonitor` - 触发生成并等待结束
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一张图片"的完整处理流程
//! - `ItemCtx` - 上下文封装（序号 + 文件名）
//! - `ItemFlow` - 流程编排（上传 → 生成 → 等待 → 清空）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_runner` - 批量图片提交器，管理资源并串行调度
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{kill_existing_browsers, launch_browser};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::PageDriver;
pub use models::{ElementCandidate, ImageFile, Region};
pub use orchestrator::App;
pub use workflow::{ItemCtx, ItemFlow, ItemReport};
