//! 流程层 - 组合业务能力为端到端流程
//!
//! 只做编排，不直接触碰 CDP

pub mod item_ctx;
pub mod item_flow;

pub use item_ctx::ItemCtx;
pub use item_flow::{ItemFlow, ItemReport};
