//! 批次项上下文
//!
//! 封装"我正在处理第几张图片"这一信息

use std::fmt::Display;

/// 批次项上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 批次内索引（从1开始）
    pub item_index: usize,

    /// 批次总数
    pub total: usize,

    /// 图片显示名（仅用于日志显示）
    pub display_name: String,
}

impl ItemCtx {
    /// 创建新的批次项上下文
    pub fn new(item_index: usize, total: usize, display_name: String) -> Self {
        Self {
            item_index,
            total,
            display_name,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[图片 {}/{} {}]",
            self.item_index, self.total, self.display_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = ItemCtx::new(2, 7, "cat.png".to_string());
        assert_eq!(format!("{}", ctx), "[图片 2/7 cat.png]");
    }
}
