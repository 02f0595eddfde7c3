//! 交互元素候选快照
//!
//! 一次扫描产生一批候选，决策完成后立即丢弃，不跨操作缓存

use serde::Deserialize;

use crate::models::geometry::BoundingBox;

/// 交互元素候选
///
/// 由页面内 JS 扫描产生，`mark_index` 对应扫描时打在元素上的
/// `data-wbs-scan` 序号，后续点击凭它回查元素
#[derive(Debug, Clone, Deserialize)]
pub struct ElementCandidate {
    /// 扫描序号（同时是 data-wbs-scan 的值）
    pub mark_index: usize,
    /// 包围盒
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
    /// 是否可见
    pub visible: bool,
    /// 计算样式的背景色（如 "rgb(32, 33, 36)" / "rgba(0, 0, 0, 0)"）
    #[serde(default)]
    pub background_color: String,
    /// aria-label（无则为空）
    #[serde(default)]
    pub aria_label: String,
    /// 文本内容（截断后）
    #[serde(default)]
    pub text: String,
}

impl ElementCandidate {
    /// 标签或文本是否暗示主导航/菜单角色
    pub fn looks_like_menu(&self) -> bool {
        let label = self.aria_label.to_lowercase();
        let text = self.text.to_lowercase();
        label.contains("menu")
            || label.contains("navigation")
            || text.contains("menu")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, text: &str) -> ElementCandidate {
        ElementCandidate {
            mark_index: 0,
            bounding_box: BoundingBox::new(0.0, 0.0, 40.0, 40.0),
            visible: true,
            background_color: String::new(),
            aria_label: label.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_menu_detection() {
        assert!(candidate("Main menu", "").looks_like_menu());
        assert!(candidate("", "Menu").looks_like_menu());
        assert!(candidate("Toggle navigation", "").looks_like_menu());
        assert!(!candidate("Expand sidebar", "").looks_like_menu());
    }
}
