//! 上传区域模型
//!
//! Region 是一次性的：每次操作前重新定位，绝不缓存，
//! 因为页面随时可能在两次操作之间发生变化

use crate::models::geometry::BoundingBox;

/// 一个命名上传区域
///
/// "部分形态"（找到标题但无合格容器）是合法状态，调用方必须容忍
#[derive(Debug, Clone)]
pub struct Region {
    /// 区域标签（如 "Subject"）
    pub label: String,
    /// 标题节点的包围盒
    pub header_box: BoundingBox,
    /// 容器包围盒；部分形态时为 None
    pub container_box: Option<BoundingBox>,
    /// 容器上的 data-wbs-mark 值；部分形态时为 None
    pub container_mark: Option<String>,
}

impl Region {
    /// 完整形态：标题 + 合格容器
    pub fn full(
        label: impl Into<String>,
        header_box: BoundingBox,
        container_box: BoundingBox,
        container_mark: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            header_box,
            container_box: Some(container_box),
            container_mark: Some(container_mark.into()),
        }
    }

    /// 部分形态：只有标题
    pub fn partial(label: impl Into<String>, header_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            header_box,
            container_box: None,
            container_mark: None,
        }
    }

    /// 是否处于完整形态
    pub fn has_container(&self) -> bool {
        self.container_mark.is_some()
    }

    /// 容器高度是否满足最小阈值
    ///
    /// 定位器保证完整形态的容器必然满足该不变量，此方法用于断言
    pub fn container_qualifies(&self, min_height: f64) -> bool {
        match self.container_box {
            Some(b) => b.height > min_height,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_region_tolerated() {
        let r = Region::partial("Subject", BoundingBox::new(10.0, 10.0, 80.0, 20.0));
        assert!(!r.has_container());
        assert!(!r.container_qualifies(150.0));
    }

    #[test]
    fn test_full_region_height_invariant() {
        let r = Region::full(
            "Scene",
            BoundingBox::new(10.0, 10.0, 80.0, 20.0),
            BoundingBox::new(0.0, 10.0, 300.0, 220.0),
            "wbs-0",
        );
        assert!(r.has_container());
        assert!(r.container_qualifies(150.0));
        assert!(!r.container_qualifies(500.0));
    }
}
