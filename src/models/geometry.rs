//! 几何类型
//!
//! 从页面 JS（getBoundingClientRect）反序列化的坐标数据

use serde::Deserialize;

/// 元素包围盒
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 水平中心
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// 垂直中心
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// 是否接近正方形（图标按钮的形状特征）
    pub fn is_near_square(&self, tolerance: f64) -> bool {
        (self.width - self.height).abs() < tolerance
    }
}

/// 视口尺寸
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        // 视口查询失败时的保守回退值
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(b.center_x(), 60.0);
        assert_eq!(b.center_y(), 40.0);
    }

    #[test]
    fn test_near_square() {
        assert!(BoundingBox::new(0.0, 0.0, 40.0, 44.0).is_near_square(8.0));
        assert!(!BoundingBox::new(0.0, 0.0, 40.0, 120.0).is_near_square(8.0));
    }
}
