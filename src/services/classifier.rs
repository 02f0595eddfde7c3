//! 视觉启发式分类器 - 业务能力层
//!
//! 当页面没有任何稳定语义标签可用时，靠几何位置和渲染背景色
//! 挑选"主操作"候选。纯函数，不接触页面，便于单独测试。
//!
//! 注意：深色/几何阈值编码的是目标 UI 当前观察到的视觉惯例，
//! UI 改版后可能失效，因此全部阈值走 Config 可调

use regex::Regex;

use crate::config::Config;
use crate::models::{ElementCandidate, Viewport};

/// 图标按钮的近正方形判定容差（px）
const SQUARE_TOLERANCE: f64 = 8.0;

/// 侧栏开关候选的几何约束
const SIDEBAR_MAX_X: f64 = 100.0;
const SIDEBAR_MAX_WIDTH: f64 = 60.0;
const SIDEBAR_MIN_Y: f64 = 50.0;

/// 解析后的 CSS 颜色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CssColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

impl CssColor {
    pub fn is_transparent(&self) -> bool {
        self.alpha == 0.0
    }
}

/// 解析 getComputedStyle 返回的背景色
///
/// 支持 "rgb(r, g, b)" / "rgba(r, g, b, a)" / "transparent"，
/// 其他形式返回 None
pub fn parse_css_color(value: &str) -> Option<CssColor> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("transparent") {
        return Some(CssColor {
            r: 0,
            g: 0,
            b: 0,
            alpha: 0.0,
        });
    }

    // 每次解析重建 Regex 开销可忽略：一次决策只扫几十个候选
    let re = Regex::new(
        r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})(?:\s*,\s*([0-9.]+))?\s*\)$",
    )
    .ok()?;
    let caps = re.captures(trimmed)?;

    let r: u8 = caps.get(1)?.as_str().parse().ok()?;
    let g: u8 = caps.get(2)?.as_str().parse().ok()?;
    let b: u8 = caps.get(3)?.as_str().parse().ok()?;
    let alpha: f64 = match caps.get(4) {
        Some(a) => a.as_str().parse().ok()?,
        None => 1.0,
    };

    Some(CssColor { r, g, b, alpha })
}

/// 视觉启发式分类器
pub struct VisualClassifier {
    dark_colors: Vec<(u8, u8, u8)>,
    dark_channel_max: u8,
    zone_bottom_frac: f64,
    zone_right_frac: f64,
}

impl VisualClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            dark_colors: config.dark_colors.clone(),
            dark_channel_max: config.dark_channel_max,
            zone_bottom_frac: config.zone_bottom_frac,
            zone_right_frac: config.zone_right_frac,
        }
    }

    /// 背景色是否属于"深色主操作"惯例
    ///
    /// 命中已知深色三元组，或所有通道都低于阈值
    pub fn is_dark(&self, color: &CssColor) -> bool {
        if color.is_transparent() {
            return false;
        }
        if self.dark_colors.contains(&(color.r, color.g, color.b)) {
            return true;
        }
        color.r < self.dark_channel_max
            && color.g < self.dark_channel_max
            && color.b < self.dark_channel_max
    }

    /// 在目标屏幕区（默认右下角）挑选主操作候选
    ///
    /// 过滤 → 丢弃透明背景（装饰性控件）→ 深色匹配里取 X 最大者
    /// （最右即主操作的布局惯例），平局按扫描顺序 → 回退近正方形
    /// 图标按钮 → 回退第一个过滤后的候选。全空时由调用方
    /// 用键盘默认提交兜底
    pub fn pick_primary_action<'a>(
        &self,
        candidates: &'a [ElementCandidate],
        viewport: Viewport,
    ) -> Option<&'a ElementCandidate> {
        let threshold_y = viewport.height * self.zone_bottom_frac;
        let threshold_x = viewport.width * self.zone_right_frac;

        let in_zone: Vec<&ElementCandidate> = candidates
            .iter()
            .filter(|c| c.visible)
            .filter(|c| c.bounding_box.y > threshold_y && c.bounding_box.x > threshold_x)
            .collect();

        // 透明背景视为次要/装饰控件（骰子、宽高比按钮等），直接丢弃
        let opaque: Vec<&ElementCandidate> = in_zone
            .iter()
            .copied()
            .filter(|c| match parse_css_color(&c.background_color) {
                Some(color) => !color.is_transparent(),
                None => false,
            })
            .collect();

        // 深色匹配：取最右，平局保持扫描顺序
        let mut best_dark: Option<&ElementCandidate> = None;
        for &candidate in &opaque {
            let color = match parse_css_color(&candidate.background_color) {
                Some(c) => c,
                None => continue,
            };
            if !self.is_dark(&color) {
                continue;
            }
            match best_dark {
                Some(current) if candidate.bounding_box.x <= current.bounding_box.x => {}
                _ => best_dark = Some(candidate),
            }
        }
        if best_dark.is_some() {
            return best_dark;
        }

        // 回退 1：近正方形（图标按钮形状）
        if let Some(square) = opaque
            .iter()
            .copied()
            .find(|c| c.bounding_box.is_near_square(SQUARE_TOLERANCE))
        {
            return Some(square);
        }

        // 回退 2：第一个过滤后的候选
        opaque.first().copied()
    }

    /// 定位收起侧栏的展开按钮
    ///
    /// 同一套深色/几何打分，但限制在标题栏以下的左缘小方块，
    /// 并排除标签/文本暗示菜单或导航角色的候选
    pub fn pick_sidebar_toggle<'a>(
        &self,
        candidates: &'a [ElementCandidate],
    ) -> Option<&'a ElementCandidate> {
        let mut plausible = self.left_edge_candidates(candidates);
        plausible.sort_by(|a, b| {
            a.bounding_box
                .y
                .partial_cmp(&b.bounding_box.y)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // 自上而下找第一个深色候选
        if let Some(dark) = plausible.iter().copied().find(|c| {
            parse_css_color(&c.background_color)
                .map(|color| self.is_dark(&color))
                .unwrap_or(false)
        }) {
            return Some(dark);
        }

        // 回退：近正方形的非菜单候选
        plausible
            .iter()
            .find(|c| c.bounding_box.is_near_square(SQUARE_TOLERANCE))
            .copied()
    }

    /// 侧栏搜索失败后的最后手段：第一个貌似合理的左缘候选
    pub fn first_left_edge_candidate<'a>(
        &self,
        candidates: &'a [ElementCandidate],
    ) -> Option<&'a ElementCandidate> {
        let mut plausible = self.left_edge_candidates(candidates);
        plausible.sort_by(|a, b| {
            a.bounding_box
                .y
                .partial_cmp(&b.bounding_box.y)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        plausible.first().copied()
    }

    fn left_edge_candidates<'a>(
        &self,
        candidates: &'a [ElementCandidate],
    ) -> Vec<&'a ElementCandidate> {
        candidates
            .iter()
            .filter(|c| c.visible)
            .filter(|c| {
                let b = &c.bounding_box;
                b.x <= SIDEBAR_MAX_X && b.width <= SIDEBAR_MAX_WIDTH && b.y >= SIDEBAR_MIN_Y
            })
            .filter(|c| !c.looks_like_menu())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn classifier() -> VisualClassifier {
        VisualClassifier::new(&Config::default())
    }

    fn candidate(mark: usize, x: f64, y: f64, w: f64, h: f64, bg: &str) -> ElementCandidate {
        ElementCandidate {
            mark_index: mark,
            bounding_box: BoundingBox::new(x, y, w, h),
            visible: true,
            background_color: bg.to_string(),
            aria_label: String::new(),
            text: String::new(),
        }
    }

    fn viewport() -> Viewport {
        Viewport {
            width: 1280.0,
            height: 720.0,
        }
    }

    // ---------- 颜色解析 ----------

    #[test]
    fn test_parse_rgb() {
        let c = parse_css_color("rgb(32, 33, 36)").unwrap();
        assert_eq!((c.r, c.g, c.b), (32, 33, 36));
        assert_eq!(c.alpha, 1.0);
    }

    #[test]
    fn test_parse_rgba_transparent() {
        let c = parse_css_color("rgba(0, 0, 0, 0)").unwrap();
        assert!(c.is_transparent());
        assert!(parse_css_color("transparent").unwrap().is_transparent());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_css_color("").is_none());
        assert!(parse_css_color("#202124").is_none());
        assert!(parse_css_color("rgb(300, 0, 0)").is_none());
    }

    // ---------- 深色判定 ----------

    #[test]
    fn test_dark_known_triples() {
        let c = classifier();
        assert!(c.is_dark(&parse_css_color("rgb(32, 33, 36)").unwrap()));
        assert!(c.is_dark(&parse_css_color("rgb(0, 0, 0)").unwrap()));
        assert!(c.is_dark(&parse_css_color("rgb(26, 26, 26)").unwrap()));
    }

    #[test]
    fn test_dark_generic_rule() {
        let c = classifier();
        assert!(c.is_dark(&parse_css_color("rgb(10, 20, 30)").unwrap()));
        assert!(!c.is_dark(&parse_css_color("rgb(255, 255, 255)").unwrap()));
        assert!(!c.is_dark(&parse_css_color("rgb(10, 20, 200)").unwrap()));
        assert!(!c.is_dark(&parse_css_color("rgba(0, 0, 0, 0)").unwrap()));
    }

    // ---------- 主操作挑选 ----------

    #[test]
    fn test_opaque_beats_transparent_regardless_of_x() {
        let c = classifier();
        let candidates = vec![
            // 透明候选更靠右，仍应落选
            candidate(0, 1100.0, 650.0, 40.0, 40.0, "rgba(0, 0, 0, 0)"),
            candidate(1, 800.0, 650.0, 40.0, 40.0, "rgb(32, 33, 36)"),
        ];
        let picked = c.pick_primary_action(&candidates, viewport()).unwrap();
        assert_eq!(picked.mark_index, 1);
    }

    #[test]
    fn test_rightmost_dark_wins() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 500.0, 650.0, 40.0, 40.0, "rgb(0, 0, 0)"),
            candidate(1, 700.0, 650.0, 40.0, 40.0, "rgb(32, 33, 36)"),
        ];
        let picked = c.pick_primary_action(&candidates, viewport()).unwrap();
        assert_eq!(picked.mark_index, 1);
    }

    #[test]
    fn test_equal_x_keeps_scan_order() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 700.0, 650.0, 40.0, 40.0, "rgb(0, 0, 0)"),
            candidate(1, 700.0, 680.0, 40.0, 40.0, "rgb(0, 0, 0)"),
        ];
        let picked = c.pick_primary_action(&candidates, viewport()).unwrap();
        assert_eq!(picked.mark_index, 0);
    }

    #[test]
    fn test_zone_filter() {
        let c = classifier();
        let candidates = vec![
            // 深色但在视口上半部，不在目标区
            candidate(0, 1000.0, 100.0, 40.0, 40.0, "rgb(0, 0, 0)"),
            // 深色但在左半部
            candidate(1, 100.0, 650.0, 40.0, 40.0, "rgb(0, 0, 0)"),
        ];
        assert!(c.pick_primary_action(&candidates, viewport()).is_none());
    }

    #[test]
    fn test_invisible_filtered() {
        let c = classifier();
        let mut hidden = candidate(0, 800.0, 650.0, 40.0, 40.0, "rgb(0, 0, 0)");
        hidden.visible = false;
        assert!(c.pick_primary_action(&[hidden], viewport()).is_none());
    }

    #[test]
    fn test_square_fallback_when_no_dark() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 800.0, 650.0, 200.0, 40.0, "rgb(240, 240, 240)"),
            candidate(1, 900.0, 650.0, 42.0, 40.0, "rgb(240, 240, 240)"),
        ];
        let picked = c.pick_primary_action(&candidates, viewport()).unwrap();
        assert_eq!(picked.mark_index, 1);
    }

    #[test]
    fn test_first_filtered_fallback() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 800.0, 650.0, 200.0, 40.0, "rgb(240, 240, 240)"),
            candidate(1, 900.0, 650.0, 180.0, 40.0, "rgb(240, 240, 240)"),
        ];
        let picked = c.pick_primary_action(&candidates, viewport()).unwrap();
        assert_eq!(picked.mark_index, 0);
    }

    // ---------- 侧栏开关 ----------

    #[test]
    fn test_sidebar_dark_preferred() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 20.0, 80.0, 40.0, 40.0, "rgb(255, 200, 0)"),
            candidate(1, 20.0, 160.0, 40.0, 40.0, "rgb(0, 0, 0)"),
        ];
        let picked = c.pick_sidebar_toggle(&candidates).unwrap();
        assert_eq!(picked.mark_index, 1);
    }

    #[test]
    fn test_sidebar_excludes_menu_and_header_band() {
        let c = classifier();
        let mut menu = candidate(0, 20.0, 160.0, 40.0, 40.0, "rgb(0, 0, 0)");
        menu.aria_label = "Main menu".to_string();
        // 标题栏内（y < 50）的深色按钮也要排除
        let header_btn = candidate(1, 20.0, 30.0, 40.0, 40.0, "rgb(0, 0, 0)");
        assert!(c.pick_sidebar_toggle(&[menu, header_btn]).is_none());
    }

    #[test]
    fn test_sidebar_excludes_right_side_and_wide() {
        let c = classifier();
        let right = candidate(0, 600.0, 160.0, 40.0, 40.0, "rgb(0, 0, 0)");
        let wide = candidate(1, 20.0, 160.0, 200.0, 40.0, "rgb(0, 0, 0)");
        assert!(c.pick_sidebar_toggle(&[right, wide]).is_none());
    }

    #[test]
    fn test_first_left_edge_best_effort() {
        let c = classifier();
        let candidates = vec![
            candidate(0, 20.0, 300.0, 40.0, 40.0, "rgb(255, 255, 255)"),
            candidate(1, 20.0, 100.0, 40.0, 40.0, "rgb(255, 255, 255)"),
        ];
        // 按 y 排序后取最上面的
        let picked = c.first_left_edge_candidate(&candidates).unwrap();
        assert_eq!(picked.mark_index, 1);
    }
}
