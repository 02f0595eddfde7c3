//! 元素解析服务 - 业务能力层
//!
//! 对一个 Region 达成一个目标（附加文件 / 清空 / 开关置位），
//! 手段是按固定优先级依次尝试的策略级联：首个成功即停，
//! 单个策略失败只是落空，不中止整个操作。
//!
//! 级联被建模为声明式的策略列表 + 一个通用 runner，
//! 以取代层层嵌套的"吞异常再试下一招"

use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::Region;
use crate::services::region_locator::RegionLocator;

/// 一次策略尝试的结果
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub reason: String,
}

impl Outcome {
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

/// 附加文件的回退策略，按固定优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStrategy {
    /// 容器内的原生文件输入，直接注入，无 UI 交互
    DirectInput,
    /// 点击容器内无内容的拖放目标，拦截对话框
    DropTarget,
    /// 标题下方固定偏移的盲点，拦截对话框
    HeaderOffset,
    /// 容器内带"上传/添加"字样的控件，拦截对话框
    LabeledControl,
    /// 全页扫描文件输入，取与标题纵向最近者
    GlobalNearest,
}

impl AttachStrategy {
    /// 级联的固定优先级顺序
    pub const ORDER: [AttachStrategy; 5] = [
        AttachStrategy::DirectInput,
        AttachStrategy::DropTarget,
        AttachStrategy::HeaderOffset,
        AttachStrategy::LabeledControl,
        AttachStrategy::GlobalNearest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttachStrategy::DirectInput => "direct-input",
            AttachStrategy::DropTarget => "drop-target",
            AttachStrategy::HeaderOffset => "header-offset",
            AttachStrategy::LabeledControl => "labeled-control",
            AttachStrategy::GlobalNearest => "global-nearest",
        }
    }
}

/// 通用级联 runner：按给定顺序逐个尝试，首个成功即返回
///
/// 与具体策略解耦，便于在测试里用记录调用顺序的假策略验证
/// 级联顺序的确定性
pub async fn run_cascade<S, F, Fut>(strategies: &[S], mut attempt: F) -> Outcome
where
    S: Copy,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Outcome>,
{
    for &strategy in strategies {
        let outcome = attempt(strategy).await;
        if outcome.success {
            return outcome;
        }
        debug!("策略落空: {}", outcome.reason);
    }
    Outcome::fail(format!("全部 {} 个策略均失败", strategies.len()))
}

/// 元素解析服务
pub struct ElementResolver {
    locator: RegionLocator,
    dialog_timeout_ms: u64,
    blind_click_offset: f64,
}

impl ElementResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            locator: RegionLocator::new(config),
            dialog_timeout_ms: config.dialog_timeout_ms,
            blind_click_offset: config.blind_click_offset,
        }
    }

    /// 向指定区域附加一个文件
    ///
    /// 先做幂等预清理（保证区域最多挂一个文件），再重新定位区域
    /// （清理可能改变容器内容），然后跑策略级联
    pub async fn attach(&self, driver: &PageDriver, label: &str, file: &Path) -> Result<bool> {
        info!("  ⬆️ 向 '{}' 上传: {}", label, file.display());

        // 幂等预清理
        if self.clear(driver, label).await? {
            debug!("'{}' 预清理移除了已有附件", label);
            sleep(Duration::from_millis(500)).await;
        }

        // 清理后内容可能变化，必须重新定位
        let region = match self.locator.locate(driver, label).await? {
            Some(r) => r,
            None => {
                warn!("    ⚠️ 未找到区域 '{}'，放弃上传", label);
                return Ok(false);
            }
        };

        let outcome = run_cascade(&AttachStrategy::ORDER, |strategy| {
            let region = &region;
            async move { self.try_strategy(strategy, driver, region, file).await }
        })
        .await;

        if outcome.success {
            info!("    ✅ 上传成功 ({})", outcome.reason);
            Ok(true)
        } else {
            warn!("    ❌ '{}' {}", label, outcome.reason);
            Ok(false)
        }
    }

    async fn try_strategy(
        &self,
        strategy: AttachStrategy,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Outcome {
        debug!("尝试策略: {}", strategy.name());
        let result = match strategy {
            AttachStrategy::DirectInput => self.try_direct_input(driver, region, file).await,
            AttachStrategy::DropTarget => self.try_drop_target(driver, region, file).await,
            AttachStrategy::HeaderOffset => self.try_header_offset(driver, region, file).await,
            AttachStrategy::LabeledControl => self.try_labeled_control(driver, region, file).await,
            AttachStrategy::GlobalNearest => self.try_global_nearest(driver, region, file).await,
        };

        // 单个策略的错误收敛为落空，由级联继续
        match result {
            Ok(outcome) => outcome,
            Err(e) => Outcome::fail(format!("{}: {}", strategy.name(), e)),
        }
    }

    /// 策略 1：容器内的原生文件输入
    async fn try_direct_input(
        &self,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Result<Outcome> {
        let selector = match RegionLocator::container_selector(region) {
            Some(s) => s,
            None => return Ok(Outcome::fail("direct-input: 区域无容器")),
        };

        let input_selector = format!("{} input[type='file']", selector);
        if driver.set_files_on_selector(&input_selector, file).await? {
            Ok(Outcome::ok("direct-input"))
        } else {
            Ok(Outcome::fail("direct-input: 容器内无文件输入"))
        }
    }

    /// 策略 2：容器内无内容的拖放目标
    async fn try_drop_target(
        &self,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Result<Outcome> {
        let selector = match RegionLocator::container_selector(region) {
            Some(s) => s,
            None => return Ok(Outcome::fail("drop-target: 区域无容器")),
        };
        let selector_json = serde_json::to_string(&selector)?;

        let js_code = format!(
            r#"
            (() => {{
                document.querySelectorAll('[data-wbs-drop]')
                    .forEach(el => el.removeAttribute('data-wbs-drop'));
                const container = document.querySelector({selector_json});
                if (!container) return false;

                for (const el of container.querySelectorAll('button, [role="button"], div, label')) {{
                    const r = el.getBoundingClientRect();
                    if (r.width < 40 || r.height < 40) continue;
                    const s = window.getComputedStyle(el);
                    if (s.visibility === 'hidden' || s.display === 'none') continue;
                    if ((el.textContent || '').trim() !== '') continue;
                    el.setAttribute('data-wbs-drop', '1');
                    return true;
                }}
                return false;
            }})()
            "#,
            selector_json = selector_json,
        );

        if !driver.eval_as::<bool>(js_code).await? {
            return Ok(Outcome::fail("drop-target: 容器内无空白可点目标"));
        }

        let attached = driver
            .click_selector_expecting_chooser("[data-wbs-drop='1']", file, self.dialog_timeout_ms)
            .await?;
        if attached {
            Ok(Outcome::ok("drop-target"))
        } else {
            Ok(Outcome::fail("drop-target: 对话框未出现"))
        }
    }

    /// 策略 3：标题下方固定偏移的盲点
    async fn try_header_offset(
        &self,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Result<Outcome> {
        let x = region.header_box.center_x();
        let y = region.header_box.y + self.blind_click_offset;

        let attached = driver
            .click_at_expecting_chooser(x, y, file, self.dialog_timeout_ms)
            .await?;
        if attached {
            Ok(Outcome::ok("header-offset"))
        } else {
            Ok(Outcome::fail("header-offset: 对话框未出现"))
        }
    }

    /// 策略 4：容器内带"上传/添加"字样的控件
    async fn try_labeled_control(
        &self,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Result<Outcome> {
        let selector = match RegionLocator::container_selector(region) {
            Some(s) => s,
            None => return Ok(Outcome::fail("labeled-control: 区域无容器")),
        };
        let selector_json = serde_json::to_string(&selector)?;

        let js_code = format!(
            r#"
            (() => {{
                document.querySelectorAll('[data-wbs-add]')
                    .forEach(el => el.removeAttribute('data-wbs-add'));
                const container = document.querySelector({selector_json});
                if (!container) return false;

                const wanted = ['upload', 'add image', 'add'];
                for (const el of container.querySelectorAll('*')) {{
                    const s = window.getComputedStyle(el);
                    if (s.visibility === 'hidden' || s.display === 'none') continue;
                    const text = ((el.textContent || '') + ' ' + (el.getAttribute('aria-label') || ''))
                        .toLowerCase();
                    if (el.children.length > 0) continue;
                    if (wanted.some(w => text.includes(w))) {{
                        el.setAttribute('data-wbs-add', '1');
                        return true;
                    }}
                }}
                return false;
            }})()
            "#,
            selector_json = selector_json,
        );

        if !driver.eval_as::<bool>(js_code).await? {
            return Ok(Outcome::fail("labeled-control: 无匹配控件"));
        }

        let attached = driver
            .click_selector_expecting_chooser("[data-wbs-add='1']", file, self.dialog_timeout_ms)
            .await?;
        if attached {
            Ok(Outcome::ok("labeled-control"))
        } else {
            Ok(Outcome::fail("labeled-control: 对话框未出现"))
        }
    }

    /// 策略 5：全页扫描文件输入，取与标题纵向最近者
    async fn try_global_nearest(
        &self,
        driver: &PageDriver,
        region: &Region,
        file: &Path,
    ) -> Result<Outcome> {
        let header_y = region.header_box.y;

        let js_code = format!(
            r#"
            (() => {{
                document.querySelectorAll('[data-wbs-global]')
                    .forEach(el => el.removeAttribute('data-wbs-global'));
                const headerY = {header_y};

                let best = null;
                let bestDy = Infinity;
                for (const input of document.querySelectorAll("input[type='file']")) {{
                    // 文件输入常被隐藏，包围盒为零时退用父元素的
                    let r = input.getBoundingClientRect();
                    if (r.width === 0 && r.height === 0 && input.parentElement) {{
                        r = input.parentElement.getBoundingClientRect();
                    }}
                    const dy = Math.abs(r.y - headerY);
                    if (dy < bestDy) {{
                        bestDy = dy;
                        best = input;
                    }}
                }}
                if (!best) return false;
                best.setAttribute('data-wbs-global', '1');
                return true;
            }})()
            "#,
            header_y = header_y,
        );

        if !driver.eval_as::<bool>(js_code).await? {
            return Ok(Outcome::fail("global-nearest: 页面上无文件输入"));
        }

        if driver
            .set_files_on_selector("[data-wbs-global='1']", file)
            .await?
        {
            Ok(Outcome::ok("global-nearest"))
        } else {
            Ok(Outcome::fail("global-nearest: 注入失败"))
        }
    }

    /// 清空区域内容（幂等）
    ///
    /// 找容器内的移除类控件点一次；已空区域返回 false，不报错。
    /// 常规按钮找不到时退用垃圾桶图标
    pub async fn clear(&self, driver: &PageDriver, label: &str) -> Result<bool> {
        let region = match self.locator.locate(driver, label).await? {
            Some(r) => r,
            None => return Ok(false),
        };
        let selector = match RegionLocator::container_selector(&region) {
            Some(s) => s,
            None => return Ok(false),
        };
        let selector_json = serde_json::to_string(&selector)?;

        let js_code = format!(
            r#"
            (() => {{
                document.querySelectorAll('[data-wbs-remove]')
                    .forEach(el => el.removeAttribute('data-wbs-remove'));
                const container = document.querySelector({selector_json});
                if (!container) return false;

                const visible = (el) => {{
                    const r = el.getBoundingClientRect();
                    if (r.width <= 0 || r.height <= 0) return false;
                    const s = window.getComputedStyle(el);
                    return s.visibility !== 'hidden' && s.display !== 'none';
                }};

                for (const btn of container.querySelectorAll("button, div[role='button']")) {{
                    if (!visible(btn)) continue;
                    const lbl = (btn.getAttribute('aria-label') || '').toLowerCase();
                    const txt = (btn.textContent || '').trim().toLowerCase();
                    if (lbl.includes('remove') || lbl.includes('clear') || lbl.includes('delete')
                        || txt === 'x') {{
                        btn.setAttribute('data-wbs-remove', '1');
                        return true;
                    }}
                }}

                // 兜底：垃圾桶图标，点它的父元素
                const trash = container.querySelector(
                    "svg[data-testid*='trash'], svg[class*='trash']");
                if (trash && trash.parentElement && visible(trash.parentElement)) {{
                    trash.parentElement.setAttribute('data-wbs-remove', '1');
                    return true;
                }}
                return false;
            }})()
            "#,
            selector_json = selector_json,
        );

        let cleared = Self::clear_with(
            || async { driver.eval_as::<bool>(js_code).await },
            || async { driver.click_selector("[data-wbs-remove='1']").await },
        )
        .await?;

        if cleared {
            info!("    🧹 已清空 '{}'", label);
            sleep(Duration::from_millis(500)).await;
        }
        Ok(cleared)
    }

    /// 清空的核心判定，移除目标的探测与点击以闭包形式注入（便于测试）
    ///
    /// 区域已空（无移除目标）时直接返回 false，不报错也不点击
    async fn clear_with<P, Pf, C, Cf>(probe: P, click: C) -> Result<bool>
    where
        P: FnOnce() -> Pf,
        Pf: Future<Output = Result<bool>>,
        C: FnOnce() -> Cf,
        Cf: Future<Output = Result<bool>>,
    {
        if !probe().await? {
            return Ok(false);
        }
        click().await
    }

    /// 确保容器内的开关/复选框全部处于 ON（幂等）
    ///
    /// 只拨动处于 OFF 的，已 ON 的不碰；返回拨动数量
    pub async fn ensure_toggles_on(&self, driver: &PageDriver, label: &str) -> Result<usize> {
        let region = match self.locator.locate(driver, label).await? {
            Some(r) => r,
            None => return Ok(0),
        };
        let selector = match RegionLocator::container_selector(&region) {
            Some(s) => s,
            None => return Ok(0),
        };
        let selector_json = serde_json::to_string(&selector)?;

        let js_code = format!(
            r#"
            (() => {{
                const container = document.querySelector({selector_json});
                if (!container) return 0;

                let flipped = 0;
                const toggles = container.querySelectorAll(
                    "input[type='checkbox'], [role='checkbox'], [role='switch']");
                for (const t of toggles) {{
                    const role = t.getAttribute('role');
                    if (role === 'checkbox' || role === 'switch') {{
                        if (t.getAttribute('aria-checked') === 'false') {{
                            t.click();
                            flipped++;
                        }}
                    }} else if (!t.checked) {{
                        t.click();
                        flipped++;
                    }}
                }}
                return flipped;
            }})()
            "#,
            selector_json = selector_json,
        );

        let flipped: usize = driver.eval_as(js_code).await?;
        if flipped > 0 {
            info!("    ☑️ '{}' 拨动了 {} 个开关到 ON", label, flipped);
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_cascade_stops_at_first_success() {
        let invoked = Arc::new(Mutex::new(Vec::new()));
        let invoked_clone = invoked.clone();

        // 两个策略都会成功，但只有第一个应被调用
        let outcome = run_cascade(&[1u32, 2u32], move |s| {
            let invoked = invoked_clone.clone();
            async move {
                invoked.lock().unwrap().push(s);
                Outcome::ok(format!("strategy-{}", s))
            }
        })
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.reason, "strategy-1");
        assert_eq!(*invoked.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_cascade_falls_through_in_order() {
        let invoked = Arc::new(Mutex::new(Vec::new()));
        let invoked_clone = invoked.clone();

        let outcome = run_cascade(&[1u32, 2u32, 3u32], move |s| {
            let invoked = invoked_clone.clone();
            async move {
                invoked.lock().unwrap().push(s);
                if s == 3 {
                    Outcome::ok("strategy-3")
                } else {
                    Outcome::fail("落空")
                }
            }
        })
        .await;

        assert!(outcome.success);
        assert_eq!(*invoked.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cascade_exhausted() {
        let outcome =
            run_cascade(&AttachStrategy::ORDER, |_| async { Outcome::fail("落空") }).await;
        assert!(!outcome.success);
        assert!(outcome.reason.contains('5'));
    }

    /// 已空区域上连清两次：两次都返回 false，不报错，也从不触发点击
    #[tokio::test]
    async fn test_clear_idempotent_on_empty_region() {
        let clicks = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let clicks = clicks.clone();
            let cleared = ElementResolver::clear_with(
                || async { Ok(false) },
                move || async move {
                    clicks.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                },
            )
            .await
            .unwrap();
            assert!(!cleared);
        }

        assert_eq!(clicks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_strategy_order_is_fixed() {
        let names: Vec<_> = AttachStrategy::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "direct-input",
                "drop-target",
                "header-offset",
                "labeled-control",
                "global-nearest"
            ]
        );
    }
}
