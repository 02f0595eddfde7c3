//! 会话/引导状态机 - 业务能力层
//!
//! 穿过未知顺序的瞬态障碍（登录、引导弹窗、收起的侧栏），
//! 收敛到所有目标区域可见的 Ready 状态。
//!
//! 轮询驱动而非事件驱动；每个阶段都有有界预算，预算耗尽时
//! "继续前进"而非报错——Ready 对编排层而言是尽力而为的猜测，
//! 不是保证

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::PageDriver;
use crate::services::classifier::VisualClassifier;
use crate::utils::{poll_until, PollVerdict};

/// 会话状态
///
/// 整个进程只有一份，生命周期等于一个页面会话
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 未登录（检测到登录表单）
    Unauthenticated,
    /// 自动登录失败，等待人工介入
    AwaitingManualLogin,
    /// 正在关闭引导弹窗
    OnboardingModal,
    /// 侧栏收起，目标区域不可见
    SidebarCollapsed,
    /// 所有目标区域已确认可见（终态）
    Ready,
}

/// 引导弹窗探测结果
#[derive(Debug, Deserialize)]
struct ModalProbe {
    continue_found: bool,
    close_found: bool,
    modal_text_found: bool,
}

/// 会话状态机
pub struct SessionManager {
    email: String,
    password: String,
    region_labels: Vec<String>,
    login_wait_secs: u64,
    manual_login_wait_secs: u64,
    max_modal_dismissals: usize,
    classifier: VisualClassifier,
}

impl SessionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            email: config.email.clone(),
            password: config.password.clone(),
            region_labels: config.region_labels.clone(),
            login_wait_secs: config.login_wait_secs,
            manual_login_wait_secs: config.manual_login_wait_secs,
            max_modal_dismissals: config.max_modal_dismissals,
            classifier: VisualClassifier::new(config),
        }
    }

    /// 推进状态机直到 Ready
    ///
    /// 已 Ready 时再次进入是空操作检查。每个阶段的预算耗尽都
    /// 退化为继续前进，最终状态只是尽力而为
    pub async fn ensure_ready(&self, driver: &PageDriver) -> Result<SessionState> {
        // 空操作检查
        if self.markers_visible(driver).await? {
            debug!("会话已就绪，跳过状态机");
            return Ok(SessionState::Ready);
        }

        // 阶段 1：登录
        let mut state = self.try_login(driver).await?;
        if state == SessionState::AwaitingManualLogin {
            state = self.await_manual_login(driver).await?;
        }

        // 阶段 2：引导弹窗（机会式：出现几个关几个，有上限）
        if state != SessionState::Ready {
            self.dismiss_onboarding_modals(driver).await?;
        }

        // 阶段 3：侧栏展开
        if !self.markers_visible(driver).await? {
            self.expand_sidebar(driver).await?;
        }

        // 终检
        if self.markers_visible(driver).await? {
            info!("✅ 会话就绪：全部目标区域可见");
            Ok(SessionState::Ready)
        } else {
            // 预算耗尽也继续前进，由后续的区域定位各自兜底
            warn!(
                "⚠️ {}，按 Ready 继续",
                AppError::session_not_ready(self.manual_login_wait_secs)
            );
            Ok(SessionState::Ready)
        }
    }

    /// 所有目标区域标签是否都可见
    async fn markers_visible(&self, driver: &PageDriver) -> Result<bool> {
        let labels_json = serde_json::to_string(&self.region_labels)?;
        let js_code = format!(
            r#"
            (() => {{
                const labels = {labels_json};
                const visible = (el) => {{
                    const r = el.getBoundingClientRect();
                    if (r.width <= 0 || r.height <= 0) return false;
                    const s = window.getComputedStyle(el);
                    return s.visibility !== 'hidden' && s.display !== 'none';
                }};
                return labels.every(label => {{
                    for (const el of document.querySelectorAll('body *')) {{
                        if (el.children.length > 0) continue;
                        if ((el.textContent || '').trim() === label && visible(el)) return true;
                    }}
                    return false;
                }});
            }})()
            "#,
            labels_json = labels_json,
        );
        driver.eval_as::<bool>(js_code).await
    }

    /// 阶段 1：自动登录
    ///
    /// 逐项填写，每次提交后短暂稳定等待；密码框始终不出现或
    /// 时限内未见标记转移，则交给人工兜底
    async fn try_login(&self, driver: &PageDriver) -> Result<SessionState> {
        info!("  🔑 尝试自动登录...");

        if !driver.type_into("input[type='email']", &self.email).await? {
            debug!("未检测到登录表单，可能已登录");
            return Ok(SessionState::OnboardingModal);
        }
        info!("    已填写邮箱，提交...");
        driver.press_enter().await?;
        sleep(Duration::from_secs(3)).await;

        // 密码框可能延迟滑入，给三次机会
        let mut password_filled = false;
        for _ in 0..3 {
            if driver
                .type_into("input[type='password']", &self.password)
                .await?
            {
                password_filled = true;
                break;
            }
            sleep(Duration::from_secs(2)).await;
        }

        if password_filled {
            info!("    已填写密码，提交...");
            driver.press_enter().await?;

            // 等待登录跳转：以区域标记出现为准，不依赖具体 URL
            let cycles = (self.login_wait_secs / 2).max(1) as usize;
            let verdict = poll_until(Duration::from_secs(2), cycles, || {
                let driver = driver;
                async move { self.markers_visible(driver).await }
            })
            .await?;

            if verdict.is_satisfied() {
                info!("    ✅ 登录成功");
                return Ok(SessionState::OnboardingModal);
            }
        } else {
            warn!("    ⚠️ 密码框未出现（可能触发了人机验证）");
        }

        Ok(SessionState::AwaitingManualLogin)
    }

    /// 阶段 1b：人工登录兜底
    ///
    /// 两步验证或风控拦截时，只能等人完成登录；固定间隔轮询
    /// 标记，预算为分钟级
    async fn await_manual_login(&self, driver: &PageDriver) -> Result<SessionState> {
        warn!("{}", "=".repeat(50));
        warn!("⚠️ 自动登录未完成，请在浏览器中手动完成登录/验证");
        warn!("   （最多等待 {} 秒）", self.manual_login_wait_secs);
        warn!("{}", "=".repeat(50));

        let cycles = (self.manual_login_wait_secs / 2).max(1) as usize;
        let verdict = poll_until(Duration::from_secs(2), cycles, || {
            let driver = driver;
            async move { self.markers_visible(driver).await }
        })
        .await?;

        match verdict {
            PollVerdict::Satisfied { cycles } => {
                info!("    ✅ 检测到登录完成 (第 {} 次轮询)", cycles);
                Ok(SessionState::OnboardingModal)
            }
            PollVerdict::Exhausted => {
                warn!("    ⚠️ 人工登录等待超时，继续前进");
                Ok(SessionState::OnboardingModal)
            }
        }
    }

    /// 阶段 2：关闭引导弹窗
    ///
    /// 连续引导屏的数量未知，循环处理但有上限；优先点显式的
    /// CONTINUE/Close 控件，没有就发 Escape
    async fn dismiss_onboarding_modals(&self, driver: &PageDriver) -> Result<()> {
        info!("  👀 检查引导弹窗...");

        for round in 0..self.max_modal_dismissals {
            if self.markers_visible(driver).await? {
                debug!("目标区域已可见，弹窗处理结束");
                break;
            }

            let probe = self.probe_modal(driver).await?;

            if probe.continue_found {
                info!("    👋 发现 CONTINUE 按钮，点击 (第 {} 轮)", round + 1);
                driver.click_selector("[data-wbs-continue='1']").await?;
                sleep(Duration::from_secs(4)).await;
                continue;
            }

            if probe.modal_text_found {
                if probe.close_found {
                    info!("    👋 发现弹窗关闭按钮，点击 (第 {} 轮)", round + 1);
                    driver.click_selector("[data-wbs-close='1']").await?;
                    sleep(Duration::from_secs(2)).await;
                } else {
                    info!("    👋 无显式关闭按钮，发送 Escape (第 {} 轮)", round + 1);
                    driver.press_escape().await?;
                    sleep(Duration::from_secs(1)).await;
                }
                continue;
            }

            // 没有任何弹窗信号
            break;
        }

        Ok(())
    }

    async fn probe_modal(&self, driver: &PageDriver) -> Result<ModalProbe> {
        let js_code = r#"
            (() => {
                document.querySelectorAll('[data-wbs-continue], [data-wbs-close]')
                    .forEach(el => {
                        el.removeAttribute('data-wbs-continue');
                        el.removeAttribute('data-wbs-close');
                    });

                const visible = (el) => {
                    const r = el.getBoundingClientRect();
                    if (r.width <= 0 || r.height <= 0) return false;
                    const s = window.getComputedStyle(el);
                    return s.visibility !== 'hidden' && s.display !== 'none';
                };

                let continue_found = false;
                for (const btn of document.querySelectorAll("button, [role='button']")) {
                    if (!visible(btn)) continue;
                    if ((btn.textContent || '').trim().toUpperCase() === 'CONTINUE') {
                        btn.setAttribute('data-wbs-continue', '1');
                        continue_found = true;
                        break;
                    }
                }

                let close_found = false;
                for (const btn of document.querySelectorAll(
                    "[aria-label='Close'], button[aria-label*='close' i]")) {
                    if (!visible(btn)) continue;
                    btn.setAttribute('data-wbs-close', '1');
                    close_found = true;
                    break;
                }

                // 对话框容器存在即视为弹窗信号
                const modal_text_found = Array.from(
                    document.querySelectorAll("[role='dialog'], [aria-modal='true']"))
                    .some(visible);

                return { continue_found, close_found, modal_text_found };
            })()
        "#;
        driver.eval_as::<ModalProbe>(js_code).await
    }

    /// 阶段 3：展开收起的侧栏
    ///
    /// 可访问名称白名单优先，退到视觉左缘搜索，再退到第一个
    /// 貌似合理的候选，全程尽力而为
    async fn expand_sidebar(&self, driver: &PageDriver) -> Result<()> {
        info!("  👀 目标区域不可见，尝试展开侧栏...");

        let candidates = driver.scan_candidates("button").await?;

        // 策略 1：显式可访问名称
        let allowlist = Regex::new("(?i)expand|open sidebar|show tools|show project").ok();
        if let Some(named) = candidates.iter().find(|c| {
            c.visible
                && allowlist
                    .as_ref()
                    .map(|re| re.is_match(&c.aria_label))
                    .unwrap_or(false)
                && !c.looks_like_menu()
        }) {
            info!("    👉 按名称命中侧栏开关: '{}'", named.aria_label);
            driver.click_scanned(named).await?;
        } else if let Some(visual) = self.classifier.pick_sidebar_toggle(&candidates) {
            // 策略 2：视觉左缘搜索（深色/近方形）
            info!(
                "    👉 视觉扫描命中侧栏开关 (y={:.0})",
                visual.bounding_box.y
            );
            driver.click_scanned(visual).await?;
        } else if let Some(first) = self.classifier.first_left_edge_candidate(&candidates) {
            // 策略 3：最后手段，点第一个貌似合理的候选
            warn!("    ⚠️ 无明确侧栏开关，点击首个左缘候选");
            driver.click_scanned(first).await?;
        } else {
            warn!("    ❌ 未找到任何侧栏开关候选");
            return Ok(());
        }

        // 验证展开结果，最多 4 秒
        let verdict = poll_until(Duration::from_millis(500), 8, || {
            let driver = driver;
            async move { self.markers_visible(driver).await }
        })
        .await?;

        if verdict.is_satisfied() {
            info!("    ✅ 侧栏已展开");
        } else {
            warn!("    ⚠️ 侧栏展开未得到确认，继续前进");
        }
        Ok(())
    }
}
