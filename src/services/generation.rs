//! 生成生命周期服务 - 业务能力层
//!
//! 触发主操作（生成按钮），然后轮询两个瞬态 UI 信号
//! （停止/取消控件、"Generating" 文案）判断远端异步操作何时结束

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::services::classifier::VisualClassifier;
use crate::utils::logging::truncate_text;

/// 生成生命周期状态
///
/// 每次触发的操作各持一份
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// 尚未观察到任何进行中信号
    Idle,
    /// 观察到进行中信号
    Running,
    /// 曾在进行中，现在两个信号都消失
    Completed,
    /// 轮询上限耗尽时仍在进行
    TimedOut,
    /// 宽限窗口内始终无信号：可能瞬间完成，也可能根本没启动
    UnknownSkip,
}

/// 生成生命周期监控器
pub struct GenerationMonitor {
    poll_secs: u64,
    max_cycles: usize,
    grace_cycles: usize,
    classifier: VisualClassifier,
}

impl GenerationMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            poll_secs: config.generation_poll_secs,
            max_cycles: config.generation_max_cycles,
            grace_cycles: config.generation_grace_cycles,
            classifier: VisualClassifier::new(config),
        }
    }

    /// 触发前排水：上一轮生成可能还在跑，等停止控件消失
    ///
    /// 最多等 15 个轮询周期，耗尽也继续（尽力而为）
    pub async fn drain_previous(&self, driver: &PageDriver) -> Result<()> {
        for cycle in 0..15 {
            if !self.probe_active(driver).await? {
                return Ok(());
            }
            debug!("上一轮生成仍在进行，等待... ({}/15)", cycle + 1);
            sleep(Duration::from_secs(self.poll_secs)).await;
        }
        warn!("    ⚠️ 上一轮生成迟迟未结束，继续触发");
        Ok(())
    }

    /// 触发主操作
    ///
    /// 视觉分类器在右下区挑最右的深色候选点击；没有任何候选时
    /// 退到键盘级默认提交（Enter）
    pub async fn trigger(&self, driver: &PageDriver) -> Result<bool> {
        info!("  ▶️ 点击生成按钮...");

        self.drain_previous(driver).await?;

        let viewport = driver.viewport().await;
        let candidates = driver
            .scan_candidates("button, [role='button'], a[role='button'], div[onclick]")
            .await?;

        if let Some(best) = self.classifier.pick_primary_action(&candidates, viewport) {
            info!(
                "    👉 命中主操作候选 (x={:.0}, bg={}, text='{}')",
                best.bounding_box.x,
                best.background_color,
                truncate_text(&best.text, 20)
            );
            if driver.click_scanned(best).await? {
                return Ok(true);
            }
        }

        // 键盘级兜底
        warn!("    ⚠️ 无可点击候选，回退为 Enter 提交");
        driver.press_enter().await?;
        Ok(false)
    }

    /// 等待本轮生成结束
    pub async fn wait(&self, driver: &PageDriver) -> Result<GenerationState> {
        self.wait_with(|| {
            let driver = driver;
            async move { self.probe_active(driver).await }
        })
        .await
    }

    /// 等待的核心循环，信号源以探针形式注入（便于测试）
    ///
    /// Idle → Running（任一信号出现）→ Completed（信号全消失）；
    /// 上限耗尽仍 Running → TimedOut；宽限窗口内无信号 → UnknownSkip，
    /// 不阻塞后续批次
    pub async fn wait_with<F, Fut>(&self, mut probe: F) -> Result<GenerationState>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut state = GenerationState::Idle;

        for cycle in 1..=self.max_cycles {
            let active = probe().await?;

            match state {
                GenerationState::Idle if active => {
                    debug!("生成信号出现 (第 {} 次轮询)", cycle);
                    state = GenerationState::Running;
                }
                GenerationState::Idle if cycle >= self.grace_cycles => {
                    info!("    ℹ️ 宽限窗口内无生成信号，跳过等待");
                    return Ok(GenerationState::UnknownSkip);
                }
                GenerationState::Running if !active => {
                    info!("    ✅ 生成完成 (第 {} 次轮询)", cycle);
                    return Ok(GenerationState::Completed);
                }
                _ => {}
            }

            if cycle < self.max_cycles {
                sleep(Duration::from_secs(self.poll_secs)).await;
            }
        }

        if state == GenerationState::Running {
            warn!(
                "    ⚠️ 生成超时：{} 次轮询 (间隔 {}s) 后仍在进行",
                self.max_cycles, self.poll_secs
            );
            Ok(GenerationState::TimedOut)
        } else {
            Ok(GenerationState::UnknownSkip)
        }
    }

    /// 探测进行中信号：停止/取消控件，或 "Generating" 文案
    async fn probe_active(&self, driver: &PageDriver) -> Result<bool> {
        let js_code = r#"
            (() => {
                const visible = (el) => {
                    const r = el.getBoundingClientRect();
                    if (r.width <= 0 || r.height <= 0) return false;
                    const s = window.getComputedStyle(el);
                    return s.visibility !== 'hidden' && s.display !== 'none';
                };

                const stops = document.querySelectorAll(
                    "button[aria-label*='Stop' i], button[aria-label*='Cancel' i]");
                for (const b of stops) {
                    if (visible(b)) return true;
                }

                for (const el of document.querySelectorAll('body *')) {
                    if (el.children.length > 0) continue;
                    const text = (el.textContent || '').trim();
                    if (text.startsWith('Generating') && visible(el)) return true;
                }
                return false;
            })()
        "#;
        driver.eval_as::<bool>(js_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn monitor() -> GenerationMonitor {
        GenerationMonitor::new(&Config::default())
    }

    /// 信号出现 3 个周期后消失：Idle→Running→Completed，
    /// 在第 4 次探测返回，而不是耗满 30 次上限
    #[tokio::test(start_paused = true)]
    async fn test_running_then_completed() {
        let m = monitor();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let state = m
            .wait_with(move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(n <= 3)
                }
            })
            .await
            .unwrap();

        assert_eq!(state, GenerationState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    /// 宽限窗口内始终无信号：UnknownSkip，只探测 grace_cycles 次
    #[tokio::test(start_paused = true)]
    async fn test_unknown_skip_within_grace() {
        let m = monitor();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let state = m
            .wait_with(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                }
            })
            .await
            .unwrap();

        assert_eq!(state, GenerationState::UnknownSkip);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// 信号一直都在：耗满上限后 TimedOut
    #[tokio::test(start_paused = true)]
    async fn test_timed_out() {
        let m = monitor();
        let state = m.wait_with(|| async { Ok(true) }).await.unwrap();
        assert_eq!(state, GenerationState::TimedOut);
    }

    /// 探针报错立即上抛
    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let m = monitor();
        let result = m
            .wait_with(|| async { Err(anyhow::anyhow!("页面崩了")) })
            .await;
        assert!(result.is_err());
    }
}
