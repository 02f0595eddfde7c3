//! 单张图片处理流程 - 流程层
//!
//! 核心职责：定义"一张图片"的完整处理流程
//!
//! 流程顺序：
//! 1. 按声明顺序向每个区域上传（单区域失败只记录，不中断）
//! 2. 稳定等待 → 触发生成 → 等待生成结束
//! 3. 清空全部区域 → 稳定等待
//!
//! 不持有任何资源（page），只依赖业务能力（services）

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::ImageFile;
use crate::services::{ElementResolver, GenerationMonitor, GenerationState};
use crate::workflow::item_ctx::ItemCtx;

/// 一张图片的处理报告
///
/// 只活到最终汇总，汇总后即丢弃
#[derive(Debug, Clone)]
pub struct ItemReport {
    /// (区域标签, 是否上传成功)，按声明顺序
    pub region_outcomes: Vec<(String, bool)>,
    /// 生成生命周期的终态
    pub generation: GenerationState,
    /// 实际清空的区域数
    pub cleared: usize,
}

impl ItemReport {
    /// 所有区域都上传失败视为该项失败
    pub fn is_failed(&self) -> bool {
        !self.region_outcomes.is_empty() && self.region_outcomes.iter().all(|(_, ok)| !ok)
    }

    /// 上传成功的区域数
    pub fn attached_count(&self) -> usize {
        self.region_outcomes.iter().filter(|(_, ok)| *ok).count()
    }
}

/// 单张图片处理流程
pub struct ItemFlow {
    resolver: ElementResolver,
    monitor: GenerationMonitor,
    region_labels: Vec<String>,
    settle_before_generate_secs: u64,
    settle_after_clear_secs: u64,
    verbose_logging: bool,
}

impl ItemFlow {
    /// 创建新的图片处理流程
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: ElementResolver::new(config),
            monitor: GenerationMonitor::new(config),
            region_labels: config.region_labels.clone(),
            settle_before_generate_secs: config.settle_before_generate_secs,
            settle_after_clear_secs: config.settle_after_clear_secs,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 处理一张图片
    ///
    /// 已分类的失败（区域没找到、策略耗尽、生成超时）都在此收敛为
    /// 报告字段；只有未分类的故障才会上抛并中止整个批次
    pub async fn run(
        &self,
        driver: &PageDriver,
        image: &ImageFile,
        ctx: &ItemCtx,
    ) -> Result<ItemReport> {
        info!("{} 开始处理", ctx);

        // 1. 按声明顺序上传到每个区域
        let mut region_outcomes = Vec::with_capacity(self.region_labels.len());
        for label in &self.region_labels {
            if self.verbose_logging {
                info!("{} 区域 '{}' 源文件: {}", ctx, label, image.path.display());
            }
            let attached = self.resolver.attach(driver, label, &image.path).await?;
            if attached {
                // 附带保证：容器内开关全部 ON
                self.resolver.ensure_toggles_on(driver, label).await?;
            } else {
                warn!("{} ⚠️ 区域 '{}' 上传失败，继续后续区域", ctx, label);
            }
            region_outcomes.push((label.clone(), attached));

            // 区域间的短暂稳定停顿
            sleep(Duration::from_secs(1)).await;
        }

        // 2. 生成前稳定等待
        info!(
            "{} ⏳ 生成前等待 {} 秒...",
            ctx, self.settle_before_generate_secs
        );
        sleep(Duration::from_secs(self.settle_before_generate_secs)).await;

        // 3. 触发生成并等待结束（无论上传成败都触发，与清理配对）
        let triggered = self.monitor.trigger(driver).await?;
        if !triggered {
            warn!("{} ⚠️ 未找到生成按钮，已退回回车兜底", ctx);
        }
        let generation = self.monitor.wait(driver).await?;
        if generation == GenerationState::TimedOut {
            warn!("{} ⚠️ 生成超时，照常进入清理", ctx);
        }

        // 4. 清空全部区域（幂等，空区域返回 false 不计数）
        info!("{} 🧹 清理全部区域...", ctx);
        let mut cleared = 0;
        for label in &self.region_labels {
            if self.resolver.clear(driver, label).await? {
                cleared += 1;
            }
        }

        // 5. 清理后稳定等待
        info!(
            "{} ⏳ 清理后稳定 {} 秒...",
            ctx, self.settle_after_clear_secs
        );
        sleep(Duration::from_secs(self.settle_after_clear_secs)).await;

        let report = ItemReport {
            region_outcomes,
            generation,
            cleared,
        };
        info!(
            "{} ✅ 处理完成: 上传 {}/{}, 生成 {:?}, 清空 {}",
            ctx,
            report.attached_count(),
            self.region_labels.len(),
            report.generation,
            report.cleared
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: &[bool]) -> ItemReport {
        ItemReport {
            region_outcomes: outcomes
                .iter()
                .enumerate()
                .map(|(i, ok)| (format!("R{}", i), *ok))
                .collect(),
            generation: GenerationState::Completed,
            cleared: 0,
        }
    }

    #[test]
    fn test_failed_only_when_all_regions_fail() {
        assert!(report(&[false, false, false]).is_failed());
        assert!(!report(&[false, true, false]).is_failed());
        assert!(!report(&[true, true, true]).is_failed());
    }

    #[test]
    fn test_attached_count() {
        assert_eq!(report(&[true, false, true]).attached_count(), 2);
    }
}
