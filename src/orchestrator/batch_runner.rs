//! 批量图片提交器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量图片的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、清理残留浏览器、启动新浏览器、创建 PageDriver
//! 2. **批量加载**：按文件夹声明顺序加载所有待处理图片（`Vec<ImageFile>`）
//! 3. **会话准备**：登录、关弹窗、展开侧栏，直到页面可用
//! 4. **逐张处理**：严格串行，上一张完全结束后才开始下一张
//! 5. **资源管理**：持有 Browser 和 PageDriver，确保生命周期正确
//! 6. **全局统计**：汇总所有图片的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单张图片的细节
//! - **资源所有者**：唯一持有 Browser 的模块
//! - **向下委托**：委托 ItemFlow 处理单张图片

use crate::browser;
use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::ImageFile;
use crate::services::SessionManager;
use crate::utils::logging;
use crate::workflow::{ItemCtx, ItemFlow, ItemReport};
use anyhow::Result;
use chromiumoxide::Browser;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    browser: Browser,
    driver: PageDriver,
    session: SessionManager,
    flow: ItemFlow,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 先清掉残留的浏览器进程，避免用户数据目录被锁
        browser::kill_existing_browsers().await;

        // 启动浏览器并打开目标页
        let (browser, page) = browser::launch_browser(&config).await?;

        // 创建 PageDriver（持有 page）
        let driver = PageDriver::new(page);

        let session = SessionManager::new(&config);
        let flow = ItemFlow::new(&config);

        Ok(Self {
            config,
            browser,
            driver,
            session,
            flow,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        // 会话准备：登录 / 关弹窗 / 展开侧栏
        self.session.ensure_ready(&self.driver).await?;

        // 加载所有待处理的图片
        let all_images = self.load_images().await?;

        if all_images.is_empty() {
            warn!("⚠️ 没有找到待处理的图片，程序结束");
            self.close_browser().await;
            return Ok(());
        }

        let total = all_images.len();
        log_images_loaded(total, &self.config.image_folders);

        // 逐张处理（严格串行）；中止路径同样要关掉浏览器
        let result = self.process_all_images(&all_images).await;
        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                self.close_browser().await;
                return Err(e);
            }
        };

        // 输出最终统计
        print_final_stats(&stats, &self.config);

        self.close_browser().await;
        Ok(())
    }

    /// 加载图片
    async fn load_images(&self) -> Result<Vec<ImageFile>> {
        info!("\n📁 正在扫描待处理的图片...");
        crate::models::load_image_batch(&self.config.image_folders).await
    }

    /// 逐张处理所有图片
    async fn process_all_images(&self, all_images: &[ImageFile]) -> Result<RunStats> {
        let total = all_images.len();

        run_items(total, Duration::from_secs(2), |idx| {
            let image = &all_images[idx];
            let ctx = ItemCtx::new(idx + 1, total, image.display_name.clone());
            async move {
                log_item_start(&ctx);

                match self.flow.run(&self.driver, image, &ctx).await {
                    Ok(report) => {
                        if report.is_failed() {
                            error!("{} ❌ 所有区域均上传失败", ctx);
                        }
                        Ok(report)
                    }
                    Err(e) => {
                        // 未分类的故障（CDP 断连等）无法在单张范围内恢复
                        error!("{} ❌ 处理过程中发生错误: {}", ctx, e);
                        error!("💡 页面或浏览器可能已失效，请检查浏览器进程后重新运行");
                        Err(e)
                    }
                }
            }
        })
        .await
    }

    /// 关闭浏览器，失败只记录不上抛
    async fn close_browser(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("⚠️ 关闭浏览器失败: {}", e);
        }
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct RunStats {
    success: usize,
    failed: usize,
    total: usize,
}

/// 串行批次循环：单项以闭包形式注入（便于测试）
///
/// 单项的失败报告只计入统计，不中断后续项；闭包返回 Err
/// （未分类故障）时立即中止整个批次
async fn run_items<F, Fut>(total: usize, cooldown: Duration, mut run_one: F) -> Result<RunStats>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<ItemReport>>,
{
    let mut stats = RunStats {
        total,
        ..Default::default()
    };

    for idx in 0..total {
        let report = run_one(idx).await?;
        if report.is_failed() {
            stats.failed += 1;
        } else {
            stats.success += 1;
        }

        // 张与张之间的冷却
        if idx + 1 < total {
            sleep(cooldown).await;
        }
    }

    Ok(stats)
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量图片提交模式");
    info!("🌐 目标页面: {}", config.target_url);
    info!("🗂️ 图片文件夹: {}", config.image_folders.join(", "));
    info!("{}", "=".repeat(60));
}

fn log_images_loaded(total: usize, folders: &[String]) {
    info!("✓ 找到 {} 张待处理的图片（来自 {} 个文件夹）", total, folders.len());
    info!("💡 严格串行处理，上一张清理完毕才开始下一张\n");
}

fn log_item_start(ctx: &ItemCtx) {
    info!("\n{}", "=".repeat(60));
    info!("📦 {} 开始", ctx);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &RunStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::GenerationState;
    use std::sync::{Arc, Mutex};

    fn report(all_regions_ok: bool) -> ItemReport {
        ItemReport {
            region_outcomes: vec![
                ("Subject".to_string(), all_regions_ok),
                ("Scene".to_string(), all_regions_ok),
                ("Style".to_string(), all_regions_ok),
            ],
            generation: GenerationState::Completed,
            cleared: 0,
        }
    }

    /// 3 张中第 2 张全区域失败：第 1、3 张照常走完，
    /// 统计恰好记 1 个失败项
    #[tokio::test(start_paused = true)]
    async fn test_one_failed_item_does_not_halt_batch() {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let visited_clone = visited.clone();

        let stats = run_items(3, Duration::from_secs(2), move |idx| {
            let visited = visited_clone.clone();
            async move {
                visited.lock().unwrap().push(idx);
                Ok(report(idx != 1))
            }
        })
        .await
        .unwrap();

        assert_eq!(*visited.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 3);
    }

    /// 未分类故障立即中止批次，后续项不再执行
    #[tokio::test(start_paused = true)]
    async fn test_unclassified_fault_aborts_batch() {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let visited_clone = visited.clone();

        let result = run_items(3, Duration::from_secs(2), move |idx| {
            let visited = visited_clone.clone();
            async move {
                visited.lock().unwrap().push(idx);
                if idx == 1 {
                    Err(anyhow::anyhow!("页面断连"))
                } else {
                    Ok(report(true))
                }
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*visited.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_yields_zero_stats() {
        let stats = run_items(0, Duration::from_secs(2), |_| async {
            Ok(report(true))
        })
        .await
        .unwrap();
        assert_eq!((stats.success, stats.failed, stats.total), (0, 0, 0));
    }
}
