use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// 强制结束残留的浏览器进程，释放 profile 目录的文件锁
///
/// 失败只记 warn：进程本来就不存在是常态
pub async fn kill_existing_browsers() {
    info!("🔪 结束残留的浏览器进程，避免 profile 被锁...");

    #[cfg(target_os = "windows")]
    let result = tokio::process::Command::new("taskkill")
        .args(["/F", "/IM", "chrome.exe", "/T"])
        .output()
        .await;

    #[cfg(not(target_os = "windows"))]
    let result = tokio::process::Command::new("pkill")
        .args(["-f", "chrome"])
        .output()
        .await;

    match result {
        Ok(_) => {
            // 等待文件锁释放
            sleep(Duration::from_secs(2)).await;
        }
        Err(e) => {
            warn!("⚠️ 无法结束浏览器进程: {}", e);
        }
    }
}

/// 启动带持久化 profile 的有头浏览器并导航到目标 URL
pub async fn launch_browser(config: &Config) -> Result<(Browser, Page)> {
    info!("🔌 启动浏览器 (持久化 profile)...");
    debug!("目标 URL: {}", config.target_url);

    let mut builder = BrowserConfig::builder()
        .with_head()
        .user_data_dir(&config.user_data_dir)
        .args(vec![
            "--start-maximized",
            // 降低被目标站点识别为自动化的概率
            "--disable-blink-features=AutomationControlled",
            "--disable-gpu",
            "--no-first-run",
            "--no-sandbox",
            "--disable-dev-shm-usage",
        ]);

    if !config.chrome_executable.is_empty() {
        builder = builder.chrome_executable(Path::new(&config.chrome_executable));
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow::anyhow!("配置浏览器失败: {}", e)
    })?;

    // 启动浏览器
    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    // 创建新页面并导航；导航失败不致命，会话状态机会继续收敛
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    if let Err(e) = page.goto(config.target_url.as_str()).await {
        warn!("⚠️ 导航警告: {}", e);
    } else {
        info!("🌐 已导航到: {}", config.target_url);
    }

    Ok((browser, page))
}
