//! 区域定位服务 - 业务能力层
//!
//! 把一个逻辑区域标签解析为页面上的有界容器。
//! 只负责"定位"能力，不做任何点击或上传

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::{BoundingBox, Region};

/// 标题可见性轮询间隔
const PROBE_INTERVAL_MS: u64 = 300;

/// 一次定位探测的 JS 返回值
#[derive(Debug, Deserialize)]
struct LocateProbe {
    found: bool,
    header: Option<BoundingBox>,
    container: Option<BoundingBox>,
}

/// 区域定位服务
pub struct RegionLocator {
    min_region_height: f64,
    max_ancestor_hops: usize,
    header_wait_ms: u64,
}

impl RegionLocator {
    pub fn new(config: &Config) -> Self {
        Self {
            min_region_height: config.min_region_height,
            max_ancestor_hops: config.max_ancestor_hops,
            header_wait_ms: config.header_wait_ms,
        }
    }

    /// 定位一个区域
    ///
    /// 先在等待时限内轮询精确文本匹配；失败后退到大小写不敏感的
    /// 前缀匹配。找到标题后向上回溯祖先，第一个高度超过阈值的祖先
    /// 成为容器并被打上 data-wbs-mark；没有合格祖先时返回部分形态。
    ///
    /// Region 是一次性的，调用方每次操作前都应重新调用本方法
    pub async fn locate(&self, driver: &PageDriver, label: &str) -> Result<Option<Region>> {
        let mark = Self::mark_for(label);

        // 精确匹配 + 可见性等待
        let cycles = (self.header_wait_ms / PROBE_INTERVAL_MS).max(1);
        for cycle in 0..cycles {
            let probe = self.probe(driver, label, true, &mark).await?;
            if probe.found {
                return Ok(Some(self.build_region(label, &mark, probe)));
            }
            if cycle + 1 < cycles {
                sleep(Duration::from_millis(PROBE_INTERVAL_MS)).await;
            }
        }

        // 回退：前缀匹配，单次探测
        debug!("区域 '{}' 精确匹配失败，尝试前缀匹配", label);
        let probe = self.probe(driver, label, false, &mark).await?;
        if probe.found {
            return Ok(Some(self.build_region(label, &mark, probe)));
        }

        warn!(
            "⚠️ 未找到区域 '{}' (等待 {}ms)",
            label, self.header_wait_ms
        );
        Ok(None)
    }

    /// 区域容器的 CSS 选择器（供解析器做容器内查询）
    pub fn container_selector(region: &Region) -> Option<String> {
        region
            .container_mark
            .as_ref()
            .map(|mark| format!("[data-wbs-mark=\"{}\"]", mark))
    }

    fn build_region(&self, label: &str, mark: &str, probe: LocateProbe) -> Region {
        let header_box = probe.header.unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));
        match probe.container {
            Some(container_box) => {
                debug!(
                    "✓ 区域 '{}' 容器高度 {:.0}px",
                    label, container_box.height
                );
                Region::full(label, header_box, container_box, mark)
            }
            None => {
                debug!("区域 '{}' 仅找到标题（部分形态）", label);
                Region::partial(label, header_box)
            }
        }
    }

    async fn probe(
        &self,
        driver: &PageDriver,
        label: &str,
        exact: bool,
        mark: &str,
    ) -> Result<LocateProbe> {
        let label_json = serde_json::to_string(label)?;
        let mark_json = serde_json::to_string(mark)?;

        let js_code = format!(
            r#"
            (() => {{
                const label = {label_json};
                const exact = {exact};
                const minHeight = {min_height};
                const maxHops = {max_hops};
                const mark = {mark_json};

                document.querySelectorAll('[data-wbs-mark="' + mark + '"]')
                    .forEach(el => el.removeAttribute('data-wbs-mark'));

                const visible = (el) => {{
                    const r = el.getBoundingClientRect();
                    if (r.width <= 0 || r.height <= 0) return false;
                    const s = window.getComputedStyle(el);
                    return s.visibility !== 'hidden' && s.display !== 'none';
                }};
                const rect = (el) => {{
                    const r = el.getBoundingClientRect();
                    return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
                }};

                let header = null;
                const wanted = label.toLowerCase();
                for (const el of document.querySelectorAll('body *')) {{
                    if (el.children.length > 0) continue;
                    const text = (el.textContent || '').trim();
                    if (!text) continue;
                    const hit = exact
                        ? text === label
                        : text.toLowerCase().startsWith(wanted);
                    if (hit && visible(el)) {{ header = el; break; }}
                }}
                if (!header) return {{ found: false, header: null, container: null }};

                let node = header.parentElement;
                let container = null;
                for (let hop = 0; hop < maxHops && node; hop++) {{
                    const r = node.getBoundingClientRect();
                    if (r.height > minHeight) {{ container = node; break; }}
                    node = node.parentElement;
                }}
                if (container) container.setAttribute('data-wbs-mark', mark);

                return {{
                    found: true,
                    header: rect(header),
                    container: container ? rect(container) : null
                }};
            }})()
            "#,
            label_json = label_json,
            exact = exact,
            min_height = self.min_region_height,
            max_hops = self.max_ancestor_hops,
            mark_json = mark_json,
        );

        driver.eval_as::<LocateProbe>(js_code).await
    }

    fn mark_for(label: &str) -> String {
        let slug: String = label
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("region-{}", slug)
    }
}
