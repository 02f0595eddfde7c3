//! 页面驱动器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露能力：
//! - eval() / eval_as()：执行 JS 并取回 JSON
//! - 坐标点击 / 按键 / 原生输入
//! - 文件输入直接注入（DOM.setFileInputFiles）
//! - 文件选择对话框拦截
//!
//! 不认识 Region / Strategy，不处理业务流程

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventFileChooserOpened, SetInterceptFileChooserDialogParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{ElementCandidate, Viewport};

/// 单次扫描的候选数量上限，防止异常页面撑爆返回载荷
const SCAN_CAP: usize = 300;

/// 页面驱动器
pub struct PageDriver {
    page: Page,
}

impl PageDriver {
    /// 创建新的页面驱动器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 查询当前视口尺寸，失败时返回保守默认值
    pub async fn viewport(&self) -> Viewport {
        match self
            .eval_as::<Viewport>("({ width: window.innerWidth, height: window.innerHeight })")
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!("⚠️ 视口查询失败，使用默认值: {}", e);
                Viewport::default()
            }
        }
    }

    /// 扫描选择器命中的元素，产出候选快照
    ///
    /// 每个候选被打上 data-wbs-scan 序号，决策后可凭
    /// [`Self::click_scanned`] 回查点击；每次扫描先清掉旧序号，
    /// 快照不跨操作复用
    pub async fn scan_candidates(&self, selector: &str) -> Result<Vec<ElementCandidate>> {
        let selector_json = serde_json::to_string(selector)?;
        let js_code = format!(
            r#"
            (() => {{
                document.querySelectorAll('[data-wbs-scan]')
                    .forEach(el => el.removeAttribute('data-wbs-scan'));

                const out = [];
                for (const el of document.querySelectorAll({selector_json})) {{
                    if (out.length >= {cap}) break;
                    const r = el.getBoundingClientRect();
                    const s = window.getComputedStyle(el);
                    const visible = r.width > 0 && r.height > 0
                        && s.visibility !== 'hidden' && s.display !== 'none';
                    el.setAttribute('data-wbs-scan', String(out.length));
                    out.push({{
                        mark_index: out.length,
                        box: {{ x: r.x, y: r.y, width: r.width, height: r.height }},
                        visible: visible,
                        background_color: s.backgroundColor || '',
                        aria_label: el.getAttribute('aria-label') || '',
                        text: (el.textContent || '').trim().slice(0, 80),
                    }});
                }}
                return out;
            }})()
            "#,
            selector_json = selector_json,
            cap = SCAN_CAP,
        );

        self.eval_as::<Vec<ElementCandidate>>(js_code).await
    }

    /// 点击最近一次扫描中序号为 mark_index 的候选
    pub async fn click_scanned(&self, candidate: &ElementCandidate) -> Result<bool> {
        self.click_selector(&format!("[data-wbs-scan='{}']", candidate.mark_index))
            .await
    }

    /// 在指定坐标派发一次完整的鼠标点击
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        debug!("坐标点击: ({:.0}, {:.0})", x, y);

        let moved = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(|e| anyhow!("构造鼠标事件失败: {}", e))?;
        self.page.execute(moved).await?;

        let pressed = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| anyhow!("构造鼠标事件失败: {}", e))?;
        self.page.execute(pressed).await?;

        let released = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|e| anyhow!("构造鼠标事件失败: {}", e))?;
        self.page.execute(released).await?;

        Ok(())
    }

    /// 发送 Enter 键（页面级，不依赖焦点元素类型）
    pub async fn press_enter(&self) -> Result<()> {
        self.dispatch_key("Enter", "Enter", 13, Some("\r")).await
    }

    /// 发送 Escape 键（通用的弹窗关闭手段）
    pub async fn press_escape(&self) -> Result<()> {
        self.dispatch_key("Escape", "Escape", 27, None).await
    }

    async fn dispatch_key(
        &self,
        key: &str,
        code: &str,
        key_code: i64,
        text: Option<&str>,
    ) -> Result<()> {
        debug!("发送按键: {}", key);

        let mut down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .code(code)
            .windows_virtual_key_code(key_code)
            .native_virtual_key_code(key_code);
        if let Some(t) = text {
            down = down.text(t);
        }
        self.page
            .execute(down.build().map_err(|e| anyhow!("构造按键事件失败: {}", e))?)
            .await?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .code(code)
            .windows_virtual_key_code(key_code)
            .native_virtual_key_code(key_code)
            .build()
            .map_err(|e| anyhow!("构造按键事件失败: {}", e))?;
        self.page.execute(up).await?;

        Ok(())
    }

    /// 点击选择器对应的第一个元素，不存在则返回 false
    pub async fn click_selector(&self, selector: &str) -> Result<bool> {
        match self.page.find_element(selector).await {
            Ok(element) => {
                element.click().await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// 向选择器对应的输入框原生键入文本，不存在则返回 false
    ///
    /// 点击聚焦后逐键输入，比 JS 赋值更接近真人操作
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<bool> {
        match self.page.find_element(selector).await {
            Ok(element) => {
                element.click().await?;
                element.type_str(text).await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// 直接向文件输入元素注入文件路径（跳过对话框）
    pub async fn set_files_on_selector(&self, selector: &str, file: &Path) -> Result<bool> {
        let element = match self.page.find_element(selector).await {
            Ok(el) => el,
            Err(_) => return Ok(false),
        };

        let mut params = SetFileInputFilesParams::builder()
            .file(file.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow!("构造文件注入参数失败: {}", e))?;
        params.backend_node_id = Some(element.backend_node_id);
        self.page.execute(params).await?;

        Ok(true)
    }

    /// 坐标点击并拦截随之弹出的文件选择对话框
    ///
    /// 对话框在时限内未出现时返回 false，拦截随即解除
    pub async fn click_at_expecting_chooser(
        &self,
        x: f64,
        y: f64,
        file: &Path,
        timeout_ms: u64,
    ) -> Result<bool> {
        self.intercept_chooser(file, timeout_ms, ChooserTrigger::Point { x, y })
            .await
    }

    /// 点击选择器并拦截随之弹出的文件选择对话框
    pub async fn click_selector_expecting_chooser(
        &self,
        selector: &str,
        file: &Path,
        timeout_ms: u64,
    ) -> Result<bool> {
        self.intercept_chooser(
            file,
            timeout_ms,
            ChooserTrigger::Selector(selector.to_string()),
        )
        .await
    }

    async fn intercept_chooser(
        &self,
        file: &Path,
        timeout_ms: u64,
        trigger: ChooserTrigger,
    ) -> Result<bool> {
        // 开启拦截后对话框不再真正弹出，事件里携带目标节点
        self.page
            .execute(SetInterceptFileChooserDialogParams::new(true))
            .await?;

        // 可出错的主体先跑完，拦截无条件解除后才上抛结果；
        // 拦截态绝不允许泄漏到本次调用之外
        let result = self.trigger_and_feed(file, timeout_ms, &trigger).await;
        let disable = self
            .page
            .execute(SetInterceptFileChooserDialogParams::new(false))
            .await;

        let attached = result?;
        disable?;
        Ok(attached)
    }

    async fn trigger_and_feed(
        &self,
        file: &Path,
        timeout_ms: u64,
        trigger: &ChooserTrigger,
    ) -> Result<bool> {
        let mut events = self.page.event_listener::<EventFileChooserOpened>().await?;

        let triggered = match trigger {
            ChooserTrigger::Point { x, y } => {
                self.click_at(*x, *y).await?;
                true
            }
            ChooserTrigger::Selector(selector) => self.click_selector(selector).await?,
        };
        if !triggered {
            debug!("拦截触发元素不存在，放弃本次拦截");
            return Ok(false);
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), events.next()).await {
            Ok(Some(event)) => self.feed_chooser_event(&event, file).await,
            Ok(None) | Err(_) => {
                debug!("文件选择对话框在 {}ms 内未出现", timeout_ms);
                Ok(false)
            }
        }
    }

    async fn feed_chooser_event(
        &self,
        event: &EventFileChooserOpened,
        file: &Path,
    ) -> Result<bool> {
        let backend_node_id = match &event.backend_node_id {
            Some(id) => id.clone(),
            None => {
                warn!("⚠️ 对话框事件缺少目标节点，无法注入文件");
                return Ok(false);
            }
        };

        let mut params = SetFileInputFilesParams::builder()
            .file(file.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow!("构造文件注入参数失败: {}", e))?;
        params.backend_node_id = Some(backend_node_id);
        self.page.execute(params).await?;

        debug!("✓ 已向拦截的对话框注入: {}", file.display());
        Ok(true)
    }
}

/// 对话框拦截的触发方式
enum ChooserTrigger {
    Point { x: f64, y: f64 },
    Selector(String),
}
