//! CDP driver backed by chromiumoxide.

use super::{ElementHandle, ElementState, PageDriver, Screenshot};
use crate::browser::BrowserConfig;
use crate::locator::{js_str, Selector};
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Result of hit-testing an element before a native click
#[derive(Debug, Deserialize)]
struct HitTest {
    state: String,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct AttributeValue {
    value: Option<String>,
}

/// Page driver with a real CDP connection
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: CdpBrowser,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
    closed: bool,
}

impl ChromiumDriver {
    /// Launch a browser and open one blank page
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched
    pub async fn launch(config: &BrowserConfig) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(config.window_width, config.window_height)
            .request_timeout(config.request_timeout);

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }

        for arg in config.launch_args() {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        debug!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            page,
            handle,
            closed: false,
        })
    }

    fn ensure_open(&self) -> ProbeResult<()> {
        if self.closed {
            Err(ProbeError::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn eval_raw(&self, expr: &str) -> ProbeResult<serde_json::Value> {
        self.ensure_open()?;
        let params = EvaluateParams::builder()
            .expression(expr)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(ProbeError::script)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn eval<T: DeserializeOwned>(&self, expr: &str) -> ProbeResult<T> {
        let value = self.eval_raw(expr).await?;
        serde_json::from_value(value).map_err(|e| ProbeError::script(e.to_string()))
    }

    /// Evaluate `body` with `el` bound to the handle's element; `null` when stale
    async fn eval_on<T: DeserializeOwned>(
        &self,
        handle: &ElementHandle,
        body: &str,
    ) -> ProbeResult<T> {
        let expr = format!(
            "(() => {{ const el = {}; if (!el) return null; {body} }})()",
            handle.selector.to_nth_query(handle.index)
        );
        let value: Option<T> = self.eval(&expr).await?;
        value.ok_or_else(|| stale(handle))
    }
}

fn stale(handle: &ElementHandle) -> ProbeError {
    ProbeError::StaleElement {
        selector: handle.selector.to_string(),
        index: handle.index,
    }
}

const VISIBILITY_JS: &str = "const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
     const visible = r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
     const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';";

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.ensure_open()?;
        debug!(url, "navigate");
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn back(&mut self) -> ProbeResult<()> {
        debug!("history back");
        self.eval_raw("history.back()").await.map(|_| ())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        self.ensure_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> ProbeResult<String> {
        self.ensure_open()?;
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn ready_state(&self) -> ProbeResult<String> {
        self.eval("document.readyState").await
    }

    async fn find_all(&self, selector: &Selector) -> ProbeResult<Vec<ElementHandle>> {
        let count: usize = self.eval(&selector.to_count_query()).await?;
        Ok((0..count)
            .map(|i| ElementHandle::new(selector.clone(), i))
            .collect())
    }

    async fn element_state(&self, handle: &ElementHandle) -> ProbeResult<ElementState> {
        self.eval_on(
            handle,
            &format!("{VISIBILITY_JS} return {{ visible, enabled }};"),
        )
        .await
    }

    async fn click(&self, handle: &ElementHandle) -> ProbeResult<()> {
        let hit: HitTest = self
            .eval_on(
                handle,
                &format!(
                    "el.scrollIntoView({{ block: 'center', inline: 'center' }}); {VISIBILITY_JS} \
                     if (!visible) return {{ state: 'hidden' }}; \
                     if (!enabled) return {{ state: 'disabled' }}; \
                     const x = r.left + r.width / 2; const y = r.top + r.height / 2; \
                     const top = document.elementFromPoint(x, y); \
                     if (top && top !== el && !el.contains(top) && !top.contains(el)) \
                       return {{ state: 'intercepted', tag: top.tagName.toLowerCase() }}; \
                     return {{ state: 'ok', x, y }};"
                ),
            )
            .await?;

        match hit.state.as_str() {
            "ok" => {
                debug!(%handle, x = hit.x, y = hit.y, "native click");
                self.page
                    .click(Point::new(hit.x, hit.y))
                    .await
                    .map_err(|e| ProbeError::script(e.to_string()))?;
                Ok(())
            }
            "intercepted" => Err(ProbeError::ClickIntercepted {
                selector: handle.selector.to_string(),
                obstructed_by: hit.tag,
            }),
            other => Err(ProbeError::NotInteractable {
                selector: handle.selector.to_string(),
                reason: format!("element is {other}"),
            }),
        }
    }

    async fn script_click(&self, handle: &ElementHandle) -> ProbeResult<()> {
        debug!(%handle, "scripted click");
        self.eval_on::<bool>(handle, "el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> ProbeResult<()> {
        self.eval_on::<bool>(
            handle,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); return true;",
        )
        .await
        .map(|_| ())
    }

    async fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> ProbeResult<()> {
        let ready: bool = self
            .eval_on(
                handle,
                &format!(
                    "{VISIBILITY_JS} if (!visible || !enabled) return false; \
                     el.focus(); \
                     const proto = Object.getPrototypeOf(el); \
                     const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
                     if (desc && desc.set) desc.set.call(el, ''); else el.value = ''; \
                     el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                     return true;"
                ),
            )
            .await?;
        if !ready {
            return Err(ProbeError::NotInteractable {
                selector: handle.selector.to_string(),
                reason: "input cannot receive text".to_string(),
            });
        }
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(())
    }

    async fn text(&self, handle: &ElementHandle) -> ProbeResult<String> {
        self.eval_on(
            handle,
            "return (el.innerText || el.textContent || '').trim();",
        )
        .await
    }

    async fn attribute(&self, handle: &ElementHandle, name: &str) -> ProbeResult<Option<String>> {
        let attr: AttributeValue = self
            .eval_on(
                handle,
                &format!("return {{ value: el.getAttribute({}) }};", js_str(name)),
            )
            .await?;
        Ok(attr.value)
    }

    async fn execute_script(&self, script: &str) -> ProbeResult<serde_json::Value> {
        self.eval_raw(script).await
    }

    async fn body_text(&self) -> ProbeResult<String> {
        self.eval("document.body ? document.body.innerText : ''")
            .await
    }

    async fn screenshot(&self) -> ProbeResult<Screenshot> {
        self.ensure_open()?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .build();

        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })?;

        use base64::Engine;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })?;
        Ok(Screenshot::new(data))
    }

    async fn window_count(&self) -> ProbeResult<usize> {
        self.ensure_open()?;
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(pages.len())
    }

    async fn close_extra_windows(&mut self) -> ProbeResult<usize> {
        self.ensure_open()?;
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        let main = self.page.target_id().clone();
        let mut closed = 0;
        for page in pages {
            if page.target_id() != &main {
                page.close()
                    .await
                    .map_err(|e| ProbeError::script(e.to_string()))?;
                closed += 1;
            }
        }
        debug!(closed, "closed extra windows");
        Ok(closed)
    }

    async fn quit(&mut self) -> ProbeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.browser.close().await;
        self.handle.abort();
        result.map_err(|e| ProbeError::BrowserLaunch {
            message: format!("close failed: {e}"),
        })?;
        debug!("browser closed");
        Ok(())
    }
}
