//! Chromium session lifecycle and the CDP-backed page driver.
//!
//! chromiumoxide needs its event stream drained for the connection to
//! make progress, so the session owns one background task doing exactly
//! that for its lifetime.

use crate::login::PageDriver;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::path::Path;
use tokio::task::JoinHandle;

/// Fixed viewport the console is rendered at.
const VIEWPORT: (u32, u32) = (1920, 1080);

/// One Chromium process plus the event drain chromiumoxide requires.
pub struct BrowserSession {
    browser: Browser,
    handler_handle: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chromium, headless unless `headed`, with the fixed
    /// viewport.
    pub async fn launch(headed: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .viewport(None);
        if headed {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        // Drain CDP events; the connection stalls without this.
        let handler_handle = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self {
            browser,
            handler_handle,
        })
    }

    /// Open the blank page the flow will drive and hand the whole
    /// session over to it.
    pub async fn open(self) -> Result<CdpPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;
        Ok(CdpPage {
            page,
            session: Some(self),
        })
    }

    async fn shutdown(mut self) {
        self.browser.close().await.ok();
        self.browser.wait().await.ok();
        self.handler_handle.abort();
    }
}

/// `PageDriver` backed by a CDP page.  Owns its `BrowserSession`; the
/// browser process dies with `close`.
pub struct CdpPage {
    page: Page,
    session: Option<BrowserSession>,
}

impl CdpPage {
    async fn eval_bool(&mut self, script: String) -> Result<bool> {
        self.page
            .evaluate(script)
            .await
            .context("script evaluation failed")?
            .into_value()
            .context("script did not return a boolean")
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    async fn wait_until_settled(&mut self) -> Result<()> {
        self.page
            .wait_for_navigation()
            .await
            .context("load did not settle")?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.page
            .url()
            .await
            .context("failed to read page url")?
            .context("page reported no url")
    }

    async fn click_button_with_text(&mut self, label: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const label = {label};
                const button = Array.from(document.querySelectorAll("button"))
                    .find(el => (el.textContent || "").includes(label));
                if (!button) return false;
                button.click();
                return true;
            }})()"#,
            label = serde_json::to_string(label)?,
        );
        self.eval_bool(script).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("focus failed: {selector}"))?;
        element
            .type_str(value)
            .await
            .with_context(|| format!("typing into {selector} failed"))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("click failed: {selector}"))?;
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?,
        );
        self.eval_bool(script).await
    }

    async fn body_text_contains(&mut self, needle: &str) -> Result<bool> {
        let script = format!(
            "((document.body && document.body.innerText) || \"\").includes({})",
            serde_json::to_string(needle)?,
        );
        self.eval_bool(script).await
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        let params = chromiumoxide::page::ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let bytes = self
            .page
            .screenshot(params)
            .await
            .context("screenshot capture failed")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        Ok(())
    }
}
