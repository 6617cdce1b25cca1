//! Chromium-backed session manager (CDP via chromiumoxide).

#[cfg(feature = "browser")]
use std::time::{Duration, Instant};

#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

use super::SessionConfig;
#[cfg(feature = "browser")]
use super::{PageSession, SessionError, SessionManager};

/// Launches one headless Chromium per session.
///
/// Every `acquire` starts a fresh browser process; `release` tears the whole
/// process down. Nothing is pooled or reused - a restart after a fault gets
/// a clean slate.
pub struct ChromeSessionManager {
    config: SessionConfig,
}

impl ChromeSessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
impl ChromeSessionManager {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    /// Find a Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf, SessionError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        // Check if in PATH via `which`
        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(SessionError::Unavailable(
            "Chrome/Chromium not found; install chromium or google-chrome".to_string(),
        ))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionManager for ChromeSessionManager {
    async fn acquire(&self) -> Result<Box<dyn PageSession>, SessionError> {
        let chrome_path = Self::find_chrome()?;

        info!("Launching browser (headless={})", self.config.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SessionError::Driver(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SessionError::Driver(format!("browser launch: {e}")))?;

        // Drain CDP events until the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Driver(format!("new page: {e}")))?;

        Ok(Box::new(ChromeSession {
            config: self.config.clone(),
            browser,
            page,
            handler_task,
            last_url: None,
        }))
    }
}

/// One live Chromium page.
#[cfg(feature = "browser")]
struct ChromeSession {
    config: SessionConfig,
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    last_url: Option<String>,
}

#[cfg(feature = "browser")]
impl ChromeSession {
    /// Build a JS expression with the selector embedded as a string literal.
    fn selector_js(css: &str, body: &str) -> String {
        let literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            "(function() {{ const el = document.querySelector({literal}); {body} }})()"
        )
    }

    async fn eval_bool(&self, js: String) -> Result<bool, SessionError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| Self::classify(&e.to_string()))?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    /// Map CDP error text onto the session error taxonomy. A destroyed
    /// execution context means the page re-rendered under us (stale), not
    /// that the driver died.
    fn classify(message: &str) -> SessionError {
        if message.contains("context") || message.contains("Context") {
            SessionError::Stale(message.to_string())
        } else {
            SessionError::Driver(message.to_string())
        }
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration, visible: bool) -> bool {
        let probe = if visible {
            Self::selector_js(
                css,
                "return !!(el && (el.offsetParent !== null || el.getClientRects().length > 0));",
            )
        } else {
            Self::selector_js(css, "return !!el;")
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(true) = self.eval_bool(probe.clone()).await {
                return true;
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // Missed waits fall back to a short settle pause; the caller works
        // with whatever is rendered.
        warn!("element wait missed for {css}, proceeding after fallback pause");
        tokio::time::sleep(self.config.wait_fallback).await;
        false
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| SessionError::Driver(format!("invalid URL: {e}")))?;

        match tokio::time::timeout(self.config.nav_timeout, self.page.execute(nav_params)).await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(SessionError::Driver(format!("navigation: {e}"))),
            Err(_) => return Err(SessionError::Timeout(self.config.nav_timeout)),
        }

        // Wait for the document to become interactive; uses readyState
        // instead of a fixed sleep.
        let ready_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;
        match tokio::time::timeout(
            self.config.nav_timeout,
            self.page.evaluate(ready_script.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => {
                // Script execution failed - might be a non-HTML page.
                debug!("Could not check ready state: {}", e);
            }
            Err(_) => return Err(SessionError::Timeout(self.config.nav_timeout)),
        }

        self.last_url = Some(url.to_string());
        // Brief settle pause for late-loading scripts.
        tokio::time::sleep(self.config.wait_fallback).await;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), SessionError> {
        let url = self
            .last_url
            .clone()
            .ok_or_else(|| SessionError::Unavailable("nothing to refresh".into()))?;
        self.navigate(&url).await
    }

    async fn wait_visible(&mut self, css: &str, timeout: Duration) -> bool {
        self.wait_for(css, timeout, true).await
    }

    async fn wait_present(&mut self, css: &str, timeout: Duration) -> bool {
        self.wait_for(css, timeout, false).await
    }

    async fn html(&mut self) -> Result<String, SessionError> {
        self.page
            .content()
            .await
            .map_err(|e| SessionError::Driver(format!("page content: {e}")))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);".to_string())
            .await
            .map_err(|e| Self::classify(&e.to_string()))?;
        Ok(())
    }

    async fn click(&mut self, css: &str) -> Result<(), SessionError> {
        let js = Self::selector_js(
            css,
            r#"if (!el) return "missing";
               el.scrollIntoView({ block: "center" });
               el.click();
               return "clicked";"#,
        );
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| Self::classify(&e.to_string()))?;
        match result.into_value::<String>().as_deref() {
            Ok("clicked") => Ok(()),
            Ok(_) => Err(SessionError::ElementVanished(css.to_string())),
            Err(e) => Err(SessionError::Driver(format!("click result: {e}"))),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close failed (ignored): {e}");
        }
        self.handler_task.abort();
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::SessionManager for ChromeSessionManager {
    async fn acquire(
        &self,
    ) -> Result<Box<dyn super::PageSession>, super::SessionError> {
        let _ = &self.config;
        Err(super::SessionError::Unavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
