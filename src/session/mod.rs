//! Browser session management.
//!
//! The crawl core drives a stateful, rate-limited rendering session it does
//! not implement itself: everything upstream depends only on the
//! [`PageSession`] and [`SessionManager`] traits. Sessions are exclusively
//! owned by one task at a time, never repaired in place - a failed session
//! is torn down and replaced wholesale.

mod chrome;

pub use chrome::ChromeSessionManager;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CrawlSettings;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser driver error: {0}")]
    Driver(String),
    #[error("element vanished: {0}")]
    ElementVanished(String),
    #[error("element went stale: {0}")]
    Stale(String),
    #[error("session unavailable: {0}")]
    Unavailable(String),
}

impl SessionError {
    /// Whether discarding and recreating the session is the right recovery.
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Driver(_) | Self::Unavailable(_))
    }
}

/// Rendering-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Page navigation timeout.
    pub nav_timeout: Duration,
    /// Default bounded wait for element visibility/presence.
    pub element_wait: Duration,
    /// Pause applied after a missed wait before proceeding anyway.
    pub wait_fallback: Duration,
    /// Run the browser headless.
    pub headless: bool,
    /// Additional browser arguments.
    pub chrome_args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
            element_wait: Duration::from_secs(5),
            wait_fallback: Duration::from_millis(500),
            headless: true,
            chrome_args: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn from_crawl(crawl: &CrawlSettings) -> Self {
        Self {
            nav_timeout: crawl.nav_timeout(),
            element_wait: crawl.element_wait(),
            wait_fallback: crawl.wait_fallback(),
            ..Default::default()
        }
    }
}

/// One live rendering session.
///
/// A session serves one navigation at a time; all operations are strictly
/// sequential within the owning task.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to a URL, waiting for the page load within the configured
    /// timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Re-load the current page.
    async fn refresh(&mut self) -> Result<(), SessionError>;

    /// Wait until an element matching `css` is visible. Returns `false` if
    /// the wait timed out; the caller proceeds with whatever is rendered -
    /// a missed wait is never an error.
    async fn wait_visible(&mut self, css: &str, timeout: Duration) -> bool;

    /// Like [`wait_visible`](PageSession::wait_visible) but only requires
    /// the element to exist in the DOM.
    async fn wait_present(&mut self, css: &str, timeout: Duration) -> bool;

    /// Current page HTML.
    async fn html(&mut self) -> Result<String, SessionError>;

    /// Scroll the window to the bottom of the document.
    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;

    /// Click the first element matching `css`.
    ///
    /// `ElementVanished` means the trigger no longer exists (the normal
    /// termination signal for show-more loops); `Stale` means the element
    /// was re-rendered between locate and click and the click is worth
    /// retrying within the same cycle.
    async fn click(&mut self, css: &str) -> Result<(), SessionError>;

    /// URL of the last successful navigation.
    fn current_url(&self) -> Option<&str>;

    /// Best-effort teardown. Must never fail the caller.
    async fn close(&mut self) {}
}

/// Creates and tears down rendering sessions.
///
/// No two logical tasks may share a session; managers hand out a fresh one
/// per `acquire` and never reuse a released session.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn PageSession>, SessionError>;

    /// Tear a session down unconditionally. Teardown failures are swallowed;
    /// release must never abort the caller.
    async fn release(&self, mut session: Box<dyn PageSession>) {
        session.close().await;
    }
}

/// Scoped session ownership for one crawl task.
///
/// Couples a manager with its live session so every exit path releases the
/// session, and `restart` (release-then-acquire) is available to the retry
/// layer.
pub struct ManagedSession {
    manager: Arc<dyn SessionManager>,
    inner: Option<Box<dyn PageSession>>,
}

impl ManagedSession {
    /// Acquire a fresh session from the manager.
    pub async fn open(manager: Arc<dyn SessionManager>) -> Result<Self, SessionError> {
        let inner = manager.acquire().await?;
        Ok(Self {
            manager,
            inner: Some(inner),
        })
    }

    /// The live session.
    ///
    /// Only unavailable when a preceding restart failed, in which case the
    /// caller sees the restart error first.
    pub fn page(&mut self) -> Result<&mut (dyn PageSession + 'static), SessionError> {
        self.inner
            .as_deref_mut()
            .ok_or_else(|| SessionError::Unavailable("session was not re-acquired".into()))
    }

    /// Discard the current session and acquire a fresh one.
    pub async fn restart(&mut self) -> Result<(), SessionError> {
        if let Some(old) = self.inner.take() {
            self.manager.release(old).await;
        }
        self.inner = Some(self.manager.acquire().await?);
        Ok(())
    }

    /// Release the session. Always succeeds.
    pub async fn close(mut self) {
        if let Some(session) = self.inner.take() {
            self.manager.release(session).await;
        }
    }
}
