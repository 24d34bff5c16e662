//! Browser session: launch Chromium, seed consent cookies, log in.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

use kaprogress_shared::{AppConfig, KaProgressError, Result};

use crate::credentials::Credentials;
use crate::page::{ChromePage, browser_err};

/// Cookie-banner consent state, pre-seeded so the banner never covers the page.
const CONSENT_COOKIES: &[(&str, &str)] = &[
    ("OptanonAlertBoxClosed", "1"),
    (
        "OptanonConsent",
        "isIABGlobal=false&datestamp=2025-01-01T00:00:00.000Z",
    ),
];

/// Launch settings resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub network_idle: Duration,
    pub base_url: Url,
    pub login_path: String,
}

impl SessionSettings {
    /// `headless` overrides `[defaults].headless` when given.
    pub fn from_config(config: &AppConfig, headless: Option<bool>) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url).map_err(|e| {
            KaProgressError::config(format!("invalid base_url '{}': {e}", config.site.base_url))
        })?;

        Ok(Self {
            headless: headless.unwrap_or(config.defaults.headless),
            executable: config.browser.executable.clone(),
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
            network_idle: Duration::from_millis(config.browser.network_idle_ms),
            base_url,
            login_path: config.site.login_path.clone(),
        })
    }

    pub fn login_url(&self) -> Result<Url> {
        self.base_url.join(&self.login_path).map_err(|e| {
            KaProgressError::config(format!("invalid login_path '{}': {e}", self.login_path))
        })
    }
}

/// Consent cookies scoped to the registrable domain of `base`.
pub fn consent_cookies(base: &Url) -> Result<Vec<CookieParam>> {
    let host = base
        .host_str()
        .ok_or_else(|| KaProgressError::config(format!("base URL '{base}' has no host")))?;
    let domain = format!(".{}", host.strip_prefix("www.").unwrap_or(host));

    CONSENT_COOKIES
        .iter()
        .map(|(name, value)| {
            CookieParam::builder()
                .name(*name)
                .value(*value)
                .domain(domain.clone())
                .path("/")
                .url(base.as_str())
                .build()
                .map_err(KaProgressError::Browser)
        })
        .collect()
}

/// A running browser with a single tab.
pub struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    page: ChromePage,
    settings: SessionSettings,
}

impl Session {
    /// Launch Chromium, open a blank tab and seed the consent cookies.
    #[instrument(skip_all, fields(headless = settings.headless))]
    pub async fn launch(settings: SessionSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder().request_timeout(settings.navigation_timeout);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &settings.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(KaProgressError::Browser)?;

        let (mut browser, mut events) = Browser::launch(config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event");
                }
            }
        });

        let opened = async {
            let page = browser.new_page("about:blank").await.map_err(browser_err)?;
            page.set_cookies(consent_cookies(&settings.base_url)?)
                .await
                .map_err(browser_err)?;
            ChromePage::attach(page, settings.network_idle).await
        }
        .await;

        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                if let Err(close) = browser.close().await {
                    debug!(error = %close, "closing browser after failed start");
                }
                handler.abort();
                return Err(e);
            }
        };

        info!("browser session started");
        Ok(Self {
            browser,
            handler,
            page,
            settings,
        })
    }

    /// Submit the login form, bounded by the navigation deadline.
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let url = self.settings.login_url()?;
        match timeout(
            self.settings.navigation_timeout,
            self.page.login(&url, credentials),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(KaProgressError::Browser(format!(
                "login did not settle within {}s",
                self.settings.navigation_timeout.as_secs()
            ))),
        }
    }

    pub fn page(&self) -> &ChromePage {
        &self.page
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close command failed");
        }
        self.browser
            .wait()
            .await
            .map_err(|e| KaProgressError::Browser(format!("waiting for browser exit: {e}")))?;
        self.handler.abort();
        debug!("browser session closed");
        Ok(())
    }
}
