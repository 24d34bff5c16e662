//! CDP-backed [`CoursePage`].
//!
//! A background task follows the page's network events: request start/end
//! events drive the quiescence check used after every navigation, and each
//! received response is published on the page's [`ResponseBus`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::error::CdpError;
use futures::{StreamExt, stream};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

use kaprogress_core::{CoursePage, InterceptedResponse, Locator, ResponseBus};
use kaprogress_shared::{KaProgressError, PageError, Result};

use crate::credentials::Credentials;
use crate::locate;

/// How often the quiescence check re-examines in-flight requests.
const IDLE_POLL: Duration = Duration::from_millis(50);

const USERNAME_INPUT: &str = "input[name='username']";
const PASSWORD_INPUT: &str = "input[name='current-password']";
const SUBMIT_BUTTON: &str = "button[type='submit']";

// ---------------------------------------------------------------------------
// Network activity
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct NetworkActivity {
    /// In-flight request id to the URL the request was first sent to.
    in_flight: HashMap<String, String>,
    last_change: Instant,
}

impl NetworkActivity {
    fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            last_change: Instant::now(),
        }
    }

    /// A redirect reuses its request id; the first URL seen is kept.
    fn started(&mut self, id: String, url: String) {
        self.in_flight.entry(id).or_insert(url);
        self.last_change = Instant::now();
    }

    fn ended(&mut self, id: &str) {
        self.in_flight.remove(id);
        self.last_change = Instant::now();
    }

    /// URL a response should be matched on: the originating request's,
    /// falling back to the response's own when the request went unseen.
    fn request_url(&self, id: &str, response_url: String) -> String {
        self.in_flight.get(id).cloned().unwrap_or(response_url)
    }
}

enum NetEvent {
    Started { id: String, url: String },
    Ended(String),
    Response { request_id: RequestId, url: String },
}

// ---------------------------------------------------------------------------
// ChromePage
// ---------------------------------------------------------------------------

/// A Chromium tab driven over CDP.
pub struct ChromePage {
    page: Page,
    bus: Arc<ResponseBus>,
    activity: Arc<Mutex<NetworkActivity>>,
    network_idle: Duration,
    pump: JoinHandle<()>,
}

impl ChromePage {
    /// Start following `page`'s network events.
    pub async fn attach(page: Page, network_idle: Duration) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .map_err(browser_err)?;

        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(browser_err)?
            .map(|e| NetEvent::Started {
                id: e.request_id.inner().clone(),
                url: e.request.url.clone(),
            });
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(browser_err)?
            .map(|e| NetEvent::Ended(e.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(browser_err)?
            .map(|e| NetEvent::Ended(e.request_id.inner().clone()));
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err)?
            .map(|e| NetEvent::Response {
                request_id: e.request_id.clone(),
                url: e.response.url.clone(),
            });

        let mut events = stream::select_all([
            started.boxed(),
            finished.boxed(),
            failed.boxed(),
            responses.boxed(),
        ]);

        let bus = Arc::new(ResponseBus::new());
        let activity = Arc::new(Mutex::new(NetworkActivity::new()));

        let pump = {
            let bus = bus.clone();
            let activity = activity.clone();
            let page = page.clone();
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    match event {
                        NetEvent::Started { id, url } => {
                            lock(&activity).started(id, url);
                        }
                        NetEvent::Ended(id) => {
                            lock(&activity).ended(&id);
                        }
                        NetEvent::Response { request_id, url } => {
                            let url = lock(&activity).request_url(request_id.inner(), url);
                            bus.publish(Arc::new(ChromeResponse {
                                page: page.clone(),
                                request_id,
                                url,
                            }));
                        }
                    }
                }
                debug!("page network event stream ended");
            })
        };

        Ok(Self {
            page,
            bus,
            activity,
            network_idle,
            pump,
        })
    }

    /// Submit the login form and wait for the session to settle.
    #[instrument(skip_all, fields(url = %login_url))]
    pub async fn login(&self, login_url: &Url, credentials: &Credentials) -> Result<()> {
        self.goto(login_url.as_str())
            .await
            .map_err(|e| KaProgressError::Browser(format!("login page: {e}")))?;

        self.fill(USERNAME_INPUT, &credentials.identifier).await?;
        self.fill(PASSWORD_INPUT, &credentials.password).await?;
        self.page
            .find_element(SUBMIT_BUTTON)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?;

        self.mark_activity();
        self.wait_for_network_idle().await;

        let landed = self.page.url().await.map_err(browser_err)?;
        if landed.as_deref().is_some_and(|u| u.contains(login_url.path())) {
            warn!("still on the login page after submitting; progress data may be missing");
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?
            .type_str(value)
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    /// Restart the quiet-period clock.
    fn mark_activity(&self) {
        self.lock_activity().last_change = Instant::now();
    }

    /// Return once no request has been in flight for `network_idle`.
    async fn wait_for_network_idle(&self) {
        loop {
            let quiet_for = {
                let a = self.lock_activity();
                a.in_flight.is_empty().then(|| a.last_change.elapsed())
            };
            match quiet_for {
                Some(quiet) if quiet >= self.network_idle => return,
                _ => tokio::time::sleep(IDLE_POLL).await,
            }
        }
    }

    async fn html(&self) -> std::result::Result<(String, Option<Url>), PageError> {
        let html = self.page.content().await.map_err(navigation_err)?;
        let base = self
            .page
            .url()
            .await
            .map_err(navigation_err)?
            .and_then(|u| Url::parse(&u).ok());
        Ok((html, base))
    }

    fn lock_activity(&self) -> MutexGuard<'_, NetworkActivity> {
        lock(&self.activity)
    }
}

#[async_trait]
impl CoursePage for ChromePage {
    async fn goto(&self, url: &str) -> std::result::Result<(), PageError> {
        debug!(url, "navigating");
        self.mark_activity();
        self.page.goto(url).await.map_err(navigation_err)?;
        self.wait_for_network_idle().await;
        Ok(())
    }

    async fn text(&self, locator: Locator) -> std::result::Result<Option<String>, PageError> {
        let (html, _) = self.html().await?;
        Ok(locate::first_text(&html, locator))
    }

    async fn links(&self, locator: Locator) -> std::result::Result<Vec<String>, PageError> {
        let (html, base) = self.html().await?;
        Ok(locate::links(&html, base.as_ref(), locator))
    }

    fn responses(&self) -> &ResponseBus {
        &self.bus
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A response seen on the page; its body is fetched on demand.
struct ChromeResponse {
    page: Page,
    request_id: RequestId,
    url: String,
}

#[async_trait]
impl InterceptedResponse for ChromeResponse {
    fn request_url(&self) -> &str {
        &self.url
    }

    async fn body(&self) -> std::result::Result<String, PageError> {
        let reply = self
            .page
            .execute(GetResponseBodyParams::new(self.request_id.clone()))
            .await
            .map_err(|e| PageError::Body(e.to_string()))?;

        let body = reply.result;
        if body.base64_encoded {
            return Err(PageError::Body("binary response body".into()));
        }
        Ok(body.body)
    }
}

fn lock(activity: &Mutex<NetworkActivity>) -> MutexGuard<'_, NetworkActivity> {
    activity.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

pub(crate) fn browser_err(err: CdpError) -> KaProgressError {
    KaProgressError::Browser(err.to_string())
}

fn navigation_err(err: CdpError) -> PageError {
    match err {
        CdpError::Timeout => PageError::Timeout,
        other => PageError::Navigation(other.to_string()),
    }
}
