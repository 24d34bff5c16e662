//! Scripted in-memory page for exercising the engine without a browser.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kaprogress_shared::{ContentItemProgress, ContentRef, PageError};

use crate::correlator::PROGRESS_ENDPOINT;
use crate::page::{
    CoursePage, InterceptedResponse, Locator, ResponseBus, SharedResponse, TITLE_HEADING,
    UNIT_HEADER,
};

pub(crate) const BASE: &str = "https://www.khanacademy.org";

pub(crate) fn progress_url() -> String {
    format!("{BASE}{PROGRESS_ENDPOINT}?fastly_cacheable=persist_until_publish")
}

/// One item record with both meaningful fields set.
pub(crate) fn item(typename: &str, completion_status: &str) -> ContentItemProgress {
    ContentItemProgress {
        completion_status: Some(completion_status.to_string()),
        content: Some(ContentRef {
            typename: Some(typename.to_string()),
        }),
    }
}

pub(crate) fn progress_body(items: &[ContentItemProgress]) -> String {
    serde_json::json!({
        "data": { "user": { "contentItemProgresses": items } }
    })
    .to_string()
}

pub(crate) fn progress_response(items: &[ContentItemProgress]) -> SharedResponse {
    FakeResponse::shared(&progress_url(), &progress_body(items))
}

pub(crate) struct FakeResponse {
    url: String,
    body: Option<String>,
}

impl FakeResponse {
    pub(crate) fn shared(url: &str, body: &str) -> SharedResponse {
        Arc::new(Self {
            url: url.to_string(),
            body: Some(body.to_string()),
        })
    }

    /// A response whose body the browser can no longer provide.
    pub(crate) fn unreadable(url: &str) -> SharedResponse {
        Arc::new(Self {
            url: url.to_string(),
            body: None,
        })
    }
}

#[async_trait]
impl InterceptedResponse for FakeResponse {
    fn request_url(&self) -> &str {
        &self.url
    }

    async fn body(&self) -> Result<String, PageError> {
        self.body
            .clone()
            .ok_or_else(|| PageError::Body("no resource with given identifier".into()))
    }
}

/// How a scripted navigation ends.
#[derive(Clone, Default)]
pub(crate) enum Navigation {
    #[default]
    Settle,
    /// Never settles; the caller's deadline must fire.
    Hang,
    Fail(String),
}

#[derive(Clone, Default)]
pub(crate) struct FakeRoute {
    title: Option<String>,
    links: Vec<String>,
    during_load: Vec<SharedResponse>,
    navigation: Navigation,
}

impl FakeRoute {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub(crate) fn links(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Response published while this page loads.
    pub(crate) fn respond(mut self, response: SharedResponse) -> Self {
        self.during_load.push(response);
        self
    }

    pub(crate) fn navigation(mut self, navigation: Navigation) -> Self {
        self.navigation = navigation;
        self
    }
}

#[derive(Default)]
pub(crate) struct FakePage {
    bus: ResponseBus,
    routes: HashMap<String, FakeRoute>,
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<String>>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_route(mut self, url: &str, route: FakeRoute) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    /// Publish a response outside any navigation.
    pub(crate) fn emit(&self, response: SharedResponse) {
        self.bus.publish(response);
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().expect("visits lock").clone()
    }

    fn current_route(&self) -> Option<FakeRoute> {
        let current = self.current.lock().expect("current lock").clone()?;
        self.routes.get(&current).cloned()
    }
}

#[async_trait]
impl CoursePage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.visits.lock().expect("visits lock").push(url.to_string());
        let route = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| PageError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        *self.current.lock().expect("current lock") = Some(url.to_string());

        for response in &route.during_load {
            self.bus.publish(response.clone());
        }

        match route.navigation {
            Navigation::Settle => Ok(()),
            Navigation::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Navigation::Fail(message) => Err(PageError::Navigation(message)),
        }
    }

    async fn text(&self, locator: Locator) -> Result<Option<String>, PageError> {
        if locator != TITLE_HEADING {
            return Ok(None);
        }
        Ok(self.current_route().and_then(|r| r.title))
    }

    async fn links(&self, locator: Locator) -> Result<Vec<String>, PageError> {
        if locator != UNIT_HEADER {
            return Ok(Vec::new());
        }
        Ok(self.current_route().map(|r| r.links).unwrap_or_default())
    }

    fn responses(&self) -> &ResponseBus {
        &self.bus
    }
}
