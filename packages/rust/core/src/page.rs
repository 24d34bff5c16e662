//! The navigable page contract consumed by the traversal engine.
//!
//! A page session (real browser or scripted test double) implements
//! [`CoursePage`] and owns a [`ResponseBus`] onto which it publishes every
//! background response it observes. The engine never talks to a browser
//! directly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use kaprogress_shared::PageError;

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

/// A DOM element addressed by tag name and `data-testid` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub tag: &'static str,
    pub test_id: &'static str,
}

impl Locator {
    pub const fn new(tag: &'static str, test_id: &'static str) -> Self {
        Self { tag, test_id }
    }

    /// CSS selector form, e.g. `h1[data-testid="course-unit-title"]`.
    pub fn css(&self) -> String {
        format!(r#"{}[data-testid="{}"]"#, self.tag, self.test_id)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css())
    }
}

/// Heading carrying the course or unit display title (same marker on both pages).
pub const TITLE_HEADING: Locator = Locator::new("h1", "course-unit-title");

/// Anchor linking from a course page to one of its units.
pub const UNIT_HEADER: Locator = Locator::new("a", "unit-header");

// ---------------------------------------------------------------------------
// Background responses
// ---------------------------------------------------------------------------

/// A background network response observed while a page was active.
#[async_trait]
pub trait InterceptedResponse: Send + Sync {
    /// URL of the request that produced this response.
    fn request_url(&self) -> &str;

    /// Raw response body. Fetched lazily; may fail if the browser evicted it.
    async fn body(&self) -> Result<String, PageError>;
}

pub type SharedResponse = Arc<dyn InterceptedResponse>;

type Listener = Arc<dyn Fn(&SharedResponse) + Send + Sync>;

/// Handle returned by [`ResponseBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out of a page's background responses to registered listeners.
///
/// Listeners are invoked synchronously in the publisher's context, in
/// subscription order.
#[derive(Default)]
pub struct ResponseBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ResponseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it receives every response published from now on.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SharedResponse) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver a response to every current listener.
    pub fn publish(&self, response: SharedResponse) {
        // Snapshot so a listener may (un)subscribe without deadlocking.
        let listeners: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&response);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ResponseBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// An authenticated, navigable page.
#[async_trait]
pub trait CoursePage: Send + Sync {
    /// Navigate to `url` and return once network activity has quiesced.
    async fn goto(&self, url: &str) -> Result<(), PageError>;

    /// Trimmed text content of the first element matching `locator`.
    async fn text(&self, locator: Locator) -> Result<Option<String>, PageError>;

    /// Absolute link targets of every element matching `locator`, in document order.
    async fn links(&self, locator: Locator) -> Result<Vec<String>, PageError>;

    /// Stream of background responses observed on this page.
    fn responses(&self) -> &ResponseBus;
}
