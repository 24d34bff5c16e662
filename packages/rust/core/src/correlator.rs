//! Response correlation: capture progress responses for one page visit.
//!
//! A [`ResponseCorrelator`] subscribes to a page's response bus when armed and
//! unsubscribes exactly once, either through [`ResponseCorrelator::disarm`] or
//! when dropped. Dropping covers every other exit path: early `?` returns,
//! panics, and a visit future cancelled by its timeout. A listener that
//! outlived its visit would attribute the next unit's responses to this one.

use std::sync::{Arc, Mutex, PoisonError};

use kaprogress_shared::ProgressPayload;
use tracing::{debug, warn};

use crate::page::{CoursePage, ListenerId, ResponseBus, SharedResponse};

/// Path fragment of the internal progress/mastery query.
pub const PROGRESS_ENDPOINT: &str = "/api/internal/graphql/getUserInfoForTopicProgressMastery";

/// Whether a request URL targets the progress/mastery query.
pub fn is_progress_endpoint(url: &str) -> bool {
    url.contains(PROGRESS_ENDPOINT)
}

type Buffer = Arc<Mutex<Vec<SharedResponse>>>;

/// Parsed payloads from one drain, with what was discarded.
#[derive(Debug, Default)]
pub struct Drained {
    /// Successfully parsed payloads, in receipt order.
    pub payloads: Vec<ProgressPayload>,
    /// Responses that matched the endpoint.
    pub matched: usize,
    /// Matched responses whose body was unreadable or not valid JSON.
    pub skipped: usize,
}

/// Scoped capture of matching background responses on one page.
pub struct ResponseCorrelator<'p> {
    bus: &'p ResponseBus,
    listener: Option<ListenerId>,
    buffer: Buffer,
}

impl<'p> ResponseCorrelator<'p> {
    /// Start buffering every response on `page` whose request URL satisfies `matches`.
    pub fn arm_for<P, F>(page: &'p P, matches: F) -> Self
    where
        P: CoursePage + ?Sized,
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let bus = page.responses();
        let buffer: Buffer = Arc::default();

        let sink = buffer.clone();
        let listener = bus.subscribe(move |response| {
            if matches(response.request_url()) {
                debug!(url = response.request_url(), "captured progress response");
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(response.clone());
            }
        });

        Self {
            bus,
            listener: Some(listener),
            buffer,
        }
    }

    /// Arm with the fixed progress endpoint predicate.
    pub fn arm_for_progress<P: CoursePage + ?Sized>(page: &'p P) -> Self {
        Self::arm_for(page, is_progress_endpoint)
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock_buffer().len()
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        self.listener.is_some()
    }

    /// Take everything buffered so far and parse each body.
    ///
    /// Capture continues while armed; a later drain returns only what
    /// arrived since. A body that cannot be read or parsed is skipped with a
    /// warning and does not abort the batch.
    pub async fn drain(&self) -> Drained {
        let responses = std::mem::take(&mut *self.lock_buffer());
        let mut drained = Drained {
            matched: responses.len(),
            ..Default::default()
        };

        for response in responses {
            let url = response.request_url();
            let body = match response.body().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url, error = %e, "failed to read progress response");
                    drained.skipped += 1;
                    continue;
                }
            };

            match ProgressPayload::from_json(&body) {
                Ok(payload) => drained.payloads.push(payload),
                Err(e) => {
                    warn!(url, error = %e, "failed to parse progress response");
                    drained.skipped += 1;
                }
            }
        }

        drained
    }

    /// Stop capturing and discard anything not yet drained.
    pub fn disarm(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.listener.take() {
            self.bus.unsubscribe(id);
            let discarded = std::mem::take(&mut *self.lock_buffer()).len();
            debug!(discarded, "response correlator disarmed");
        }
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, Vec<SharedResponse>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResponseCorrelator<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, FakeResponse, item, progress_body, progress_url};

    #[test]
    fn endpoint_predicate() {
        assert!(is_progress_endpoint(
            "https://www.khanacademy.org/api/internal/graphql/getUserInfoForTopicProgressMastery?hash=1"
        ));
        assert!(!is_progress_endpoint(
            "https://www.khanacademy.org/api/internal/graphql/getFullUserProfile"
        ));
    }

    #[tokio::test]
    async fn buffers_only_matching_responses() {
        let page = FakePage::new();
        let correlator = ResponseCorrelator::arm_for_progress(&page);

        page.emit(FakeResponse::shared(
            "https://www.khanacademy.org/api/internal/graphql/somethingElse",
            "{}",
        ));
        page.emit(FakeResponse::shared(
            &progress_url(),
            &progress_body(&[item("Video", "COMPLETE")]),
        ));
        assert_eq!(correlator.pending(), 1);

        let drained = correlator.drain().await;
        assert_eq!(drained.matched, 1);
        assert_eq!(drained.payloads.len(), 1);
        assert_eq!(drained.payloads[0].items().len(), 1);
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn unparsable_bodies_are_skipped_not_fatal() {
        let page = FakePage::new();
        let correlator = ResponseCorrelator::arm_for_progress(&page);

        page.emit(FakeResponse::shared(&progress_url(), "<html>oops</html>"));
        page.emit(FakeResponse::unreadable(&progress_url()));
        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));

        let drained = correlator.drain().await;
        assert_eq!(drained.matched, 3);
        assert_eq!(drained.skipped, 2);
        assert_eq!(drained.payloads.len(), 1);
    }

    #[tokio::test]
    async fn responses_after_settle_are_kept_until_disarm() {
        let page = FakePage::new();
        let correlator = ResponseCorrelator::arm_for_progress(&page);

        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));
        let first = correlator.drain().await;
        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));
        let second = correlator.drain().await;

        assert_eq!(first.matched, 1);
        assert_eq!(second.matched, 1);
    }

    #[test]
    fn disarm_unsubscribes_once() {
        let page = FakePage::new();
        let correlator = ResponseCorrelator::arm_for_progress(&page);
        assert_eq!(page.responses().listener_count(), 1);
        assert!(correlator.is_armed());

        correlator.disarm();
        assert_eq!(page.responses().listener_count(), 0);
    }

    #[test]
    fn drop_unsubscribes() {
        let page = FakePage::new();
        {
            let _correlator = ResponseCorrelator::arm_for_progress(&page);
            assert_eq!(page.responses().listener_count(), 1);
        }
        assert_eq!(page.responses().listener_count(), 0);
    }

    #[test]
    fn panic_while_armed_still_unsubscribes() {
        let page = FakePage::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _correlator = ResponseCorrelator::arm_for_progress(&page);
            panic!("visit blew up");
        }));
        assert!(result.is_err());
        assert_eq!(page.responses().listener_count(), 0);
    }

    #[tokio::test]
    async fn consecutive_correlators_do_not_share_responses() {
        let page = FakePage::new();

        let first = ResponseCorrelator::arm_for_progress(&page);
        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));
        first.disarm();

        // Arrives after the first visit ended: must be seen by nobody.
        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));

        let second = ResponseCorrelator::arm_for_progress(&page);
        page.emit(FakeResponse::shared(&progress_url(), &progress_body(&[])));
        assert_eq!(second.drain().await.matched, 1);
    }
}
