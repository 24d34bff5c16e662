//! Unit visits: load one unit page and turn its captured progress into a snapshot.

use std::time::Duration;

use kaprogress_shared::{UnitSnapshot, VisitFailure};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::accumulator::UnitProgress;
use crate::correlator::ResponseCorrelator;
use crate::page::{CoursePage, TITLE_HEADING};

/// Visits unit pages one at a time on a shared page.
pub struct UnitVisitor<'p, P: CoursePage + ?Sized> {
    page: &'p P,
    navigation_timeout: Duration,
}

impl<'p, P: CoursePage + ?Sized> UnitVisitor<'p, P> {
    pub fn new(page: &'p P, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }

    /// Visit `unit_url` and count its content items.
    ///
    /// The correlator is armed before navigation starts so responses fired
    /// during load are captured, and is released on every return path.
    #[instrument(skip_all, fields(url = unit_url))]
    pub async fn visit(
        &self,
        course_title: &str,
        unit_url: &str,
    ) -> Result<UnitSnapshot, VisitFailure> {
        let correlator = ResponseCorrelator::arm_for_progress(self.page);

        let title = match timeout(self.navigation_timeout, self.load(unit_url)).await {
            Ok(loaded) => loaded?,
            Err(_) => {
                debug!(timeout_ms = self.navigation_timeout.as_millis(), "unit navigation timed out");
                return Err(VisitFailure::Timeout);
            }
        };

        let drained = correlator.drain().await;
        correlator.disarm();

        if drained.matched == 0 {
            warn!(unit = %title, "no progress responses captured");
            return Err(VisitFailure::NoData);
        }
        if drained.payloads.is_empty() {
            warn!(unit = %title, skipped = drained.skipped, "no progress response was readable");
            return Err(VisitFailure::NoData);
        }

        let mut progress = UnitProgress::new();
        let unknown: usize = drained
            .payloads
            .iter()
            .map(|payload| progress.fold_payload(payload))
            .sum();

        let snapshot = progress.into_snapshot(course_title, title);
        info!(
            unit = %snapshot.unit_title,
            payloads = drained.payloads.len(),
            unknown,
            done = snapshot.is_done(),
            "unit progress fetched"
        );
        Ok(snapshot)
    }

    /// Navigate and read the unit heading.
    async fn load(&self, unit_url: &str) -> Result<String, VisitFailure> {
        self.page.goto(unit_url).await?;
        self.page
            .text(TITLE_HEADING)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VisitFailure::Navigation(format!("unit title not found ({TITLE_HEADING})")))
    }
}
