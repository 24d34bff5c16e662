//! Multi-course run: traverse every configured course slug in order.

use std::time::{Duration, Instant};

use kaprogress_shared::{CourseReport, TraversalConfig, VisitFailure, course_url};
use tracing::{error, info, instrument};

use crate::page::CoursePage;
use crate::traversal::CourseTraversal;

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Reports of courses that traversed, in slug order.
    pub reports: Vec<CourseReport>,
    /// Courses that failed: (slug, reason).
    pub failed: Vec<(String, String)>,
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a course page is loaded.
    fn course_started(&self, slug: &str, current: usize, total: usize);
    /// Called before each unit visit.
    fn unit_started(&self, url: &str, current: usize, total: usize);
    /// Called when a unit visit failed and the unit is left out.
    fn unit_skipped(&self, url: &str, failure: &VisitFailure);
    /// Called as soon as a course report is complete.
    fn course_finished(&self, report: &CourseReport);
    /// Called when a whole course is skipped.
    fn course_failed(&self, slug: &str, reason: &str);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn course_started(&self, _slug: &str, _current: usize, _total: usize) {}
    fn unit_started(&self, _url: &str, _current: usize, _total: usize) {}
    fn unit_skipped(&self, _url: &str, _failure: &VisitFailure) {}
    fn course_finished(&self, _report: &CourseReport) {}
    fn course_failed(&self, _slug: &str, _reason: &str) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Traverse every course in `config.courses`, one after another.
///
/// A course that fails (bad slug, navigation fault, missing title, no
/// units) is logged and skipped; the run always continues to the next one.
#[instrument(skip_all, fields(courses = config.courses.len()))]
pub async fn track_courses<P: CoursePage + ?Sized>(
    page: &P,
    config: &TraversalConfig,
    progress: &dyn ProgressReporter,
) -> RunSummary {
    let start = Instant::now();
    let traversal = CourseTraversal::new(page, config.navigation_timeout);
    let total = config.courses.len();
    let mut summary = RunSummary::default();

    for (i, slug) in config.courses.iter().enumerate() {
        progress.course_started(slug, i + 1, total);
        info!(slug = %slug, "traversing course");

        let outcome = match course_url(&config.base_url, slug) {
            Ok(url) => traversal
                .traverse(slug, url.as_str(), progress)
                .await
                .map_err(|failure| failure.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(report) => {
                progress.course_finished(&report);
                summary.reports.push(report);
            }
            Err(reason) => {
                error!(slug = %slug, error = %reason, "error traversing course");
                progress.course_failed(slug, &reason);
                summary.failed.push((slug.clone(), reason));
            }
        }
    }

    summary.elapsed = start.elapsed();
    info!(
        succeeded = summary.reports.len(),
        failed = summary.failed.len(),
        elapsed_ms = summary.elapsed.as_millis(),
        "run completed"
    );
    progress.done(&summary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, FakeRoute, item, progress_response};
    use std::sync::Mutex;

    const BASE: &str = "https://www.khanacademy.org";

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().expect("events lock").push(event);
        }
    }

    impl ProgressReporter for Recorder {
        fn course_started(&self, slug: &str, current: usize, total: usize) {
            self.push(format!("start {slug} {current}/{total}"));
        }
        fn unit_started(&self, _url: &str, _current: usize, _total: usize) {}
        fn unit_skipped(&self, url: &str, _failure: &VisitFailure) {
            self.push(format!("skip {url}"));
        }
        fn course_finished(&self, report: &CourseReport) {
            self.push(format!("finish {}", report.title));
        }
        fn course_failed(&self, slug: &str, _reason: &str) {
            self.push(format!("fail {slug}"));
        }
        fn done(&self, summary: &RunSummary) {
            self.push(format!("done {}", summary.reports.len()));
        }
    }

    fn config(courses: &[&str]) -> TraversalConfig {
        TraversalConfig {
            base_url: BASE.into(),
            navigation_timeout: Duration::from_millis(200),
            courses: courses.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn failed_course_does_not_stop_the_run() {
        let unit = format!("{BASE}/math/geometry/x1");
        let page = FakePage::new()
            .with_route(
                &format!("{BASE}/math/empty"),
                FakeRoute::new().title("Empty"),
            )
            .with_route(
                &format!("{BASE}/math/geometry"),
                FakeRoute::new().title("Geometry").links(&[unit.as_str()]),
            )
            .with_route(
                &unit,
                FakeRoute::new()
                    .title("Angles")
                    .respond(progress_response(&[item("Article", "COMPLETE")])),
            );
        let recorder = Recorder::default();

        let summary = track_courses(
            &page,
            &config(&["/math/missing", "/math/empty", "  ", "math/geometry"]),
            &recorder,
        )
        .await;

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].title, "Geometry");
        assert_eq!(summary.reports[0].slug, "math/geometry");
        let failed: Vec<&str> = summary.failed.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(failed, ["/math/missing", "/math/empty", "  "]);
        assert!(summary.failed[1].1.contains("no units found"));

        let events = recorder.events.lock().expect("events lock").clone();
        assert_eq!(events.first().map(String::as_str), Some("start /math/missing 1/4"));
        assert!(events.contains(&"finish Geometry".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done 1"));
    }

    #[tokio::test]
    async fn empty_course_list_is_an_empty_run() {
        let page = FakePage::new();
        let summary = track_courses(&page, &config(&[]), &SilentProgress).await;
        assert!(summary.reports.is_empty());
        assert!(summary.failed.is_empty());
        assert!(page.visits().is_empty());
    }
}
