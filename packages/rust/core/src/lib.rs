//! Traversal and aggregation engine for ka-progress.
//!
//! Walks course pages and their units on an authenticated [`page::CoursePage`],
//! captures progress responses per unit visit, and folds them into
//! [`kaprogress_shared::UnitSnapshot`]s:
//! - [`classify`]: item record → (category, completed)
//! - [`accumulator`]: order-independent per-unit counters
//! - [`correlator`]: scoped capture of progress responses for one visit
//! - [`visitor`]: one unit page → snapshot or [`kaprogress_shared::VisitFailure`]
//! - [`traversal`]: one course page → ordered report
//! - [`run`]: every configured course, sequentially

pub mod accumulator;
pub mod classify;
pub mod correlator;
pub mod page;
pub mod run;
pub mod traversal;
pub mod visitor;

#[cfg(test)]
pub(crate) mod test_support;

pub use accumulator::{FoldOutcome, UnitProgress};
pub use classify::{ContentCategory, classify};
pub use correlator::{PROGRESS_ENDPOINT, ResponseCorrelator, is_progress_endpoint};
pub use page::{CoursePage, InterceptedResponse, Locator, ResponseBus, SharedResponse};
pub use run::{ProgressReporter, RunSummary, SilentProgress, track_courses};
pub use traversal::CourseTraversal;
pub use visitor::UnitVisitor;
