//! Course traversal: discover a course's units and visit each in order.

use std::time::Duration;

use chrono::Utc;
use kaprogress_shared::{CourseFailure, CourseReport};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::page::{CoursePage, TITLE_HEADING, UNIT_HEADER};
use crate::run::ProgressReporter;
use crate::visitor::UnitVisitor;

/// Walks one course page and its units on a shared page.
pub struct CourseTraversal<'p, P: CoursePage + ?Sized> {
    page: &'p P,
    navigation_timeout: Duration,
}

impl<'p, P: CoursePage + ?Sized> CourseTraversal<'p, P> {
    pub fn new(page: &'p P, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }

    /// Traverse the course at `course_url`.
    ///
    /// A unit whose visit fails is logged and left out of the report; it
    /// never stops the remaining units.
    #[instrument(skip_all, fields(slug = slug, url = course_url))]
    pub async fn traverse(
        &self,
        slug: &str,
        course_url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<CourseReport, CourseFailure> {
        let discovered = timeout(self.navigation_timeout, self.discover(course_url)).await;
        let (title, unit_urls) = match discovered {
            Ok(discovered) => discovered?,
            Err(_) => return Err(CourseFailure::Timeout),
        };

        info!(course = %title, units = unit_urls.len(), "fetching progress for course");

        let visitor = UnitVisitor::new(self.page, self.navigation_timeout);
        let total = unit_urls.len();
        let mut units = Vec::with_capacity(total);
        let mut skipped_units = 0;

        for (i, unit_url) in unit_urls.iter().enumerate() {
            progress.unit_started(unit_url, i + 1, total);
            match visitor.visit(&title, unit_url).await {
                Ok(snapshot) => units.push(snapshot),
                Err(failure) => {
                    warn!(url = %unit_url, error = %failure, "skipping unit");
                    progress.unit_skipped(unit_url, &failure);
                    skipped_units += 1;
                }
            }
        }

        Ok(CourseReport {
            slug: slug.to_string(),
            title,
            units,
            skipped_units,
            generated_at: Utc::now(),
        })
    }

    /// Load the course page and read its title and unit links.
    async fn discover(&self, course_url: &str) -> Result<(String, Vec<String>), CourseFailure> {
        self.page.goto(course_url).await?;

        let title = self
            .page
            .text(TITLE_HEADING)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or(CourseFailure::CourseNotFound)?;

        let unit_urls = self.page.links(UNIT_HEADER).await?;
        if unit_urls.is_empty() {
            return Err(CourseFailure::NoUnitsFound);
        }

        Ok((title, unit_urls))
    }
}
