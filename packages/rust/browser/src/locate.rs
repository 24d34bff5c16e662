//! `data-testid` locators evaluated over a page's rendered HTML.

use kaprogress_core::Locator;
use scraper::{Html, Selector};
use url::Url;

/// Whitespace-normalized text of the first element matching `locator`.
pub fn first_text(html: &str, locator: Locator) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(&locator.css()).ok()?;

    doc.select(&sel)
        .next()
        .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

/// `href` targets of every element matching `locator`, in document order,
/// resolved against `base` when relative.
pub fn links(html: &str, base: Option<&Url>, locator: Locator) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse(&locator.css()) else {
        return Vec::new();
    };

    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve(base, href))
        .collect()
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaprogress_core::page::{TITLE_HEADING, UNIT_HEADER};

    const COURSE_HTML: &str = r##"<html><body>
        <header><h1>Khan Academy</h1></header>
        <main>
            <h1 data-testid="course-unit-title">
                6th grade   math
            </h1>
            <a data-testid="unit-header" href="/math/cc-sixth-grade-math/cc-6th-ratios-prop-topic">Ratios</a>
            <a href="/math/cc-sixth-grade-math/not-a-unit">Other</a>
            <a data-testid="unit-header" href="https://www.khanacademy.org/math/cc-sixth-grade-math/x0267d782">Arithmetic</a>
            <a data-testid="unit-header" href="#">Placeholder</a>
            <a data-testid="unit-header">No href</a>
        </main>
    </body></html>"##;

    fn base() -> Url {
        Url::parse("https://www.khanacademy.org/math/cc-sixth-grade-math").unwrap()
    }

    #[test]
    fn reads_marked_heading_not_first_h1() {
        assert_eq!(
            first_text(COURSE_HTML, TITLE_HEADING),
            Some("6th grade math".to_string())
        );
    }

    #[test]
    fn missing_or_empty_heading_is_none() {
        assert_eq!(first_text("<html><body><h1>Hi</h1></body></html>", TITLE_HEADING), None);
        assert_eq!(
            first_text(r#"<h1 data-testid="course-unit-title">  </h1>"#, TITLE_HEADING),
            None
        );
    }

    #[test]
    fn unit_links_in_document_order() {
        let links = links(COURSE_HTML, Some(&base()), UNIT_HEADER);
        assert_eq!(
            links,
            [
                "https://www.khanacademy.org/math/cc-sixth-grade-math/cc-6th-ratios-prop-topic",
                "https://www.khanacademy.org/math/cc-sixth-grade-math/x0267d782",
            ]
        );
    }

    #[test]
    fn no_unit_anchors_is_empty() {
        let html = r#"<html><body><a href="/math">Math</a></body></html>"#;
        assert!(links(html, Some(&base()), UNIT_HEADER).is_empty());
    }

    #[test]
    fn relative_links_without_base_are_dropped() {
        let links = links(COURSE_HTML, None, UNIT_HEADER);
        assert_eq!(
            links,
            ["https://www.khanacademy.org/math/cc-sixth-grade-math/x0267d782"]
        );
    }
}
