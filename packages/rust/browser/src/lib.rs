//! Browser session bootstrap for ka-progress.
//!
//! This crate provides:
//! - [`Session`]: launches Chromium, injects consent cookies, logs in
//! - [`ChromePage`]: the CDP-backed [`kaprogress_core::CoursePage`]
//! - [`locate`]: `data-testid` locators over rendered HTML

pub mod credentials;
pub mod locate;
pub mod page;
pub mod session;

pub use credentials::Credentials;
pub use page::ChromePage;
pub use session::{Session, SessionSettings, consent_cookies};
