//! Login credentials.

use std::fmt;

use kaprogress_shared::{CredentialsConfig, KaProgressError, Result};

/// Email/username and password for the login form.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    /// Both parts are required; surrounding whitespace is dropped.
    pub fn new(identifier: impl AsRef<str>, password: impl AsRef<str>) -> Result<Self> {
        let identifier = identifier.as_ref().trim();
        let password = password.as_ref().trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(KaProgressError::credentials(
                "identifier and password are required",
            ));
        }
        Ok(Self {
            identifier: identifier.to_string(),
            password: password.to_string(),
        })
    }

    /// Read whichever parts are set (and non-empty) in the configured env vars.
    pub fn from_env(config: &CredentialsConfig) -> (Option<String>, Option<String>) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        (read(&config.identifier_env), read(&config.password_env))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}
