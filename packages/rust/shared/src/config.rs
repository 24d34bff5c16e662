//! Application configuration for ka-progress.
//!
//! User config lives at `~/.kaprogress/kaprogress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KaProgressError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "kaprogress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".kaprogress";

/// Built-in math curriculum course slugs, traversed when none are given.
pub const DEFAULT_COURSES: &[&str] = &[
    "/math/cc-2nd-grade-math",
    "/math/cc-third-grade-math",
    "/math/cc-fourth-grade-math",
    "/math/cc-fifth-grade-math",
    "/math/cc-sixth-grade-math",
    "/math/cc-seventh-grade-math",
    "/math/cc-eighth-grade-math",
];

// ---------------------------------------------------------------------------
// Config structs (matching kaprogress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Target site.
    #[serde(default)]
    pub site: SiteConfig,

    /// Browser session settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Where login credentials come from.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Run the browser without a window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Course slugs to traverse, in order.
    #[serde(default = "default_courses")]
    pub courses: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            headless: true,
            courses: default_courses(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_courses() -> Vec<String> {
    DEFAULT_COURSES.iter().map(|s| s.to_string()).collect()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Origin that course slugs are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the login form.
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.khanacademy.org".into()
}
fn default_login_path() -> String {
    "/login".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Deadline for a single navigation to settle.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Quiet period with no requests in flight before a page counts as settled.
    #[serde(default = "default_network_idle")]
    pub network_idle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            navigation_timeout_secs: default_navigation_timeout(),
            network_idle_ms: default_network_idle(),
        }
    }
}

fn default_navigation_timeout() -> u64 {
    60
}
fn default_network_idle() -> u64 {
    500
}

/// `[credentials]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Name of the env var holding the login email or username.
    #[serde(default = "default_identifier_env")]
    pub identifier_env: String,

    /// Name of the env var holding the password (never store the password itself).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            identifier_env: default_identifier_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_identifier_env() -> String {
    "KA_PROGRESS_IDENTIFIER".into()
}
fn default_password_env() -> String {
    "KA_PROGRESS_PASSWORD".into()
}

// ---------------------------------------------------------------------------
// Traversal config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime traversal configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Origin that course slugs are joined onto.
    pub base_url: String,
    /// Deadline for each navigation (course page or unit page).
    pub navigation_timeout: Duration,
    /// Course slugs, traversed sequentially in this order.
    pub courses: Vec<String>,
}

impl From<&AppConfig> for TraversalConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.site.base_url.clone(),
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
            courses: config.defaults.courses.clone(),
        }
    }
}

/// Resolve a path-like course slug against the site origin.
pub fn course_url(base_url: &str, slug: &str) -> Result<Url> {
    let base = Url::parse(base_url)
        .map_err(|e| KaProgressError::validation(format!("invalid base URL '{base_url}': {e}")))?;

    let slug = slug.trim();
    if slug.is_empty() {
        return Err(KaProgressError::validation("empty course slug"));
    }
    if slug.contains("://") || slug.starts_with("//") || slug.starts_with("\\\\") {
        return Err(KaProgressError::validation(format!(
            "course slug '{slug}' must be a path, not a URL"
        )));
    }

    let path = if slug.starts_with('/') {
        slug.to_string()
    } else {
        format!("/{slug}")
    };

    let url = base
        .join(&path)
        .map_err(|e| KaProgressError::validation(format!("invalid course slug '{slug}': {e}")))?;

    // The logged-in session must never be sent to another origin.
    if url.origin() != base.origin() {
        return Err(KaProgressError::validation(format!(
            "course slug '{slug}' resolves outside {base_url}"
        )));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.kaprogress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| KaProgressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.kaprogress/kaprogress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KaProgressError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| KaProgressError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| KaProgressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| KaProgressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| KaProgressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
