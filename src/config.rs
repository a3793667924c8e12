//! Run settings handed to the scraper core.
//!
//! Values come from [`Settings::default`], optionally a TOML file, and
//! finally command-line overrides applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result, API_BASE_URL, DEFAULT_OUTPUT_DIR, DEFAULT_TERM, USER_AGENT};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// API root, without a trailing slash.
    pub base_url: String,
    pub term: u32,
    /// Minimum gap between the end of one request and the start of the next.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Extra attempts after the first one for transient failures.
    pub max_retries: u32,
    pub output_dir: PathBuf,
    pub fetch_pdfs: bool,
    pub fetch_statements: bool,
    /// Restrict the run to one proceeding number.
    pub proceeding: Option<u32>,
    /// Re-download artifacts that already exist on disk.
    pub force: bool,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_owned(),
            term: DEFAULT_TERM,
            request_delay_ms: 1000,
            request_timeout_secs: 30,
            max_retries: 3,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fetch_pdfs: true,
            fetch_statements: false,
            proceeding: None,
            force: false,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
