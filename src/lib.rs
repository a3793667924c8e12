//! Sejm transcript scraper.
//!
//! Walks terms, proceedings and sitting days exposed by the Sejm API and
//! mirrors the day PDFs (and optionally per-statement HTML) onto disk,
//! skipping anything already present.

mod error;
mod macros;
mod model;
mod parse;
mod storage;

pub mod config;
pub mod process;
pub mod request;
pub mod stats;
pub mod walk;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{Error, Result, TransportError};
pub use process::Scraper;
pub use stats::{RunStatistics, Summary};

pub const API_BASE_URL: &str = "https://api.sejm.gov.pl/sejm";
pub const DEFAULT_TERM: u32 = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "stenogramy_sejm";
pub const USER_AGENT: &str = concat!("sejm-scrap/", env!("CARGO_PKG_VERSION"));

/// Proceeding metadata file, one per proceeding directory.
pub const PROCEEDING_INFO_FILE: &str = "info_posiedzenia.json";
/// Statement list metadata file, one per day directory.
pub const STATEMENT_LIST_FILE: &str = "info_wypowiedzi.json";
