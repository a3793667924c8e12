//! On-disk layout of downloaded transcripts.
//!
//! ```text
//! {root}/kadencja_10/
//!     posiedzenie_001_2023-11-13/
//!         info_posiedzenia.json
//!         transkrypt_k10_p001_2023-11-13.pdf
//!         wypowiedzi_2023-11-13/
//!             info_wypowiedzi.json
//!             007_Szymon_Holownia.html
//! ```
//!
//! The files themselves are the dedup index: a non-empty file at the
//! canonical path counts as fetched. Writes go through a temporary file in
//! the same directory and are renamed into place, so a canonical path never
//! holds a partial artifact.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use crate::model::Proceeding;
use crate::parse::safe_filename;
use crate::{Error, Result, PROCEEDING_INFO_FILE, STATEMENT_LIST_FILE};

/// One file kind inside a proceeding directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact<'a> {
    ProceedingInfo,
    Pdf {
        date: NaiveDate,
    },
    StatementList {
        date: NaiveDate,
    },
    Statement {
        date: NaiveDate,
        num: u32,
        speaker: &'a str,
    },
}

pub fn term_dir(term: u32) -> PathBuf {
    PathBuf::from(format!("kadencja_{term:02}"))
}

pub fn proceeding_dir(term: u32, proceeding: &Proceeding) -> PathBuf {
    let name = match proceeding.first_date() {
        Some(first) => format!("posiedzenie_{:03}_{first}", proceeding.number),
        None => format!("posiedzenie_{:03}", proceeding.number),
    };
    term_dir(term).join(name)
}

fn statements_dir(date: NaiveDate) -> String {
    format!("wypowiedzi_{date}")
}

/// Canonical path of an artifact, relative to the output root.
pub fn path_for(term: u32, proceeding: &Proceeding, artifact: Artifact<'_>) -> PathBuf {
    let dir = proceeding_dir(term, proceeding);
    match artifact {
        Artifact::ProceedingInfo => dir.join(PROCEEDING_INFO_FILE),
        Artifact::Pdf { date } => dir.join(format!(
            "transkrypt_k{term:02}_p{:03}_{date}.pdf",
            proceeding.number
        )),
        Artifact::StatementList { date } => dir.join(statements_dir(date)).join(STATEMENT_LIST_FILE),
        Artifact::Statement { date, num, speaker } => dir
            .join(statements_dir(date))
            .join(format!("{num:03}_{}.html", safe_filename(speaker))),
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }

    /// `true` if a non-empty file sits at `rel`.
    pub fn exists(&self, rel: &Path) -> bool {
        fs::metadata(self.resolve(rel))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    pub fn read(&self, rel: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(rel);
        fs::read(&path).map_err(|source| Error::Storage { path, source })
    }

    /// Writes `content` to `rel`, creating missing directories. Returns the
    /// absolute path written.
    pub fn write(&self, rel: &Path, content: &[u8]) -> Result<PathBuf> {
        self.write_with(rel, |file| file.write_all(content))
    }

    fn write_with(
        &self,
        rel: &Path,
        fill: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<PathBuf> {
        let target = self.resolve(rel);
        let storage_err = |source| Error::Storage {
            path: target.clone(),
            source,
        };
        let parent = target
            .parent()
            .ok_or_else(|| storage_err(io::Error::other("no parent directory")))?;
        fs::create_dir_all(parent).map_err(storage_err)?;

        // Dropping the temp file on any early return removes it.
        let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
        fill(tmp.as_file_mut()).map_err(storage_err)?;
        tmp.as_file().sync_all().map_err(storage_err)?;
        tmp.persist(&target).map_err(|e| storage_err(e.error))?;

        log::debug!("wrote {}", target.display());
        Ok(target)
    }
}
