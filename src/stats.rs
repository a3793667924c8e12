use std::fmt;

use crate::request::FetchOutcome;

/// Final outcome of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    AlreadyPresent,
    Fetched,
    NotYetAvailable,
    TransientError,
    FatalError,
}

impl OutcomeKind {
    pub fn is_error(self) -> bool {
        matches!(self, Self::TransientError | Self::FatalError)
    }
}

impl<T> From<&FetchOutcome<T>> for OutcomeKind {
    fn from(outcome: &FetchOutcome<T>) -> Self {
        match outcome {
            FetchOutcome::Fetched(_) => Self::Fetched,
            FetchOutcome::NotYetAvailable => Self::NotYetAvailable,
            FetchOutcome::TransientError(_) => Self::TransientError,
            FetchOutcome::FatalError(_) => Self::FatalError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    ProceedingInfo,
    Pdf,
    StatementList,
    Statement,
}

/// Counters for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub proceedings_processed: u64,
    pub future_proceedings_skipped: u64,
    pub pdfs_downloaded: u64,
    pub pdfs_already_present: u64,
    pub statements_saved: u64,
    pub statements_already_present: u64,
    pub not_yet_available: u64,
    pub errors: u64,
}

impl RunStatistics {
    /// Counts the final outcome of a unit. Call once per unit, after retries.
    pub fn record(&mut self, outcome: OutcomeKind, unit: UnitKind) {
        match (outcome, unit) {
            (OutcomeKind::Fetched, UnitKind::Pdf) => self.pdfs_downloaded += 1,
            (OutcomeKind::Fetched, UnitKind::Statement) => self.statements_saved += 1,
            (OutcomeKind::AlreadyPresent, UnitKind::Pdf) => self.pdfs_already_present += 1,
            (OutcomeKind::AlreadyPresent, UnitKind::Statement) => {
                self.statements_already_present += 1;
            }
            (OutcomeKind::NotYetAvailable, _) => self.not_yet_available += 1,
            (OutcomeKind::TransientError | OutcomeKind::FatalError, _) => self.errors += 1,
            // Metadata files are bookkeeping, not downloads.
            (
                OutcomeKind::Fetched | OutcomeKind::AlreadyPresent,
                UnitKind::ProceedingInfo | UnitKind::StatementList,
            ) => {}
        }
    }

    pub fn record_processed(&mut self) {
        self.proceedings_processed += 1;
    }

    pub fn record_future_skip(&mut self) {
        self.future_proceedings_skipped += 1;
    }

    /// An error outside any single unit, e.g. a failed listing.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn summary(&self) -> Summary {
        Summary {
            entries: vec![
                ("Proceedings processed", self.proceedings_processed),
                ("Future proceedings skipped", self.future_proceedings_skipped),
                ("PDFs downloaded", self.pdfs_downloaded),
                ("PDFs already present", self.pdfs_already_present),
                ("Statements saved", self.statements_saved),
                ("Statements already present", self.statements_already_present),
                ("Not yet available", self.not_yet_available),
                ("Errors", self.errors),
            ],
            has_errors: self.has_errors(),
        }
    }
}

/// Ordered, printable view of [`RunStatistics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub entries: Vec<(&'static str, u64)>,
    pub has_errors: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (label, value) in &self.entries {
            writeln!(f, "{label:<width$} : {value}")?;
        }
        Ok(())
    }
}
