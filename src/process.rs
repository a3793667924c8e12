use chrono::{Local, NaiveDate};

use crate::model::{Proceeding, ProceedingRecord, Statement, StatementList, TranscriptDay};
use crate::parse::statement_document;
use crate::request::{ApiClient, Clock, FetchOutcome, HttpTransport, TokioClock, Transport};
use crate::stats::{OutcomeKind, RunStatistics, UnitKind};
use crate::storage::{path_for, Artifact, Storage};
use crate::walk::{is_future, list_proceedings, list_terms, select, with_dates};
use crate::{info_time, Error, Result, Settings};

/// Drives one scraping run over a single term.
///
/// Work is strictly sequential: proceedings in listing order, days in
/// declared order, statements in list order. A failure is recorded against
/// the unit it happened in and the run moves on.
pub struct Scraper<T, C = TokioClock> {
    api: ApiClient<T, C>,
    storage: Storage,
    settings: Settings,
    as_of: NaiveDate,
    stats: RunStatistics,
}

impl Scraper<HttpTransport, TokioClock> {
    /// Scraper talking to the real API, with today as the run date.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let api = ApiClient::from_settings(&settings)?;
        Ok(Self::new(api, settings, Local::now().date_naive()))
    }
}

impl<T: Transport, C: Clock> Scraper<T, C> {
    pub fn new(api: ApiClient<T, C>, settings: Settings, as_of: NaiveDate) -> Self {
        Self {
            storage: Storage::new(&settings.output_dir),
            api,
            settings,
            as_of,
            stats: RunStatistics::default(),
        }
    }

    pub async fn run(mut self) -> RunStatistics {
        let start_time = Local::now();
        let term = self.settings.term;
        info_time!("Started scraping term {} into {}", term, self.storage.root().display());

        self.log_term().await;

        let proceedings = match list_proceedings(&mut self.api, term).await {
            FetchOutcome::Fetched(list) => list,
            FetchOutcome::NotYetAvailable => {
                log::warn!("term {term} has no proceedings listed");
                return self.stats;
            }
            FetchOutcome::TransientError(e) | FetchOutcome::FatalError(e) => {
                log::error!("could not list proceedings of term {term}: {e}");
                self.stats.record_error();
                return self.stats;
            }
        };

        let available: Vec<u32> = proceedings.iter().map(|p| p.number).collect();
        let selected = select(proceedings, self.settings.proceeding);
        if let (Some(number), true) = (self.settings.proceeding, selected.is_empty()) {
            log::error!("proceeding {number} not found in term {term}, available: {available:?}");
            self.stats.record_error();
        }
        log::info!("{} proceedings to consider", selected.len());

        for proceeding in selected {
            let proceeding = with_dates(&mut self.api, term, proceeding).await;
            if is_future(&proceeding, self.as_of) {
                log::info!(
                    "skipping future proceeding {} (dates: {:?})",
                    proceeding.number,
                    proceeding.dates
                );
                self.stats.record_future_skip();
                continue;
            }
            self.process_proceeding(&proceeding).await;
            self.stats.record_processed();
        }

        info_time!(
            start_time,
            "Finished term {} after {} requests",
            term,
            self.api.requests()
        );
        self.stats
    }

    async fn log_term(&mut self) {
        let term = self.settings.term;
        match list_terms(&mut self.api).await {
            FetchOutcome::Fetched(terms) => match terms.iter().find(|t| t.num == term) {
                Some(t) => log::info!(
                    "term {}: {} - {}",
                    t.num,
                    t.from,
                    t.to.map_or_else(|| "ongoing".to_owned(), |d| d.to_string())
                ),
                None => log::warn!("term {term} is not among the listed terms"),
            },
            FetchOutcome::NotYetAvailable => log::warn!("no terms listed"),
            FetchOutcome::TransientError(e) | FetchOutcome::FatalError(e) => {
                log::warn!("could not list terms: {e}");
            }
        }
    }

    async fn process_proceeding(&mut self, proceeding: &Proceeding) {
        let term = self.settings.term;
        log::info!(
            "Processing proceeding {} ({} days)",
            proceeding.number,
            proceeding.dates.len()
        );

        // Metadata first, so an interrupted run still leaves it behind.
        self.write_proceeding_info(proceeding);

        for day in proceeding.days(term) {
            if day.date > self.as_of {
                log::info!("{day} has not taken place yet");
                if self.settings.fetch_pdfs {
                    self.stats.record(OutcomeKind::NotYetAvailable, UnitKind::Pdf);
                }
                if self.settings.fetch_statements {
                    self.stats
                        .record(OutcomeKind::NotYetAvailable, UnitKind::StatementList);
                }
                continue;
            }
            if self.settings.fetch_pdfs {
                self.fetch_pdf(proceeding, &day).await;
            }
            if self.settings.fetch_statements {
                self.fetch_statements(proceeding, &day).await;
            }
        }
    }

    fn write_proceeding_info(&mut self, proceeding: &Proceeding) {
        let rel = path_for(self.settings.term, proceeding, Artifact::ProceedingInfo);
        let record = ProceedingRecord {
            term: self.settings.term,
            proceeding: proceeding.clone(),
        };
        let res = serde_json::to_vec_pretty(&record)
            .map_err(Error::from)
            .and_then(|json| self.storage.write(&rel, &json));
        let kind = match res {
            Ok(_) => OutcomeKind::Fetched,
            Err(e) => {
                log::error!(
                    "storage error writing metadata of proceeding {}: {e}",
                    proceeding.number
                );
                OutcomeKind::FatalError
            }
        };
        self.stats.record(kind, UnitKind::ProceedingInfo);
    }

    async fn fetch_pdf(&mut self, proceeding: &Proceeding, day: &TranscriptDay) {
        let rel = path_for(day.term, proceeding, Artifact::Pdf { date: day.date });
        if !self.settings.force && self.storage.exists(&rel) {
            log::debug!("PDF for {day} already present");
            self.stats.record(OutcomeKind::AlreadyPresent, UnitKind::Pdf);
            return;
        }

        let outcome = self
            .api
            .transcript_pdf(day)
            .await
            .and_then(|bytes| persist(&self.storage, &rel, &bytes));
        self.settle(&outcome, UnitKind::Pdf, day, None);
    }

    async fn fetch_statements(&mut self, proceeding: &Proceeding, day: &TranscriptDay) {
        let Some(list) = self.statement_list(proceeding, day).await else {
            return;
        };
        log::info!("{day}: {} statements", list.statements.len());
        for statement in &list.statements {
            self.fetch_statement(proceeding, day, statement).await;
        }
    }

    /// The day's statement list, from disk when already saved.
    async fn statement_list(
        &mut self,
        proceeding: &Proceeding,
        day: &TranscriptDay,
    ) -> Option<StatementList> {
        let rel = path_for(day.term, proceeding, Artifact::StatementList { date: day.date });
        if !self.settings.force && self.storage.exists(&rel) {
            let cached = self
                .storage
                .read(&rel)
                .and_then(|raw| Ok(serde_json::from_slice::<StatementList>(&raw)?));
            match cached {
                Ok(list) => {
                    self.stats
                        .record(OutcomeKind::AlreadyPresent, UnitKind::StatementList);
                    return Some(list);
                }
                Err(e) => log::warn!("saved statement list for {day} is unreadable, refetching: {e}"),
            }
        }

        let list = match self.api.statement_list(day).await {
            // An empty list is what the API serves before the transcript is
            // published; saving it would hide the real list on later runs.
            FetchOutcome::Fetched(list) if list.statements.is_empty() => {
                FetchOutcome::NotYetAvailable
            }
            FetchOutcome::Fetched(list) => {
                let written = serde_json::to_vec_pretty(&list)
                    .map_err(Error::from)
                    .and_then(|json| self.storage.write(&rel, &json));
                if let Err(e) = written {
                    self.report(UnitKind::StatementList, day, None, "storage error", &e);
                    self.stats
                        .record(OutcomeKind::FatalError, UnitKind::StatementList);
                    return Some(list);
                }
                FetchOutcome::Fetched(list)
            }
            other => other,
        };
        self.settle(&list, UnitKind::StatementList, day, None);
        match list {
            FetchOutcome::Fetched(list) => Some(list),
            _ => None,
        }
    }

    async fn fetch_statement(
        &mut self,
        proceeding: &Proceeding,
        day: &TranscriptDay,
        statement: &Statement,
    ) {
        let rel = path_for(
            day.term,
            proceeding,
            Artifact::Statement {
                date: day.date,
                num: statement.num,
                speaker: &statement.name,
            },
        );
        if !self.settings.force && self.storage.exists(&rel) {
            self.stats
                .record(OutcomeKind::AlreadyPresent, UnitKind::Statement);
            return;
        }

        let outcome = match self.api.statement_html(day, statement.num).await {
            FetchOutcome::Fetched(fragment) => {
                match statement_document(statement, day, fragment).await {
                    Ok(doc) => persist(&self.storage, &rel, doc.as_bytes()),
                    Err(e) => FetchOutcome::FatalError(e),
                }
            }
            other => other.and_then(|_| FetchOutcome::NotYetAvailable),
        };
        self.settle(&outcome, UnitKind::Statement, day, Some(statement.num));
    }

    /// Logs and counts the final outcome of a unit.
    fn settle<V>(
        &mut self,
        outcome: &FetchOutcome<V>,
        unit: UnitKind,
        day: &TranscriptDay,
        num: Option<u32>,
    ) {
        match outcome {
            FetchOutcome::Fetched(_) => log::debug!("{unit:?} for {day} saved"),
            FetchOutcome::NotYetAvailable => {
                log::info!("{unit:?} for {day} is not available yet");
            }
            FetchOutcome::TransientError(e) => self.report(unit, day, num, "transient error", e),
            FetchOutcome::FatalError(e) => {
                let kind = if matches!(e, Error::Storage { .. }) {
                    "storage error"
                } else {
                    "fatal error"
                };
                self.report(unit, day, num, kind, e);
            }
        }
        self.stats.record(OutcomeKind::from(outcome), unit);
    }

    fn report(&self, unit: UnitKind, day: &TranscriptDay, num: Option<u32>, kind: &str, e: &Error) {
        match num {
            Some(num) => log::error!("{kind}: {unit:?} #{num} of {day}: {e}"),
            None => log::error!("{kind}: {unit:?} of {day}: {e}"),
        }
    }
}

fn persist(storage: &Storage, rel: &std::path::Path, content: &[u8]) -> FetchOutcome<()> {
    match storage.write(rel, content) {
        Ok(path) => {
            log::info!("saved {}", path.display());
            FetchOutcome::Fetched(())
        }
        Err(e) => FetchOutcome::FatalError(e),
    }
}
