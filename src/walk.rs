//! Enumeration of terms and proceedings.
//!
//! Listing data is read fresh from the API on every run. Everything here is
//! either a single listing call or a pure function over its result.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::{Proceeding, Term};
use crate::request::{ApiClient, Clock, FetchOutcome, Transport};

/// All terms, most recent first.
pub async fn list_terms<T: Transport, C: Clock>(
    api: &mut ApiClient<T, C>,
) -> FetchOutcome<Vec<Term>> {
    api.terms().await.and_then(|mut terms| {
        terms.sort_by(|a, b| b.num.cmp(&a.num));
        FetchOutcome::Fetched(terms)
    })
}

/// Proceedings of a term, cleaned with [`unique_proceedings`].
pub async fn list_proceedings<T: Transport, C: Clock>(
    api: &mut ApiClient<T, C>,
    term: u32,
) -> FetchOutcome<Vec<Proceeding>> {
    api.proceedings(term)
        .await
        .and_then(|list| FetchOutcome::Fetched(unique_proceedings(list)))
}

/// Drops unnumbered placeholder entries and repeated numbers (first one
/// wins), then sorts by number.
pub fn unique_proceedings(proceedings: Vec<Proceeding>) -> Vec<Proceeding> {
    let mut seen = HashSet::new();
    let mut unique: Vec<_> = proceedings
        .into_iter()
        .filter(|p| {
            if p.number == 0 {
                log::warn!("skipping proceeding without a number: {:?}", p.title);
                return false;
            }
            if !seen.insert(p.number) {
                log::debug!("skipping duplicate proceeding {}", p.number);
                return false;
            }
            true
        })
        .collect();
    unique.sort_by_key(|p| p.number);
    unique
}

/// A proceeding is in the future only if it has dates and every one of them
/// is strictly after `as_of`.
pub fn is_future(proceeding: &Proceeding, as_of: NaiveDate) -> bool {
    !proceeding.dates.is_empty() && proceeding.dates.iter().all(|d| *d > as_of)
}

/// Keeps only proceeding `only`, when given.
pub fn select(proceedings: Vec<Proceeding>, only: Option<u32>) -> Vec<Proceeding> {
    match only {
        Some(number) => proceedings
            .into_iter()
            .filter(|p| p.number == number)
            .collect(),
        None => proceedings,
    }
}

/// Fills in dates from the detail endpoint when the listing entry has none.
/// Falls back to the listing entry if the lookup fails.
pub async fn with_dates<T: Transport, C: Clock>(
    api: &mut ApiClient<T, C>,
    term: u32,
    proceeding: Proceeding,
) -> Proceeding {
    if !proceeding.dates.is_empty() {
        return proceeding;
    }
    match api.proceeding(term, proceeding.number).await {
        FetchOutcome::Fetched(detail) if detail.number == proceeding.number => detail,
        FetchOutcome::Fetched(_) | FetchOutcome::NotYetAvailable => proceeding,
        FetchOutcome::TransientError(e) | FetchOutcome::FatalError(e) => {
            log::warn!(
                "could not fetch details of proceeding {}: {e}",
                proceeding.number
            );
            proceeding
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProceedingSummary {
    pub number: u32,
    pub title: String,
    pub dates: Vec<NaiveDate>,
    pub current: bool,
    pub is_future: bool,
}

pub async fn proceedings_summary<T: Transport, C: Clock>(
    api: &mut ApiClient<T, C>,
    term: u32,
    as_of: NaiveDate,
) -> FetchOutcome<Vec<ProceedingSummary>> {
    list_proceedings(api, term).await.and_then(|list| {
        FetchOutcome::Fetched(
            list.into_iter()
                .map(|p| ProceedingSummary {
                    is_future: is_future(&p, as_of),
                    number: p.number,
                    title: p.title,
                    dates: p.dates,
                    current: p.current,
                })
                .collect(),
        )
    })
}
