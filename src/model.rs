//! Entities returned by the Sejm API.
//!
//! Deserialization is the schema check: a response missing a required
//! field fails here, at the client boundary, and never reaches the
//! orchestration logic.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parliamentary term (kadencja).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub num: u32,
    pub from: NaiveDate,
    /// `None` while the term is still running.
    #[serde(default)]
    pub to: Option<NaiveDate>,
    pub current: bool,
}

/// One sitting (posiedzenie) of the chamber within a term.
///
/// The listing endpoint occasionally returns placeholder entries without a
/// number; those deserialize to `0` and are dropped by the walker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proceeding {
    #[serde(default)]
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    pub current: bool,
}

impl Proceeding {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Sitting days in declared order.
    pub fn days(&self, term: u32) -> impl Iterator<Item = TranscriptDay> + '_ {
        self.dates.iter().map(move |&date| TranscriptDay {
            term,
            proceeding: self.number,
            date,
        })
    }
}

/// Proceeding metadata as persisted next to the transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceedingRecord {
    pub term: u32,
    #[serde(flatten)]
    pub proceeding: Proceeding,
}

/// A single sitting day; one PDF transcript per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptDay {
    pub term: u32,
    pub proceeding: u32,
    pub date: NaiveDate,
}

impl fmt::Display for TranscriptDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "term {} / proceeding {} / {}",
            self.term, self.proceeding, self.date
        )
    }
}

/// One spoken contribution (wypowiedź) within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub num: u32,
    pub name: String,
    #[serde(default)]
    pub function: String,
    #[serde(rename = "memberID", default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<u32>,
    #[serde(default)]
    pub start_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_date_time: Option<NaiveDateTime>,
    /// Submitted in writing, never delivered from the rostrum.
    #[serde(default)]
    pub unspoken: bool,
}

/// Response of the per-day transcripts endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proceeding_num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn term_without_end_date_is_open() {
        let term: Term =
            serde_json::from_value(json!({"num": 10, "from": "2023-11-13", "current": true}))
                .unwrap();
        assert_eq!(term.to, None);
        assert!(term.current);
    }

    #[test]
    fn proceeding_requires_title() {
        let res = serde_json::from_value::<Proceeding>(
            json!({"number": 3, "dates": ["2023-12-05"], "current": false}),
        );
        assert!(res.is_err());
    }

    #[test]
    fn statement_reads_api_field_names() {
        let statement: Statement = serde_json::from_value(json!({
            "num": 7,
            "name": "Szymon Hołownia",
            "function": "Marszałek",
            "memberID": 124,
            "startDateTime": "2023-11-13T12:05:41",
            "endDateTime": "2023-11-13T12:09:00",
            "unspoken": false
        }))
        .unwrap();

        assert_eq!(statement.member_id, Some(124));
        assert_eq!(
            statement.start_date_time.unwrap().to_string(),
            "2023-11-13 12:05:41"
        );
    }

    #[test]
    fn days_follow_declared_order() {
        let p = Proceeding {
            number: 1,
            title: "1. Posiedzenie".into(),
            dates: vec![
                NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
                NaiveDate::from_ymd_opt(2023, 11, 13).unwrap(),
            ],
            current: false,
        };
        let days: Vec<_> = p.days(10).map(|d| d.date.to_string()).collect();
        assert_eq!(days, ["2023-11-14", "2023-11-13"]);
    }
}
