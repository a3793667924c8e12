use std::sync::Arc;

use scraper::{Html, Selector};
use tokio::task::spawn_blocking;

use crate::model::{Statement, TranscriptDay};
use crate::{Error, Result};

const MAX_NAME_LEN: usize = 50;

/// Wraps a statement fragment returned by the API into a standalone document
/// with the statement's metadata as a header.
pub async fn statement_document(
    statement: &Statement,
    day: &TranscriptDay,
    fragment: String,
) -> Result<String> {
    let fragment = Arc::new(fragment);
    let body = spawn_blocking({
        let fragment = fragment.clone();
        move || fragment_body(&fragment)
    })
    .await??;

    Ok(render(statement, day, &body))
}

/// Inner markup of the fragment's `<body>`, whether the API sent a bare
/// fragment or a full document.
fn fragment_body(fragment: &str) -> Result<String> {
    let doc = Html::parse_document(fragment);
    let body_selector = create_selector("body")?;
    Ok(doc
        .select(&body_selector)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_default()
        .trim()
        .to_owned())
}

fn render(statement: &Statement, day: &TranscriptDay, body: &str) -> String {
    let fmt_time = |t: Option<chrono::NaiveDateTime>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    };
    let name = escape(&statement.name);
    format!(
        r#"<!DOCTYPE html>
<html lang="pl">
<head>
    <meta charset="UTF-8">
    <title>Wypowiedź - {name}</title>
</head>
<body>
    <div class="metadata">
        <p><strong>Mówca:</strong> {name}</p>
        <p><strong>Funkcja:</strong> {function}</p>
        <p><strong>Numer wypowiedzi:</strong> {num}</p>
        <p><strong>Data:</strong> {date}</p>
        <p><strong>Czas rozpoczęcia:</strong> {start}</p>
        <p><strong>Czas zakończenia:</strong> {end}</p>
        <p><strong>Kadencja:</strong> {term}</p>
        <p><strong>Posiedzenie:</strong> {proceeding}</p>{unspoken}
    </div>
    <div class="content">
{body}
    </div>
</body>
</html>
"#,
        function = escape(&statement.function),
        num = statement.num,
        date = day.date,
        start = fmt_time(statement.start_date_time),
        end = fmt_time(statement.end_date_time),
        term = day.term,
        proceeding = day.proceeding,
        unspoken = if statement.unspoken {
            "\n        <p><em>Wypowiedź niewygłoszona</em></p>"
        } else {
            ""
        },
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Turns a speaker name into a file-name component: Polish letters lose
/// their diacritics, anything outside `[A-Za-z0-9_-]` becomes `_`, and the
/// result is capped at 50 characters.
pub fn safe_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(strip_diacritic)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    if safe.is_empty() {
        "nieznany".to_owned()
    } else {
        safe
    }
}

#[inline]
fn strip_diacritic(c: char) -> char {
    match c {
        'ą' => 'a',
        'ć' => 'c',
        'ę' => 'e',
        'ł' => 'l',
        'ń' => 'n',
        'ó' => 'o',
        'ś' => 's',
        'ź' | 'ż' => 'z',
        'Ą' => 'A',
        'Ć' => 'C',
        'Ę' => 'E',
        'Ł' => 'L',
        'Ń' => 'N',
        'Ó' => 'O',
        'Ś' => 'S',
        'Ź' | 'Ż' => 'Z',
        c => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn statement(name: &str, unspoken: bool) -> Statement {
        Statement {
            num: 4,
            name: name.into(),
            function: "Poseł".into(),
            member_id: Some(1),
            start_date_time: "2023-11-13T10:00:00".parse().ok(),
            end_date_time: None,
            unspoken,
        }
    }

    fn day() -> TranscriptDay {
        TranscriptDay {
            term: 10,
            proceeding: 1,
            date: NaiveDate::from_ymd_opt(2023, 11, 13).unwrap(),
        }
    }

    #[test]
    fn polish_names_are_transliterated() {
        assert_eq!(safe_filename("Małgorzata Gośniowska-Kola"), "Malgorzata_Gosniowska-Kola");
        assert_eq!(safe_filename("ŻÓŁW"), "ZOLW");
    }

    #[test]
    fn illegal_path_characters_are_replaced() {
        assert_eq!(safe_filename("a/b\\c:d*e?"), "a_b_c_d_e_");
        assert_eq!(safe_filename("../../etc"), "______etc");
    }

    #[test]
    fn long_and_empty_names() {
        assert_eq!(safe_filename(&"x".repeat(80)).len(), MAX_NAME_LEN);
        assert_eq!(safe_filename(""), "nieznany");
    }

    #[tokio::test]
    async fn document_embeds_fragment_body_and_metadata() {
        let html = statement_document(
            &statement("Jan <Kowalski>", false),
            &day(),
            "<html><body><p>Wysoka Izbo!</p></body></html>".into(),
        )
        .await
        .unwrap();

        assert!(html.contains("<p>Wysoka Izbo!</p>"));
        assert!(html.contains("Jan &lt;Kowalski&gt;"));
        assert!(html.contains("2023-11-13 10:00:00"));
        assert!(!html.contains("niewygłoszona"));
    }

    #[tokio::test]
    async fn bare_fragment_and_unspoken_flag() {
        let html = statement_document(&statement("Anna", true), &day(), "<div>Tekst</div>".into())
            .await
            .unwrap();

        assert!(html.contains("<div>Tekst</div>"));
        assert!(html.contains("Wypowiedź niewygłoszona"));
    }
}
