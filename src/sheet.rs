//! Spreadsheet reader.
//!
//! Fetches the knowledge-base rows from the Google Sheets `values` REST
//! endpoint and parses them into [`RawRow`]s keyed by the header row.
//! Handles the sheet shapes editors actually produce: short rows are padded,
//! headers are lowercased and trimmed, and rows whose `active` column is
//! anything but `TRUE` are filtered out (when that column exists at all).
//!
//! Rows with blank required cells are *not* filtered here — the normalizer
//! rejects them per row so the sync report can surface them.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SheetConfig;
use crate::models::RawRow;
use crate::traits::SheetReader;

const REQUIRED_COLUMNS: [&str; 2] = ["question", "answer"];

/// Read-only Google Sheets client using an API key
/// (`SHEETS_API_KEY` environment variable).
pub struct GoogleSheetsReader {
    client: reqwest::Client,
    api_key: String,
    spreadsheet_id: String,
    sheet_name: String,
}

impl GoogleSheetsReader {
    pub fn new(config: &SheetConfig) -> Result<Self> {
        let api_key = std::env::var("SHEETS_API_KEY")
            .map_err(|_| anyhow::anyhow!("SHEETS_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
        })
    }
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[async_trait]
impl SheetReader for GoogleSheetsReader {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}!A:Z",
            self.spreadsheet_id, self.sheet_name
        );

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("sheet fetch failed {}: {}", status, body);
        }

        let parsed: ValuesResponse = response.json().await?;
        parse_rows(&parsed.values)
    }
}

/// Parse a raw value grid (header row first) into active data rows.
pub fn parse_rows(values: &[Vec<String>]) -> Result<Vec<RawRow>> {
    if values.len() < 2 {
        tracing::warn!("sheet is empty or has only a header row");
        return Ok(Vec::new());
    }

    let headers: Vec<String> = values[0]
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!("sheet is missing required columns: {}", missing.join(", "));
    }

    let has_active_column = headers.iter().any(|h| h == "active");
    let mut rows = Vec::new();

    for (offset, row) in values[1..].iter().enumerate() {
        let mut cells: HashMap<String, String> = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            // Short rows are padded with empty cells.
            let value = row.get(i).cloned().unwrap_or_default();
            cells.insert(header.clone(), value);
        }

        let raw = RawRow {
            row_number: (offset + 2) as u32,
            cells,
        };

        if has_active_column && !raw.cell("active").eq_ignore_ascii_case("true") {
            continue;
        }

        rows.push(raw);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parses_rows_with_row_numbers() {
        let values = grid(&[
            &["Question", "Answer", "Link"],
            &["How to pay?", "By card.", "https://example.com/pay"],
            &["Opening hours?", "9-6.", ""],
        ]);
        let rows = parse_rows(&values).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[1].row_number, 3);
        assert_eq!(rows[0].cell("question"), "How to pay?");
        assert_eq!(rows[0].cell("link"), "https://example.com/pay");
    }

    #[test]
    fn test_pads_short_rows() {
        let values = grid(&[
            &["question", "answer", "category"],
            &["Q only", "A"],
        ]);
        let rows = parse_rows(&values).unwrap();
        assert_eq!(rows[0].cell("category"), "");
    }

    #[test]
    fn test_filters_inactive_rows() {
        let values = grid(&[
            &["question", "answer", "active"],
            &["Q1", "A1", "TRUE"],
            &["Q2", "A2", "FALSE"],
            &["Q3", "A3", ""],
        ]);
        let rows = parse_rows(&values).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell("question"), "Q1");
    }

    #[test]
    fn test_no_active_column_keeps_everything() {
        let values = grid(&[&["question", "answer"], &["Q1", "A1"], &["Q2", "A2"]]);
        let rows = parse_rows(&values).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_required_column_fails() {
        let values = grid(&[&["question", "link"], &["Q1", "L1"]]);
        let err = parse_rows(&values).unwrap_err();
        assert!(err.to_string().contains("answer"));
    }

    #[test]
    fn test_header_case_and_whitespace_ignored() {
        let values = grid(&[&[" Question ", "ANSWER"], &["Q1", "A1"]]);
        let rows = parse_rows(&values).unwrap();
        assert_eq!(rows[0].cell("question"), "Q1");
        assert_eq!(rows[0].cell("answer"), "A1");
    }

    #[test]
    fn test_empty_sheet_yields_no_rows() {
        assert!(parse_rows(&grid(&[&["question", "answer"]]))
            .unwrap()
            .is_empty());
        assert!(parse_rows(&[]).unwrap().is_empty());
    }
}
