//! Row normalization.
//!
//! Turns one [`RawRow`] into a canonical [`Document`]: a stable id derived
//! from the row's unique key, an order-stable content string for embedding,
//! and a SHA-256 content hash for change detection. Whitespace is collapsed
//! per field before hashing so formatting churn in the sheet does not
//! invalidate the index.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::{Document, RawRow, RowMeta};

/// Errors surfaced while normalizing a single row.
///
/// Row-level failures are isolated: the sync skips the row, records the
/// reason, and continues with the rest of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The required question cell was blank.
    MissingQuestion { row: u32 },
    /// The required answer cell was blank.
    MissingAnswer { row: u32 },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingQuestion { row } => write!(f, "row {}: question is blank", row),
            Self::MissingAnswer { row } => write!(f, "row {}: answer is blank", row),
        }
    }
}

impl std::error::Error for RowError {}

/// Normalize one raw row into a canonical document.
pub fn normalize_row(row: &RawRow) -> Result<Document, RowError> {
    let question = collapse_whitespace(row.cell("question"));
    let answer = collapse_whitespace(row.cell("answer"));

    if question.is_empty() {
        return Err(RowError::MissingQuestion {
            row: row.row_number,
        });
    }
    if answer.is_empty() {
        return Err(RowError::MissingAnswer {
            row: row.row_number,
        });
    }

    let category = non_empty(collapse_whitespace(row.cell("category")));
    let keywords = non_empty(collapse_whitespace(row.cell("keywords")));
    // Links are metadata only — they carry no semantic value worth embedding.
    let link = non_empty(row.cell("link").to_string());

    let content = build_content(&question, &answer, category.as_deref(), keywords.as_deref());

    Ok(Document {
        id: document_id(row),
        content_hash: hash_content(&content),
        content,
        metadata: RowMeta {
            row_number: row.row_number,
            question,
            answer,
            link,
            category,
            keywords,
        },
    })
}

/// Stable document id for a row.
///
/// Uses the explicit `id` cell when the sheet provides one, otherwise the
/// row position. Never random: the same logical row maps to the same id on
/// every sync, and edits to unrelated rows cannot shift it.
pub fn document_id(row: &RawRow) -> String {
    let key = match row.cell("id") {
        "" => row.row_number.to_string(),
        explicit => explicit.to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(b"row:");
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the embeddable content block. Field order is fixed (category,
/// question, answer, keywords) so the hash is stable.
fn build_content(
    question: &str,
    answer: &str,
    category: Option<&str>,
    keywords: Option<&str>,
) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(category) = category {
        parts.push(format!("Category: {}", category));
    }
    parts.push(format!("Question: {}", question));
    parts.push(format!("Answer: {}", answer));
    if let Some(keywords) = keywords {
        parts.push(format!("Keywords: {}", keywords));
    }
    parts.join("\n")
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse runs of whitespace (including newlines) to single spaces and
/// trim the ends.
fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
