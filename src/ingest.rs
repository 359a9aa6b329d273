//! CSV upload parsing.
//!
//! Turns an uploaded highlights export into [`NewHighlight`] rows. Only the
//! columns listed in [`REQUIRED_COLUMNS`] are read, anything else is ignored.

use crate::highlights::{parse_tags, NewHighlight};
use csv::StringRecord;

pub const COLUMN_HIGHLIGHT: &str = "Highlight";
pub const COLUMN_BOOK_TITLE: &str = "Book Title";
pub const COLUMN_BOOK_AUTHOR: &str = "Book Author";
pub const COLUMN_TAGS: &str = "Tags";

pub const REQUIRED_COLUMNS: [&str; 4] = [
    COLUMN_HIGHLIGHT,
    COLUMN_BOOK_TITLE,
    COLUMN_BOOK_AUTHOR,
    COLUMN_TAGS,
];

#[derive(thiserror::Error, Debug)]
pub enum CsvImportError {
    #[error("File must be a CSV file")]
    NotCsv,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid CSV file: {0}")]
    Malformed(#[from] csv::Error),
}

/// Column positions of the required fields within a header row.
struct Columns {
    highlight: usize,
    book_title: usize,
    book_author: usize,
    tags: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, CsvImportError> {
        let position = |name: &str| headers.iter().position(|header| header == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();

        match (
            position(COLUMN_HIGHLIGHT),
            position(COLUMN_BOOK_TITLE),
            position(COLUMN_BOOK_AUTHOR),
            position(COLUMN_TAGS),
        ) {
            (Some(highlight), Some(book_title), Some(book_author), Some(tags)) => Ok(Columns {
                highlight,
                book_title,
                book_author,
                tags,
            }),
            _ => Err(CsvImportError::MissingColumns(missing)),
        }
    }
}

/// Reject uploads whose file name does not carry a `.csv` extension.
pub fn ensure_csv_filename(filename: &str) -> Result<(), CsvImportError> {
    if filename.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(CsvImportError::NotCsv)
    }
}

/// Parse a CSV export into highlight rows.
///
/// Rows with an empty highlight are skipped. Missing cells read as empty
/// strings and tags are split on commas.
pub fn parse_highlights(data: &[u8]) -> Result<Vec<NewHighlight>, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers)?;

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();

        let content = cell(columns.highlight);
        if content.is_empty() {
            continue;
        }

        rows.push(NewHighlight {
            content: content.to_string(),
            book_title: cell(columns.book_title).to_string(),
            book_author: cell(columns.book_author).to_string(),
            tags: parse_tags(cell(columns.tags)),
        });
    }

    log::debug!("parsed {} highlight rows", rows.len());

    Ok(rows)
}
