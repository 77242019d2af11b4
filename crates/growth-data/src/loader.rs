//! Upload ingestion: bytes in, normalized [`Dataset`] out.
//!
//! Handles delimited text (CSV/TSV) and spreadsheet binaries (XLSX/XLS),
//! resolves duck-typed headers through the alias table, and normalizes every
//! row exactly once. Row-level problems are skipped and counted, never
//! raised; only a file with no usable rows (or no user-id column at all) is
//! an error.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{Data, Reader};
use chrono::NaiveDate;
use growth_core::error::IngestionError;
use growth_core::field_parsers::{
    is_dirty_token, ColumnMap, ColumnResolver, DateParser, FlagParser, NumericCleaner,
};
use growth_core::models::{Record, UserStatus};
use tracing::{debug, warn};

use crate::dataset::Dataset;

// ── Public types ──────────────────────────────────────────────────────────────

/// How the byte stream will be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// CSV or TSV text.
    Delimited,
    /// XLSX/XLS workbook.
    Spreadsheet,
}

/// A successfully loaded dataset plus ingestion diagnostics.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The normalized, indexed dataset.
    pub dataset: Dataset,
    /// Rows that survived normalization.
    pub rows_loaded: usize,
    /// Rows dropped on the way in: malformed delimited rows plus rows that
    /// failed normalization (bad dates, missing user id, exact duplicates).
    pub skipped_rows: usize,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Parses an uploaded file into a [`Dataset`].
pub struct Loader;

impl Loader {
    /// Load `bytes` into a dataset, picking the format from
    /// `extension_hint` with a content sniff as fallback.
    ///
    /// The bytes are not persisted anywhere; the caller owns the upload's
    /// lifecycle.
    pub fn load(bytes: &[u8], extension_hint: Option<&str>) -> Result<LoadOutcome, IngestionError> {
        if bytes.is_empty() {
            return Err(IngestionError::EmptyFile);
        }

        let format = detect_format(bytes, extension_hint)?;
        debug!("Detected input format: {:?}", format);

        let (headers, rows, malformed) = match format {
            FileFormat::Delimited => read_delimited(bytes, extension_hint)?,
            FileFormat::Spreadsheet => {
                let (headers, rows) = read_spreadsheet(bytes)?;
                (headers, rows, 0)
            }
        };

        let (records, skipped) = normalize_rows(&headers, rows)?;
        let rows_loaded = records.len();
        let skipped_rows = skipped + malformed;

        debug!(
            "Loaded {} records ({} rows skipped) from {} columns",
            rows_loaded,
            skipped_rows,
            headers.len()
        );

        Ok(LoadOutcome {
            dataset: Dataset::from_records(records),
            rows_loaded,
            skipped_rows,
        })
    }
}

// ── Format detection ──────────────────────────────────────────────────────────

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Pick the decode format from the extension hint, falling back to a
/// content sniff when the hint is absent or contradicts the bytes.
///
/// Spreadsheet magic bytes are definitive: a real XLSX is a ZIP archive and
/// a legacy XLS starts with the CFB signature, so when either is present the
/// file is decoded as a spreadsheet regardless of the hint.
fn detect_format(bytes: &[u8], extension_hint: Option<&str>) -> Result<FileFormat, IngestionError> {
    let sniffed_spreadsheet = bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC);
    let hint = extension_hint
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .unwrap_or_default();

    if sniffed_spreadsheet {
        if matches!(hint.as_str(), "csv" | "tsv" | "txt") {
            warn!("Extension hint '{}' contradicts spreadsheet magic; trusting content", hint);
        }
        return Ok(FileFormat::Spreadsheet);
    }

    match hint.as_str() {
        "csv" | "tsv" | "txt" => Ok(FileFormat::Delimited),
        "xlsx" | "xlsm" | "xls" => {
            warn!("Extension hint '{}' without spreadsheet magic; trying delimited text", hint);
            Ok(FileFormat::Delimited)
        }
        _ => {
            if looks_textual(bytes) {
                Ok(FileFormat::Delimited)
            } else {
                Err(IngestionError::UnsupportedFormat(if hint.is_empty() {
                    "unrecognized binary content".to_string()
                } else {
                    hint
                }))
            }
        }
    }
}

/// Heuristic: text files do not contain NUL bytes near the start.
fn looks_textual(bytes: &[u8]) -> bool {
    !bytes.iter().take(512).any(|&b| b == 0)
}

// ── Delimited text ────────────────────────────────────────────────────────────

/// Read CSV/TSV into a header row, raw string rows, and a count of rows the
/// decoder rejected outright.
fn read_delimited(
    bytes: &[u8],
    extension_hint: Option<&str>,
) -> Result<(Vec<String>, Vec<Vec<String>>, usize), IngestionError> {
    let delimiter = sniff_delimiter(bytes, extension_hint);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestionError::Delimited(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for result in reader.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(|c| c.to_string()).collect()),
            Err(e) => {
                // A malformed row is a row-level problem; skip it but keep
                // it in the skipped tally.
                malformed += 1;
                debug!("Skipping malformed delimited row: {}", e);
            }
        }
    }

    Ok((headers, rows, malformed))
}

/// Tab wins when the hint says TSV or the header line contains more tabs
/// than commas.
fn sniff_delimiter(bytes: &[u8], extension_hint: Option<&str>) -> u8 {
    if extension_hint
        .map(|e| e.trim_start_matches('.').eq_ignore_ascii_case("tsv"))
        .unwrap_or(false)
    {
        return b'\t';
    }
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let tabs = first_line.iter().filter(|&&b| b == b'\t').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

// ── Spreadsheet ───────────────────────────────────────────────────────────────

/// Read the first worksheet into a header row plus raw string rows.
fn read_spreadsheet(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), IngestionError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| IngestionError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestionError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| IngestionError::Spreadsheet(e.to_string()))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => {
            return Err(IngestionError::Spreadsheet(
                "first sheet is empty".to_string(),
            ))
        }
    };

    let rows: Vec<Vec<String>> = row_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok((headers, rows))
}

/// Render a spreadsheet cell as the string the field parsers expect.
///
/// Integral floats drop the trailing `.0` so numeric user ids round-trip;
/// native date cells are rendered in a format [`DateParser`] accepts.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Validate and normalize raw rows into [`Record`]s.
///
/// Dropped (and counted) rows: empty/dirty user id, no parseable date in
/// either date column, exact duplicates of an earlier row
/// (`user_id` + `signup_date` + `activity_date`).
fn normalize_rows(
    headers: &[String],
    rows: Vec<Vec<String>>,
) -> Result<(Vec<Record>, usize), IngestionError> {
    let columns = ColumnResolver::resolve(headers);
    let Some(user_idx) = columns.user_id else {
        return Err(IngestionError::MissingUserColumn {
            header: headers.join(","),
        });
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut seen: HashSet<(String, Option<NaiveDate>, Option<NaiveDate>)> = HashSet::new();

    for row in rows {
        match normalize_row(&row, user_idx, &columns) {
            Some(record) => {
                let key = (
                    record.user_id.clone(),
                    record.signup_date,
                    record.activity_date,
                );
                if seen.insert(key) {
                    records.push(record);
                } else {
                    skipped += 1;
                }
            }
            None => skipped += 1,
        }
    }

    if records.is_empty() {
        return Err(IngestionError::NoUsableRows { skipped });
    }

    Ok((records, skipped))
}

/// Normalize one row; `None` means the row fails the Record invariant.
fn normalize_row(row: &[String], user_idx: usize, columns: &ColumnMap) -> Option<Record> {
    let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(String::as_str);

    let user_raw = row.get(user_idx).map(String::as_str).unwrap_or("");
    if is_dirty_token(user_raw) {
        return None;
    }
    let user_id = user_raw.trim().to_string();

    let signup_date = cell(columns.signup_date).and_then(DateParser::parse);
    let activity_date = cell(columns.activity_date).and_then(DateParser::parse);
    if signup_date.is_none() && activity_date.is_none() {
        return None;
    }

    let plan = cell(columns.plan)
        .filter(|v| !is_dirty_token(v))
        .map(|v| v.trim().to_string());
    let revenue = cell(columns.revenue).and_then(NumericCleaner::parse);
    let status = cell(columns.status)
        .filter(|v| !is_dirty_token(v))
        .map(UserStatus::from_raw);
    let converted = cell(columns.converted).and_then(FlagParser::parse);
    let session_duration = cell(columns.session_duration).and_then(NumericCleaner::parse);
    let sessions_count = cell(columns.sessions_count).and_then(NumericCleaner::parse);

    Some(Record {
        user_id,
        signup_date,
        activity_date,
        plan,
        revenue,
        status,
        converted,
        session_duration,
        sessions_count,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use growth_core::models::{Period, UserStatus};

    fn load_csv(content: &str) -> Result<LoadOutcome, IngestionError> {
        Loader::load(content.as_bytes(), Some("csv"))
    }

    // ── detect_format ──────────────────────────────────────────────────────

    #[test]
    fn test_detect_format_csv_hint() {
        assert_eq!(
            detect_format(b"a,b\n1,2\n", Some("csv")).unwrap(),
            FileFormat::Delimited
        );
    }

    #[test]
    fn test_detect_format_zip_magic_wins_over_hint() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest");
        assert_eq!(
            detect_format(&bytes, Some("csv")).unwrap(),
            FileFormat::Spreadsheet
        );
    }

    #[test]
    fn test_detect_format_legacy_xls_magic() {
        let mut bytes = CFB_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_format(&bytes, None).unwrap(), FileFormat::Spreadsheet);
    }

    #[test]
    fn test_detect_format_xlsx_hint_without_magic_falls_back() {
        assert_eq!(
            detect_format(b"user_id,date\n1,2024-01-01\n", Some("xlsx")).unwrap(),
            FileFormat::Delimited
        );
    }

    #[test]
    fn test_detect_format_no_hint_textual() {
        assert_eq!(
            detect_format(b"user_id,date\n", None).unwrap(),
            FileFormat::Delimited
        );
    }

    #[test]
    fn test_detect_format_unknown_binary_rejected() {
        let bytes = [0u8, 1, 2, 3, 0, 0, 9];
        let err = detect_format(&bytes, Some("bin")).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat(_)));
    }

    // ── sniff_delimiter ────────────────────────────────────────────────────

    #[test]
    fn test_sniff_delimiter_tabs() {
        assert_eq!(sniff_delimiter(b"a\tb\tc\n1\t2\t3\n", None), b'\t');
        assert_eq!(sniff_delimiter(b"a,b,c\n", None), b',');
        assert_eq!(sniff_delimiter(b"a,b\n", Some("tsv")), b'\t');
    }

    // ── Loading ────────────────────────────────────────────────────────────

    #[test]
    fn test_load_basic_csv() {
        let outcome = load_csv(
            "user_id,signup_date,activity_date\n\
             u1,2024-01-01,2024-01-02\n\
             u2,2024-01-03,2024-01-04\n",
        )
        .unwrap();
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.skipped_rows, 0);
        assert_eq!(outcome.dataset.total_users(), 2);
    }

    #[test]
    fn test_load_alias_headers() {
        let outcome = load_csv(
            "UID,Created At,Last Active\n\
             u1,2024-01-01,2024-01-02\n",
        )
        .unwrap();
        let record = &outcome.dataset.records()[0];
        assert_eq!(record.user_id, "u1");
        assert!(record.signup_date.is_some());
        assert!(record.activity_date.is_some());
    }

    #[test]
    fn test_load_empty_bytes() {
        let err = Loader::load(b"", Some("csv")).unwrap_err();
        assert!(matches!(err, IngestionError::EmptyFile));
    }

    #[test]
    fn test_load_missing_user_column() {
        let err = load_csv("signup_date,revenue\n2024-01-01,5\n").unwrap_err();
        assert!(matches!(err, IngestionError::MissingUserColumn { .. }));
    }

    #[test]
    fn test_load_rows_without_dates_skipped_and_counted() {
        let outcome = load_csv(
            "user_id,signup_date\n\
             u1,2024-01-01\n\
             u2,not-a-date\n\
             u3,???\n",
        )
        .unwrap();
        assert_eq!(outcome.rows_loaded, 1);
        assert_eq!(outcome.skipped_rows, 2);
    }

    #[test]
    fn test_load_all_dates_unparsable_is_ingestion_error() {
        let err = load_csv(
            "user_id,signup_date\n\
             u1,garbage\n\
             u2,junk\n",
        )
        .unwrap_err();
        assert!(matches!(err, IngestionError::NoUsableRows { skipped: 2 }));
    }

    #[test]
    fn test_load_dirty_user_id_skipped() {
        let outcome = load_csv(
            "user_id,signup_date\n\
             n/a,2024-01-01\n\
             u1,2024-01-01\n",
        )
        .unwrap();
        assert_eq!(outcome.rows_loaded, 1);
        assert_eq!(outcome.skipped_rows, 1);
    }

    #[test]
    fn test_load_exact_duplicates_dropped() {
        let outcome = load_csv(
            "user_id,signup_date,activity_date\n\
             u1,2024-01-01,2024-01-02\n\
             u1,2024-01-01,2024-01-02\n\
             u1,2024-01-01,2024-01-09\n",
        )
        .unwrap();
        // The second row is an exact duplicate; the third is a new event.
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.skipped_rows, 1);
    }

    #[test]
    fn test_load_optional_fields() {
        let outcome = load_csv(
            "user_id,signup_date,plan,revenue,status\n\
             u1,2024-01-01,pro,\"1,200\",cancelled\n\
             u2,2024-01-02,n/a,-50,active\n",
        )
        .unwrap();
        let records = outcome.dataset.records();
        assert_eq!(records[0].plan.as_deref(), Some("pro"));
        assert_eq!(records[0].revenue, Some(1200.0));
        assert_eq!(records[0].status, Some(UserStatus::Churned));
        assert_eq!(records[1].plan, None);
        assert_eq!(records[1].revenue, None); // negative treated as unparseable
        assert_eq!(records[1].status, Some(UserStatus::Active));
    }

    #[test]
    fn test_load_engagement_fields() {
        let outcome = load_csv(
            "user_id,signup_date,converted,session_duration,sessions_count\n\
             u1,2024-01-01,yes,12.5,4\n\
             u2,2024-01-02,0,n/a,\n",
        )
        .unwrap();
        let records = outcome.dataset.records();
        assert_eq!(records[0].converted, Some(true));
        assert_eq!(records[0].session_duration, Some(12.5));
        assert_eq!(records[0].sessions_count, Some(4.0));
        assert_eq!(records[1].converted, Some(false));
        assert_eq!(records[1].session_duration, None);
        assert_eq!(records[1].sessions_count, None);
    }

    #[test]
    fn test_load_malformed_rows_counted_as_skipped() {
        let mut bytes = b"user_id,signup_date\nu1,2024-01-01\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b",2024-01-01\nu2,2024-01-02\n");

        let outcome = Loader::load(&bytes, Some("csv")).unwrap();
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.skipped_rows, 1);
    }

    #[test]
    fn test_load_xlsx_workbook() {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/data/export.xlsx"
        ));
        let outcome = Loader::load(bytes, Some("xlsx")).unwrap();
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.skipped_rows, 0);

        let records = outcome.dataset.records();
        // Numeric ids come back without a float suffix.
        assert_eq!(records[0].user_id, "101");
        assert_eq!(records[1].user_id, "102");
        // Native date cells decode through the same date path as text.
        assert_eq!(
            records[0].signup_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            records[1].signup_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 8)
        );
        assert!(records[0].activity_date.is_some());
    }

    #[test]
    fn test_load_tsv() {
        let outcome = Loader::load(
            b"user_id\tsignup_date\nu1\t2024-01-01\n",
            Some("tsv"),
        )
        .unwrap();
        assert_eq!(outcome.rows_loaded, 1);
    }

    #[test]
    fn test_load_from_file_on_disk() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("export.csv");
        std::fs::write(
            &path,
            "user_id,signup_date,activity_date\nu1,2024-01-01,2024-01-02\n",
        )
        .expect("write csv");

        let bytes = std::fs::read(&path).expect("read csv");
        let hint = path.extension().map(|e| e.to_string_lossy().to_string());
        let outcome = Loader::load(&bytes, hint.as_deref()).unwrap();
        assert_eq!(outcome.rows_loaded, 1);
    }

    #[test]
    fn test_load_mixed_date_formats() {
        let outcome = load_csv(
            "user_id,activity_date\n\
             u1,2024-01-15\n\
             u2,15/01/2024\n\
             u3,15-Jan-2024\n",
        )
        .unwrap();
        assert_eq!(outcome.rows_loaded, 3);
        let period = Period::from_date(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(outcome.dataset.active_in(period), 3);
    }
}
