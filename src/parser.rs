//! CSV reader for the raw hourly rental log.

use csv::{ErrorKind, ReaderBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, RecordKey, Result, Stage};
use crate::model::{RAW_COLUMNS, RawTable};

/// Reads every row of the CSV at `path` into an untyped [`RawTable`].
///
/// # Errors
///
/// - [`PipelineError::Schema`] if a row's width differs from the header or
///   the header itself is not valid UTF-8.
/// - [`PipelineError::Type`] if a data cell is not valid UTF-8.
/// - [`PipelineError::Io`] if the file cannot be opened or read.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| PipelineError::io(Stage::Validate, path, e))?;
    read_table_from(file, path)
}

/// Same as [`read_table`] over any reader; `origin` is only used in errors.
pub fn read_table_from<R: Read>(reader: R, origin: &Path) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| classify(e, origin, &[]))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| classify(e, origin, &headers))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(path = %origin.display(), rows = rows.len(), "Raw table read");
    Ok(RawTable { headers, rows })
}

/// Maps a csv error onto the pipeline taxonomy. Only genuine read failures
/// stay `Io`; malformed content is a schema or type problem.
fn classify(err: csv::Error, origin: &Path, headers: &[String]) -> PipelineError {
    let stage = Stage::Validate;
    // Header is record 0, so data rows keep their 1-based number.
    let row = |pos: &Option<csv::Position>| pos.as_ref().map_or(0, |p| p.record() as usize);

    match err.kind() {
        ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => PipelineError::Schema {
            stage,
            message: format!(
                "row {} has {len} fields, expected {expected_len}",
                row(pos)
            ),
        },
        ErrorKind::Utf8 { pos, .. } if headers.is_empty() => PipelineError::Schema {
            stage,
            message: format!("header row {} is not valid UTF-8", row(pos)),
        },
        ErrorKind::Utf8 { pos, err } => {
            let field = headers
                .get(err.field())
                .and_then(|name| RAW_COLUMNS.iter().find(|c| **c == name.trim()))
                .copied()
                .unwrap_or("unnamed column");
            PipelineError::Type {
                stage,
                key: RecordKey::Row(row(pos)),
                field,
                value: format!("<invalid byte after {} valid>", err.valid_up_to()),
                expected: "UTF-8 text",
            }
        }
        _ => PipelineError::io(stage, origin, err),
    }
}
