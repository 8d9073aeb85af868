//! Pipe-delimited report rendering.
//!
//! Reports use the "pipe" dialect: `|` delimiter, `\` escape
//! character, quotes only where needed, CRLF line endings and a header row
//! first. The renderer writes to any [`std::io::Write`]; where the bytes end
//! up is decided by the caller.

use std::borrow::Cow;
use std::io::Write;

use crate::collections::Collection;
use crate::diagnostics::{CollectionStats, DatasetDiagnosis, WorkerDiagnosis, WorkerRecord};
use crate::error::CoreError;
use crate::types::{Platform, Scope};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DELIMITER: u8 = b'|';
pub const ESCAPE: u8 = b'\\';
const QUOTE: u8 = b'"';

/// File name prefix shared by every report.
pub const REPORT_PREFIX: &str = "ScanFME_Report";

/// Collection report columns for a single workgroup.
pub const WORKGROUP_COLUMNS: [&str; 9] = [
    "wg_id",
    "wg_url",
    "wg_ds_count",
    "wg_ep_count",
    "wg_wk_count",
    "wg_rq_count",
    "wg_gd_count",
    "wg_pd_count",
    "wg_ds_no_isogeo_id",
];

/// Reduced collection report columns for the whole database.
pub const DATABASE_COLUMNS: [&str; 4] = ["wg_id", "wg_url", "wg_ds_count", "wg_ds_no_isogeo_id"];

/// Worker report columns.
pub const WORKER_COLUMNS: [&str; 7] = [
    "wg_id",
    "wg_url",
    "wk_id",
    "wk_count",
    "wk_uptodate",
    "wk_name",
    "wk_version",
];

/// Collections summarised by the workgroup report, in column order.
const WORKGROUP_COUNT_COLUMNS: [Collection; 6] = [
    Collection::Datasets,
    Collection::Entrypoints,
    Collection::Subscriptions,
    Collection::Requests,
    Collection::Geodatabases,
    Collection::Procdatasets,
];

// ---------------------------------------------------------------------------
// URLs and file names
// ---------------------------------------------------------------------------

/// Daemon dashboard of a workgroup.
pub fn workgroup_url(workgroup_id: &str) -> String {
    format!("https://daemons.isogeo.com/g/{workgroup_id}")
}

/// Worker administration page of a workgroup.
pub fn worker_admin_url(workgroup_id: &str) -> String {
    format!("https://app.isogeo.com/groups/{workgroup_id}/admin/isogeo-worker")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Collections,
    Workers,
}

/// File name for a report. Directory handling is up to the caller.
pub fn report_file_name(kind: ReportKind, platform: Platform, scope: &Scope, base: &str) -> String {
    let platform = platform.as_str().to_uppercase();
    match (kind, scope) {
        (ReportKind::Collections, Scope::Workgroup(wg)) => {
            format!("{REPORT_PREFIX}_{platform}_{wg}_{base}")
        }
        (ReportKind::Collections, Scope::Database) => {
            format!("{REPORT_PREFIX}_{platform}_DB_{base}")
        }
        (ReportKind::Workers, Scope::Workgroup(wg)) => {
            format!("{REPORT_PREFIX}_Workers_{platform}_{wg}_{base}")
        }
        (ReportKind::Workers, Scope::Database) => {
            format!("{REPORT_PREFIX}_Workers_{platform}_{base}")
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Row writer for the pipe dialect.
///
/// Quoting is done here rather than by the csv writer: a field holding the
/// delimiter, a quote, the escape character or a line break is wrapped in
/// quotes with every quote and escape character prefixed by `\`.
pub struct PipeWriter<W: Write> {
    inner: csv::Writer<W>,
}

/// Wrap `out` in a writer configured for the pipe dialect.
pub fn pipe_writer<W: Write>(out: W) -> PipeWriter<W> {
    let inner = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::CRLF)
        .has_headers(false)
        .from_writer(out);
    PipeWriter { inner }
}

impl<W: Write> PipeWriter<W> {
    pub fn write_row<I, T>(&mut self, fields: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.inner
            .write_record(fields.into_iter().map(|f| encode_field(f.as_ref()).into_owned()))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CoreError> {
        self.inner.flush()?;
        Ok(())
    }
}

fn encode_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field
        .bytes()
        .any(|b| matches!(b, DELIMITER | QUOTE | ESCAPE | b'\r' | b'\n'));
    if !needs_quotes {
        return Cow::Borrowed(field);
    }

    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for c in field.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

fn count_cell(stats: &CollectionStats, collection: Collection) -> String {
    stats
        .get(collection)
        .map(|n| n.to_string())
        .unwrap_or_default()
}

/// Write the collection summary report: header plus one row.
///
/// Counts whose query failed are left empty.
pub fn render_collection_report<W: Write>(
    out: W,
    scope: &Scope,
    stats: &CollectionStats,
    datasets: &DatasetDiagnosis,
) -> Result<(), CoreError> {
    let mut writer = pipe_writer(out);
    let no_isogeo_id = datasets.no_isogeo_id.to_string();

    match scope {
        Scope::Workgroup(wg) => {
            writer.write_row(WORKGROUP_COLUMNS)?;
            let mut row = vec![wg.to_string(), workgroup_url(wg.as_str())];
            row.extend(WORKGROUP_COUNT_COLUMNS.iter().map(|&c| count_cell(stats, c)));
            row.push(no_isogeo_id);
            writer.write_row(&row)?;
        }
        Scope::Database => {
            writer.write_row(DATABASE_COLUMNS)?;
            writer.write_row([
                String::new(),
                String::new(),
                count_cell(stats, Collection::Datasets),
                no_isogeo_id,
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Write the worker report: header plus one row per subscription.
///
/// Returns the number of data rows written.
pub fn render_worker_report<W: Write>(out: W, diagnosis: &WorkerDiagnosis) -> Result<usize, CoreError> {
    let mut writer = pipe_writer(out);
    writer.write_row(WORKER_COLUMNS)?;

    let mut rows = 0;
    for (bucket, subscription) in diagnosis.records() {
        let record = WorkerRecord::from_subscription(subscription, bucket);
        writer.write_row([
            record.workgroup_id.as_str(),
            worker_admin_url(&record.workgroup_id).as_str(),
            record.record_id.as_str(),
            record.worker_count.to_string().as_str(),
            if record.up_to_date { "1" } else { "0" },
            record.name.as_str(),
            record.version.as_str(),
        ])?;
        rows += 1;
    }

    writer.flush()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
