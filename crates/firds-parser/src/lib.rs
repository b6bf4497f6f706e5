//! Transforms FIRDS instrument reference-data XML into the flat CSV layout
//! published downstream.

pub mod csv_output;
pub mod errors;
pub mod extract;
pub mod model;
pub mod pairing;

use std::path::Path;

use tracing::{info, warn};

pub use csv_output::{read_csv, write_csv, CSV_HEADER};
pub use errors::TransformError;
pub use extract::{extract_file, extract_str, FIRDS_NAMESPACE};
pub use model::{ExtractedDocument, InstrumentRecord, IssuerValue, OutputRow, TransformReport};
pub use pairing::{pair_rows, IssuerScope, PairedRows, PairingPolicy, TransformOptions};

/// Converts `xml_path` into `csv_path` with the default options and returns
/// the number of data rows written.
pub fn transform(xml_path: &Path, csv_path: &Path) -> Result<usize, TransformError> {
    transform_with(xml_path, csv_path, &TransformOptions::default()).map(|report| report.rows)
}

pub fn transform_with(
    xml_path: &Path,
    csv_path: &Path,
    options: &TransformOptions,
) -> Result<TransformReport, TransformError> {
    let document = extract_file(xml_path)?;
    let paired = pair_rows(&document, options)?;
    write_csv(csv_path, &paired.rows)?;

    let report = TransformReport {
        instruments: document.instruments.len(),
        issuers: document.issuers.len(),
        rows: paired.rows.len(),
        incomplete_records: document
            .instruments
            .iter()
            .filter(|record| !record.is_complete())
            .count(),
        unpaired: paired.unpaired,
    };

    if report.incomplete_records > 0 {
        warn!(
            records = report.incomplete_records,
            "instrument records with absent fields were written with empty cells"
        );
    }
    info!(
        rows = report.rows,
        instruments = report.instruments,
        issuers = report.issuers,
        csv = %csv_path.display(),
        "wrote {} rows to {}",
        report.rows,
        csv_path.display()
    );

    Ok(report)
}
