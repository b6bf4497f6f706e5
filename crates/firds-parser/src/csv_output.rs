use std::io;
use std::path::Path;

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use crate::errors::TransformError;
use crate::model::OutputRow;

pub const CSV_HEADER: [&str; 6] = [
    "FinInstrmGnlAttrbts.Id",
    "FinInstrmGnlAttrbts.FullNm",
    "FinInstrmGnlAttrbts.ClssfctnTp",
    "FinInstrmGnlAttrbts.CmmdtyDerivInd",
    "FinInstrmGnlAttrbts.NtnlCcy",
    "Issr",
];

/// Writes the header and `rows` to `path`.
///
/// Rows go to a temporary file in the destination directory which replaces
/// `path` only once everything has been written, so a failed write never
/// leaves a truncated file behind.
pub fn write_csv(path: &Path, rows: &[OutputRow]) -> Result<(), TransformError> {
    let write_error = |source| TransformError::Write {
        path: path.to_path_buf(),
        source,
    };
    let csv_error = |source| TransformError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = staging_file(directory).map_err(write_error)?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(staging);
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(write_error)?;

    let staging = writer
        .into_inner()
        .map_err(|err| write_error(err.into_error()))?;
    staging
        .persist(path)
        .map_err(|err| write_error(err.error))?;
    Ok(())
}

/// Temporary file for [`write_csv`]. It is opened with the mode a plain
/// create would use (0666 less the umask) so the persisted CSV is not
/// owner-only.
fn staging_file(directory: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".firds-").suffix(".csv.tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(directory)
}

/// Reads a CSV produced by [`write_csv`]; the header must match exactly.
pub fn read_csv(path: &Path) -> Result<Vec<OutputRow>, TransformError> {
    let csv_error = |source| TransformError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;

    let header = reader.headers().map_err(csv_error)?;
    if header.iter().ne(CSV_HEADER) {
        return Err(TransformError::UnexpectedHeader {
            path: path.to_path_buf(),
            found: header.iter().collect::<Vec<_>>().join(","),
        });
    }

    reader
        .deserialize()
        .collect::<Result<Vec<OutputRow>, _>>()
        .map_err(csv_error)
}
