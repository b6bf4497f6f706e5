use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::errors::FetchError;

/// Extracts every entry of `archive` below `destination` and returns the
/// paths of the extracted files in archive order.
///
/// Files written before a failure are left in place.
pub fn unpack(archive: &[u8], destination: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|source| FetchError::Archive { source })?;
    fs::create_dir_all(destination).map_err(|source| FetchError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut extracted = Vec::with_capacity(zip.len());
    match extract_entries(&mut zip, destination, &mut extracted) {
        Ok(()) => {
            info!(
                files = extracted.len(),
                destination = %destination.display(),
                "extraction completed"
            );
            Ok(extracted)
        }
        Err(err) => {
            if !extracted.is_empty() {
                warn!(
                    files = extracted.len(),
                    destination = %destination.display(),
                    error = %err,
                    "extraction stopped partway; already extracted files were kept"
                );
            }
            Err(err)
        }
    }
}

pub fn unpack_file(archive_path: &Path, destination: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let bytes = fs::read(archive_path).map_err(|source| FetchError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    unpack(&bytes, destination)
}

/// Name of the XML document shipped inside `archive_name`
/// (`DLTINS_20210117_01of01.zip` holds `DLTINS_20210117_01of01.xml`).
pub fn xml_entry_name(archive_name: &str) -> String {
    let path = Path::new(archive_name).with_extension("xml");
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{archive_name}.xml"))
}

fn extract_entries<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    destination: &Path,
    extracted: &mut Vec<PathBuf>,
) -> Result<(), FetchError> {
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|source| FetchError::Archive { source })?;
        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| FetchError::UnsafeEntry { name: name.clone() })?;
        let target = destination.join(relative);
        let io_error = |source| FetchError::Io {
            path: target.clone(),
            source,
        };

        info!(entry = %name, size = entry.size(), "archive entry");

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut file = File::create(&target).map_err(io_error)?;
        copy_entry(&mut entry, &mut file).map_err(|err| match err {
            EntryCopyError::Read(err) => FetchError::Archive {
                source: ZipError::Io(err),
            },
            EntryCopyError::Write(err) => io_error(err),
        })?;
        extracted.push(target);
    }
    Ok(())
}

enum EntryCopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Streams an entry to disk. The size declared in the archive is not
/// trusted; decompression and checksum failures surface as read errors.
fn copy_entry(entry: &mut impl Read, file: &mut File) -> Result<(), EntryCopyError> {
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = match entry.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(EntryCopyError::Read(err)),
        };
        file.write_all(&buffer[..read])
            .map_err(EntryCopyError::Write)?;
    }
    file.flush().map_err(EntryCopyError::Write)
}
