//! Domain rewriting inside ZIP/JAR containers.
//!
//! The source archive is read entry by entry and a new archive is built in
//! memory. Entries whose extension marks them as text-bearing are
//! decompressed, checked for the search bytes, and rewritten when they contain
//! any. Everything else, including text entries without a hit, is copied
//! through raw, so its compressed bytes stay exactly as they were.
//!
//! Nothing is written to disk here. The caller commits the returned bytes
//! only after the whole pass has succeeded.

use crate::codec::EncodedPattern;
use crate::rewrite;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Extensions of entries that may hold the domain as text.
pub const TEXT_EXTENSIONS: &[&str] = &["class", "properties", "json", "xml", "yml", "yaml"];

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read entry {name}: {source}")]
    ReadEntry { name: String, source: io::Error },

    #[error("failed to write entry {name}: {source}")]
    WriteEntry { name: String, source: io::Error },
}

/// Result of rewriting one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the rewritten archive has not been written anywhere yet"]
pub struct ArchiveRewrite {
    /// Bytes of the rebuilt archive.
    pub bytes: Vec<u8>,
    /// Total replacements across all entries.
    pub occurrences: usize,
    /// Number of entries in the archive.
    pub entries: usize,
    /// Names of entries whose content changed, in archive order.
    pub rewritten: Vec<String>,
}

/// Whether an entry name carries an allow-listed extension.
pub fn is_text_entry(name: &str) -> bool {
    if name.ends_with('/') {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Rewrite `pattern` inside the archive at `path`.
pub fn rewrite_archive(path: &Path, pattern: &EncodedPattern) -> Result<ArchiveRewrite, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    rewrite_archive_from(file, pattern)
}

/// Rewrite `pattern` inside an archive read from `reader`.
pub fn rewrite_archive_from<R: Read + Seek>(
    reader: R,
    pattern: &EncodedPattern,
) -> Result<ArchiveRewrite, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let entries = archive.len();
    debug!("Archive contains {} entries", entries);

    let mut occurrences = 0;
    let mut rewritten = Vec::new();

    for index in 0..entries {
        let name = archive.by_index_raw(index)?.name().to_string();

        if is_text_entry(&name) {
            let mut entry = archive.by_index(index)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|source| ArchiveError::ReadEntry {
                    name: name.clone(),
                    source,
                })?;

            // Cheap pre-check before the full scan.
            if rewrite::contains(&data, pattern.search()) {
                let count = rewrite::rewrite(&mut data, pattern);
                if count > 0 {
                    let mut options = SimpleFileOptions::default()
                        .compression_method(entry.compression())
                        .large_file(data.len() as u64 >= u64::from(u32::MAX));
                    if let Some(modified) = entry.last_modified() {
                        options = options.last_modified_time(modified);
                    }
                    if let Some(mode) = entry.unix_mode() {
                        options = options.unix_permissions(mode);
                    }
                    drop(entry);

                    writer.start_file(name.as_str(), options)?;
                    writer
                        .write_all(&data)
                        .map_err(|source| ArchiveError::WriteEntry {
                            name: name.clone(),
                            source,
                        })?;

                    debug!("Rewrote {} occurrence(s) in {}", count, name);
                    occurrences += count;
                    rewritten.push(name);
                    continue;
                }
            }
        }

        writer.raw_copy_file(archive.by_index_raw(index)?)?;
    }

    let bytes = writer.finish()?.into_inner();

    Ok(ArchiveRewrite {
        bytes,
        occurrences,
        entries,
        rewritten,
    })
}

/// Count occurrences of `pattern` across allow-listed entries without
/// building a new archive.
pub fn count_in_archive(path: &Path, pattern: &EncodedPattern) -> Result<usize, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let mut total = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if !is_text_entry(&name) {
            continue;
        }
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|source| ArchiveError::ReadEntry { name, source })?;
        total += rewrite::count(&data, pattern);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DomainPattern, Encoding};
    use zip::CompressionMethod;

    fn build_archive(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        data
    }

    fn narrow() -> EncodedPattern {
        DomainPattern::new("hytale.com", "sanasol.ws")
            .unwrap()
            .encode(Encoding::Narrow)
    }

    #[test]
    fn test_is_text_entry() {
        assert!(is_text_entry("com/example/Auth.class"));
        assert!(is_text_entry("config/app.PROPERTIES"));
        assert!(is_text_entry("data.yaml"));
        assert!(!is_text_entry("assets/logo.png"));
        assert!(!is_text_entry("META-INF/"));
        assert!(!is_text_entry("classes"));
    }

    #[test]
    fn test_rewrites_allow_listed_entries_only() {
        let source = build_archive(&[
            ("Auth.class", b"\x00\x10https://hytale.com\x00", CompressionMethod::Deflated),
            ("logo.png", b"png hytale.com png", CompressionMethod::Stored),
            ("app.properties", b"url=hytale.com\nalt=hytale.com\n", CompressionMethod::Stored),
        ]);

        let result = rewrite_archive_from(Cursor::new(source), &narrow()).unwrap();

        assert_eq!(result.entries, 3);
        assert_eq!(result.occurrences, 3);
        assert_eq!(result.rewritten, vec!["Auth.class", "app.properties"]);
        assert_eq!(
            read_entry(&result.bytes, "Auth.class"),
            b"\x00\x10https://sanasol.ws\x00"
        );
        assert_eq!(read_entry(&result.bytes, "logo.png"), b"png hytale.com png");
        assert_eq!(
            read_entry(&result.bytes, "app.properties"),
            b"url=sanasol.ws\nalt=sanasol.ws\n"
        );
    }

    #[test]
    fn test_preserves_order_and_compression() {
        let source = build_archive(&[
            ("b.json", b"{\"host\":\"hytale.com\"}", CompressionMethod::Stored),
            ("a.xml", b"<host>hytale.com</host>", CompressionMethod::Deflated),
        ]);

        let result = rewrite_archive_from(Cursor::new(source), &narrow()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(result.bytes)).unwrap();

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "b.json");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        let second = archive.by_index(1).unwrap();
        assert_eq!(second.name(), "a.xml");
        assert_eq!(second.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_no_occurrences() {
        let source = build_archive(&[("a.json", b"{}", CompressionMethod::Deflated)]);
        let result = rewrite_archive_from(Cursor::new(source), &narrow()).unwrap();
        assert_eq!(result.occurrences, 0);
        assert!(result.rewritten.is_empty());
        assert_eq!(read_entry(&result.bytes, "a.json"), b"{}");
    }

    #[test]
    fn test_invalid_archive_is_an_error() {
        let result = rewrite_archive_from(Cursor::new(b"not a zip".to_vec()), &narrow());
        assert!(matches!(result, Err(ArchiveError::Zip(_))));
    }
}
