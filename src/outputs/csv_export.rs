//! CSV rendering and atomic file replacement.

use super::StoreError;
use crate::models::ItemRecord;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const HEADERS: [&str; 3] = ["year", "title", "abstract"];

#[derive(Serialize)]
struct CsvRow<'a> {
    year: i32,
    title: &'a str,
    abstract_text: &'a str,
}

/// Render `records` as CSV with a `year,title,abstract` header, in order.
///
/// The header is written even when there are no rows.
pub fn render(records: &[ItemRecord], path: &Path) -> Result<Vec<u8>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADERS).map_err(csv_err)?;
    for record in records {
        writer
            .serialize(CsvRow {
                year: record.year,
                title: &record.title,
                abstract_text: &record.abstract_text,
            })
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::io(path, e.into_error()))
}

/// Replace `path` with `bytes` via a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_header_only_when_empty() {
        let bytes = render(&[], Path::new("out.csv")).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "year,title,abstract\n");
    }

    #[test]
    fn test_render_quotes_commas_and_newlines() {
        let records = vec![
            ItemRecord::new(2020, "Plain", "Simple"),
            ItemRecord::new(2021, "Commas, \"quotes\"", "line one\nline two"),
        ];
        let bytes = render(&records, Path::new("out.csv")).unwrap();

        let mut reader = ::csv::Reader::from_reader(bytes.as_slice());
        assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), HEADERS);
        let rows: Vec<::csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "2021");
        assert_eq!(&rows[1][1], "Commas, \"quotes\"");
        assert_eq!(&rows[1][2], "line one\nline two");
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
