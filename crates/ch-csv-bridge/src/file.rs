//! CSV file endpoints.
//!
//! [`CsvSink`] writes a header plus records; [`CsvSource`] reads the header
//! once and then hands out records in bounded batches. Both are synchronous
//! and are driven from blocking threads by the transfer engine.

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

const BOM: char = '\u{feff}';

/// Buffered CSV writer. Fields are quoted only when they need it (RFC 4180).
pub struct CsvSink {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
    records: u64,
}

impl CsvSink {
    /// Create or truncate the file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .from_writer(BufWriter::new(file));
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            records: 0,
        })
    }

    pub fn write_header<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.writer
            .write_record(names.iter().map(|n| n.as_ref().as_bytes()))?;
        Ok(())
    }

    pub fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        self.writer
            .write_record(fields.iter().map(|f| f.as_ref().as_bytes()))?;
        self.records += 1;
        Ok(())
    }

    /// Data records written so far (header excluded).
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Records read from a file, with the 1-based number of the first one.
#[derive(Debug)]
pub struct TextBatch {
    pub first_row: u64,
    pub records: Vec<Vec<String>>,
}

/// Buffered CSV reader positioned after the header line.
pub struct CsvSource {
    reader: csv::Reader<BufReader<File>>,
    header: Vec<String>,
    rows_read: u64,
    record: StringRecord,
}

impl std::fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSource")
            .field("header", &self.header)
            .field("rows_read", &self.rows_read)
            .finish()
    }
}

impl CsvSource {
    /// Open a file and read its header line.
    ///
    /// Fails with `NotFound` if the file does not exist. A file with no
    /// header line yields an empty header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::file_not_found(path.display().to_string())
            } else {
                BridgeError::Io(e)
            }
        })?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if let Some(first) = header.first_mut() {
            if let Some(stripped) = first.strip_prefix(BOM) {
                *first = stripped.to_string();
            }
        }
        if header.len() == 1 && header[0].is_empty() {
            header.clear();
        }

        Ok(Self {
            reader,
            header,
            rows_read: 0,
            record: StringRecord::new(),
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows consumed so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read up to `max` records. Returns `None` at end of file.
    pub fn next_batch(&mut self, max: usize) -> Result<Option<TextBatch>> {
        let first_row = self.rows_read + 1;
        let mut records = Vec::with_capacity(max.min(4096));
        while records.len() < max.max(1) {
            if !self.reader.read_record(&mut self.record)? {
                break;
            }
            self.rows_read += 1;
            records.push(self.record.iter().map(str::to_string).collect());
        }
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(TextBatch { first_row, records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_sink_quotes_only_when_needed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_header(&["name", "note"]).unwrap();
        sink.write_record(&["Ann", "plain"]).unwrap();
        sink.write_record(&["Bob", "has, comma"]).unwrap();
        sink.write_record(&["Cy", "say \"hi\""]).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.records(), 3);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "name,note\nAnn,plain\nBob,\"has, comma\"\nCy,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_source_batches_and_row_numbers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "in.csv", "a,b\n1,2\n3,4\n5,6\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.header(), &["a".to_string(), "b".to_string()]);

        let first = source.next_batch(2).unwrap().unwrap();
        assert_eq!(first.first_row, 1);
        assert_eq!(first.records.len(), 2);

        let second = source.next_batch(2).unwrap().unwrap();
        assert_eq!(second.first_row, 3);
        assert_eq!(second.records, vec![vec!["5".to_string(), "6".to_string()]]);

        assert!(source.next_batch(2).unwrap().is_none());
        assert_eq!(source.rows_read(), 3);
    }

    #[test]
    fn test_source_strips_bom_and_tolerates_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bom.csv", "\u{feff}id,name\n1\n2,Ann,extra\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.header()[0], "id");
        let batch = source.next_batch(10).unwrap().unwrap();
        assert_eq!(batch.records[0].len(), 1);
        assert_eq!(batch.records[1].len(), 3);
    }

    #[test]
    fn test_source_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CsvSource::open(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { kind: "File", .. }));
    }

    #[test]
    fn test_source_empty_file_has_empty_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        let source = CsvSource::open(&path).unwrap();
        assert!(source.header().is_empty());
    }
}
