//! Per-run CSV summary: header first, then one flushed row per evaluated agent.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};

use crate::schema::{AgentRecord, SUMMARY_HEADER};

/// Append-only summary sink.
///
/// Every row is flushed as soon as it is written, so a crash leaves all rows
/// recorded before it on disk.
pub struct SummaryWriter {
    path: PathBuf,
    writer: Writer<File>,
    rows: u64,
}

impl SummaryWriter {
    /// Create a new summary file and write its header.
    ///
    /// Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SummaryError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(SUMMARY_HEADER)?;
        writer.flush()?;

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Append one record.
    pub fn append(&mut self, record: &AgentRecord) -> Result<(), SummaryError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
impl SummaryWriter {
    /// Send further rows to `file` instead of the summary file.
    pub(crate) fn redirect(&mut self, file: File) {
        self.writer = WriterBuilder::new().has_headers(false).from_writer(file);
    }
}

/// Read every record of a summary file.
pub fn read_summary<P: AsRef<Path>>(path: P) -> Result<Vec<AgentRecord>, SummaryError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?;
    if !headers.iter().eq(SUMMARY_HEADER) {
        return Err(SummaryError::HeaderMismatch(
            headers.iter().collect::<Vec<_>>().join(","),
        ));
    }

    reader
        .deserialize()
        .collect::<Result<Vec<AgentRecord>, _>>()
        .map_err(SummaryError::from)
}

/// Summary persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unexpected summary header: {0}")]
    HeaderMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KfGenome;
    use std::fs;
    use tempfile::tempdir;

    fn record(id: u64, generation: u32, fitness: f64) -> AgentRecord {
        let genome = KfGenome::from_array(std::array::from_fn(|i| 0.1 * (i as f64 + id as f64)));
        AgentRecord::new(id, generation, &genome, fitness)
    }

    #[test]
    fn test_header_written_on_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let writer = SummaryWriter::create(&path).unwrap();
        assert_eq!(writer.rows(), 0);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "agent_id,generation_number,p_11,p_22,p_33,p_44,q_11,q_22,q_33,q_44,r_11,r_22,r_33,r_44,fitness\n"
        );
        assert!(read_summary(&path).unwrap().is_empty());
    }

    #[test]
    fn test_rows_visible_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let mut writer = SummaryWriter::create(&path).unwrap();

        writer.append(&record(1, 0, 3.5)).unwrap();
        // Still open, row must already be on disk.
        let lines = fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 2);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let records = vec![record(1, 0, 3.5), record(2, 0, 1e-7), record(3, 1, 12345.678)];

        let mut writer = SummaryWriter::create(&path).unwrap();
        for r in &records {
            writer.append(r).unwrap();
        }
        assert_eq!(writer.rows(), 3);
        drop(writer);

        assert_eq!(read_summary(&path).unwrap(), records);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        fs::write(&path, "keep me\n").unwrap();

        assert!(matches!(
            SummaryWriter::create(&path),
            Err(SummaryError::Io(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me\n");
    }

    #[test]
    fn test_read_rejects_foreign_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "id,score\n1,2.0\n").unwrap();

        assert!(matches!(
            read_summary(&path),
            Err(SummaryError::HeaderMismatch(_))
        ));
    }
}
