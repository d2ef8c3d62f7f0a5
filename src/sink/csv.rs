use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{DetectionRecord, LogSink};
use crate::error::SinkError;

/// Appends `timestamp,class` rows to a CSV file, creating it when missing.
pub struct CsvLogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvLogSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open detection log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for CsvLogSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn append(&mut self, record: &DetectionRecord) -> Result<(), SinkError> {
        let line = format!(
            "{},{}\n",
            escape_field(&record.timestamp),
            escape_field(&record.class_name)
        );
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|err| SinkError::log("csv", format!("{}: {}", self.path.display(), err)))
    }
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_rows_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("detection_log.csv");

        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.append(&DetectionRecord::new("2024-05-01 08:30:00", "car"))
            .unwrap();
        drop(sink);
        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.append(&DetectionRecord::new("2024-05-01 08:30:06", "person"))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "2024-05-01 08:30:00,car\n2024-05-01 08:30:06,person\n"
        );
    }

    #[test]
    fn quotes_fields_with_separators() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
