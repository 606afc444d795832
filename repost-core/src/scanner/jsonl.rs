//! JSON-lines backlog export reader.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::MessageSource;
use crate::error::{RepostError, Result};
use crate::media::Message;

/// Reads one [`Message`] per line from an export file.
///
/// Blank lines are ignored. Lines that do not parse, including lines that
/// are not valid UTF-8, are logged and skipped, so one bad record does not
/// stop a backlog import.
pub struct JsonlMessageSource {
    reader: BufReader<File>,
    buf: Vec<u8>,
    batch_size: usize,
    line_no: usize,
    malformed: usize,
}

impl JsonlMessageSource {
    pub async fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| {
            RepostError::Source(format!("Cannot open {}: {e}", path.display()))
        })?;

        Ok(Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
            batch_size: batch_size.max(1),
            line_no: 0,
            malformed: 0,
        })
    }

    /// Lines skipped because they were not valid messages.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

#[async_trait]
impl MessageSource for JsonlMessageSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<Message>>> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                break;
            }
            self.line_no += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "Skipping export line that is not UTF-8");
                    self.malformed += 1;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Message>(line) {
                Ok(message) => batch.push(message),
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "Skipping malformed export line");
                    self.malformed += 1;
                }
            }
        }

        Ok((!batch.is_empty()).then_some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn line(id: u32) -> String {
        format!(
            r#"{{"id":"{id}","channel_id":"c","author_id":"a","timestamp":"2024-01-01T00:00:00Z"}}"#
        )
    }

    #[tokio::test]
    async fn test_reads_in_batches_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for id in 0..5 {
            writeln!(file, "{}", line(id)).unwrap();
        }
        writeln!(file).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file, "{}", line(5)).unwrap();

        let mut source = JsonlMessageSource::open(file.path(), 4).await.unwrap();
        let first = source.next_batch().await.unwrap().unwrap();
        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].reference.id, "5");
        assert!(source.next_batch().await.unwrap().is_none());
        assert_eq!(source.malformed(), 1);
    }

    #[tokio::test]
    async fn test_skips_line_with_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", line(0)).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        write!(file, "{}", line(1)).unwrap();

        let mut source = JsonlMessageSource::open(file.path(), 10).await.unwrap();
        let batch = source.next_batch().await.unwrap().unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.reference.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
        assert_eq!(source.malformed(), 1);
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = JsonlMessageSource::open("/nonexistent/export.jsonl", 10)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RepostError::Source(_)));
    }
}
