// Newline-delimited JSON result files.
//
// Without a chunk size everything goes to `<prefix>.json`. With one, items
// are split across `<prefix>_<YYYY-mm-ddTHH_MM_SS>_<n>.json` files of at most
// `results_per_file` items each; the index keeps names unique when several
// chunks open within the same second.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

const FILE_TIME_FORMAT: &str = "%Y-%m-%dT%H_%M_%S";

pub struct ResultWriter {
    prefix: String,
    results_per_file: Option<u64>,
    started: DateTime<Utc>,
    current: Option<BufWriter<File>>,
    in_current: u64,
    files: Vec<PathBuf>,
}

impl ResultWriter {
    /// A zero chunk size means no chunking.
    pub fn new(prefix: &str, results_per_file: Option<u64>, started: DateTime<Utc>) -> Self {
        Self {
            prefix: prefix.to_string(),
            results_per_file: results_per_file.filter(|n| *n > 0),
            started,
            current: None,
            in_current: 0,
            files: Vec::new(),
        }
    }

    pub fn write(&mut self, item: &Value) -> Result<()> {
        let chunk_full = self
            .results_per_file
            .is_some_and(|limit| self.in_current >= limit);
        if self.current.is_none() || chunk_full {
            self.open_next()?;
        }

        if let Some(out) = self.current.as_mut() {
            serde_json::to_writer(&mut *out, item).context("Failed to serialize result")?;
            out.write_all(b"\n")?;
        }
        self.in_current += 1;
        Ok(())
    }

    /// Flush and return the paths written, in order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.flush_current()?;
        Ok(self.files)
    }

    fn open_next(&mut self) -> Result<()> {
        self.flush_current()?;

        let path = match self.results_per_file {
            None => PathBuf::from(format!("{}.json", self.prefix)),
            Some(_) => PathBuf::from(format!(
                "{}_{}_{}.json",
                self.prefix,
                self.started.format(FILE_TIME_FORMAT),
                self.files.len() + 1
            )),
        };

        info!(file = %path.display(), "Writing results");
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.current = Some(BufWriter::new(file));
        self.in_current = 0;
        self.files.push(path);
        Ok(())
    }

    fn flush_current(&mut self) -> Result<()> {
        if let Some(mut out) = self.current.take() {
            out.flush().context("Failed to flush results file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snowbot-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_single_file() {
        let dir = scratch_dir("single");
        let prefix = dir.join("out").display().to_string();

        let mut writer = ResultWriter::new(&prefix, None, started());
        for i in 0..3 {
            writer.write(&json!({"id": i})).unwrap();
        }
        let files = writer.finish().unwrap();

        assert_eq!(files, vec![PathBuf::from(format!("{prefix}.json"))]);
        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(content, "{\"id\":0}\n{\"id\":1}\n{\"id\":2}\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_chunked_files() {
        let dir = scratch_dir("chunked");
        let prefix = dir.join("snow").display().to_string();

        let mut writer = ResultWriter::new(&prefix, Some(2), started());
        for i in 0..5 {
            writer.write(&json!({"id": i})).unwrap();
        }
        let files = writer.finish().unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(
            files[0],
            PathBuf::from(format!("{prefix}_2024-01-15T03_00_00_1.json"))
        );
        let last = std::fs::read_to_string(&files[2]).unwrap();
        assert_eq!(last.lines().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_no_items_no_files() {
        let writer = ResultWriter::new("unused", Some(10), started());
        assert!(writer.finish().unwrap().is_empty());
    }
}
