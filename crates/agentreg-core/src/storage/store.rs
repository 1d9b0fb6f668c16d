use crate::model::Record;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only record persistence, partitioned by UTC day:
/// `<dir>/YYYYMMDD.jsonl`, one record per line.
///
/// The runner is the sole writer within a run; reads happen between CLI
/// phases, so no locking is needed. A torn trailing line from a crashed
/// writer is detected as a JSON parse error and discarded on read.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one record to its day partition. The handle is opened fresh
    /// per write with append semantics.
    pub fn append(&self, record: &Record) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log dir {}", self.dir.display()))?;
        let path = self.partition_path(&record.timestamp);
        let mut line = serde_json::to_string(record).context("failed to serialize record")?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }

    fn partition_path(&self, ts: &DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("{}.jsonl", ts.format("%Y%m%d")))
    }

    /// Read every record under the log directory. A missing directory is an
    /// empty store. Unparseable lines are discarded with a warning.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to read log dir {}", self.dir.display())))
            }
        };
        files.sort();

        let mut records = Vec::new();
        for path in files {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            for (line_no, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Record>(line) {
                    Ok(r) => records.push(r),
                    Err(e) => {
                        tracing::warn!(
                            file = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "discarding unparseable record line"
                        );
                    }
                }
            }
        }
        Ok(records)
    }

    /// Records belonging to one run, in no particular order.
    pub fn read_run(&self, run_id: &str) -> Result<Vec<Record>> {
        let mut records = self.read_all()?;
        records.retain(|r| r.run_id == run_id);
        Ok(records)
    }

    /// Records with `timestamp ∈ [start, end)`.
    pub fn read_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Record>> {
        let mut records = self.read_all()?;
        records.retain(|r| r.timestamp >= start && r.timestamp < end);
        Ok(records)
    }

    /// The run whose newest record has the greatest timestamp. Timestamp ties
    /// are broken by the greater run_id so the answer is deterministic.
    pub fn read_latest_run(&self) -> Result<Option<(String, Vec<Record>)>> {
        let records = self.read_all()?;
        let latest = records
            .iter()
            .max_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.run_id.cmp(&b.run_id))
            })
            .map(|r| r.run_id.clone());
        Ok(latest.map(|run_id| {
            let run_records: Vec<Record> =
                records.iter().filter(|r| r.run_id == run_id).cloned().collect();
            (run_id, run_records)
        }))
    }
}
