//! Directory-backed storage for grid runs.
//!
//! Each run is a directory holding `manifest.json` and an append-only
//! `timeseries.jsonl` with one emission per line, growing along the time
//! dimension as the run progresses.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use sf_engine::{EngineResult, OutputSink, PixelSnapshot};

use crate::types::{RunManifest, TimeseriesRecord};
use crate::{ResultsError, ResultsResult};

pub struct GridStore {
    root_dir: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl GridStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self {
            root_dir,
            writer: None,
        })
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join("manifest.json").exists()
    }

    /// Write the manifest and open the run's timeseries for appending.
    /// Subsequent [`OutputSink::emit`] calls stream into it.
    pub fn create_run(&mut self, manifest: &RunManifest) -> ResultsResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(run_dir.join("manifest.json"), manifest_json)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.join("timeseries.jsonl"))?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn append(&mut self, record: &TimeseriesRecord) -> ResultsResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ResultsError::RunNotFound {
                run_id: "no open run".to_string(),
            });
        };
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id).join("manifest.json");
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_timeseries(&self, run_id: &str) -> ResultsResult<Vec<TimeseriesRecord>> {
        let path = self.run_dir(run_id).join("timeseries.jsonl");
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(line)?);
            }
        }
        Ok(records)
    }

    pub fn list_runs(&self) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        if !self.root_dir.exists() {
            return Ok(runs);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}

impl OutputSink for GridStore {
    fn emit(&mut self, timestamp: DateTime<Utc>, snapshots: &[PixelSnapshot]) -> EngineResult<()> {
        self.append(&TimeseriesRecord {
            timestamp,
            snapshots: snapshots.to_vec(),
        })?;
        Ok(())
    }
}
