//! Groups samples into gzip containers and rotates them across numbered
//! directories.

use crate::config::{Config, OutputStrategy};
use crate::error::ConvertError;
use crate::replay::SampleSink;
use crate::sample::TrainingSample;
use flate2::Compression;
use flate2::write::GzEncoder;
use log::debug;
use std::collections::VecDeque;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Totals reported by [`ChunkBatcher::finalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    pub containers_written: u64,
    pub samples_written: u64,
}

pub struct ChunkBatcher {
    output_dir: PathBuf,
    prefix: String,
    samples_per_container: usize,
    max_containers_per_directory: u64,
    strategy: OutputStrategy,
    pending: VecDeque<TrainingSample>,
    stats: BatcherStats,
}

impl ChunkBatcher {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        samples_per_container: usize,
        max_containers_per_directory: u64,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            samples_per_container: samples_per_container.max(1),
            max_containers_per_directory: max_containers_per_directory.max(1),
            strategy: OutputStrategy::Rotating,
            pending: VecDeque::new(),
            stats: BatcherStats::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.output_dir,
            &config.output_prefix,
            config.samples_per_container,
            config.max_containers_per_directory,
        )
        .with_strategy(config.output_strategy)
    }

    pub fn with_strategy(mut self, strategy: OutputStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> BatcherStats {
        self.stats
    }

    /// Queue samples behind everything enqueued so far.
    pub fn enqueue<I: IntoIterator<Item = TrainingSample>>(&mut self, samples: I) {
        self.pending.extend(samples);
    }

    /// Write out full containers while more than one container's worth is
    /// queued. With `force`, also write the remainder as a short container.
    pub fn flush(&mut self, force: bool) -> Result<(), ConvertError> {
        while self.pending.len() > self.samples_per_container {
            let batch: Vec<_> = self.pending.drain(..self.samples_per_container).collect();
            self.write_container(&batch)?;
        }
        if force && !self.pending.is_empty() {
            let batch: Vec<_> = self.pending.drain(..).collect();
            self.write_container(&batch)?;
        }
        Ok(())
    }

    /// Close off the current game. Per-game output writes its samples now.
    pub fn end_game(&mut self) -> Result<(), ConvertError> {
        match self.strategy {
            OutputStrategy::PerGame => self.flush(true),
            OutputStrategy::Rotating => self.flush(false),
        }
    }

    /// Write everything still queued and return the run totals.
    pub fn finalize(mut self) -> Result<BatcherStats, ConvertError> {
        self.flush(true)?;
        Ok(self.stats)
    }

    /// Path of the `index`-th container of this run.
    pub fn container_path(&self, index: u64) -> PathBuf {
        let directory = format!(
            "{}{}",
            self.prefix,
            index / self.max_containers_per_directory
        );
        self.output_dir
            .join(directory)
            .join(format!("training.{index}.gz"))
    }

    fn write_container(&mut self, batch: &[TrainingSample]) -> Result<(), ConvertError> {
        let path = self.container_path(self.stats.containers_written);
        debug!("Write chunk: path={}; samples={}", path.display(), batch.len());
        write_container(&path, batch)?;
        self.stats.containers_written += 1;
        self.stats.samples_written += batch.len() as u64;
        Ok(())
    }
}

impl SampleSink for ChunkBatcher {
    fn accept(&mut self, sample: TrainingSample) -> Result<(), ConvertError> {
        self.pending.push_back(sample);
        if self.strategy == OutputStrategy::Rotating {
            self.flush(false)?;
        }
        Ok(())
    }
}

/// Write `samples` as one gzip container. The file only appears under its
/// final name once it is complete.
pub fn write_container(path: &Path, samples: &[TrainingSample]) -> Result<(), ConvertError> {
    let directory = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(directory).map_err(|e| ConvertError::io(directory, e))?;

    let tmp = NamedTempFile::new_in(directory).map_err(|e| ConvertError::io(directory, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(tmp), Compression::default());
    for sample in samples {
        sample
            .write_to(&mut encoder)
            .map_err(|e| ConvertError::io(path, e))?;
    }
    let mut writer = encoder.finish().map_err(|e| ConvertError::io(path, e))?;
    writer.flush().map_err(|e| ConvertError::io(path, e))?;
    let tmp = writer
        .into_inner()
        .map_err(|e| ConvertError::io(path, e.into_error()))?;
    tmp.persist(path)
        .map_err(|e| ConvertError::io(path, e.error))?;
    Ok(())
}
