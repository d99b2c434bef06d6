//! Reading written containers back.

use crate::error::ConvertError;
use crate::sample::TrainingSample;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// Running number `n` of a `training.n.gz` container.
fn container_index(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix("training.")?
        .strip_suffix(".gz")?
        .parse()
        .ok()
}

/// Every `*.gz` file below `root`, in write order: by container number, then
/// by path for files outside the `training.n.gz` scheme.
pub fn find_containers(root: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let pattern = root.join("**").join("*.gz");
    let pattern = pattern.to_string_lossy();
    let invalid = |reason: String| ConvertError::Pattern {
        pattern: pattern.to_string(),
        reason,
    };

    let mut paths = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| invalid(e.to_string()))? {
        let path = entry.map_err(|e| invalid(e.to_string()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| (container_index(a), a).cmp(&(container_index(b), b)));
    Ok(paths)
}

pub fn read_container(path: &Path) -> Result<Vec<TrainingSample>, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut reader = BufReader::new(MultiGzDecoder::new(file));

    let mut samples = Vec::new();
    loop {
        match TrainingSample::read_from(&mut reader) {
            Ok(Some(sample)) => samples.push(sample),
            Ok(None) => break,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ConvertError::MalformedRecord {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(ConvertError::io(path, e)),
        }
    }
    Ok(samples)
}

/// All samples below `root`, container by container.
pub fn read_containers(root: &Path) -> Result<Vec<TrainingSample>, ConvertError> {
    let mut samples = Vec::new();
    for path in find_containers(root)? {
        samples.extend(read_container(&path)?);
    }
    Ok(samples)
}

/// Aggregate view of a set of containers, as printed by `inspect`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSummary {
    pub containers: usize,
    pub records: usize,
    /// Results from the side to move's point of view.
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub undecided: usize,
    pub mean_root_q: f64,
}

impl ContainerSummary {
    pub fn add(&mut self, sample: &TrainingSample) {
        self.records += 1;
        match (sample.result_q, sample.result_d) {
            (q, _) if q > 0.0 => self.wins += 1,
            (q, _) if q < 0.0 => self.losses += 1,
            (_, d) if d > 0.0 => self.draws += 1,
            _ => self.undecided += 1,
        }
        let n = self.records as f64;
        self.mean_root_q += (f64::from(sample.root_q) - self.mean_root_q) / n;
    }
}

pub fn summarize(root: &Path) -> Result<ContainerSummary, ConvertError> {
    let mut summary = ContainerSummary::default();
    for path in find_containers(root)? {
        summary.containers += 1;
        for sample in read_container(&path)? {
            summary.add(&sample);
        }
    }
    Ok(summary)
}
