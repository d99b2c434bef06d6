//! Conversion settings, shared by the command line and library callers.

use crate::builder::TrainingSampleBuilder;
use crate::encoder::InputFormat;
use crate::error::ConvertError;
use crate::replay::ReplayOptions;
use clap::{Args, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// What to do with the rest of a game once a ply cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Drop the ply and carry on with the next one.
    Skip,
    /// Stop the game; samples already emitted are kept.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputStrategy {
    /// Fill containers across games.
    #[default]
    Rotating,
    /// One container per game.
    PerGame,
}

/// Compression of the PGN input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Compression {
    /// zstd for `.zst` files, plain text otherwise.
    #[default]
    Auto,
    Zstd,
    Plain,
}

/// Log filter used when `CHESS_LOG` is unset. `verbose` opens it to `debug`,
/// where the per-move lines are logged.
pub fn default_log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Log every ply and container write
    #[arg(short, long)]
    pub verbose: bool,

    /// Take value targets from `[%eval]` comments and drop badly annotated moves
    #[arg(long, alias = "lichess-mode")]
    pub evaluation_gated: bool,

    /// Containers per output directory before rolling to the next one
    #[arg(long, default_value_t = 10_000)]
    pub max_containers_per_directory: u64,

    /// Samples per container
    #[arg(long, default_value_t = 4096)]
    pub samples_per_container: usize,

    /// Name prefix of the numbered output directories
    #[arg(long, default_value = "supervised-")]
    pub output_prefix: String,

    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputStrategy::Rotating)]
    pub output_strategy: OutputStrategy,

    /// lc0 input format code (1, 2, 3, 4, 5, 132 or 133)
    #[arg(long, default_value_t = InputFormat::Classical)]
    pub input_format: InputFormat,

    #[arg(long, value_enum, default_value_t = Policy::Abort)]
    pub illegal_move_policy: Policy,

    #[arg(long, value_enum, default_value_t = Policy::Skip)]
    pub missing_eval_policy: Policy,

    /// Score positions with the built-in evaluator when evaluations are not gated
    #[arg(long)]
    pub static_eval: bool,

    /// Keep only the first sample of every distinct position
    #[arg(long)]
    pub dedupe: bool,

    /// Worker threads; 0 uses one per core
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    #[arg(long, value_enum, default_value_t = Compression::Auto)]
    pub compression: Compression,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            evaluation_gated: false,
            max_containers_per_directory: 10_000,
            samples_per_container: 4096,
            output_prefix: "supervised-".to_string(),
            output_dir: PathBuf::from("."),
            output_strategy: OutputStrategy::Rotating,
            input_format: InputFormat::Classical,
            illegal_move_policy: Policy::Abort,
            missing_eval_policy: Policy::Skip,
            static_eval: false,
            dedupe: false,
            threads: 0,
            compression: Compression::Auto,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.samples_per_container == 0 {
            return Err(ConvertError::Config(
                "samples_per_container must be at least 1".to_string(),
            ));
        }
        if self.max_containers_per_directory == 0 {
            return Err(ConvertError::Config(
                "max_containers_per_directory must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        default_log_level(self.verbose)
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            verbose: self.verbose,
            evaluation_gated: self.evaluation_gated,
            illegal_move_policy: self.illegal_move_policy,
            missing_eval_policy: self.missing_eval_policy,
            static_eval: self.static_eval,
        }
    }

    /// Drift correction only matters for evaluation-derived targets.
    pub fn sample_builder(&self) -> TrainingSampleBuilder {
        TrainingSampleBuilder::new(self.input_format, self.evaluation_gated)
    }
}
