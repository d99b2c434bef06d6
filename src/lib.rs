//! Convert annotated PGN games into lc0 V6 supervised training containers.

pub mod annotation;
pub mod batcher;
pub mod board;
pub mod builder;
pub mod config;
pub mod container;
pub mod dedup;
pub mod encoder;
pub mod error;
pub mod eval;
pub mod pipeline;
pub mod policy;
pub mod reader;
pub mod replay;
pub mod sample;
pub mod score;
pub mod translate;
pub mod types;
pub mod visitor;

pub use batcher::{BatcherStats, ChunkBatcher};
pub use builder::{SampleInput, TrainingSampleBuilder};
pub use config::{Compression, Config, OutputStrategy, Policy};
pub use encoder::{InputFormat, Lc0PlaneEncoder, PlaneEncoder};
pub use error::{ConvertError, ErrorAccumulator};
pub use pipeline::{ConvertStats, Pipeline};
pub use replay::{GameReplayer, ReplayOptions, ReplayReport, ReplayState, SampleSink};
pub use sample::TrainingSample;
pub use types::{GameRecord, GameResult, MoveRecord};
