//! PGN files in, containers out.
//!
//! Games are replayed in parallel batches on a rayon pool. A single writer
//! thread owns the [`ChunkBatcher`] and receives samples one at a time over a
//! channel bounded by sample count, in input order.

use crate::batcher::{BatcherStats, ChunkBatcher};
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::ConvertError;
use crate::reader::{PgnGames, expand_inputs};
use crate::replay::{GameReplayer, ReplayReport, SampleSink};
use crate::sample::TrainingSample;
use crate::types::GameRecord;
use crossbeam::channel::{Receiver, Sender, bounded};
use indicatif::ProgressBar;
use log::{debug, info};
use rayon::prelude::*;
use std::thread;

const GAMES_PER_BATCH: usize = 64;
/// Samples queued for the writer at most.
const CHANNEL_CAPACITY: usize = 1024;

enum WriterMessage {
    Sample(TrainingSample),
    EndGame,
}

/// Totals for one conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub games: u64,
    pub games_aborted: u64,
    pub plies_read: u64,
    pub plies_skipped: u64,
    pub evals_missing: u64,
    pub bad_moves_suppressed: u64,
    pub samples_emitted: u64,
    pub duplicates_dropped: u64,
    pub samples_written: u64,
    pub containers_written: u64,
}

impl ConvertStats {
    fn record(&mut self, report: &ReplayReport) {
        self.games += 1;
        if report.is_aborted() {
            self.games_aborted += 1;
        }
        self.plies_read += u64::from(report.plies_read);
        self.plies_skipped += u64::from(report.plies_skipped);
        self.evals_missing += u64::from(report.evals_missing);
        self.bad_moves_suppressed += u64::from(report.bad_moves_suppressed);
        self.samples_emitted += u64::from(report.samples_emitted);
    }
}

pub struct Pipeline {
    config: Config,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
        })
    }

    /// Report processed games on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Convert every game in the files named by `inputs` (paths or glob
    /// patterns).
    pub fn convert_files<S: AsRef<str>>(&self, inputs: &[S]) -> Result<ConvertStats, ConvertError> {
        let paths = expand_inputs(inputs)?;
        if paths.is_empty() {
            return Err(ConvertError::Config("no input files".to_string()));
        }
        self.run(PgnGames::new(paths, self.config.compression))
    }

    pub fn run<I>(&self, games: I) -> Result<ConvertStats, ConvertError>
    where
        I: IntoIterator<Item = Result<GameRecord, ConvertError>>,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| ConvertError::Config(e.to_string()))?;

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let batcher = ChunkBatcher::from_config(&self.config);
        let dedup = self.config.dedupe.then(Deduplicator::new);
        let writer = thread::spawn(move || write_games(receiver, batcher, dedup));

        let mut stats = ConvertStats::default();
        let fed = self.feed(&pool, games, &sender, &mut stats);
        drop(sender);

        // a writer failure explains any WriterGone seen while feeding
        let (written, dropped) = writer.join().map_err(|_| ConvertError::WriterGone)??;
        fed?;

        stats.samples_written = written.samples_written;
        stats.containers_written = written.containers_written;
        stats.duplicates_dropped = dropped;
        if let Some(progress) = &self.progress {
            progress.finish_with_message(format!(
                "{} samples in {} containers",
                stats.samples_written, stats.containers_written
            ));
        }
        info!(
            "Converted {} games ({} aborted) into {} samples across {} containers",
            stats.games, stats.games_aborted, stats.samples_written, stats.containers_written
        );
        Ok(stats)
    }

    fn feed<I>(
        &self,
        pool: &rayon::ThreadPool,
        games: I,
        sender: &Sender<WriterMessage>,
        stats: &mut ConvertStats,
    ) -> Result<(), ConvertError>
    where
        I: IntoIterator<Item = Result<GameRecord, ConvertError>>,
    {
        let builder = self.config.sample_builder();
        let replayer = GameReplayer::new(&builder, self.config.replay_options());

        let mut batch = Vec::with_capacity(GAMES_PER_BATCH);
        for game in games {
            batch.push(game?);
            if batch.len() == GAMES_PER_BATCH {
                self.replay_batch(pool, &replayer, &batch, sender, stats)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.replay_batch(pool, &replayer, &batch, sender, stats)?;
        }
        Ok(())
    }

    fn replay_batch(
        &self,
        pool: &rayon::ThreadPool,
        replayer: &GameReplayer<'_>,
        batch: &[GameRecord],
        sender: &Sender<WriterMessage>,
        stats: &mut ConvertStats,
    ) -> Result<(), ConvertError> {
        let outputs: Vec<Result<(ReplayReport, Vec<TrainingSample>), ConvertError>> =
            pool.install(|| {
                batch
                    .par_iter()
                    .map(|game| {
                        let mut samples = Vec::new();
                        let report = replayer.replay(game, &mut samples)?;
                        Ok((report, samples))
                    })
                    .collect()
            });

        for (game, output) in batch.iter().zip(outputs) {
            let (report, samples) = output?;
            if let Some(errors) = report.errors.as_deref() {
                debug!("Game diagnostics: event={:?}; {errors}", game.event);
            }
            stats.record(&report);
            let messages = samples
                .into_iter()
                .map(WriterMessage::Sample)
                .chain([WriterMessage::EndGame]);
            for message in messages {
                sender
                    .send(message)
                    .map_err(|_| ConvertError::WriterGone)?;
            }
        }

        if let Some(progress) = &self.progress {
            progress.set_position(stats.games);
            progress.set_message(format!("{} samples", stats.samples_emitted));
        }
        Ok(())
    }
}

fn write_games(
    receiver: Receiver<WriterMessage>,
    mut batcher: ChunkBatcher,
    mut dedup: Option<Deduplicator>,
) -> Result<(BatcherStats, u64), ConvertError> {
    for message in receiver {
        match message {
            WriterMessage::Sample(sample) => {
                if dedup.as_mut().is_none_or(|d| d.admit(&sample)) {
                    batcher.accept(sample)?;
                }
            }
            WriterMessage::EndGame => batcher.end_game()?,
        }
    }
    let dropped = dedup.map_or(0, |d| d.dropped());
    Ok((batcher.finalize()?, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputStrategy;
    use crate::container::read_containers;
    use crate::types::{GameResult, MoveRecord};
    use tempfile::TempDir;

    fn game(sans: &[&str]) -> Result<GameRecord, ConvertError> {
        Ok(GameRecord::new(
            GameResult::Draw,
            sans.iter().map(|san| MoveRecord::new(*san)).collect(),
        ))
    }

    fn config(dir: &TempDir) -> Config {
        Config {
            output_dir: dir.path().to_path_buf(),
            samples_per_container: 3,
            threads: 2,
            ..Config::default()
        }
    }

    #[test]
    fn test_samples_keep_game_order() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config(&dir)).unwrap();
        let stats = pipeline
            .run(vec![game(&["e4", "e5"]), game(&["d4", "d5", "c4"])])
            .unwrap();

        assert_eq!(stats.games, 2);
        assert_eq!(stats.samples_emitted, 5);
        assert_eq!(stats.samples_written, 5);
        assert_eq!(stats.containers_written, 2);

        let played: Vec<u16> = read_containers(dir.path())
            .unwrap()
            .iter()
            .map(|s| s.played_idx)
            .collect();
        assert_eq!(played[0], 322);
        assert_eq!(played[2], 293);
    }

    #[test]
    fn test_games_beyond_one_batch_keep_order() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(Config {
            output_strategy: OutputStrategy::PerGame,
            ..config(&dir)
        })
        .unwrap();
        let count = GAMES_PER_BATCH * 2 + 5;
        let games: Vec<_> = (0..count)
            .map(|i| if i % 2 == 0 { game(&["e4"]) } else { game(&["d4", "d5"]) })
            .collect();
        let stats = pipeline.run(games).unwrap();

        assert_eq!(stats.games, count as u64);
        assert_eq!(stats.containers_written, count as u64);

        let played: Vec<u16> = read_containers(dir.path())
            .unwrap()
            .iter()
            .map(|s| s.played_idx)
            .collect();
        assert_eq!(played.len(), count + count / 2);
        assert_eq!(&played[..4], &[322, 293, 293, 322]);
        assert_eq!(played[played.len() - 1], 322);
    }

    #[test]
    fn test_aborted_games_are_counted() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config(&dir)).unwrap();
        let stats = pipeline
            .run(vec![game(&["e4", "e5", "Ke2"]), game(&["e4", "e4"])])
            .unwrap();
        assert_eq!(stats.games, 2);
        assert_eq!(stats.games_aborted, 1);
        assert_eq!(stats.samples_written, 4);
    }

    #[test]
    fn test_dedupe_drops_repeated_positions() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(Config {
            dedupe: true,
            ..config(&dir)
        })
        .unwrap();
        let stats = pipeline
            .run(vec![game(&["e4", "e5"]), game(&["e4", "c5"])])
            .unwrap();

        assert_eq!(stats.samples_emitted, 4);
        // both games reach the position after 1. e4
        assert_eq!(stats.duplicates_dropped, 2);
        assert_eq!(stats.samples_written, 2);
    }

    #[test]
    fn test_reader_error_is_returned() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config(&dir)).unwrap();
        let failure = Err(ConvertError::Config("boom".to_string()));
        let err = pipeline.run(vec![game(&["e4"]), failure]).unwrap_err();

        assert!(matches!(err, ConvertError::Config(_)));
        assert!(read_containers(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Pipeline::new(Config {
            samples_per_container: 0,
            ..Config::default()
        });
        assert!(result.is_err());
    }
}
