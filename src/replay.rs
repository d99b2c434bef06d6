//! Replays one game move by move and turns every usable ply into a
//! training record.

use crate::annotation::{interpret, suffix_glyph};
use crate::board::{GamePosition, PositionHistory, clean_san};
use crate::builder::{SampleInput, TrainingSampleBuilder};
use crate::config::Policy;
use crate::encoder::{Lc0PlaneEncoder, PlaneEncoder};
use crate::error::{ConvertError, ErrorAccumulator};
use crate::eval;
use crate::sample::TrainingSample;
use crate::score::{eval_to_win_probability, static_eval_to_win_probability};
use crate::types::GameRecord;
use log::{Level, debug, log};

/// Receives samples in the order they were built.
pub trait SampleSink {
    fn accept(&mut self, sample: TrainingSample) -> Result<(), ConvertError>;
}

impl SampleSink for Vec<TrainingSample> {
    fn accept(&mut self, sample: TrainingSample) -> Result<(), ConvertError> {
        self.push(sample);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayState {
    #[default]
    NotStarted,
    Replaying,
    Finished,
    Aborted,
}

/// How one game went.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub state: ReplayState,
    pub plies_read: u32,
    pub samples_emitted: u32,
    /// Illegal plies passed over under [`Policy::Skip`].
    pub plies_skipped: u32,
    pub bad_moves_suppressed: u32,
    pub evals_missing: u32,
    pub errors: ErrorAccumulator,
}

impl ReplayReport {
    pub fn is_aborted(&self) -> bool {
        self.state == ReplayState::Aborted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Log every ply at `debug` instead of `trace`.
    pub verbose: bool,
    /// Use `%eval` comments as value targets and drop badly annotated moves.
    pub evaluation_gated: bool,
    pub illegal_move_policy: Policy,
    pub missing_eval_policy: Policy,
    /// Fall back to the static evaluator when evaluations are not gated.
    pub static_eval: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            evaluation_gated: false,
            illegal_move_policy: Policy::Abort,
            missing_eval_policy: Policy::Skip,
            static_eval: false,
        }
    }
}

impl ReplayOptions {
    pub fn ply_log_level(&self) -> Level {
        if self.verbose {
            Level::Debug
        } else {
            Level::Trace
        }
    }
}

pub struct GameReplayer<'a, E = Lc0PlaneEncoder> {
    builder: &'a TrainingSampleBuilder<E>,
    options: ReplayOptions,
}

impl<'a, E: PlaneEncoder> GameReplayer<'a, E> {
    pub fn new(builder: &'a TrainingSampleBuilder<E>, options: ReplayOptions) -> Self {
        Self { builder, options }
    }

    /// Replay `game`, handing each sample to `sink`.
    ///
    /// Problems with the game itself end up in the report; only a failing
    /// sink is returned as an error.
    pub fn replay<S: SampleSink + ?Sized>(
        &self,
        game: &GameRecord,
        sink: &mut S,
    ) -> Result<ReplayReport, ConvertError> {
        let mut report = ReplayReport::default();
        if let Some(parse_error) = game.parse_error.as_deref() {
            report.errors.push(parse_error);
        }

        let start = match GamePosition::from_fen(game.starting_fen()) {
            Ok(start) => start,
            Err(e) => {
                report.errors.push(&e.to_string());
                report.state = ReplayState::Aborted;
                debug!("Game end: event={:?}; state=Aborted", game.event);
                return Ok(report);
            }
        };
        let ply_level = self.options.ply_log_level();
        let mut history = PositionHistory::new(start);
        report.state = ReplayState::Replaying;

        for (ply, record) in game.moves.iter().enumerate() {
            let ply = ply + 1;
            report.plies_read += 1;
            let san = clean_san(&record.text);
            log!(ply_level, "Read move: ply={ply}; san={san}");

            let position = history.last();
            let Some(played) = position.parse_san(san).filter(|m| position.is_legal(m)) else {
                report
                    .errors
                    .push(&format!("ply {ply}: illegal move '{}'", record.text.trim()));
                match self.options.illegal_move_policy {
                    Policy::Skip => {
                        debug!("Skipping illegal move: ply={ply}; san={san}");
                        report.plies_skipped += 1;
                        continue;
                    }
                    Policy::Abort => {
                        report.state = ReplayState::Aborted;
                        break;
                    }
                }
            };

            let nag = record.nag.or_else(|| suffix_glyph(&record.text));
            let annotation = interpret(nag, record.comment.as_deref());
            let value = if self.options.evaluation_gated {
                match annotation.raw_score {
                    Some(score) => Some(eval_to_win_probability(score)),
                    None => {
                        report.evals_missing += 1;
                        let reason = if annotation.has_comment {
                            "comment without %eval"
                        } else {
                            "no comment"
                        };
                        report.errors.push(&format!("ply {ply}: {reason}"));
                        if self.options.missing_eval_policy == Policy::Abort {
                            report.state = ReplayState::Aborted;
                            break;
                        }
                        None
                    }
                }
            } else if self.options.static_eval {
                let centipawns = eval::evaluate(position);
                let white_relative = if position.is_black_to_move() {
                    -centipawns
                } else {
                    centipawns
                };
                Some(static_eval_to_win_probability(white_relative))
            } else {
                Some(0.0)
            };

            let suppressed = self.options.evaluation_gated && annotation.is_bad_move;
            if suppressed {
                log!(ply_level, "Suppressing annotated bad move: ply={ply}; san={san}");
                report.bad_moves_suppressed += 1;
            }

            if let (Some(value), false) = (value, suppressed) {
                let legal_moves = position.legal_moves();
                let sample = self.builder.build(&SampleInput {
                    result: game.result,
                    history: &history,
                    played: &played,
                    best: None,
                    legal_moves: &legal_moves,
                    value,
                    visits: None,
                });
                sink.accept(sample)?;
                report.samples_emitted += 1;
            }

            history.append(played);
        }

        if report.state == ReplayState::Replaying {
            report.state = ReplayState::Finished;
        }
        debug!(
            "Game end: event={:?}; state={:?}; plies={}; samples={}",
            game.event, report.state, report.plies_read, report.samples_emitted
        );
        Ok(report)
    }
}
