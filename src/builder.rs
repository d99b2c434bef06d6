//! Assembly of one training record for one played move.

use crate::board::PositionHistory;
use crate::encoder::{InputFormat, Lc0PlaneEncoder, PlaneEncoder, reverse_bits_in_bytes};
use crate::score::drift_correct;
use crate::sample::{TrainingSample, V6_VERSION};
use crate::translate::{FLIP_TRANSFORM, translate};
use crate::types::GameResult;
use log::warn;
use shakmaty::{CastlingSide, Move};

/// Everything known about one ply when its record is built.
pub struct SampleInput<'a> {
    pub result: GameResult,
    pub history: &'a PositionHistory,
    pub played: &'a Move,
    /// Move a search preferred; the played move when absent.
    pub best: Option<&'a Move>,
    pub legal_moves: &'a [Move],
    /// Expected outcome relative to White, in `[-1, 1]`.
    pub value: f32,
    /// Search visits; 1 for a plain played move when absent.
    pub visits: Option<u32>,
}

pub struct TrainingSampleBuilder<E = Lc0PlaneEncoder> {
    encoder: E,
    input_format: InputFormat,
    drift_correction: bool,
}

impl TrainingSampleBuilder<Lc0PlaneEncoder> {
    pub fn new(input_format: InputFormat, drift_correction: bool) -> Self {
        Self::with_encoder(Lc0PlaneEncoder, input_format, drift_correction)
    }
}

impl<E: PlaneEncoder> TrainingSampleBuilder<E> {
    pub fn with_encoder(encoder: E, input_format: InputFormat, drift_correction: bool) -> Self {
        Self {
            encoder,
            input_format,
            drift_correction,
        }
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    /// Build the record for the position at the end of `input.history`.
    ///
    /// `input.played` must be one of `input.legal_moves`.
    pub fn build(&self, input: &SampleInput<'_>) -> TrainingSample {
        let position = input.history.last();
        let chess = position.chess();
        let black_to_move = position.is_black_to_move();
        let encoded = self.encoder.encode(input.history, self.input_format);
        let transform = encoded.transform;

        let mut sample = TrainingSample {
            version: V6_VERSION,
            input_format: self.input_format.code(),
            ..TrainingSample::default()
        };

        for (stored, plane) in sample.planes.iter_mut().zip(encoded.planes) {
            *stored = reverse_bits_in_bytes(plane);
        }

        // probabilities default to -1 for illegal moves
        for m in input.legal_moves {
            match translate(m, chess).policy_index(transform) {
                Some(idx) => sample.probabilities[usize::from(idx)] = 0.0,
                None => warn!("Legal move {m:?} has no policy index"),
            }
        }

        debug_assert!(
            input.legal_moves.contains(input.played),
            "played move must be legal"
        );
        let played_idx = translate(input.played, chess).policy_index(transform);
        match played_idx {
            Some(idx) => sample.probabilities[usize::from(idx)] = 1.0,
            None => warn!("Played move {:?} has no policy index", input.played),
        }
        let best_idx = match input.best {
            Some(best) => translate(best, chess).policy_index(transform),
            None => played_idx,
        };
        sample.played_idx = played_idx.unwrap_or(0);
        sample.best_idx = best_idx.unwrap_or_else(|| {
            warn!("Best move has no policy index, using the played move's");
            sample.played_idx
        });

        let us = position.side_to_move();
        let them = !us;
        let castling = [
            position.castling_rook_file(us, CastlingSide::QueenSide),
            position.castling_rook_file(us, CastlingSide::KingSide),
            position.castling_rook_file(them, CastlingSide::QueenSide),
            position.castling_rook_file(them, CastlingSide::KingSide),
        ]
        .map(|rook_file| match rook_file {
            Some(file) if self.input_format.is_960_castling() => 1u8 << file,
            Some(_) => 1,
            None => 0,
        });
        [
            sample.castling_us_ooo,
            sample.castling_us_oo,
            sample.castling_them_ooo,
            sample.castling_them_oo,
        ] = castling;

        if self.input_format.is_canonical() {
            let ep = position
                .en_passant_square()
                .map_or(0u8, |sq| 1 << (sq.file() as u8));
            sample.side_to_move_or_enpassant = if transform & FLIP_TRANSFORM != 0 {
                ep.reverse_bits()
            } else {
                ep
            };
            sample.invariance_info = transform | if black_to_move { 0x80 } else { 0 };
        } else {
            sample.side_to_move_or_enpassant = u8::from(black_to_move);
            sample.invariance_info = 0;
        }
        sample.rule50_count = position.rule50_ply().min(u32::from(u8::MAX)) as u8;

        let (result_q, result_d) = match (input.result, black_to_move) {
            (GameResult::WhiteWon, false) | (GameResult::BlackWon, true) => (1.0, 0.0),
            (GameResult::WhiteWon, true) | (GameResult::BlackWon, false) => (-1.0, 0.0),
            (GameResult::Draw, _) => (0.0, 1.0),
            (GameResult::Unknown, _) => (0.0, 0.0),
        };
        sample.result_q = result_q;
        sample.result_d = result_d;

        let q = if black_to_move { -input.value } else { input.value };
        sample.root_q = q;
        sample.best_q = q;
        sample.played_q = q;
        sample.orig_q = q;

        sample.visits = input.visits.unwrap_or(1);

        if self.drift_correction {
            (sample.root_q, sample.root_d) = drift_correct(sample.root_q, sample.root_d);
            (sample.best_q, sample.best_d) = drift_correct(sample.best_q, sample.best_d);
            (sample.played_q, sample.played_d) = drift_correct(sample.played_q, sample.played_d);
            (sample.orig_q, sample.orig_d) = drift_correct(sample.orig_q, sample.orig_d);
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::GamePosition;
    use crate::score::{eval_to_win_probability, wdl};

    fn history_after(fen: Option<&str>, sans: &[&str]) -> PositionHistory {
        let start = match fen {
            Some(fen) => GamePosition::from_fen(fen).unwrap(),
            None => GamePosition::startpos(),
        };
        let mut history = PositionHistory::new(start);
        for san in sans {
            let m = history.last().parse_san(san).unwrap();
            history.append(m);
        }
        history
    }

    fn build(
        builder: &TrainingSampleBuilder,
        history: &PositionHistory,
        san: &str,
        result: GameResult,
        value: f32,
    ) -> TrainingSample {
        let played = history.last().parse_san(san).unwrap();
        let legal = history.last().legal_moves();
        builder.build(&SampleInput {
            result,
            history,
            played: &played,
            best: None,
            legal_moves: &legal,
            value,
            visits: None,
        })
    }

    #[test]
    fn test_probability_mask() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let history = history_after(None, &[]);
        let sample = build(&builder, &history, "e4", GameResult::WhiteWon, 0.0);

        assert_eq!(sample.probabilities.iter().filter(|&&p| p == 1.0).count(), 1);
        assert_eq!(sample.probabilities.iter().filter(|&&p| p == 0.0).count(), 19);
        assert!(
            sample
                .probabilities
                .iter()
                .all(|&p| p == -1.0 || p == 0.0 || p == 1.0)
        );
        assert_eq!(sample.played_policy_index(), Some(322));
        assert_eq!(sample.played_idx, 322);
        assert_eq!(sample.best_idx, 322);
    }

    #[test]
    fn test_result_relative_to_side_to_move() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let start = history_after(None, &[]);
        let white = build(&builder, &start, "e4", GameResult::WhiteWon, 0.0);
        assert_eq!((white.result_q, white.result_d), (1.0, 0.0));
        assert_eq!(white.side_to_move_or_enpassant, 0);

        let after_e4 = history_after(None, &["e4"]);
        let black = build(&builder, &after_e4, "e5", GameResult::WhiteWon, 0.0);
        assert_eq!((black.result_q, black.result_d), (-1.0, 0.0));
        assert_eq!(black.side_to_move_or_enpassant, 1);

        let draw = build(&builder, &after_e4, "e5", GameResult::Draw, 0.0);
        assert_eq!((draw.result_q, draw.result_d), (0.0, 1.0));

        let unknown = build(&builder, &after_e4, "e5", GameResult::Unknown, 0.0);
        assert_eq!((unknown.result_q, unknown.result_d), (0.0, 0.0));
    }

    #[test]
    fn test_value_target_is_negated_for_black() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let q = eval_to_win_probability(-1.5);

        let white = build(&builder, &history_after(None, &[]), "e4", GameResult::Draw, q);
        assert_eq!(white.root_q, q);
        assert_eq!(white.best_q, q);
        assert_eq!(white.played_q, q);
        assert_eq!(white.orig_q, q);
        assert_eq!(white.visits, 1);

        let black = build(&builder, &history_after(None, &["e4"]), "c5", GameResult::Draw, q);
        assert_eq!(black.root_q, -q);
    }

    #[test]
    fn test_drift_correction_keeps_targets_feasible() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, true);
        let sample = build(&builder, &history_after(None, &[]), "d4", GameResult::Draw, 1.4);
        for (q, d) in [
            (sample.root_q, sample.root_d),
            (sample.best_q, sample.best_d),
            (sample.played_q, sample.played_d),
            (sample.orig_q, sample.orig_d),
        ] {
            let (w, _, l) = wdl(q, d);
            assert!(w >= 0.0 && l >= 0.0);
            assert!((w - l - q).abs() < 1e-6);
            assert!(w + l <= 1.0 + 1e-6);
        }
        assert_eq!(sample.root_q, 1.0);
    }

    #[test]
    fn test_classical_castling_flags() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let history = history_after(None, &["e4", "e5", "Ke2"]);
        let sample = build(&builder, &history, "Nc6", GameResult::Draw, 0.0);
        // Black to move: us = Black keeps both rights, White lost them
        assert_eq!(sample.castling_us_ooo, 1);
        assert_eq!(sample.castling_us_oo, 1);
        assert_eq!(sample.castling_them_ooo, 0);
        assert_eq!(sample.castling_them_oo, 0);
    }

    #[test]
    fn test_960_castling_masks() {
        let builder = TrainingSampleBuilder::new(InputFormat::CastlingPlane, false);
        let sample = build(&builder, &history_after(None, &[]), "e4", GameResult::Draw, 0.0);
        assert_eq!(sample.castling_us_ooo, 1 << 0);
        assert_eq!(sample.castling_us_oo, 1 << 7);
        assert_eq!(sample.castling_them_ooo, 1 << 0);
        assert_eq!(sample.castling_them_oo, 1 << 7);
    }

    #[test]
    fn test_canonical_side_to_move_and_en_passant() {
        let builder = TrainingSampleBuilder::new(InputFormat::Canonical, false);
        // black pawn on d4 can take e3 en passant
        let history = history_after(Some("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1"), &["e4"]);
        let sample = build(&builder, &history, "dxe3", GameResult::BlackWon, 0.0);

        let transform = sample.invariance_info & 0x7F;
        assert_eq!(sample.invariance_info & 0x80, 0x80);
        let expected_ep = if transform & FLIP_TRANSFORM != 0 {
            (1u8 << 4).reverse_bits()
        } else {
            1 << 4
        };
        assert_eq!(sample.side_to_move_or_enpassant, expected_ep);
        assert_eq!(sample.result_q, 1.0);
    }

    #[test]
    fn test_planes_are_stored_bit_reversed() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let sample = build(&builder, &history_after(None, &[]), "e4", GameResult::Draw, 0.0);
        // our king on e1 (bit 4) lands on bit 3
        assert_eq!(sample.planes[5], 1 << 3);
        assert_eq!(sample.planes[0], 0xFF00);
    }

    #[test]
    fn test_explicit_best_move_and_visits() {
        let builder = TrainingSampleBuilder::new(InputFormat::Classical, false);
        let history = history_after(None, &[]);
        let played = history.last().parse_san("e4").unwrap();
        let best = history.last().parse_san("d4").unwrap();
        let legal = history.last().legal_moves();
        let sample = builder.build(&SampleInput {
            result: GameResult::Draw,
            history: &history,
            played: &played,
            best: Some(&best),
            legal_moves: &legal,
            value: 0.0,
            visits: Some(800),
        });
        assert_eq!(sample.played_idx, 322);
        assert_eq!(sample.best_idx, 293);
        assert_eq!(sample.visits, 800);
    }
}
