//! Drops samples whose position was already written in this run.

use crate::encoder::PLANE_COUNT;
use crate::sample::TrainingSample;
use std::collections::HashSet;

/// Everything that makes two records describe the same network input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PositionKey {
    planes: [u64; PLANE_COUNT],
    castling: [u8; 4],
    side_to_move_or_enpassant: u8,
    rule50_count: u8,
}

impl PositionKey {
    fn of(sample: &TrainingSample) -> Self {
        Self {
            planes: sample.planes,
            castling: [
                sample.castling_us_ooo,
                sample.castling_us_oo,
                sample.castling_them_ooo,
                sample.castling_them_oo,
            ],
            side_to_move_or_enpassant: sample.side_to_move_or_enpassant,
            rule50_count: sample.rule50_count,
        }
    }
}

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<PositionKey>,
    dropped: u64,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time a position is offered.
    pub fn admit(&mut self, sample: &TrainingSample) -> bool {
        let fresh = self.seen.insert(PositionKey::of(sample));
        if !fresh {
            self.dropped += 1;
        }
        fresh
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
