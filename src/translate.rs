//! Conversion of shakmaty moves into the side-relative form the policy head
//! and training records use.

use crate::board::GamePosition;
use crate::policy::{self, PolicyMove, PromotionPiece};
use shakmaty::{CastlingSide, Chess, Color, File, Move, Position, Square};

/// Mirror files (a <-> h).
pub const FLIP_TRANSFORM: u8 = 1;
/// Mirror ranks (1 <-> 8).
pub const MIRROR_TRANSFORM: u8 = 2;
/// Reflect across the a8-h1 diagonal.
pub const TRANSPOSE_TRANSFORM: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Normal,
    Promotion(PromotionPiece),
    /// King takes own rook; `rook_file` is `0..8`.
    Castle { rook_file: u8 },
}

/// A move seen from the mover's side: squares are `0..64` with a1 = 0, and
/// ranks are mirrored when Black moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalMove {
    pub from: u8,
    pub to: u8,
    pub kind: MoveKind,
}

impl CanonicalMove {
    /// Apply an encoder transform (a combination of the `*_TRANSFORM` bits).
    pub fn transformed(self, transform: u8) -> Self {
        if transform == 0 {
            return self;
        }
        let from = transform_square(self.from, transform);
        let to = transform_square(self.to, transform);
        let kind = match self.kind {
            MoveKind::Castle { .. } => MoveKind::Castle { rook_file: to % 8 },
            other => other,
        };
        Self { from, to, kind }
    }

    pub fn to_policy_move(self) -> PolicyMove {
        PolicyMove {
            from: self.from,
            to: self.to,
            promotion: match self.kind {
                MoveKind::Promotion(piece) => Some(piece),
                _ => None,
            },
        }
    }

    /// Policy slot after applying `transform`, or `None` when unmappable.
    pub fn policy_index(self, transform: u8) -> Option<u16> {
        let mv = self.transformed(transform).to_policy_move();
        policy::index_of(mv.from, mv.to, mv.promotion)
    }

    /// Undo the side-to-move flip, giving absolute board squares.
    pub fn to_absolute(self, mover: Color) -> (Square, Square) {
        let flip = if mover == Color::Black { 56 } else { 0 };
        (
            Square::new(u32::from(self.from ^ flip)),
            Square::new(u32::from(self.to ^ flip)),
        )
    }
}

pub fn transform_square(sq: u8, transform: u8) -> u8 {
    let mut sq = sq;
    if transform & FLIP_TRANSFORM != 0 {
        sq ^= 7;
    }
    if transform & MIRROR_TRANSFORM != 0 {
        sq ^= 56;
    }
    if transform & TRANSPOSE_TRANSFORM != 0 {
        let (file, rank) = (sq % 8, sq / 8);
        sq = (7 - file) * 8 + (7 - rank);
    }
    sq
}

/// Translate a legal move in `pos` into its canonical form. Castling is
/// expressed as king to rook square, with the rook file taken from the
/// position's castling rights.
pub fn translate(m: &Move, pos: &Chess) -> CanonicalMove {
    let mover = pos.turn();

    let (from, to, kind) = if GamePosition::is_castling(m) {
        let king = m.from().unwrap_or(m.to());
        let side = if m.to().file() > king.file() {
            CastlingSide::KingSide
        } else {
            CastlingSide::QueenSide
        };
        let rook_file = pos
            .castles()
            .rook(mover, side)
            .map(Square::file)
            .unwrap_or(match side {
                CastlingSide::KingSide => File::H,
                CastlingSide::QueenSide => File::A,
            });
        let to = Square::from_coords(rook_file, king.rank());
        (
            king,
            to,
            MoveKind::Castle {
                rook_file: rook_file as u8,
            },
        )
    } else {
        // drops do not exist in standard chess
        let from = m.from().unwrap_or(m.to());
        let kind = m
            .promotion()
            .and_then(PromotionPiece::from_role)
            .map_or(MoveKind::Normal, MoveKind::Promotion);
        (from, m.to(), kind)
    };

    let flip = if mover == Color::Black { 56 } else { 0 };
    CanonicalMove {
        from: from as u8 ^ flip,
        to: to as u8 ^ flip,
        kind,
    }
}
