//! Board history to input planes, the way lc0 networks expect them.

use crate::board::{GamePosition, HistoryEntry, PositionHistory};
use crate::translate::{FLIP_TRANSFORM, MIRROR_TRANSFORM, TRANSPOSE_TRANSFORM};
use shakmaty::{Bitboard, Color, Role};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const HISTORY_STEPS: usize = 8;
pub const PLANES_PER_STEP: usize = 13;
pub const PLANE_COUNT: usize = HISTORY_STEPS * PLANES_PER_STEP;

const ROLES: [Role; 6] = [
    Role::Pawn,
    Role::Knight,
    Role::Bishop,
    Role::Rook,
    Role::Queen,
    Role::King,
];

/// lc0 network input format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Classical,
    CastlingPlane,
    Canonical,
    CanonicalHectoplies,
    CanonicalHectopliesArmageddon,
    CanonicalV2,
    CanonicalV2Armageddon,
}

impl InputFormat {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Classical,
            2 => Self::CastlingPlane,
            3 => Self::Canonical,
            4 => Self::CanonicalHectoplies,
            132 => Self::CanonicalHectopliesArmageddon,
            5 => Self::CanonicalV2,
            133 => Self::CanonicalV2Armageddon,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Classical => 1,
            Self::CastlingPlane => 2,
            Self::Canonical => 3,
            Self::CanonicalHectoplies => 4,
            Self::CanonicalHectopliesArmageddon => 132,
            Self::CanonicalV2 => 5,
            Self::CanonicalV2Armageddon => 133,
        }
    }

    /// Castling bytes carry rook file masks instead of plain flags.
    pub fn is_960_castling(self) -> bool {
        self.code() >= 2
    }

    /// Positions are transformed into a canonical orientation.
    pub fn is_canonical(self) -> bool {
        self.code() >= 3
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| {
                format!(
                    "Invalid input format '{}'. Supported values: 1, 2, 3, 4, 5, 132, 133.",
                    s.trim()
                )
            })
    }
}

/// Encoder output: planes with a1 in bit 0, plus the transform that was
/// applied to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPlanes {
    pub planes: [u64; PLANE_COUNT],
    pub transform: u8,
}

pub trait PlaneEncoder: Send + Sync {
    fn encode(&self, history: &PositionHistory, format: InputFormat) -> EncodedPlanes;
}

/// Eight history steps of six "ours", six "theirs" and one repetition plane,
/// all seen from the side to move.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lc0PlaneEncoder;

impl PlaneEncoder for Lc0PlaneEncoder {
    fn encode(&self, history: &PositionHistory, format: InputFormat) -> EncodedPlanes {
        let current = history.last();
        let us = current.side_to_move();
        let flip_ranks = us == Color::Black;
        let stop_early = format.is_canonical();
        let fill_missing = !history.starts_from_standard();
        let castling = current.castling_signature();

        let recent: Vec<&HistoryEntry> = history.iter_recent().collect();
        let mut planes = [0u64; PLANE_COUNT];

        for step in 0..HISTORY_STEPS {
            let entry = match recent.get(step) {
                Some(entry) => *entry,
                None if fill_missing => recent[recent.len() - 1],
                None => break,
            };
            let position = entry.position();

            // castling and en passant changes cannot be undone
            if stop_early && position.castling_signature() != castling {
                break;
            }
            if stop_early && step > 0 && position.en_passant_square().is_some() {
                break;
            }

            let base = step * PLANES_PER_STEP;
            let board = position.board();
            for (i, role) in ROLES.into_iter().enumerate() {
                let ours = board.by_color(us) & board.by_role(role);
                let theirs = board.by_color(!us) & board.by_role(role);
                planes[base + i] = orient(ours, flip_ranks);
                planes[base + 6 + i] = orient(theirs, flip_ranks);
            }
            if entry.repetitions() >= 1 {
                planes[base + 12] = u64::MAX;
            }

            if stop_early && position.rule50_ply() == 0 {
                break;
            }
        }

        let transform = if format.is_canonical() {
            choose_transform(current)
        } else {
            0
        };
        if transform != 0 {
            for plane in &mut planes {
                *plane = transform_bitboard(*plane, transform);
            }
        }

        EncodedPlanes { planes, transform }
    }
}

fn orient(bb: Bitboard, flip_ranks: bool) -> u64 {
    if flip_ranks { bb.0.swap_bytes() } else { bb.0 }
}

/// Pick the transform that puts our king on the e-h files and, for pawnless
/// positions, into the lower right triangle.
pub fn choose_transform(position: &GamePosition) -> u8 {
    if position.has_castling_rights() {
        return 0;
    }

    let board = position.board();
    let us = position.side_to_move();
    let flip_ranks = us == Color::Black;
    let oriented = |bb: Bitboard| orient(bb, flip_ranks);

    let mut king = oriented(board.by_color(us) & board.by_role(Role::King));
    let mut transform = 0;
    if king & 0x0F0F_0F0F_0F0F_0F0F != 0 {
        transform |= FLIP_TRANSFORM;
        king = reverse_bits_in_bytes(king);
    }

    if board.by_role(Role::Pawn).0 != 0 {
        return transform;
    }

    if king & 0xFFFF_FFFF_0000_0000 != 0 {
        transform |= MIRROR_TRANSFORM;
        king = king.swap_bytes();
    }

    if king & 0xE0C0_8000 != 0 {
        return transform | TRANSPOSE_TRANSFORM;
    }

    if king & 0x1020_4080 != 0 {
        let ours = oriented(board.by_color(us));
        let theirs = oriented(board.by_color(!us));
        let tie_breakers = [
            ours | theirs,
            ours,
            oriented(board.by_role(Role::King)),
            oriented(board.by_role(Role::Queen)),
            oriented(board.by_role(Role::Rook)),
            oriented(board.by_role(Role::Knight)),
            oriented(board.by_role(Role::Bishop)),
        ];
        for bb in tie_breakers {
            match compare_transposing(bb, transform) {
                Ordering::Less => return transform,
                Ordering::Greater => return transform | TRANSPOSE_TRANSFORM,
                Ordering::Equal => {}
            }
        }
    }

    transform
}

fn compare_transposing(bb: u64, transform: u8) -> Ordering {
    let value = transform_bitboard(bb, transform & (FLIP_TRANSFORM | MIRROR_TRANSFORM));
    value.cmp(&transpose_bits_in_bytes(value))
}

pub fn transform_bitboard(bb: u64, transform: u8) -> u64 {
    let mut bb = bb;
    if transform & FLIP_TRANSFORM != 0 {
        bb = reverse_bits_in_bytes(bb);
    }
    if transform & MIRROR_TRANSFORM != 0 {
        bb = bb.swap_bytes();
    }
    if transform & TRANSPOSE_TRANSFORM != 0 {
        bb = transpose_bits_in_bytes(bb);
    }
    bb
}

pub fn reverse_bits_in_bytes(v: u64) -> u64 {
    u64::from_le_bytes(v.to_le_bytes().map(u8::reverse_bits))
}

/// Reflect a bitboard across the a8-h1 diagonal.
pub fn transpose_bits_in_bytes(v: u64) -> u64 {
    let v = ((v & 0xAA00_AA00_AA00_AA00) >> 9)
        | ((v & 0x0055_0055_0055_0055) << 9)
        | (v & 0x55AA_55AA_55AA_55AA);
    let v = ((v & 0xCCCC_0000_CCCC_0000) >> 18)
        | ((v & 0x0000_3333_0000_3333) << 18)
        | (v & 0x3333_CCCC_3333_CCCC);
    ((v & 0xF0F0_F0F0_0000_0000) >> 36)
        | ((v & 0x0000_0000_0F0F_0F0F) << 36)
        | (v & 0x0F0F_0F0F_F0F0_F0F0)
}
