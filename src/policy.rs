//! The 1858-slot policy head layout used by lc0 networks.
//!
//! Slots `0..1792` cover every queen-line and knight move, grouped by
//! from-square (a1 first) and ordered by destination square. Slots
//! `1792..1858` are the rank-7 to rank-8 promotions to queen, rook and bishop.
//! Knight promotions share the plain from-to slot.

use shakmaty::Role;
use std::fmt;
use std::sync::LazyLock;

pub const POLICY_SIZE: usize = 1858;

const PLAIN_MOVE_COUNT: usize = 1792;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromotionPiece {
    Knight,
    Bishop,
    Rook,
    Queen,
}

impl PromotionPiece {
    pub fn from_role(role: Role) -> Option<Self> {
        match role {
            Role::Knight => Some(Self::Knight),
            Role::Bishop => Some(Self::Bishop),
            Role::Rook => Some(Self::Rook),
            Role::Queen => Some(Self::Queen),
            Role::Pawn | Role::King => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
        }
    }

    /// Position inside a promotion triple; knights have no dedicated slot.
    fn slot(self) -> Option<usize> {
        match self {
            Self::Queen => Some(0),
            Self::Rook => Some(1),
            Self::Bishop => Some(2),
            Self::Knight => None,
        }
    }
}

/// A move as the policy head sees it: squares `0..64` (a1 = 0) relative to
/// the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyMove {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<PromotionPiece>,
}

impl fmt::Display for PolicyMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_square(f, self.from)?;
        write_square(f, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.as_char())?;
        }
        Ok(())
    }
}

fn write_square(f: &mut fmt::Formatter<'_>, sq: u8) -> fmt::Result {
    let file = (b'a' + sq % 8) as char;
    let rank = (b'1' + sq / 8) as char;
    write!(f, "{file}{rank}")
}

struct PolicyTable {
    plain: Vec<Option<u16>>,
    promotions: [[Option<u16>; 3]; 64],
}

static TABLE: LazyLock<PolicyTable> = LazyLock::new(PolicyTable::build);

impl PolicyTable {
    fn build() -> Self {
        let mut next = 0u16;
        let mut plain = vec![None; 64 * 64];
        let mut promotions = [[None; 3]; 64];

        for from in 0..64u8 {
            for to in 0..64u8 {
                if from != to && (is_queen_line(from, to) || is_knight_jump(from, to)) {
                    plain[usize::from(from) * 64 + usize::from(to)] = Some(next);
                    next += 1;
                }
            }
        }
        debug_assert_eq!(usize::from(next), PLAIN_MOVE_COUNT);

        for from_file in 0..8u8 {
            for to_file in from_file.saturating_sub(1)..=(from_file + 1).min(7) {
                for piece in [
                    PromotionPiece::Queen,
                    PromotionPiece::Rook,
                    PromotionPiece::Bishop,
                ] {
                    if let Some(slot) = piece.slot() {
                        promotions[usize::from(from_file * 8 + to_file)][slot] = Some(next);
                    }
                    next += 1;
                }
            }
        }
        debug_assert_eq!(usize::from(next), POLICY_SIZE);

        Self { plain, promotions }
    }
}

fn file_rank(sq: u8) -> (i8, i8) {
    ((sq % 8) as i8, (sq / 8) as i8)
}

fn is_queen_line(from: u8, to: u8) -> bool {
    let (ff, fr) = file_rank(from);
    let (tf, tr) = file_rank(to);
    ff == tf || fr == tr || (tf - ff).abs() == (tr - fr).abs()
}

fn is_knight_jump(from: u8, to: u8) -> bool {
    let (ff, fr) = file_rank(from);
    let (tf, tr) = file_rank(to);
    matches!(((tf - ff).abs(), (tr - fr).abs()), (1, 2) | (2, 1))
}

/// Policy slot of a side-to-move-relative move, or `None` if the head has no
/// slot for it.
pub fn index_of(from: u8, to: u8, promotion: Option<PromotionPiece>) -> Option<u16> {
    if from >= 64 || to >= 64 {
        return None;
    }

    let table = &*TABLE;
    match promotion.and_then(PromotionPiece::slot) {
        Some(slot) => {
            if from / 8 != 6 || to / 8 != 7 {
                return None;
            }
            table.promotions[usize::from((from % 8) * 8 + to % 8)][slot]
        }
        None => table.plain[usize::from(from) * 64 + usize::from(to)],
    }
}
