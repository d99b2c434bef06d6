//! Hand-written static evaluation, used as a value target when a game has no
//! engine annotations.

use crate::board::GamePosition;
use shakmaty::{Board, Color, Piece, Role, Square};

const PAWN_VALUE: i32 = 100;
const KNIGHT_VALUE: i32 = 320;
const BISHOP_VALUE: i32 = 330;
const ROOK_VALUE: i32 = 500;
const QUEEN_VALUE: i32 = 900;

const BISHOP_PAIR_BONUS: i32 = 50;
const DOUBLED_PAWN_PENALTY: i32 = -20;
const ISOLATED_PAWN_PENALTY: i32 = -15;
const PASSED_PAWN_BONUS_BASE: i32 = 20;
const MOBILITY_BONUS: i32 = 4;

const MAX_PHASE: i32 = 24;

// Piece-square tables are written with rank 8 on the first row, so White
// looks up `sq ^ 56` and Black looks up `sq` directly.
#[rustfmt::skip]
const PST_PAWN: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 25, 25, 10,  5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-20,-20, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const PST_KNIGHT: [i32; 64] = [
   -50,-40,-30,-30,-30,-30,-40,-50,
   -40,-20,  0,  0,  0,  0,-20,-40,
   -30,  0, 10, 15, 15, 10,  0,-30,
   -30,  5, 15, 20, 20, 15,  5,-30,
   -30,  0, 15, 20, 20, 15,  0,-30,
   -30,  5, 10, 15, 15, 10,  5,-30,
   -40,-20,  0,  5,  5,  0,-20,-40,
   -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const PST_BISHOP: [i32; 64] = [
   -20,-10,-10,-10,-10,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5, 10, 10,  5,  0,-10,
   -10,  5,  5, 10, 10,  5,  5,-10,
   -10,  0, 10, 10, 10, 10,  0,-10,
   -10, 10, 10, 10, 10, 10, 10,-10,
   -10,  5,  0,  0,  0,  0,  5,-10,
   -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const PST_ROOK: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const PST_QUEEN: [i32; 64] = [
   -20,-10,-10, -5, -5,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
     0,  0,  5,  5,  5,  5,  0, -5,
   -10,  5,  5,  5,  5,  5,  0,-10,
   -10,  0,  5,  0,  0,  0,  0,-10,
   -20,-10,-10, -5, -5,-10,-10,-20,
];

#[rustfmt::skip]
const PST_KING_MG: [i32; 64] = [
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -20,-30,-30,-40,-40,-30,-30,-20,
   -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20,
];

#[rustfmt::skip]
const PST_KING_EG: [i32; 64] = [
   -50,-40,-30,-20,-20,-30,-40,-50,
   -30,-20,-10,  0,  0,-10,-20,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-30,  0,  0,  0,  0,-30,-30,
   -50,-30,-30,-30,-30,-30,-30,-50,
];

/// Centipawn score from the side to move's point of view.
pub fn evaluate(position: &GamePosition) -> i32 {
    let board = position.board();
    let phase = game_phase(board);
    let score = material(board) + piece_squares(board, phase) + pawn_structure(board)
        + mobility(board);

    match position.side_to_move() {
        Color::White => score,
        Color::Black => -score,
    }
}

fn pieces(board: &Board) -> impl Iterator<Item = (Square, Piece)> + '_ {
    board
        .occupied()
        .into_iter()
        .filter_map(move |sq| board.piece_at(sq).map(|piece| (sq, piece)))
}

fn sign(color: Color) -> i32 {
    match color {
        Color::White => 1,
        Color::Black => -1,
    }
}

/// 24 with all minor and major pieces on the board, 0 with none.
fn game_phase(board: &Board) -> i32 {
    let phase: i32 = pieces(board)
        .map(|(_, piece)| match piece.role {
            Role::Knight | Role::Bishop => 1,
            Role::Rook => 2,
            Role::Queen => 4,
            Role::Pawn | Role::King => 0,
        })
        .sum();
    phase.min(MAX_PHASE)
}

fn material(board: &Board) -> i32 {
    let mut score = 0;
    let mut bishops = [0; 2];
    for (_, piece) in pieces(board) {
        let value = match piece.role {
            Role::Pawn => PAWN_VALUE,
            Role::Knight => KNIGHT_VALUE,
            Role::Bishop => {
                bishops[piece.color as usize] += 1;
                BISHOP_VALUE
            }
            Role::Rook => ROOK_VALUE,
            Role::Queen => QUEEN_VALUE,
            Role::King => 0,
        };
        score += sign(piece.color) * value;
    }

    for color in [Color::White, Color::Black] {
        if bishops[color as usize] >= 2 {
            score += sign(color) * BISHOP_PAIR_BONUS;
        }
    }
    score
}

fn piece_squares(board: &Board, phase: i32) -> i32 {
    let mut middlegame = 0;
    let mut endgame = 0;
    for (sq, piece) in pieces(board) {
        let idx = match piece.color {
            Color::White => sq as usize ^ 56,
            Color::Black => sq as usize,
        };
        let (mg, eg) = match piece.role {
            Role::Pawn => (PST_PAWN[idx], PST_PAWN[idx]),
            Role::Knight => (PST_KNIGHT[idx], PST_KNIGHT[idx]),
            Role::Bishop => (PST_BISHOP[idx], PST_BISHOP[idx]),
            Role::Rook => (PST_ROOK[idx], PST_ROOK[idx]),
            Role::Queen => (PST_QUEEN[idx], PST_QUEEN[idx]),
            Role::King => (PST_KING_MG[idx], PST_KING_EG[idx]),
        };
        middlegame += sign(piece.color) * mg;
        endgame += sign(piece.color) * eg;
    }
    (middlegame * phase + endgame * (MAX_PHASE - phase)) / MAX_PHASE
}

fn pawn_structure(board: &Board) -> i32 {
    let mut counts = [[0i32; 8]; 2];
    // most advanced pawn per file, from each side's own point of view
    let mut front: [[Option<i32>; 8]; 2] = [[None; 8]; 2];
    let mut ranks: [Vec<(i32, i32)>; 2] = [Vec::new(), Vec::new()];

    for (sq, piece) in pieces(board) {
        if piece.role != Role::Pawn {
            continue;
        }
        let c = piece.color as usize;
        let file = sq.file() as i32;
        let rank = sq.rank() as i32;
        counts[c][file as usize] += 1;
        ranks[c].push((file, rank));
        let advanced = match piece.color {
            Color::White => rank,
            Color::Black => 7 - rank,
        };
        let slot = &mut front[c][file as usize];
        *slot = Some(slot.map_or(advanced, |best| best.max(advanced)));
    }

    let mut score = 0;
    for color in [Color::White, Color::Black] {
        let c = color as usize;
        let enemy = &ranks[1 - c];
        for file in 0..8usize {
            let count = counts[c][file];
            if count == 0 {
                continue;
            }
            if count > 1 {
                score += sign(color) * DOUBLED_PAWN_PENALTY * (count - 1);
            }

            let neighbours = (file > 0 && counts[c][file - 1] > 0)
                || (file < 7 && counts[c][file + 1] > 0);
            if !neighbours {
                score += sign(color) * ISOLATED_PAWN_PENALTY;
            }

            let Some(advanced) = front[c][file] else {
                continue;
            };
            let blocked = enemy.iter().any(|&(f, r)| {
                let enemy_advanced = match color {
                    Color::White => r,
                    Color::Black => 7 - r,
                };
                (f - file as i32).abs() <= 1 && enemy_advanced > advanced
            });
            if !blocked {
                score += sign(color) * (PASSED_PAWN_BONUS_BASE + (advanced - 1) * 10);
            }
        }
    }
    score
}

fn mobility(board: &Board) -> i32 {
    pieces(board)
        .map(|(sq, piece)| {
            let reach = match piece.role {
                Role::Knight => {
                    let mut reach = 8;
                    if matches!(sq.file() as u8, 0 | 7) {
                        reach -= 2;
                    }
                    if matches!(sq.rank() as u8, 0 | 7) {
                        reach -= 2;
                    }
                    reach
                }
                Role::Bishop => 5,
                Role::Rook => 4,
                Role::Queen => 8,
                Role::Pawn | Role::King => 0,
            };
            sign(piece.color) * reach * MOBILITY_BONUS / 2
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_fen(fen: &str) -> i32 {
        evaluate(&GamePosition::from_fen(fen).unwrap())
    }

    #[test]
    fn test_startpos_is_balanced() {
        assert_eq!(evaluate(&GamePosition::startpos()), 0);
    }

    #[test]
    fn test_score_is_side_to_move_relative() {
        let white = eval_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        let black = eval_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1");
        assert!(white > 800);
        assert_eq!(black, -white);
    }

    #[test]
    fn test_game_phase() {
        let board = GamePosition::startpos().board().clone();
        assert_eq!(game_phase(&board), 24);
        let kings = GamePosition::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(game_phase(kings.board()), 0);
    }

    #[test]
    fn test_bishop_pair() {
        let pair = GamePosition::from_fen("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 1").unwrap();
        assert_eq!(material(pair.board()), 2 * BISHOP_VALUE + BISHOP_PAIR_BONUS);
    }

    #[test]
    fn test_pawn_structure_terms() {
        // doubled and isolated, but passed: the front pawn on e5 is unopposed
        let doubled = GamePosition::from_fen("4k3/8/8/4P3/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(
            pawn_structure(doubled.board()),
            DOUBLED_PAWN_PENALTY + ISOLATED_PAWN_PENALTY + PASSED_PAWN_BONUS_BASE + 30
        );

        // an enemy pawn ahead on an adjacent file stops the passer
        let blocked = GamePosition::from_fen("4k3/3p4/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        assert_eq!(pawn_structure(blocked.board()), 0);
    }

    #[test]
    fn test_advanced_passers_score_higher() {
        let far = eval_fen("4k3/8/4P3/8/8/8/8/4K3 w - - 0 1");
        let near = eval_fen("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1");
        assert!(far > near);
    }

    #[test]
    fn test_knight_mobility_penalizes_edges() {
        let center = GamePosition::from_fen("4k3/8/8/8/3N4/8/8/4K3 w - - 0 1").unwrap();
        let corner = GamePosition::from_fen("4k3/8/8/8/8/8/8/N3K3 w - - 0 1").unwrap();
        assert_eq!(mobility(center.board()), 16);
        assert_eq!(mobility(corner.board()), 8);
    }
}
