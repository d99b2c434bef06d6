//! Board state and position history on top of shakmaty.

use crate::error::ConvertError;
use crate::types::STARTPOS_FEN;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{
    Board, CastlingMode, CastlingSide, Chess, Color, EnPassantMode, Move, MoveList, Position,
    Square,
};
use std::borrow::Cow;

/// A single game state. Moves handed to [`GamePosition::apply`] must be legal.
#[derive(Debug, Clone)]
pub struct GamePosition {
    chess: Chess,
}

impl GamePosition {
    pub fn startpos() -> Self {
        Self {
            chess: Chess::default(),
        }
    }

    /// Parse a starting position. Empty text means the standard position and a
    /// four-field FEN gets default move counters. Standard castling is tried
    /// first, then Chess960 castling.
    pub fn from_fen(fen: &str) -> Result<Self, ConvertError> {
        let normalized = normalize_fen(fen);
        let invalid = |reason: String| ConvertError::InvalidPosition {
            fen: normalized.to_string(),
            reason,
        };

        let setup = Fen::from_ascii(normalized.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let chess = match setup.clone().into_position::<Chess>(CastlingMode::Standard) {
            Ok(chess) => chess,
            Err(_) => setup
                .into_position::<Chess>(CastlingMode::Chess960)
                .map_err(|e| invalid(e.to_string()))?,
        };

        Ok(Self { chess })
    }

    pub fn chess(&self) -> &Chess {
        &self.chess
    }

    pub fn board(&self) -> &Board {
        self.chess.board()
    }

    /// Resolve cleaned SAN text against this position. Returns `None` when
    /// the text is not SAN or names no legal move.
    pub fn parse_san(&self, text: &str) -> Option<Move> {
        let text = match text {
            "0-0" => "O-O",
            "0-0-0" => "O-O-O",
            other => other,
        };
        let san: San = text.parse().ok()?;
        san.to_move(&self.chess).ok()
    }

    pub fn is_legal(&self, m: &Move) -> bool {
        self.chess.legal_moves().contains(m)
    }

    pub fn legal_moves(&self) -> MoveList {
        self.chess.legal_moves()
    }

    pub fn apply(&mut self, m: Move) {
        self.chess.play_unchecked(m);
    }

    pub fn is_castling(m: &Move) -> bool {
        m.is_castle()
    }

    pub fn en_passant_square(&self) -> Option<Square> {
        self.chess.ep_square(EnPassantMode::Legal)
    }

    pub fn side_to_move(&self) -> Color {
        self.chess.turn()
    }

    pub fn is_black_to_move(&self) -> bool {
        self.chess.turn() == Color::Black
    }

    pub fn rule50_ply(&self) -> u32 {
        self.chess.halfmoves()
    }

    /// File of the rook `color` may still castle with on `side`.
    pub fn castling_rook_file(&self, color: Color, side: CastlingSide) -> Option<u8> {
        let castles = self.chess.castles();
        if !castles.has(color, side) {
            return None;
        }
        castles.rook(color, side).map(|sq| sq.file() as u8)
    }

    /// Rook files for white O-O, white O-O-O, black O-O, black O-O-O.
    pub fn castling_signature(&self) -> [Option<u8>; 4] {
        [
            self.castling_rook_file(Color::White, CastlingSide::KingSide),
            self.castling_rook_file(Color::White, CastlingSide::QueenSide),
            self.castling_rook_file(Color::Black, CastlingSide::KingSide),
            self.castling_rook_file(Color::Black, CastlingSide::QueenSide),
        ]
    }

    pub fn has_castling_rights(&self) -> bool {
        self.castling_signature().iter().any(Option::is_some)
    }

    fn key(&self) -> Zobrist64 {
        self.chess.zobrist_hash(EnPassantMode::Legal)
    }
}

fn normalize_fen(fen: &str) -> Cow<'_, str> {
    let fen = fen.trim();
    if fen.is_empty() {
        return Cow::Borrowed(STARTPOS_FEN);
    }
    if fen.split_whitespace().count() == 4 {
        Cow::Owned(format!("{fen} 0 1"))
    } else {
        Cow::Borrowed(fen)
    }
}

/// One position in a game plus how often it occurred before.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    position: GamePosition,
    key: Zobrist64,
    repetitions: u32,
}

impl HistoryEntry {
    fn new(position: GamePosition, repetitions: u32) -> Self {
        let key = position.key();
        Self {
            position,
            key,
            repetitions,
        }
    }

    pub fn position(&self) -> &GamePosition {
        &self.position
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }
}

/// Ordered positions reachable from the game start. Never empty.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    entries: Vec<HistoryEntry>,
}

impl PositionHistory {
    pub fn new(start: GamePosition) -> Self {
        Self {
            entries: vec![HistoryEntry::new(start, 0)],
        }
    }

    pub fn append(&mut self, m: Move) {
        let mut next = self.last().clone();
        next.apply(m);

        let key = next.key();
        let repetitions = self.entries.iter().filter(|e| e.key == key).count() as u32;
        self.entries.push(HistoryEntry {
            position: next,
            key,
            repetitions,
        });
    }

    pub fn last(&self) -> &GamePosition {
        &self.last_entry().position
    }

    pub fn last_entry(&self) -> &HistoryEntry {
        // the constructor seeds one entry and nothing removes it
        &self.entries[self.entries.len() - 1]
    }

    pub fn first(&self) -> &GamePosition {
        &self.entries[0].position
    }

    /// Most recent entry first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn starts_from_standard(&self) -> bool {
        self.first().board() == &Board::new()
    }
}

/// Reduce raw move text to something the SAN parser accepts: drop a leading
/// move number, an inline `{` comment fragment, trailing annotation marks and
/// a trailing period.
pub fn clean_san(raw: &str) -> &str {
    let mut san = raw.trim();

    let digits = san.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && san[digits..].starts_with('.') {
        san = san[digits..].trim_start_matches('.').trim_start();
    }

    if let Some(brace) = san.find('{') {
        san = &san[..brace];
    }

    san = san
        .trim_end()
        .trim_end_matches(['!', '?', '+', '#', '=']);
    san = san.strip_suffix('.').unwrap_or(san);
    san.trim()
}
