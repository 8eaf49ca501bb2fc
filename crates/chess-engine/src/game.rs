//! Game state on top of [`Position`]: move history, derived status flags and
//! the game result.

use crate::movegen::{
    has_legal_move, is_in_check, is_square_attacked, legal_moves_for, legal_moves_from,
    make_move, LegalScan, MoveList,
};
use crate::rules::{GameResult, GameStatus, Termination};
use crate::Position;
use chess_core::{Color, FenError, Notation, NotationError, Piece, Square};
use thiserror::Error;

/// One full move of history: White's display text and Black's.
///
/// A slot is empty when that side has not moved yet, or when the game was
/// set up with Black to move.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryEntry {
    /// Fullmove number the pair belongs to.
    pub number: u32,
    pub white: String,
    pub black: String,
}

/// What a successful [`Game::apply_move`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub notation: Notation,
    /// Notation plus `+` or `#`.
    pub display: String,
    pub mover: Color,
    pub captured: Option<Piece>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid move notation: {0}")]
    InvalidNotation(#[from] NotationError),

    #[error("no piece on {0}")]
    EmptySquare(Square),

    #[error("{side} cannot move the piece on {square}")]
    WrongSide { side: Color, square: Square },

    #[error("it is not {0}'s turn")]
    NotYourTurn(Color),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game has already ended")]
    GameAlreadyOver,
}

/// A game in progress or finished.
#[derive(Debug, Clone)]
pub struct Game {
    position: Position,
    history: Vec<HistoryEntry>,
    result: GameResult,
    termination: Option<Termination>,
    status: GameStatus,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::from_position(Position::startpos())
    }

    pub fn from_position(position: Position) -> Self {
        let mut game = Game {
            position,
            history: Vec::new(),
            result: GameResult::InProgress,
            termination: None,
            status: GameStatus::default(),
        };
        game.refresh_status();
        game
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self::from_position(Position::from_fen(fen)?))
    }

    /// Back to the standard starting position with empty history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replaces the position with the one described by `fen`.
    ///
    /// Only FEN syntax is validated. On error nothing changes. On success the
    /// history is cleared and status flags are recomputed for the side to
    /// move, so a mated or stalemated position loads as a finished game.
    pub fn set_position(&mut self, fen: &str) -> Result<(), FenError> {
        let position = Position::from_fen(fen)?;
        *self = Self::from_position(position);
        tracing::debug!(fen, "position set");
        Ok(())
    }

    pub fn position_fen(&self) -> String {
        self.position.to_fen()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.position.piece_at(sq)
    }

    pub fn legal_moves_from(&self, sq: Square) -> MoveList {
        legal_moves_from(&self.position, sq)
    }

    pub fn legal_moves_for(&self, color: Color, scan: LegalScan) -> MoveList {
        legal_moves_for(&self.position, color, scan)
    }

    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        is_square_attacked(&self.position.board, sq, by)
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_game_over(&self) -> bool {
        self.result.is_finished()
    }

    pub fn move_history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History as `1. e2-e4 e7-e5 2. ...`.
    pub fn history_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.history.len() * 3);
        for entry in &self.history {
            if entry.white.is_empty() {
                parts.push(format!("{}...", entry.number));
            } else {
                parts.push(format!("{}.", entry.number));
                parts.push(entry.white.clone());
            }
            if !entry.black.is_empty() {
                parts.push(entry.black.clone());
            }
        }
        parts.join(" ")
    }

    /// Parses and plays `text` for `side`.
    pub fn apply_move(&mut self, text: &str, side: Color) -> Result<MoveOutcome, GameError> {
        let notation = Notation::parse(text)?;
        self.apply(notation, side)
    }

    /// Plays an already parsed move for `side`. Nothing changes on error.
    pub fn apply(&mut self, notation: Notation, side: Color) -> Result<MoveOutcome, GameError> {
        if self.is_game_over() {
            return Err(GameError::GameAlreadyOver);
        }

        let (from, _) = notation.king_squares(side);
        let piece = self
            .position
            .piece_at(from)
            .ok_or(GameError::EmptySquare(from))?;
        if piece.color != side {
            return Err(GameError::WrongSide { side, square: from });
        }
        if side != self.position.side_to_move {
            return Err(GameError::NotYourTurn(side));
        }
        if !self.legal_moves_from(from).contains(&notation) {
            return Err(GameError::IllegalMove(notation.to_string()));
        }

        let captured = match notation {
            Notation::Piece { to, .. } if notation.is_en_passant() => {
                Square::from_coords(to.file_index() as i8, from.rank_index() as i8)
                    .and_then(|sq| self.position.piece_at(sq))
            }
            Notation::Piece { to, .. } => self.position.piece_at(to),
            Notation::Castle(_) => None,
        };
        let number = self.position.fullmove_number;

        self.position = make_move(&self.position, notation);
        self.refresh_status();

        let display_text = format!("{}{}", notation, self.status.suffix());
        self.record(number, side, display_text.clone());

        tracing::debug!(
            mv = %display_text,
            side = %side,
            fen = %self.position.to_fen(),
            "move applied"
        );
        if self.is_game_over() {
            tracing::info!(result = %self.result, termination = ?self.termination, "game over");
        }

        Ok(MoveOutcome {
            notation,
            display: display_text,
            mover: side,
            captured,
            status: self.status,
        })
    }

    /// Maps an engine's long-algebraic move (`e2e4`, `e7e8q`, `e1g1`) onto
    /// the matching legal move for the side to move.
    pub fn notation_from_uci(&self, uci: &str) -> Option<Notation> {
        let from = Square::from_algebraic(uci.get(0..2)?)?;
        let to = Square::from_algebraic(uci.get(2..4)?)?;
        let promotion = match uci.get(4..) {
            Some("") | None => None,
            Some(text) => {
                let mut chars = text.chars();
                let kind = chars
                    .next()
                    .and_then(chess_core::PieceKind::from_promotion_letter)?;
                if chars.next().is_some() {
                    return None;
                }
                Some(kind)
            }
        };
        let side = self.position.side_to_move;
        self.legal_moves_from(from)
            .iter()
            .copied()
            .find(|m| m.king_squares(side) == (from, to) && m.promotion() == promotion)
    }

    /// `color` resigns. No effect once the game is over.
    pub fn resign(&mut self, color: Color) -> Result<(), GameError> {
        self.finish_externally(color, Termination::Resignation)
    }

    /// `color` ran out of time. No effect once the game is over.
    pub fn flag_fall(&mut self, color: Color) -> Result<(), GameError> {
        self.finish_externally(color, Termination::TimeForfeit)
    }

    fn finish_externally(&mut self, loser: Color, how: Termination) -> Result<(), GameError> {
        if self.is_game_over() {
            return Err(GameError::GameAlreadyOver);
        }
        self.result = GameResult::win_for(loser.opposite());
        self.termination = Some(how);
        self.status.game_over = true;
        tracing::info!(loser = %loser, termination = %how, result = %self.result, "game over");
        Ok(())
    }

    fn record(&mut self, number: u32, side: Color, display: String) {
        match side {
            Color::White => self.history.push(HistoryEntry {
                number,
                white: display,
                black: String::new(),
            }),
            Color::Black => match self.history.last_mut() {
                Some(entry) if entry.black.is_empty() && entry.number == number => {
                    entry.black = display;
                }
                _ => self.history.push(HistoryEntry {
                    number,
                    white: String::new(),
                    black: display,
                }),
            },
        }
    }

    fn refresh_status(&mut self) {
        let side = self.position.side_to_move;
        let check = is_in_check(&self.position.board, side);
        let can_move = has_legal_move(&self.position, side);

        self.status = GameStatus {
            check,
            checkmate: check && !can_move,
            stalemate: !check && !can_move,
            game_over: !can_move,
        };

        if self.status.checkmate {
            self.result = GameResult::win_for(side.opposite());
            self.termination = Some(Termination::Checkmate);
        } else if self.status.stalemate {
            self.result = GameResult::Draw;
            self.termination = Some(Termination::Stalemate);
        }
    }
}
