//! Game outcome types.

use chess_core::Color;
use std::fmt;

/// Result of a game, finished or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameResult {
    #[default]
    InProgress,
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    /// The side that won, for a decisive result.
    pub const fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            _ => None,
        }
    }

    pub const fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub const fn is_finished(self) -> bool {
        !matches!(self, GameResult::InProgress)
    }

    /// PGN result token.
    pub const fn token(self) -> &'static str {
        match self {
            GameResult::InProgress => "*",
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Checkmate,
    Stalemate,
    Resignation,
    /// A player's clock ran out.
    TimeForfeit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::Resignation => "resignation",
            Termination::TimeForfeit => "time forfeit",
        };
        f.write_str(text)
    }
}

/// Flags derived for the side to move after every position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameStatus {
    pub check: bool,
    pub checkmate: bool,
    pub stalemate: bool,
    pub game_over: bool,
}

impl GameStatus {
    /// Suffix appended to a move's display text.
    pub const fn suffix(self) -> &'static str {
        if self.checkmate {
            "#"
        } else if self.check {
            "+"
        } else {
            ""
        }
    }
}
