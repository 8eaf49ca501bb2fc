//! Chess rule engine for the board firmware.
//!
//! - [`Board`] and [`Position`]: placement plus side to move, castling
//!   rights, en passant target and move clocks
//! - [`movegen`]: attack detection, per-square and per-side legal move
//!   generation, and [`make_move`]
//! - [`Game`]: applies moves given in board notation, keeps the move
//!   history and derives check, checkmate and stalemate
//! - [`pgn`]: PGN-like export
//!
//! # Example
//!
//! ```
//! use chess_core::Color;
//! use chess_engine::Game;
//!
//! let mut game = Game::new();
//! game.apply_move("e2-e4", Color::White).unwrap();
//! game.apply_move("e7-e5", Color::Black).unwrap();
//! assert_eq!(game.history_text(), "1. e2-e4 e7-e5");
//! ```

mod board;
mod game;
pub mod movegen;
pub mod pgn;
mod position;
pub mod rules;

pub use board::Board;
pub use game::{Game, GameError, HistoryEntry, MoveOutcome};
pub use movegen::{
    generate_moves, is_in_check, is_square_attacked, legal_moves_for, legal_moves_from,
    make_move, LegalScan, MoveList,
};
pub use pgn::PgnHeaders;
pub use position::Position;
pub use rules::{GameResult, GameStatus, Termination};
