//! Core types shared by the rule engine and the board firmware.
//!
//! - [`Color`], [`PieceKind`] and [`Piece`] for what stands on a square
//! - [`Square`], [`File`], [`Rank`] and [`Bitboard`] for where
//! - [`CastlingRights`] and [`CastleSide`] for castling state and geometry
//! - [`Fen`] for position text and [`Notation`] for move text

mod bitboard;
mod castling;
mod color;
mod fen;
mod notation;
mod piece;
mod square;

pub use bitboard::{Bitboard, BitboardIter};
pub use castling::{CastleSide, CastlingRights};
pub use color::Color;
pub use fen::{Fen, FenError};
pub use notation::{validate_notation, MoveKind, Notation, NotationError};
pub use piece::{Piece, PieceKind};
pub use square::{File, Rank, Square};
