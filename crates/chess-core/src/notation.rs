//! Move notation used between the rule engine, the board reconciler and the
//! move history.
//!
//! Grammar: `<from><sep><to>[=<piece>][e.p.]` where `sep` is `-` for a quiet
//! move and `x` for a capture, or one of the castling literals `O-O` and
//! `O-O-O`. Check and mate suffixes (`+`, `#`) are display-only and never
//! accepted here.

use crate::{CastleSide, Color, PieceKind, Square};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("empty move notation")]
    Empty,

    #[error("invalid square '{0}' in move notation")]
    InvalidSquare(String),

    #[error("invalid separator '{0}': expected '-' or 'x'")]
    InvalidSeparator(char),

    #[error("invalid promotion piece '{0}'")]
    InvalidPromotion(String),

    #[error("en passant requires a capture separator")]
    EnPassantWithoutCapture,

    #[error("unexpected trailing text '{0}'")]
    TrailingText(String),
}

/// How a non-castling move treats its destination square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Quiet,
    Capture,
    EnPassant,
}

/// A parsed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notation {
    Piece {
        from: Square,
        to: Square,
        kind: MoveKind,
        promotion: Option<PieceKind>,
    },
    Castle(CastleSide),
}

impl Notation {
    pub const fn quiet(from: Square, to: Square) -> Self {
        Notation::Piece {
            from,
            to,
            kind: MoveKind::Quiet,
            promotion: None,
        }
    }

    pub const fn capture(from: Square, to: Square) -> Self {
        Notation::Piece {
            from,
            to,
            kind: MoveKind::Capture,
            promotion: None,
        }
    }

    pub const fn en_passant(from: Square, to: Square) -> Self {
        Notation::Piece {
            from,
            to,
            kind: MoveKind::EnPassant,
            promotion: None,
        }
    }

    pub const fn castle(side: CastleSide) -> Self {
        Notation::Castle(side)
    }

    /// Returns a copy carrying the given promotion piece. Castling is unchanged.
    pub const fn with_promotion(self, piece: PieceKind) -> Self {
        match self {
            Notation::Piece { from, to, kind, .. } => Notation::Piece {
                from,
                to,
                kind,
                promotion: Some(piece),
            },
            castle => castle,
        }
    }

    pub fn parse(text: &str) -> Result<Self, NotationError> {
        if text.is_empty() {
            return Err(NotationError::Empty);
        }
        match text {
            "O-O" => return Ok(Notation::Castle(CastleSide::Kingside)),
            "O-O-O" => return Ok(Notation::Castle(CastleSide::Queenside)),
            _ => {}
        }

        let from_text = text.get(0..2).unwrap_or(text);
        let from = Square::from_algebraic(from_text)
            .ok_or_else(|| NotationError::InvalidSquare(from_text.to_string()))?;

        let kind = match text[2..].chars().next() {
            Some('-') => MoveKind::Quiet,
            Some('x') => MoveKind::Capture,
            Some(other) => return Err(NotationError::InvalidSeparator(other)),
            None => return Err(NotationError::InvalidSquare(String::new())),
        };

        let to_text = text.get(3..5).unwrap_or(&text[3..]);
        let to = Square::from_algebraic(to_text)
            .ok_or_else(|| NotationError::InvalidSquare(to_text.to_string()))?;

        let mut rest = &text[3 + to_text.len()..];

        let mut promotion = None;
        if let Some(after) = rest.strip_prefix('=') {
            let mut chars = after.chars();
            let letter = chars.next();
            promotion = Some(
                letter
                    .and_then(PieceKind::from_promotion_letter)
                    .ok_or_else(|| NotationError::InvalidPromotion(after.to_string()))?,
            );
            rest = chars.as_str();
        }

        let mut kind = kind;
        if let Some(after) = rest.strip_prefix("e.p.") {
            if kind != MoveKind::Capture {
                return Err(NotationError::EnPassantWithoutCapture);
            }
            kind = MoveKind::EnPassant;
            rest = after;
        }

        if !rest.is_empty() {
            return Err(NotationError::TrailingText(rest.to_string()));
        }

        Ok(Notation::Piece {
            from,
            to,
            kind,
            promotion,
        })
    }

    pub const fn from(self) -> Option<Square> {
        match self {
            Notation::Piece { from, .. } => Some(from),
            Notation::Castle(_) => None,
        }
    }

    pub const fn to(self) -> Option<Square> {
        match self {
            Notation::Piece { to, .. } => Some(to),
            Notation::Castle(_) => None,
        }
    }

    pub const fn promotion(self) -> Option<PieceKind> {
        match self {
            Notation::Piece { promotion, .. } => promotion,
            Notation::Castle(_) => None,
        }
    }

    pub const fn castle_side(self) -> Option<CastleSide> {
        match self {
            Notation::Castle(side) => Some(side),
            Notation::Piece { .. } => None,
        }
    }

    pub const fn is_capture(self) -> bool {
        matches!(
            self,
            Notation::Piece {
                kind: MoveKind::Capture | MoveKind::EnPassant,
                ..
            }
        )
    }

    pub const fn is_en_passant(self) -> bool {
        matches!(
            self,
            Notation::Piece {
                kind: MoveKind::EnPassant,
                ..
            }
        )
    }

    /// Origin and destination of the moving piece, resolving castling to the
    /// king's squares for `color`.
    pub const fn king_squares(self, color: Color) -> (Square, Square) {
        match self {
            Notation::Piece { from, to, .. } => (from, to),
            Notation::Castle(side) => (CastleSide::king_from(color), side.king_to(color)),
        }
    }

    /// Long algebraic form used by UCI engines (`e2e4`, `e7e8q`, `e1g1`).
    pub fn to_uci(self, color: Color) -> String {
        let (from, to) = self.king_squares(color);
        match self.promotion() {
            Some(piece) => format!("{}{}{}", from, to, piece.letter().to_ascii_lowercase()),
            None => format!("{}{}", from, to),
        }
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Notation::Castle(side) => write!(f, "{}", side.token()),
            Notation::Piece {
                from,
                to,
                kind,
                promotion,
            } => {
                let sep = if kind == MoveKind::Quiet { '-' } else { 'x' };
                write!(f, "{}{}{}", from, sep, to)?;
                if let Some(piece) = promotion {
                    write!(f, "={}", piece.letter())?;
                }
                if kind == MoveKind::EnPassant {
                    write!(f, "e.p.")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Notation {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Notation::parse(s)
    }
}

/// True when `text` is well-formed move notation.
pub fn validate_notation(text: &str) -> bool {
    Notation::parse(text).is_ok()
}
