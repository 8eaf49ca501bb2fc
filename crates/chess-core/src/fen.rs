//! FEN (Forsyth-Edwards Notation) parsing and serialization.
//!
//! Only the six-field syntax is checked here. A syntactically valid FEN may
//! still describe an impossible position (no kings, pawns on the back rank,
//! castling rights without a rook); such positions are accepted as-is.

use crate::{CastlingRights, Color, Piece, Square};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 6 fields, got {0}")]
    InvalidFieldCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// The six FEN fields in typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    /// Indexed by square, a1 first.
    pub placement: [Option<Piece>; 64],
    pub active_color: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Fen {
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::InvalidFieldCount(fields.len()));
        }

        let placement = parse_placement(fields[0])?;

        let active_color = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = CastlingRights::from_fen(fields[2])
            .ok_or_else(|| FenError::InvalidCastlingRights(fields[2].to_string()))?;

        let en_passant = match fields[3] {
            "-" => None,
            text => Some(
                Square::from_algebraic(text)
                    .ok_or_else(|| FenError::InvalidEnPassantSquare(text.to_string()))?,
            ),
        };

        let halfmove_clock = fields[4]
            .parse::<u32>()
            .map_err(|_| FenError::InvalidHalfmoveClock(fields[4].to_string()))?;

        let fullmove_number = fields[5]
            .parse::<u32>()
            .map_err(|_| FenError::InvalidFullmoveNumber(fields[5].to_string()))?;

        Ok(Fen {
            placement,
            active_color,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Writes the piece-placement field only.
    pub fn placement_field(placement: &[Option<Piece>; 64]) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match placement[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }
}

fn parse_placement(field: &str) -> Result<[Option<Piece>; 64], FenError> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::InvalidPiecePlacement(format!(
            "expected 8 ranks, got {}",
            ranks.len()
        )));
    }

    let mut placement = [None; 64];
    // FEN lists rank 8 first.
    for (i, text) in ranks.iter().enumerate() {
        let rank = 7 - i;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                file += skip as usize;
            } else if let Some(piece) = Piece::from_fen_char(c) {
                if file < 8 {
                    placement[rank * 8 + file] = Some(piece);
                }
                file += 1;
            } else {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "invalid character '{}' in rank {}",
                    c,
                    rank + 1
                )));
            }
        }
        if file != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "rank {} has {} squares, expected 8",
                rank + 1,
                file
            )));
        }
    }
    Ok(placement)
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let en_passant = self
            .en_passant
            .map_or_else(|| "-".to_string(), |sq| sq.to_algebraic());
        write!(
            f,
            "{} {} {} {} {} {}",
            Self::placement_field(&self.placement),
            self.active_color.fen_char(),
            self.castling,
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

impl std::str::FromStr for Fen {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fen::parse(s)
    }
}
