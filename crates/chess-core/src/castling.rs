//! Castling rights and castling geometry.

use crate::{Bitboard, Color, Square};
use std::fmt;

/// Which wing a castling move goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

impl CastleSide {
    pub const ALL: [CastleSide; 2] = [CastleSide::Kingside, CastleSide::Queenside];

    pub const fn king_from(color: Color) -> Square {
        match color {
            Color::White => Square::E1,
            Color::Black => Square::E8,
        }
    }

    pub const fn king_to(self, color: Color) -> Square {
        match (self, color) {
            (CastleSide::Kingside, Color::White) => Square::G1,
            (CastleSide::Queenside, Color::White) => Square::C1,
            (CastleSide::Kingside, Color::Black) => Square::G8,
            (CastleSide::Queenside, Color::Black) => Square::C8,
        }
    }

    pub const fn rook_from(self, color: Color) -> Square {
        match (self, color) {
            (CastleSide::Kingside, Color::White) => Square::H1,
            (CastleSide::Queenside, Color::White) => Square::A1,
            (CastleSide::Kingside, Color::Black) => Square::H8,
            (CastleSide::Queenside, Color::Black) => Square::A8,
        }
    }

    pub const fn rook_to(self, color: Color) -> Square {
        match (self, color) {
            (CastleSide::Kingside, Color::White) => Square::F1,
            (CastleSide::Queenside, Color::White) => Square::D1,
            (CastleSide::Kingside, Color::Black) => Square::F8,
            (CastleSide::Queenside, Color::Black) => Square::D8,
        }
    }

    /// Squares between king and rook that must be empty.
    pub fn between(self, color: Color) -> Bitboard {
        let rank = color.back_rank() as i8;
        let files: &[i8] = match self {
            CastleSide::Kingside => &[5, 6],
            CastleSide::Queenside => &[1, 2, 3],
        };
        Bitboard::from_squares(files.iter().filter_map(|&f| Square::from_coords(f, rank)))
    }

    /// Squares the king stands on, crosses, or lands on. None may be attacked.
    pub fn king_path(self, color: Color) -> [Square; 3] {
        let from = Self::king_from(color);
        let to = self.king_to(color);
        let transit = self.rook_to(color);
        [from, transit, to]
    }

    /// The literal notation token.
    pub const fn token(self) -> &'static str {
        match self {
            CastleSide::Kingside => "O-O",
            CastleSide::Queenside => "O-O-O",
        }
    }
}

/// Four independent castling flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    const fn flag(color: Color, side: CastleSide) -> u8 {
        match (color, side) {
            (Color::White, CastleSide::Kingside) => 0b0001,
            (Color::White, CastleSide::Queenside) => 0b0010,
            (Color::Black, CastleSide::Kingside) => 0b0100,
            (Color::Black, CastleSide::Queenside) => 0b1000,
        }
    }

    #[inline]
    pub const fn has(self, color: Color, side: CastleSide) -> bool {
        self.0 & Self::flag(color, side) != 0
    }

    #[inline]
    pub fn grant(&mut self, color: Color, side: CastleSide) {
        self.0 |= Self::flag(color, side);
    }

    #[inline]
    pub fn remove(&mut self, color: Color, side: CastleSide) {
        self.0 &= !Self::flag(color, side);
    }

    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        self.remove(color, CastleSide::Kingside);
        self.remove(color, CastleSide::Queenside);
    }

    /// Drops whichever right depends on a rook standing on `sq`.
    pub fn remove_for_rook_square(&mut self, sq: Square) {
        for color in Color::ALL {
            for side in CastleSide::ALL {
                if side.rook_from(color) == sq {
                    self.remove(color, side);
                }
            }
        }
    }

    /// Parses the FEN castling field (`KQkq` subset or `-`).
    pub fn from_fen(field: &str) -> Option<Self> {
        if field == "-" {
            return Some(Self::NONE);
        }
        if field.is_empty() {
            return None;
        }
        let mut rights = Self::NONE;
        for c in field.chars() {
            let (color, side) = match c {
                'K' => (Color::White, CastleSide::Kingside),
                'Q' => (Color::White, CastleSide::Queenside),
                'k' => (Color::Black, CastleSide::Kingside),
                'q' => (Color::Black, CastleSide::Queenside),
                _ => return None,
            };
            rights.grant(color, side);
        }
        Some(rights)
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (color, side, c) in [
            (Color::White, CastleSide::Kingside, 'K'),
            (Color::White, CastleSide::Queenside, 'Q'),
            (Color::Black, CastleSide::Kingside, 'k'),
            (Color::Black, CastleSide::Queenside, 'q'),
        ] {
            if self.has(color, side) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}
