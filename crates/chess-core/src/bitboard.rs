//! 64-bit occupancy sets.
//!
//! Bit i corresponds to square i (a1 = bit 0, h8 = bit 63). The board's
//! sensor matrix reports its state in exactly this layout, so the same type
//! serves both the logical board and the physical snapshot.

use crate::Square;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const FULL: Bitboard = Bitboard(!0);

    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00FF);
    pub const RANK_2: Bitboard = Bitboard(0x0000_0000_0000_FF00);
    pub const RANK_7: Bitboard = Bitboard(0x00FF_0000_0000_0000);
    pub const RANK_8: Bitboard = Bitboard(0xFF00_0000_0000_0000);

    #[inline]
    pub const fn new(bits: u64) -> Self {
        Bitboard(bits)
    }

    #[inline]
    pub const fn from_square(sq: Square) -> Self {
        Bitboard(sq.bit())
    }

    pub fn from_squares<I: IntoIterator<Item = Square>>(squares: I) -> Self {
        squares
            .into_iter()
            .fold(Bitboard::EMPTY, |bb, sq| bb.with(sq))
    }

    /// Parses `0x`-prefixed hex or plain decimal text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().replace('_', "");
        let bits = match text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16).ok()?,
            None => text.parse().ok()?,
        };
        Some(Bitboard(bits))
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Population count.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub const fn contains(self, sq: Square) -> bool {
        self.0 & sq.bit() != 0
    }

    #[inline]
    pub const fn with(self, sq: Square) -> Self {
        Bitboard(self.0 | sq.bit())
    }

    #[inline]
    pub const fn without(self, sq: Square) -> Self {
        Bitboard(self.0 & !sq.bit())
    }

    #[inline]
    pub fn set(&mut self, sq: Square) {
        self.0 |= sq.bit();
    }

    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !sq.bit();
    }

    /// The square of a one-bit set, `None` for zero or several bits.
    #[inline]
    pub fn single_square(self) -> Option<Square> {
        if self.count() == 1 {
            Square::from_index(self.0.trailing_zeros() as u8)
        } else {
            None
        }
    }

    #[inline]
    pub fn pop_lsb(&mut self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            let sq = self.0.trailing_zeros() as u8;
            self.0 &= self.0 - 1;
            Square::from_index(sq)
        }
    }

    #[inline]
    pub const fn is_subset_of(self, other: Bitboard) -> bool {
        self.0 & !other.0 == 0
    }
}

impl BitAnd for Bitboard {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        Bitboard(self.0 & rhs.0)
    }
}

impl BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Bitboard {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Bitboard(self.0 | rhs.0)
    }
}

impl BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXor for Bitboard {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self::Output {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl Not for Bitboard {
    type Output = Self;
    #[inline]
    fn not(self) -> Self::Output {
        Bitboard(!self.0)
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard({:#018x})", self.0)?;
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let sq = rank * 8 + file;
                if (self.0 >> sq) & 1 == 1 {
                    write!(f, "X ")?;
                } else {
                    write!(f, ". ")?;
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}

impl fmt::Display for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Iterator over set squares, a1 first.
pub struct BitboardIter(Bitboard);

impl Iterator for BitboardIter {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.pop_lsb()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.0.count() as usize;
        (count, Some(count))
    }
}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = BitboardIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        BitboardIter(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn from_square() {
        let bb = Bitboard::from_square(Square::A1);
        assert_eq!(bb.0, 1);
        assert!(bb.contains(Square::A1));
        assert!(!bb.contains(Square::H1));
    }

    #[test]
    fn count() {
        assert_eq!(Bitboard::EMPTY.count(), 0);
        assert_eq!(Bitboard::FULL.count(), 64);
        assert_eq!((Bitboard::RANK_1 | Bitboard::RANK_8).count(), 16);
    }

    #[test]
    fn single_square_requires_exactly_one_bit() {
        assert_eq!(Bitboard::from_square(sq("e4")).single_square(), Some(sq("e4")));
        assert_eq!(Bitboard::EMPTY.single_square(), None);
        assert_eq!(Bitboard::from_squares([sq("e2"), sq("e4")]).single_square(), None);
    }

    #[test]
    fn parse_hex_and_decimal() {
        assert_eq!(
            Bitboard::parse("0xFFFF00000000FFFF"),
            Some(Bitboard(0xFFFF_0000_0000_FFFF))
        );
        assert_eq!(Bitboard::parse("0xffff_0000_0000_ffff"), Some(Bitboard(0xFFFF_0000_0000_FFFF)));
        assert_eq!(Bitboard::parse("16"), Some(Bitboard(16)));
        assert_eq!(Bitboard::parse("0xZZ"), None);
    }

    #[test]
    fn iterator_yields_squares_in_index_order() {
        let squares: Vec<Square> = Bitboard::RANK_1.into_iter().collect();
        assert_eq!(squares.len(), 8);
        assert_eq!(squares[0], Square::A1);
        assert_eq!(squares[7], Square::H1);
    }

    #[test]
    fn subset() {
        let kings = Bitboard::from_squares([Square::E1, Square::E8]);
        assert!(Bitboard::from_square(Square::E1).is_subset_of(kings));
        assert!(!Bitboard::from_square(Square::D1).is_subset_of(kings));
    }
}
