//! Square-indexed piece placement.

use chess_core::{Bitboard, Color, Piece, PieceKind, Square};
use std::fmt;
use std::ops::Index;

/// 64 squares, a1 first. Each square holds a piece or nothing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    squares: [Option<Piece>; 64],
}

impl Board {
    pub const fn empty() -> Self {
        Board { squares: [None; 64] }
    }

    pub const fn from_placement(squares: [Option<Piece>; 64]) -> Self {
        Board { squares }
    }

    /// Standard starting arrangement.
    pub fn standard() -> Self {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        let mut board = Board::empty();
        for color in Color::ALL {
            for (file, kind) in BACK_RANK.iter().enumerate() {
                let file = file as i8;
                if let Some(sq) = Square::from_coords(file, color.back_rank() as i8) {
                    board.put(sq, Piece::new(color, *kind));
                }
                if let Some(sq) = Square::from_coords(file, color.pawn_rank() as i8) {
                    board.put(sq, Piece::new(color, PieceKind::Pawn));
                }
            }
        }
        board
    }

    pub fn placement(&self) -> &[Option<Piece>; 64] {
        &self.squares
    }

    #[inline]
    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index() as usize]
    }

    #[inline]
    pub fn is_empty(&self, sq: Square) -> bool {
        self.get(sq).is_none()
    }

    #[inline]
    pub fn put(&mut self, sq: Square, piece: Piece) {
        self.squares[sq.index() as usize] = Some(piece);
    }

    /// Removes and returns whatever stands on `sq`.
    #[inline]
    pub fn take(&mut self, sq: Square) -> Option<Piece> {
        self.squares[sq.index() as usize].take()
    }

    /// Iterates occupied squares, a1 first.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.get(sq).map(|piece| (sq, piece)))
    }

    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.pieces().filter(move |(_, piece)| piece.color == color)
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, piece)| piece.is(color, PieceKind::King))
            .map(|(sq, _)| sq)
    }

    /// Occupancy in the same layout the sensor matrix reports.
    pub fn occupancy(&self) -> Bitboard {
        Bitboard::from_squares(self.pieces().map(|(sq, _)| sq))
    }

    pub fn occupancy_of(&self, color: Color) -> Bitboard {
        Bitboard::from_squares(self.pieces_of(color).map(|(sq, _)| sq))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<Square> for Board {
    type Output = Option<Piece>;

    fn index(&self, sq: Square) -> &Self::Output {
        &self.squares[sq.index() as usize]
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for rank in (0..8i8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8i8 {
                let c = Square::from_coords(file, rank)
                    .and_then(|sq| self.get(sq))
                    .map_or('.', |piece| piece.to_fen_char());
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout() {
        let board = Board::standard();
        assert_eq!(board.pieces().count(), 32);
        assert_eq!(board.king_square(Color::White), Some(Square::E1));
        assert_eq!(board.king_square(Color::Black), Some(Square::E8));
        assert_eq!(
            board[Square::D1],
            Some(Piece::new(Color::White, PieceKind::Queen))
        );
        assert_eq!(board.occupancy(), Bitboard(0xFFFF_0000_0000_FFFF));
        assert_eq!(board.occupancy_of(Color::White), Bitboard(0xFFFF));
    }

    #[test]
    fn put_and_take() {
        let mut board = Board::empty();
        let knight = Piece::new(Color::Black, PieceKind::Knight);
        let f6 = Square::from_algebraic("f6").unwrap();
        board.put(f6, knight);
        assert_eq!(board.get(f6), Some(knight));
        assert_eq!(board.take(f6), Some(knight));
        assert!(board.is_empty(f6));
        assert_eq!(board.take(f6), None);
    }

    #[test]
    fn missing_king() {
        assert_eq!(Board::empty().king_square(Color::White), None);
    }
}
