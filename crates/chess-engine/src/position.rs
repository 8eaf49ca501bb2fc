//! Complete position state: placement plus the FEN metadata.

use chess_core::{CastlingRights, Color, Fen, FenError, Piece, Square};

use crate::Board;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub board: Board,
    pub side_to_move: Color,
    pub castling: CastlingRights,
    /// Square a pawn skipped on its last two-square push, if any.
    pub en_passant: Option<Square>,
    /// Plies since the last capture or pawn move.
    pub halfmove_clock: u32,
    /// Starts at 1 and increments after Black moves.
    pub fullmove_number: u32,
}

impl Position {
    pub fn empty() -> Self {
        Position {
            board: Board::empty(),
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn startpos() -> Self {
        Position {
            board: Board::standard(),
            castling: CastlingRights::ALL,
            ..Self::empty()
        }
    }

    /// Loads a position from FEN. Only syntax is checked; the resulting
    /// position may be one that cannot arise in a game.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fen = Fen::parse(fen)?;
        Ok(Position {
            board: Board::from_placement(fen.placement),
            side_to_move: fen.active_color,
            castling: fen.castling,
            en_passant: fen.en_passant,
            halfmove_clock: fen.halfmove_clock,
            fullmove_number: fen.fullmove_number,
        })
    }

    pub fn to_fen(&self) -> String {
        Fen {
            placement: *self.board.placement(),
            active_color: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
        .to_string()
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board.get(sq)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{CastleSide, PieceKind};

    #[test]
    fn startpos_matches_fen() {
        assert_eq!(Position::startpos().to_fen(), Fen::STARTPOS);
        assert_eq!(Position::from_fen(Fen::STARTPOS).unwrap(), Position::startpos());
    }

    #[test]
    fn fen_roundtrip() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 b - - 13 41",
        ] {
            assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn metadata_fields() {
        let pos =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b Kq e3 0 1").unwrap();
        assert_eq!(pos.side_to_move, Color::Black);
        assert_eq!(pos.en_passant, Square::from_algebraic("e3"));
        assert!(pos.castling.has(Color::White, CastleSide::Kingside));
        assert!(!pos.castling.has(Color::White, CastleSide::Queenside));
        assert_eq!(
            pos.piece_at(Square::from_algebraic("e4").unwrap()),
            Some(Piece::new(Color::White, PieceKind::Pawn))
        );
    }

    #[test]
    fn rejects_malformed_fen() {
        assert!(Position::from_fen("not a fen").is_err());
    }
}
