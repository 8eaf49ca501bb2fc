//! The physical board: what the sensors last reported, and which piece the
//! firmware believes stands on each occupied square.

use chess_core::{Bitboard, CastleSide, Color, Piece, Square};
use chess_engine::{Board, Position};

/// Occupancy of the standard starting arrangement: ranks 1, 2, 7 and 8.
pub const STARTING_OCCUPANCY: Bitboard = Bitboard(0xFFFF_0000_0000_FFFF);

/// Squares that changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    /// Occupied before, empty after.
    pub vacated: Bitboard,
    /// Empty before, occupied after.
    pub occupied: Bitboard,
}

impl Delta {
    pub fn between(before: Bitboard, after: Bitboard) -> Self {
        Delta {
            vacated: before & !after,
            occupied: after & !before,
        }
    }

    pub fn changed(self) -> Bitboard {
        self.vacated | self.occupied
    }

    pub fn count(self) -> u32 {
        self.changed().count()
    }

    pub fn is_empty(self) -> bool {
        self.changed().is_empty()
    }
}

pub fn delta(before: Bitboard, after: Bitboard) -> Delta {
    Delta::between(before, after)
}

/// The square of a one-square delta.
pub fn single_square(bits: Bitboard) -> Option<Square> {
    bits.single_square()
}

pub fn squares(bits: Bitboard) -> Vec<Square> {
    bits.into_iter().collect()
}

/// King and rook home squares for a castling move.
pub fn castling_origin(color: Color, side: CastleSide) -> Bitboard {
    Bitboard::from_square(CastleSide::king_from(color)) | Bitboard::from_square(side.rook_from(color))
}

/// King and rook destination squares for a castling move.
pub fn castling_target(color: Color, side: CastleSide) -> Bitboard {
    Bitboard::from_square(side.king_to(color)) | Bitboard::from_square(side.rook_to(color))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalBoard {
    occupancy: Bitboard,
    mirror: Board,
}

impl PhysicalBoard {
    /// A board whose sensors agree with `position`.
    pub fn new(position: &Position) -> Self {
        PhysicalBoard {
            occupancy: position.board.occupancy(),
            mirror: position.board.clone(),
        }
    }

    /// Stores a new sensor snapshot and returns what changed since the last one.
    pub fn capture(&mut self, snapshot: Bitboard) -> Delta {
        let change = Delta::between(self.occupancy, snapshot);
        self.occupancy = snapshot;
        change
    }

    pub fn occupancy(&self) -> Bitboard {
        self.occupancy
    }

    pub fn count_pieces(&self) -> u32 {
        self.occupancy.count()
    }

    pub fn mirror(&self) -> &Board {
        &self.mirror
    }

    /// The piece the mirror places on `sq`.
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.mirror.get(sq)
    }

    /// Forces the mirror to the rule engine's board.
    pub fn sync_mirror(&mut self, position: &Position) {
        self.mirror = position.board.clone();
    }

    /// Where the sensors disagree with `position`: `vacated` squares should
    /// hold a piece but read empty, `occupied` squares read a piece that
    /// should not be there.
    pub fn mismatch(&self, position: &Position) -> Delta {
        Delta::between(position.board.occupancy(), self.occupancy)
    }

    pub fn matches(&self, position: &Position) -> bool {
        self.mismatch(position).is_empty()
    }
}
