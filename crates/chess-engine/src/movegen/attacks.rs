//! Square attack detection by walking offsets and rays on the board.
//!
//! All steps go through [`Square::offset`], which refuses to wrap around a
//! board edge, so a knight on h-file never "attacks" the a-file.

use crate::Board;
use chess_core::{Color, Piece, PieceKind, Square};

/// (file, rank) steps of a knight.
pub const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// (file, rank) steps of a king.
pub const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

pub const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];
pub const ORTHOGONALS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Ray directions for a sliding piece kind. Empty for non-sliders.
pub fn slider_directions(kind: PieceKind) -> &'static [(i8, i8)] {
    const QUEEN: [(i8, i8); 8] = [
        (1, 1),
        (1, -1),
        (-1, -1),
        (-1, 1),
        (0, 1),
        (1, 0),
        (0, -1),
        (-1, 0),
    ];
    match kind {
        PieceKind::Bishop => &DIAGONALS,
        PieceKind::Rook => &ORTHOGONALS,
        PieceKind::Queen => &QUEEN,
        _ => &[],
    }
}

/// First occupied square along a ray from `from` (exclusive) and its piece.
pub fn first_blocker(board: &Board, from: Square, step: (i8, i8)) -> Option<(Square, Piece)> {
    let mut current = from;
    while let Some(next) = current.offset(step.0, step.1) {
        if let Some(piece) = board.get(next) {
            return Some((next, piece));
        }
        current = next;
    }
    None
}

/// Returns true if a piece of color `by` attacks `sq`.
///
/// Checked in order: pawns, knights, sliding pieces along diagonals and
/// orthogonals (each ray stops at its first occupied square), then the king.
/// Whether `sq` itself is occupied does not matter.
pub fn is_square_attacked(board: &Board, sq: Square, by: Color) -> bool {
    // A pawn of `by` attacks diagonally forward, so it stands one rank behind
    // `sq` from its own point of view.
    let behind = -by.pawn_direction();
    for file_step in [-1, 1] {
        if let Some(from) = sq.offset(file_step, behind) {
            if board.get(from) == Some(Piece::new(by, PieceKind::Pawn)) {
                return true;
            }
        }
    }

    let knight = Some(Piece::new(by, PieceKind::Knight));
    if KNIGHT_OFFSETS
        .iter()
        .filter_map(|&(df, dr)| sq.offset(df, dr))
        .any(|from| board.get(from) == knight)
    {
        return true;
    }

    for &step in &DIAGONALS {
        if let Some((_, piece)) = first_blocker(board, sq, step) {
            if piece.color == by && matches!(piece.kind, PieceKind::Bishop | PieceKind::Queen) {
                return true;
            }
        }
    }

    for &step in &ORTHOGONALS {
        if let Some((_, piece)) = first_blocker(board, sq, step) {
            if piece.color == by && matches!(piece.kind, PieceKind::Rook | PieceKind::Queen) {
                return true;
            }
        }
    }

    let king = Some(Piece::new(by, PieceKind::King));
    KING_OFFSETS
        .iter()
        .filter_map(|&(df, dr)| sq.offset(df, dr))
        .any(|from| board.get(from) == king)
}

/// Returns true if `color` has a king and it is attacked. A board without
/// that king is never in check.
pub fn is_in_check(board: &Board, color: Color) -> bool {
    board
        .king_square(color)
        .is_some_and(|king| is_square_attacked(board, king, color.opposite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn board(fen: &str) -> Board {
        Position::from_fen(fen).unwrap().board
    }

    #[test]
    fn pawn_attacks_point_forward() {
        let b = board("8/8/8/3p4/8/8/4P3/8 w - - 0 1");
        // White pawn on e2 covers d3 and f3 only.
        assert!(is_square_attacked(&b, sq("d3"), Color::White));
        assert!(is_square_attacked(&b, sq("f3"), Color::White));
        assert!(!is_square_attacked(&b, sq("e3"), Color::White));
        assert!(!is_square_attacked(&b, sq("d1"), Color::White));
        // Black pawn on d5 covers c4 and e4.
        assert!(is_square_attacked(&b, sq("c4"), Color::Black));
        assert!(is_square_attacked(&b, sq("e4"), Color::Black));
        assert!(!is_square_attacked(&b, sq("c6"), Color::Black));
    }

    #[test]
    fn pawn_attacks_do_not_wrap() {
        let b = board("8/8/8/8/8/8/7P/8 w - - 0 1");
        assert!(is_square_attacked(&b, sq("g3"), Color::White));
        assert!(!is_square_attacked(&b, sq("a4"), Color::White));
        assert!(!is_square_attacked(&b, sq("a3"), Color::White));
    }

    #[test]
    fn knight_attacks_do_not_wrap() {
        let b = board("8/8/8/8/8/8/8/7N w - - 0 1");
        assert!(is_square_attacked(&b, sq("g3"), Color::White));
        assert!(is_square_attacked(&b, sq("f2"), Color::White));
        assert!(!is_square_attacked(&b, sq("a2"), Color::White));
        assert!(!is_square_attacked(&b, sq("b3"), Color::White));
    }

    #[test]
    fn rays_stop_at_first_blocker() {
        let b = board("8/8/8/8/r2P3k/8/8/8 w - - 0 1");
        assert!(is_square_attacked(&b, sq("b4"), Color::Black));
        assert!(is_square_attacked(&b, sq("d4"), Color::Black));
        assert!(!is_square_attacked(&b, sq("e4"), Color::Black));
        assert!(is_square_attacked(&b, sq("a8"), Color::Black));
    }

    #[test]
    fn queen_rays_blocked_by_own_pieces() {
        let b = board("8/8/8/8/8/n1b5/8/q7 w - - 0 1");
        assert!(is_square_attacked(&b, sq("e1"), Color::Black));
        assert!(is_square_attacked(&b, sq("b2"), Color::Black));
        // The a-file is blocked by the knight on a3.
        assert!(!is_square_attacked(&b, sq("a6"), Color::Black));
        assert!(!is_square_attacked(&b, sq("g8"), Color::Black));
    }

    #[test]
    fn king_adjacency() {
        let b = board("8/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(is_square_attacked(&b, sq("d2"), Color::White));
        assert!(is_square_attacked(&b, sq("f1"), Color::White));
        assert!(!is_square_attacked(&b, sq("e3"), Color::White));
        assert!(!is_square_attacked(&b, sq("e1"), Color::Black));
    }

    #[test]
    fn check_detection() {
        let b = board("4k3/8/8/8/8/8/8/4R1K1 b - - 0 1");
        assert!(is_in_check(&b, Color::Black));
        assert!(!is_in_check(&b, Color::White));
        assert!(!is_in_check(&Board::empty(), Color::White));
    }
}
