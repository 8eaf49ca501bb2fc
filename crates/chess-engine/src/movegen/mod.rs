//! Move generation.
//!
//! Moves are generated per piece by walking offsets and rays on the board,
//! then filtered by playing each candidate on a scratch copy of the position
//! and testing the mover's king. Castling skips that filter: its generation
//! already requires the king's start, transit and destination squares to be
//! safe.

mod attacks;
pub mod perft;

use crate::Position;
use chess_core::{CastleSide, Color, MoveKind, Notation, Piece, PieceKind, Square};

pub use attacks::{
    first_blocker, is_in_check, is_square_attacked, slider_directions, DIAGONALS, KING_OFFSETS,
    KNIGHT_OFFSETS, ORTHOGONALS,
};

/// A list of moves with a fixed maximum capacity.
///
/// No position has more than 218 legal moves, so a fixed array avoids heap
/// allocation while generating.
#[derive(Clone)]
pub struct MoveList {
    moves: [Notation; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    pub const MAX_MOVES: usize = 256;

    const FILLER: Notation = Notation::Castle(CastleSide::Kingside);

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [Self::FILLER; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, m: Notation) {
        debug_assert!(self.len < Self::MAX_MOVES);
        if self.len < Self::MAX_MOVES {
            self.moves[self.len] = m;
            self.len += 1;
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[Notation] {
        &self.moves[..self.len]
    }

    pub fn contains(&self, m: &Notation) -> bool {
        self.as_slice().contains(m)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notation> {
        self.as_slice().iter()
    }

    /// Canonical notation text of every move, in generation order.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|m| m.to_string()).collect()
    }

    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&Notation) -> bool,
    {
        let mut write = 0;
        for read in 0..self.len {
            if f(&self.moves[read]) {
                self.moves[write] = self.moves[read];
                write += 1;
            }
        }
        self.len = write;
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Notation;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Notation;
    type IntoIter = std::slice::Iter<'a, Notation>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|m| m.to_string()))
            .finish()
    }
}

/// How far [`legal_moves_for`] scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalScan {
    All,
    /// Stop once one fully legal move is confirmed. Enough to tell whether
    /// the side has any move at all.
    FirstOnly,
}

/// Legal moves of whatever piece stands on `from`, for that piece's color.
/// Empty when the square is empty.
pub fn legal_moves_from(position: &Position, from: Square) -> MoveList {
    let mut moves = MoveList::new();
    let Some(piece) = position.board.get(from) else {
        return moves;
    };
    pseudo_legal_moves_from(position, from, piece, &mut moves);
    moves.retain(|m| m.castle_side().is_some() || !leaves_king_attacked(position, *m, piece.color));
    moves
}

/// Legal moves of every piece of `color`.
pub fn legal_moves_for(position: &Position, color: Color, scan: LegalScan) -> MoveList {
    let mut moves = MoveList::new();
    for (from, _) in position.board.pieces_of(color) {
        for m in &legal_moves_from(position, from) {
            moves.push(*m);
            if scan == LegalScan::FirstOnly {
                return moves;
            }
        }
    }
    moves
}

/// Legal moves for the side to move.
pub fn generate_moves(position: &Position) -> MoveList {
    legal_moves_for(position, position.side_to_move, LegalScan::All)
}

/// Returns true if `color` has at least one legal move.
pub fn has_legal_move(position: &Position, color: Color) -> bool {
    !legal_moves_for(position, color, LegalScan::FirstOnly).is_empty()
}

fn leaves_king_attacked(position: &Position, m: Notation, color: Color) -> bool {
    let next = make_move(position, m);
    is_in_check(&next.board, color)
}

fn pseudo_legal_moves_from(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    match piece.kind {
        PieceKind::Pawn => pawn_moves(position, from, piece.color, moves),
        PieceKind::Knight => step_moves(position, from, piece.color, &KNIGHT_OFFSETS, moves),
        PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen => {
            slider_moves(position, from, piece, moves)
        }
        PieceKind::King => {
            step_moves(position, from, piece.color, &KING_OFFSETS, moves);
            castling_moves(position, from, piece.color, moves);
        }
    }
}

fn push_pawn_move(from: Square, to: Square, kind: MoveKind, color: Color, moves: &mut MoveList) {
    let base = Notation::Piece {
        from,
        to,
        kind,
        promotion: None,
    };
    if to.rank_index() == color.promotion_rank() {
        for piece in PieceKind::PROMOTIONS {
            moves.push(base.with_promotion(piece));
        }
    } else {
        moves.push(base);
    }
}

fn pawn_moves(position: &Position, from: Square, color: Color, moves: &mut MoveList) {
    let board = &position.board;
    let dir = color.pawn_direction();

    if let Some(one) = from.offset(0, dir) {
        if board.is_empty(one) {
            push_pawn_move(from, one, MoveKind::Quiet, color, moves);
            if from.rank_index() == color.pawn_rank() {
                if let Some(two) = one.offset(0, dir) {
                    if board.is_empty(two) {
                        moves.push(Notation::quiet(from, two));
                    }
                }
            }
        }
    }

    for file_step in [-1, 1] {
        let Some(to) = from.offset(file_step, dir) else {
            continue;
        };
        match board.get(to) {
            Some(target) if target.color != color => {
                push_pawn_move(from, to, MoveKind::Capture, color, moves);
            }
            None if position.en_passant == Some(to) && position.side_to_move == color => {
                // The pawn being captured sits beside `from`, on the target's file.
                let victim = from.offset(file_step, 0);
                let victim_piece = victim.and_then(|sq| board.get(sq));
                if victim_piece == Some(Piece::new(color.opposite(), PieceKind::Pawn)) {
                    moves.push(Notation::en_passant(from, to));
                }
            }
            _ => {}
        }
    }
}

fn step_moves(
    position: &Position,
    from: Square,
    color: Color,
    offsets: &[(i8, i8)],
    moves: &mut MoveList,
) {
    for &(df, dr) in offsets {
        let Some(to) = from.offset(df, dr) else {
            continue;
        };
        match position.board.get(to) {
            None => moves.push(Notation::quiet(from, to)),
            Some(target) if target.color != color => moves.push(Notation::capture(from, to)),
            Some(_) => {}
        }
    }
}

fn slider_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    for &(df, dr) in slider_directions(piece.kind) {
        let mut current = from;
        while let Some(to) = current.offset(df, dr) {
            match position.board.get(to) {
                None => moves.push(Notation::quiet(from, to)),
                Some(target) => {
                    if target.color != piece.color {
                        moves.push(Notation::capture(from, to));
                    }
                    break;
                }
            }
            current = to;
        }
    }
}

fn castling_moves(position: &Position, from: Square, color: Color, moves: &mut MoveList) {
    if from != CastleSide::king_from(color) {
        return;
    }
    let board = &position.board;
    let occupied = board.occupancy();
    let enemy = color.opposite();

    for side in CastleSide::ALL {
        if !position.castling.has(color, side) {
            continue;
        }
        if board.get(side.rook_from(color)) != Some(Piece::new(color, PieceKind::Rook)) {
            continue;
        }
        if !(occupied & side.between(color)).is_empty() {
            continue;
        }
        if side
            .king_path(color)
            .iter()
            .any(|&sq| is_square_attacked(board, sq, enemy))
        {
            continue;
        }
        moves.push(Notation::castle(side));
    }
}

/// Plays `m` on a copy of `position` and returns the copy.
///
/// The mover is the piece on the origin square (the side to move for
/// castling). The move is not checked for legality; a move from an empty
/// square leaves the position unchanged.
pub fn make_move(position: &Position, m: Notation) -> Position {
    let mut next = position.clone();

    let (us, reset_halfmove) = match m {
        Notation::Castle(side) => {
            let us = position.side_to_move;
            let king_from = CastleSide::king_from(us);
            if let Some(king) = next.board.take(king_from) {
                next.board.put(side.king_to(us), king);
            }
            if let Some(rook) = next.board.take(side.rook_from(us)) {
                next.board.put(side.rook_to(us), rook);
            }
            next.castling.remove_color(us);
            next.en_passant = None;
            (us, false)
        }
        Notation::Piece {
            from,
            to,
            kind,
            promotion,
        } => {
            let Some(piece) = next.board.take(from) else {
                return next;
            };
            let us = piece.color;
            let mut captured = next.board.take(to);
            if kind == MoveKind::EnPassant {
                if let Some(victim) = Square::from_coords(to.file_index() as i8, from.rank_index() as i8) {
                    captured = next.board.take(victim);
                }
            }

            let placed = match promotion {
                Some(promoted) if piece.kind == PieceKind::Pawn => Piece::new(us, promoted),
                _ => piece,
            };
            next.board.put(to, placed);

            match piece.kind {
                PieceKind::King => next.castling.remove_color(us),
                PieceKind::Rook => next.castling.remove_for_rook_square(from),
                _ => {}
            }
            if captured.is_some() {
                next.castling.remove_for_rook_square(to);
            }

            let double_push = piece.kind == PieceKind::Pawn
                && (to.rank_index() as i8 - from.rank_index() as i8).abs() == 2;
            next.en_passant = if double_push {
                from.offset(0, us.pawn_direction())
            } else {
                None
            };

            (us, piece.kind == PieceKind::Pawn || captured.is_some())
        }
    };

    next.halfmove_clock = if reset_halfmove {
        0
    } else {
        position.halfmove_clock + 1
    };
    if us == Color::Black {
        next.fullmove_number += 1;
    }
    next.side_to_move = us.opposite();
    next
}
