//! Perft: counts leaf nodes of the legal move tree to validate the generator
//! against published node counts.

use super::{generate_moves, make_move};
use crate::Position;

pub fn perft(position: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_moves(position);
    if depth == 1 {
        return moves.len() as u64;
    }

    moves
        .iter()
        .map(|m| perft(&make_move(position, *m), depth - 1))
        .sum()
}

/// Node count below each root move, sorted by notation. Handy for locating a
/// generator bug against a reference engine's `divide` output.
pub fn perft_divide(position: &Position, depth: u32) -> Vec<(String, u64)> {
    let mut results: Vec<(String, u64)> = generate_moves(position)
        .iter()
        .map(|m| {
            let nodes = perft(&make_move(position, *m), depth.saturating_sub(1));
            (m.to_string(), nodes)
        })
        .collect();
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 1";

    fn check(fen: &str, expected: &[u64]) {
        let position = Position::from_fen(fen).unwrap();
        for (depth, &nodes) in expected.iter().enumerate() {
            assert_eq!(
                perft(&position, depth as u32 + 1),
                nodes,
                "perft({}) of {}",
                depth + 1,
                fen
            );
        }
    }

    #[test]
    fn startpos() {
        let position = Position::startpos();
        assert_eq!(perft(&position, 1), 20);
        assert_eq!(perft(&position, 2), 400);
        assert_eq!(perft(&position, 3), 8902);
    }

    #[test]
    #[ignore]
    fn startpos_depth_4() {
        assert_eq!(perft(&Position::startpos(), 4), 197_281);
    }

    // Castling through and out of attacks, en passant, promotions.
    #[test]
    fn kiwipete() {
        check(KIWIPETE, &[48, 2039]);
    }

    #[test]
    #[ignore]
    fn kiwipete_depth_3() {
        check(KIWIPETE, &[48, 2039, 97_862]);
    }

    // En passant that would expose the king along a rank.
    #[test]
    fn position_3() {
        check(POSITION_3, &[14, 191, 2812]);
    }

    #[test]
    fn position_4() {
        check(POSITION_4, &[6, 264, 9467]);
    }

    #[test]
    fn position_5() {
        check(POSITION_5, &[44, 1486]);
    }

    #[test]
    fn divide_sums_to_perft() {
        let position = Position::startpos();
        let results = perft_divide(&position, 2);
        assert_eq!(results.len(), 20);
        assert_eq!(results.iter().map(|(_, n)| n).sum::<u64>(), 400);
        assert!(results.iter().any(|(m, n)| m == "g1-f3" && *n == 20));
    }
}
