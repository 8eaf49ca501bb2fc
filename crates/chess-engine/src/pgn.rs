//! PGN-style export of a game: tag pairs, numbered move pairs in the board's
//! own move notation, and the result token.

use crate::Game;
use chrono::Local;
use std::io::Write;

/// Tag values that do not come from the game itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnHeaders {
    pub event: String,
    pub site: String,
    pub round: String,
    pub white: String,
    pub black: String,
}

impl Default for PgnHeaders {
    fn default() -> Self {
        PgnHeaders {
            event: "?".to_string(),
            site: "?".to_string(),
            round: "?".to_string(),
            white: "?".to_string(),
            black: "?".to_string(),
        }
    }
}

impl Game {
    /// Renders the game as PGN-like text, dated today.
    pub fn to_pgn(&self, headers: &PgnHeaders) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = write_pgn(&mut out, self, headers, &Local::now().format("%Y.%m.%d").to_string());
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Writes `game` as PGN-like text. Move text wraps at 80 columns.
pub fn write_pgn<W: Write>(
    out: &mut W,
    game: &Game,
    headers: &PgnHeaders,
    date: &str,
) -> std::io::Result<()> {
    let result = game.result().token();

    writeln!(out, "[Event \"{}\"]", headers.event)?;
    writeln!(out, "[Site \"{}\"]", headers.site)?;
    writeln!(out, "[Date \"{}\"]", date)?;
    writeln!(out, "[Round \"{}\"]", headers.round)?;
    writeln!(out, "[White \"{}\"]", headers.white)?;
    writeln!(out, "[Black \"{}\"]", headers.black)?;
    writeln!(out, "[Result \"{}\"]", result)?;
    writeln!(out)?;

    let history = game.history_text();
    let move_text = if history.is_empty() {
        result.to_string()
    } else {
        format!("{} {}", history, result)
    };

    let mut line = String::new();
    for word in move_text.split(' ') {
        if !line.is_empty() && line.len() + 1 + word.len() > 80 {
            writeln!(out, "{}", line)?;
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    writeln!(out, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Color;

    fn render(game: &Game, headers: &PgnHeaders) -> String {
        let mut out = Vec::new();
        write_pgn(&mut out, game, headers, "2024.01.02").unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn headers_and_moves() {
        let mut game = Game::new();
        for (text, side) in [
            ("f2-f3", Color::White),
            ("e7-e5", Color::Black),
            ("g2-g4", Color::White),
            ("d8-h4", Color::Black),
        ] {
            game.apply_move(text, side).unwrap();
        }
        let headers = PgnHeaders {
            event: "Casual".to_string(),
            white: "Board".to_string(),
            black: "Engine".to_string(),
            ..PgnHeaders::default()
        };

        let pgn = render(&game, &headers);
        let expected = "[Event \"Casual\"]\n\
                        [Site \"?\"]\n\
                        [Date \"2024.01.02\"]\n\
                        [Round \"?\"]\n\
                        [White \"Board\"]\n\
                        [Black \"Engine\"]\n\
                        [Result \"0-1\"]\n\
                        \n\
                        1. f2-f3 e7-e5 2. g2-g4 d8-h4# 0-1\n";
        assert_eq!(pgn, expected);
    }

    #[test]
    fn unfinished_game_without_moves() {
        let pgn = render(&Game::new(), &PgnHeaders::default());
        assert!(pgn.contains("[Result \"*\"]"));
        assert!(pgn.ends_with("\n*\n"));
    }

    #[test]
    fn long_games_wrap() {
        let mut game = Game::new();
        for _ in 0..10 {
            for (text, side) in [
                ("g1-f3", Color::White),
                ("g8-f6", Color::Black),
                ("f3-g1", Color::White),
                ("f6-g8", Color::Black),
            ] {
                game.apply_move(text, side).unwrap();
            }
        }
        let pgn = render(&game, &PgnHeaders::default());
        let body: Vec<&str> = pgn.split("\n\n").nth(1).unwrap().lines().collect();
        assert!(body.len() > 1);
        assert!(body.iter().all(|line| line.len() <= 80));
    }

    #[test]
    fn to_pgn_dates_today() {
        let pgn = Game::new().to_pgn(&PgnHeaders::default());
        assert!(pgn.contains("[Date \""));
        assert!(!pgn.contains("[Date \"?\"]"));
    }
}
