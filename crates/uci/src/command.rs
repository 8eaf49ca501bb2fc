//! Commands sent from the board to the remote engine.

use crate::UciError;
use std::fmt;

/// Commands sent from the board to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Initialize UCI mode.
    Uci,
    /// Set an engine option.
    SetOption { name: String, value: String },
    /// Check if engine is ready.
    IsReady,
    /// The next search belongs to a different game.
    UciNewGame,
    /// Set up position. `None` is the standard starting position.
    Position { fen: Option<String> },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
}

/// Search limits for the `go` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GoOptions {
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Search for at most this many milliseconds.
    pub movetime: Option<u64>,
}

impl EngineCommand {
    pub fn skill_level(level: u32) -> Self {
        EngineCommand::SetOption {
            name: "Skill Level".to_string(),
            value: level.to_string(),
        }
    }

    /// The command as one protocol line, without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            EngineCommand::Uci => "uci".to_string(),
            EngineCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            EngineCommand::IsReady => "isready".to_string(),
            EngineCommand::UciNewGame => "ucinewgame".to_string(),
            EngineCommand::Position { fen: None } => "position startpos".to_string(),
            EngineCommand::Position { fen: Some(fen) } => format!("position fen {}", fen),
            EngineCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                if let Some(d) = opts.depth {
                    parts.push(format!("depth {}", d));
                }
                if let Some(t) = opts.movetime {
                    parts.push(format!("movetime {}", t));
                }
                parts.join(" ")
            }
            EngineCommand::Stop => "stop".to_string(),
            EngineCommand::Quit => "quit".to_string(),
        }
    }

    /// Parse a command line. The engine side of a conversation, used by
    /// engine stand-ins.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        match parts.next().unwrap_or("") {
            "uci" => Ok(EngineCommand::Uci),
            "isready" => Ok(EngineCommand::IsReady),
            "ucinewgame" => Ok(EngineCommand::UciNewGame),
            "stop" => Ok(EngineCommand::Stop),
            "quit" => Ok(EngineCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Ok(Self::parse_go(parts)),
            _ => Err(UciError::Parse(format!("unknown command '{}'", input))),
        }
    }

    fn parse_setoption<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let parts: Vec<&str> = parts.collect();
        let value_idx = parts.iter().position(|&s| s == "value");
        match (parts.first(), value_idx) {
            (Some(&"name"), Some(idx)) if idx > 1 => Ok(EngineCommand::SetOption {
                name: parts[1..idx].join(" "),
                value: parts[idx + 1..].join(" "),
            }),
            _ => Err(UciError::Parse(format!(
                "expected 'name <id> value <x>', got '{}'",
                parts.join(" ")
            ))),
        }
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        match parts.next() {
            Some("startpos") => Ok(EngineCommand::Position { fen: None }),
            Some("fen") => {
                let fen: Vec<&str> = parts.take_while(|&p| p != "moves").collect();
                if fen.is_empty() {
                    return Err(UciError::Parse("position fen without a FEN".to_string()));
                }
                Ok(EngineCommand::Position {
                    fen: Some(fen.join(" ")),
                })
            }
            Some(other) => Err(UciError::Parse(format!(
                "expected 'startpos' or 'fen', got '{}'",
                other
            ))),
            None => Err(UciError::Parse("expected 'startpos' or 'fen'".to_string())),
        }
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Self {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        opts.depth = parts[i].parse().ok();
                    }
                }
                "movetime" => {
                    i += 1;
                    if i < parts.len() {
                        opts.movetime = parts[i].parse().ok();
                    }
                }
                _ => {}
            }
            i += 1;
        }

        EngineCommand::Go(opts)
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_lines() {
        assert_eq!(EngineCommand::Uci.to_line(), "uci");
        assert_eq!(
            EngineCommand::skill_level(3).to_line(),
            "setoption name Skill Level value 3"
        );
        assert_eq!(EngineCommand::IsReady.to_line(), "isready");
        assert_eq!(EngineCommand::UciNewGame.to_line(), "ucinewgame");
        assert_eq!(EngineCommand::Position { fen: None }.to_line(), "position startpos");
    }

    #[test]
    fn search_lines() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let position = EngineCommand::Position {
            fen: Some(fen.to_string()),
        };
        assert_eq!(position.to_line(), format!("position fen {}", fen));

        let go = EngineCommand::Go(GoOptions {
            depth: Some(1),
            movetime: Some(1000),
        });
        assert_eq!(go.to_string(), "go depth 1 movetime 1000");
        assert_eq!(EngineCommand::Go(GoOptions::default()).to_line(), "go");
    }

    #[test]
    fn parse_setoption_with_spaces() {
        let cmd = EngineCommand::parse("setoption name Skill Level value 7").unwrap();
        assert_eq!(cmd, EngineCommand::skill_level(7));
        assert!(EngineCommand::parse("setoption value 7").is_err());
    }

    #[test]
    fn parse_position_fen() {
        let cmd = EngineCommand::parse(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert_eq!(
            cmd,
            EngineCommand::Position {
                fen: Some(
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()
                ),
            }
        );
        assert!(EngineCommand::parse("position").is_err());
        assert!(EngineCommand::parse("position fen").is_err());
    }

    #[test]
    fn parse_go() {
        let cmd = EngineCommand::parse("go depth 4 movetime 250").unwrap();
        assert_eq!(
            cmd,
            EngineCommand::Go(GoOptions {
                depth: Some(4),
                movetime: Some(250),
            })
        );
    }

    #[test]
    fn parse_unknown() {
        assert!(EngineCommand::parse("register later").is_err());
        assert!(EngineCommand::parse("").is_err());
    }
}
