//! Remote chess engine protocol (UCI over a line-oriented stream).
//!
//! The board talks to an engine running elsewhere on the network. Searches
//! are fire-and-poll: [`RemoteEngine::go`] sends the position and returns at
//! once, and the caller polls for replies with a short timeout on every pass
//! of its loop.
//!
//! # Commands sent
//!
//! - `uci` / `uciok` - Handshake
//! - `setoption name Skill Level value <n>` - Engine strength
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame`, `position fen <fen>` - Game and position setup
//! - `go depth <d> movetime <ms>` - Start search
//! - `stop` / `quit`
//!
//! # Replies polled
//!
//! - `info ...` - Search progress
//! - `bestmove <move> [ponder <move>]` - Search result

mod client;
mod command;
mod info;

pub use client::{EnginePoll, RemoteEngine, TcpEngine};
pub use command::{EngineCommand, GoOptions};
pub use info::{EngineInfo, Score};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine did not answer within the allowed time. Only raised
    /// while connecting; a quiet engine mid-search is not an error.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("engine closed the connection")]
    Closed,
    #[error("parse error: {0}")]
    Parse(String),
}

/// Messages sent from engine to board.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Id { name: Option<String>, author: Option<String> },
    UciOk,
    ReadyOk,
    Info(EngineInfo),
    BestMove { mv: String, ponder: Option<String> },
    /// Anything else the engine prints (option lists, copyright banners).
    Other(String),
}

impl EngineMessage {
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next().unwrap_or("") {
            "uciok" => Ok(EngineMessage::UciOk),
            "readyok" => Ok(EngineMessage::ReadyOk),
            "id" => match parts.next() {
                Some("name") => Ok(EngineMessage::Id {
                    name: Some(parts.collect::<Vec<_>>().join(" ")),
                    author: None,
                }),
                Some("author") => Ok(EngineMessage::Id {
                    name: None,
                    author: Some(parts.collect::<Vec<_>>().join(" ")),
                }),
                _ => Ok(EngineMessage::Other(line.to_string())),
            },
            "info" => EngineInfo::parse(line)
                .map(EngineMessage::Info)
                .ok_or_else(|| UciError::Parse(line.to_string())),
            "bestmove" => {
                let mv = parts
                    .next()
                    .ok_or_else(|| UciError::Parse(format!("bestmove without a move: '{}'", line)))?
                    .to_string();
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                Ok(EngineMessage::BestMove { mv, ponder })
            }
            _ => Ok(EngineMessage::Other(line.to_string())),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_string(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
            EngineMessage::Other(line) => line.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handshake_replies() {
        assert_eq!(EngineMessage::parse("uciok\n").unwrap(), EngineMessage::UciOk);
        assert_eq!(EngineMessage::parse("readyok").unwrap(), EngineMessage::ReadyOk);
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16").unwrap(),
            EngineMessage::Id {
                name: Some("Stockfish 16".to_string()),
                author: None
            }
        );
    }

    #[test]
    fn parse_bestmove() {
        assert_eq!(
            EngineMessage::parse("bestmove e7e8q ponder a2a3").unwrap(),
            EngineMessage::BestMove {
                mv: "e7e8q".to_string(),
                ponder: Some("a2a3".to_string())
            }
        );
        assert_eq!(
            EngineMessage::parse("bestmove e1g1").unwrap(),
            EngineMessage::BestMove {
                mv: "e1g1".to_string(),
                ponder: None
            }
        );
        assert!(matches!(
            EngineMessage::parse("bestmove"),
            Err(UciError::Parse(_))
        ));
    }

    #[test]
    fn unknown_lines_are_kept() {
        assert_eq!(
            EngineMessage::parse("option name Hash type spin default 16").unwrap(),
            EngineMessage::Other("option name Hash type spin default 16".to_string())
        );
    }

    #[test]
    fn to_uci_round_trips() {
        for line in ["uciok", "readyok", "bestmove g8f6", "info depth 3 score mate 2 pv d1h5"] {
            assert_eq!(EngineMessage::parse(line).unwrap().to_uci(), line);
        }
    }
}
