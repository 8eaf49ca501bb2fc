//! Engine `info` lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = engine winning, negative = engine losing).
    Mate(i32),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {}", cp),
            Score::Mate(m) => write!(f, "mate {}", m),
        }
    }
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Which line of a multi-PV search this is.
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    /// The score is only a lower or upper bound.
    pub bound: bool,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    pub currmove: Option<String>,
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Free text; always the rest of the line.
    pub string: Option<String>,
}

impl EngineInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an info line. Unknown keywords are skipped with their value.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        info.depth = parts[i].parse().ok();
                    }
                }
                "seldepth" => {
                    i += 1;
                    if i < parts.len() {
                        info.seldepth = parts[i].parse().ok();
                    }
                }
                "multipv" => {
                    i += 1;
                    if i < parts.len() {
                        info.multipv = parts[i].parse().ok();
                    }
                }
                "score" => {
                    i += 1;
                    if i + 1 < parts.len() {
                        let value = parts[i + 1].parse::<i32>().ok();
                        info.score = match (parts[i], value) {
                            ("cp", Some(cp)) => Some(Score::Cp(cp)),
                            ("mate", Some(m)) => Some(Score::Mate(m)),
                            _ => None,
                        };
                        i += 1;
                    }
                }
                "lowerbound" | "upperbound" => {
                    info.bound = true;
                }
                "nodes" => {
                    i += 1;
                    if i < parts.len() {
                        info.nodes = parts[i].parse().ok();
                    }
                }
                "nps" => {
                    i += 1;
                    if i < parts.len() {
                        info.nps = parts[i].parse().ok();
                    }
                }
                "time" => {
                    i += 1;
                    if i < parts.len() {
                        info.time = parts[i].parse().ok();
                    }
                }
                "pv" => {
                    i += 1;
                    // Collect all remaining moves until another keyword or end
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                "currmove" => {
                    i += 1;
                    if i < parts.len() {
                        info.currmove = Some(parts[i].to_string());
                    }
                }
                "currmovenumber" => {
                    i += 1;
                    if i < parts.len() {
                        info.currmovenumber = parts[i].parse().ok();
                    }
                }
                "hashfull" => {
                    i += 1;
                    if i < parts.len() {
                        info.hashfull = parts[i].parse().ok();
                    }
                }
                "string" => {
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                _ => {
                    // Keyword we do not track, e.g. tbhits; skip its value.
                    i += 1;
                }
            }
            i += 1;
        }

        Some(info)
    }

    /// The first move of the principal variation.
    pub fn best_line_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(d) = self.seldepth {
            parts.push(format!("seldepth {}", d));
        }
        if let Some(n) = self.multipv {
            parts.push(format!("multipv {}", n));
        }
        if let Some(s) = self.score {
            parts.push(format!("score {}", s));
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(n) = self.nps {
            parts.push(format!("nps {}", n));
        }
        if let Some(t) = self.time {
            parts.push(format!("time {}", t));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        if let Some(ref m) = self.currmove {
            parts.push(format!("currmove {}", m));
        }
        if let Some(n) = self.currmovenumber {
            parts.push(format!("currmovenumber {}", n));
        }
        if let Some(h) = self.hashfull {
            parts.push(format!("hashfull {}", h));
        }
        if let Some(ref s) = self.string {
            parts.push(format!("string {}", s));
        }

        f.write_str(&parts.join(" "))
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "string"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_info() {
        let line = "info depth 12 score cp 30 nodes 125000 nps 500000 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.nps, Some(500000));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
        assert_eq!(info.best_line_move(), Some("e2e4"));
    }

    #[test]
    fn parse_mate_score() {
        let info = EngineInfo::parse("info depth 20 score mate -3 pv e2e4").unwrap();
        assert_eq!(info.score, Some(Score::Mate(-3)));
    }

    #[test]
    fn bounds_and_unknown_keywords() {
        let line = "info depth 5 score cp 12 upperbound tbhits 0 time 40 pv d2d4";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.score, Some(Score::Cp(12)));
        assert!(info.bound);
        assert_eq!(info.time, Some(40));
        assert_eq!(info.pv, vec!["d2d4"]);
    }

    #[test]
    fn string_takes_the_rest() {
        let info = EngineInfo::parse("info string NNUE evaluation enabled depth 3").unwrap();
        assert_eq!(info.string.as_deref(), Some("NNUE evaluation enabled depth 3"));
        assert_eq!(info.depth, None);
    }

    #[test]
    fn not_an_info_line() {
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
        assert!(EngineInfo::parse("information").is_none());
    }

    #[test]
    fn display_matches_parse() {
        let line = "info depth 10 score cp 35 nodes 50000 pv e2e4 e7e5";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.to_string(), line);
    }
}
