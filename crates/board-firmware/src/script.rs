//! Line-oriented input standing in for the board's buttons, touchscreen and
//! sensors.
//!
//! One command per line; `#` starts a comment:
//!
//! ```text
//! setup                 # pieces placed on their starting squares
//! confirm white         # white's clock button
//! e2. e4.               # anything else is a sensor toggle script
//! both                  # both buttons: back to setup
//! promote q
//! resign black
//! resync
//! new engine black      # or `new human`
//! wait 1500             # let time pass, in milliseconds
//! ```

use anyhow::{anyhow, bail, Context};
use chess_core::{Color, PieceKind};
use move_reconciler::OpponentConfig;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Setup,
    /// Toggle script for the scripted sensor.
    Sensor(String),
    Confirm(Color),
    Both,
    Promote(PieceKind),
    Resign(Color),
    Resync,
    NewGame(OpponentConfig),
    Wait(Duration),
}

fn parse_color(word: Option<&str>) -> anyhow::Result<Color> {
    match word {
        Some("white") | Some("w") => Ok(Color::White),
        Some("black") | Some("b") => Ok(Color::Black),
        Some(other) => bail!("unknown color '{}'", other),
        None => bail!("missing color"),
    }
}

/// Parses one script line. Blank and comment lines give `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };

    let command = match keyword {
        "setup" => Command::Setup,
        "confirm" => Command::Confirm(parse_color(words.next())?),
        "both" => Command::Both,
        "promote" => {
            let letter = words
                .next()
                .and_then(|w| w.chars().next())
                .ok_or_else(|| anyhow!("missing promotion piece"))?;
            let kind = PieceKind::from_promotion_letter(letter)
                .ok_or_else(|| anyhow!("'{}' is not a promotion piece", letter))?;
            Command::Promote(kind)
        }
        "resign" => Command::Resign(parse_color(words.next())?),
        "resync" => Command::Resync,
        "new" => match words.next() {
            Some("human") | None => Command::NewGame(OpponentConfig::Human),
            Some("engine") => Command::NewGame(OpponentConfig::Engine {
                color: parse_color(words.next())?,
            }),
            Some(other) => bail!("unknown opponent '{}'", other),
        },
        "wait" => {
            let ms: u64 = words
                .next()
                .ok_or_else(|| anyhow!("missing wait time"))?
                .parse()
                .context("wait time must be milliseconds")?;
            Command::Wait(Duration::from_millis(ms))
        }
        _ => return Ok(Some(Command::Sensor(line.to_string()))),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected '{}' after {}", extra, keyword);
    }
    Ok(Some(command))
}

/// Parses a whole script, naming the offending line on error.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<Command>> {
    let mut commands = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let parsed = parse_line(line).with_context(|| format!("script line {}", number + 1))?;
        commands.extend(parsed);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords() {
        assert_eq!(parse_line("setup").unwrap(), Some(Command::Setup));
        assert_eq!(
            parse_line("confirm black").unwrap(),
            Some(Command::Confirm(Color::Black))
        );
        assert_eq!(
            parse_line("promote N").unwrap(),
            Some(Command::Promote(PieceKind::Knight))
        );
        assert_eq!(
            parse_line("new engine b").unwrap(),
            Some(Command::NewGame(OpponentConfig::Engine { color: Color::Black }))
        );
        assert_eq!(
            parse_line("wait 250").unwrap(),
            Some(Command::Wait(Duration::from_millis(250)))
        );
    }

    #[test]
    fn sensor_lines_pass_through() {
        assert_eq!(
            parse_line("  e2. e4.  # king's pawn").unwrap(),
            Some(Command::Sensor("e2. e4.".to_string()))
        );
        assert_eq!(parse_line("# only a comment").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn bad_lines() {
        assert!(parse_line("confirm").is_err());
        assert!(parse_line("confirm green").is_err());
        assert!(parse_line("promote k").is_err());
        assert!(parse_line("wait soon").is_err());
        assert!(parse_line("both now").is_err());
    }

    #[test]
    fn errors_name_the_line() {
        let err = parse_script("setup\n\nresign purple\n").unwrap_err();
        assert_eq!(err.to_string(), "script line 3");
    }
}
