//! What the core asks the LEDs, display and touchscreen to show.
//!
//! Requests are plain data. A [`Presenter`] turns them into whatever the
//! hardware needs; on the host they are written as JSON lines, one request
//! per line:
//!
//! ```json
//! {"type":"highlight","origin":"e2","destinations":[{"square":"e3","tag":"quiet"},{"square":"e4","tag":"quiet"}]}
//! {"type":"candidate","notation":"e2-e4"}
//! {"type":"status","text":"e2-e4"}
//! ```

use chess_core::{Color, Notation, Square};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

/// How a highlighted destination should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationTag {
    Quiet,
    Capture,
    Promotion,
    Castle,
}

impl DestinationTag {
    /// The tag for the destination of `mv`.
    pub fn of(mv: Notation) -> Self {
        if mv.castle_side().is_some() {
            DestinationTag::Castle
        } else if mv.promotion().is_some() {
            DestinationTag::Promotion
        } else if mv.is_capture() {
            DestinationTag::Capture
        } else {
            DestinationTag::Quiet
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub square: Square,
    pub tag: DestinationTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationRequest {
    /// Legal destinations of the piece lifted from `origin`.
    Highlight {
        origin: Square,
        destinations: Vec<Destination>,
    },
    /// A move is ready and waits for the confirm button.
    Candidate { notation: String },
    /// A piece was lifted that may not move now.
    IllegalLift { square: Square },
    /// The board shows something that is not a legal move.
    IllegalMove { attempted: Option<String> },
    /// Ask which piece the pawn on `square` becomes.
    PromotionChoice { square: Square, color: Color },
    Status { text: String },
    /// The position the operator must set up, and the squares that differ.
    ShowPosition { fen: String, mismatched: Vec<Square> },
    Clear,
    GameOver { result: String, termination: String },
    Clock {
        white: String,
        black: String,
        running: Option<Color>,
    },
}

impl PresentationRequest {
    pub fn status(text: impl Into<String>) -> Self {
        PresentationRequest::Status { text: text.into() }
    }

    /// Highlight for `origin` built from its legal moves.
    ///
    /// Promotion variants share a destination and are listed once.
    pub fn highlight<'a>(origin: Square, moves: impl IntoIterator<Item = &'a Notation>, side: Color) -> Self {
        let mut destinations: Vec<Destination> = Vec::new();
        for &mv in moves {
            let (_, square) = mv.king_squares(side);
            if destinations.iter().any(|d| d.square == square) {
                continue;
            }
            destinations.push(Destination {
                square,
                tag: DestinationTag::of(mv),
            });
        }
        PresentationRequest::Highlight {
            origin,
            destinations,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("display link closed")]
    Closed,

    #[error("display write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The display side of the board.
pub trait Presenter {
    fn present(&mut self, request: &PresentationRequest) -> Result<(), TransportError>;

    /// Presents every request, logging failures. Display trouble never stops
    /// the loop.
    fn present_all(&mut self, requests: &[PresentationRequest]) {
        for request in requests {
            if let Err(e) = self.present(request) {
                tracing::warn!(error = %e, "presentation request dropped");
            }
        }
    }
}

/// Writes each request as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesPresenter<W> {
    out: W,
}

impl<W: Write> JsonLinesPresenter<W> {
    pub fn new(out: W) -> Self {
        JsonLinesPresenter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonLinesPresenter<W> {
    fn present(&mut self, request: &PresentationRequest) -> Result<(), TransportError> {
        serde_json::to_writer(&mut self.out, request)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every request in memory.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub requests: Vec<PresentationRequest>,
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, request: &PresentationRequest) -> Result<(), TransportError> {
        self.requests.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{CastleSide, PieceKind};

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn tags_follow_the_move() {
        assert_eq!(
            DestinationTag::of(Notation::quiet(sq("e2"), sq("e4"))),
            DestinationTag::Quiet
        );
        assert_eq!(
            DestinationTag::of(Notation::capture(sq("e4"), sq("d5"))),
            DestinationTag::Capture
        );
        assert_eq!(
            DestinationTag::of(Notation::en_passant(sq("e5"), sq("d6"))),
            DestinationTag::Capture
        );
        assert_eq!(
            DestinationTag::of(Notation::capture(sq("b7"), sq("a8")).with_promotion(PieceKind::Queen)),
            DestinationTag::Promotion
        );
        assert_eq!(
            DestinationTag::of(Notation::castle(CastleSide::Kingside)),
            DestinationTag::Castle
        );
    }

    #[test]
    fn highlight_lists_promotion_squares_once() {
        let moves: Vec<Notation> = PieceKind::PROMOTIONS
            .iter()
            .map(|&k| Notation::quiet(sq("a7"), sq("a8")).with_promotion(k))
            .collect();
        let request = PresentationRequest::highlight(sq("a7"), &moves, Color::White);
        assert_eq!(
            request,
            PresentationRequest::Highlight {
                origin: sq("a7"),
                destinations: vec![Destination {
                    square: sq("a8"),
                    tag: DestinationTag::Promotion
                }],
            }
        );
    }

    #[test]
    fn highlight_shows_where_the_king_lands_when_castling() {
        let moves = [Notation::castle(CastleSide::Queenside)];
        let request = PresentationRequest::highlight(sq("e8"), &moves, Color::Black);
        match request {
            PresentationRequest::Highlight { destinations, .. } => {
                assert_eq!(destinations[0].square, sq("c8"));
                assert_eq!(destinations[0].tag, DestinationTag::Castle);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn json_lines_output() {
        let mut presenter = JsonLinesPresenter::new(Vec::new());
        presenter
            .present(&PresentationRequest::Candidate {
                notation: "e2-e4".to_string(),
            })
            .unwrap();
        presenter.present(&PresentationRequest::Clear).unwrap();
        presenter
            .present(&PresentationRequest::PromotionChoice {
                square: sq("h8"),
                color: Color::White,
            })
            .unwrap();

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"type":"candidate","notation":"e2-e4"}"#);
        assert_eq!(lines[1], r#"{"type":"clear"}"#);
        assert_eq!(
            lines[2],
            r#"{"type":"promotion_choice","square":"h8","color":"white"}"#
        );
    }

    struct BrokenLink;

    impl Presenter for BrokenLink {
        fn present(&mut self, _: &PresentationRequest) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }
    }

    #[test]
    fn failed_presentation_is_not_fatal() {
        let mut link = BrokenLink;
        link.present_all(&[PresentationRequest::Clear, PresentationRequest::status("hi")]);

        let mut recorder = RecordingPresenter::default();
        recorder.present_all(&[PresentationRequest::Clear, PresentationRequest::status("hi")]);
        assert_eq!(recorder.requests.len(), 2);
    }
}
