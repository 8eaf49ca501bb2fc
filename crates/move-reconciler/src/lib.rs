//! Physical board reconciliation for the chessboard firmware.
//!
//! Hall sensors under the squares only report occupancy. This crate turns a
//! stream of occupancy snapshots plus the two confirm buttons into moves for
//! the rule engine:
//!
//! - [`PhysicalBoard`]: the last sensor snapshot and the piece mirror
//! - [`SensorSignal`] / [`SensorSource`]: the interrupt flag and the reader
//! - [`Reconciler`]: the per-move state machine ([`Phase`], [`Transition`])
//! - [`PresentationRequest`] / [`Presenter`]: what to show on the LEDs and
//!   the display
//! - [`GameClocks`], [`BoardConfig`] and [`Session`]: the rest of the loop
//!
//! # Example
//!
//! ```
//! use chess_core::{Color, Square};
//! use chess_engine::Game;
//! use move_reconciler::{Reconciler, Transition, STARTING_OCCUPANCY};
//!
//! let mut game = Game::new();
//! let mut reconciler = Reconciler::new(&game);
//! let e2 = Square::from_algebraic("e2").unwrap();
//! let e4 = Square::from_algebraic("e4").unwrap();
//!
//! reconciler.bitboard_changed(&game, STARTING_OCCUPANCY.without(e2));
//! let t = reconciler.bitboard_changed(&game, STARTING_OCCUPANCY.without(e2).with(e4));
//! assert!(matches!(t, Transition::Candidate(_)));
//!
//! let t = reconciler.confirm_pressed(&mut game, Color::White);
//! assert!(matches!(t, Transition::Applied(_)));
//! assert_eq!(game.side_to_move(), Color::Black);
//! ```

mod clock;
mod config;
mod phase;
mod physical;
mod presentation;
mod reconciler;
mod sensor;
mod session;

pub use clock::{format_clock, ChessClock, GameClocks};
pub use config::{BoardConfig, ClockConfig, ConfigError, EngineConfig, OpponentConfig, SensorConfig};
pub use phase::Phase;
pub use physical::{
    castling_origin, castling_target, delta, single_square, squares, Delta, PhysicalBoard,
    STARTING_OCCUPANCY,
};
pub use presentation::{
    Destination, DestinationTag, JsonLinesPresenter, PresentationRequest, Presenter,
    RecordingPresenter, TransportError,
};
pub use reconciler::{Reconciler, ResyncError, Transition};
pub use sensor::{ScriptedSensor, SensorError, SensorSignal, SensorSource};
pub use session::{Button, EngineRequest, MenuSelection, Session, SessionError, SessionState};
