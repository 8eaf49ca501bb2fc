//! One board session: setup, play, clocks and the remote engine, driven one
//! input at a time by the firmware loop.

use crate::clock::GameClocks;
use crate::config::{BoardConfig, ClockConfig, OpponentConfig};
use crate::physical::{squares, Delta, STARTING_OCCUPANCY};
use crate::presentation::PresentationRequest;
use crate::reconciler::{Reconciler, ResyncError, Transition};
use crate::sensor::{SensorError, SensorSignal, SensorSource};
use chess_core::{Bitboard, Color, Notation, PieceKind};
use chess_engine::{Game, GameError, Position};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uci::EnginePoll;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Resync(#[from] ResyncError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the pieces to stand on their starting squares.
    AwaitingSetup,
    /// Set up; the white button starts the game.
    ReadyToStart,
    Playing,
    Finished,
}

/// A press of the side buttons. Both at once resets the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Confirm(Color),
    Both,
}

/// Selections from the touchscreen menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuSelection {
    NewGame {
        opponent: OpponentConfig,
        clock: ClockConfig,
    },
    Resign(Color),
    /// The operator set up the shown position and asks to continue.
    ForceResync,
}

/// A search to start on the remote engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub fen: String,
    pub depth: u32,
    pub movetime_ms: u64,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    game: Game,
    reconciler: Reconciler,
    clocks: GameClocks,
    config: BoardConfig,
    opponent: OpponentConfig,
    /// A search was started for the current ply.
    engine_asked: bool,
    last_snapshot: Option<Bitboard>,
    outbox: Vec<PresentationRequest>,
}

impl Session {
    pub fn new(config: BoardConfig) -> Self {
        let game = Game::new();
        let mut session = Session {
            state: SessionState::AwaitingSetup,
            reconciler: Reconciler::new(&game),
            game,
            clocks: GameClocks::new(config.clock.initial(), config.clock.increment()),
            opponent: config.opponent,
            config,
            engine_asked: false,
            last_snapshot: None,
            outbox: Vec::new(),
        };
        session.push(PresentationRequest::status("set up the starting position"));
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn clocks(&self) -> &GameClocks {
        &self.clocks
    }

    pub fn opponent(&self) -> OpponentConfig {
        self.opponent
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Presentation requests issued since the last call, oldest first.
    pub fn drain_requests(&mut self) -> Vec<PresentationRequest> {
        self.collect();
        std::mem::take(&mut self.outbox)
    }

    /// One sensor pass: reads the board only if the change signal was
    /// raised since the last pass.
    pub fn poll_sensor<S: SensorSource>(
        &mut self,
        source: &mut S,
        signal: &SensorSignal,
    ) -> Result<Option<Transition>, SensorError> {
        if !signal.take() {
            return Ok(None);
        }
        let snapshot = source.read()?;
        Ok(Some(self.sensor_snapshot(snapshot)))
    }

    pub fn sensor_snapshot(&mut self, snapshot: Bitboard) -> Transition {
        let previous = self.last_snapshot.replace(snapshot);
        match self.state {
            SessionState::AwaitingSetup | SessionState::ReadyToStart => {
                if previous != Some(snapshot) {
                    self.check_setup(snapshot);
                }
                Transition::None
            }
            SessionState::Playing => {
                let transition = self.reconciler.bitboard_changed(&self.game, snapshot);
                self.collect();
                transition
            }
            SessionState::Finished => Transition::None,
        }
    }

    pub fn button_pressed(&mut self, button: Button, now: Instant) -> Transition {
        match (button, self.state) {
            (Button::Both, SessionState::Playing | SessionState::Finished) => {
                info!("both buttons pressed, resetting board");
                self.reset();
                self.push(PresentationRequest::status("game reset"));
                Transition::None
            }
            (Button::Confirm(Color::White), SessionState::ReadyToStart) => {
                self.start(now);
                Transition::None
            }
            (Button::Confirm(side), SessionState::Playing) => {
                let transition = self.reconciler.confirm_pressed(&mut self.game, side);
                self.after(&transition, now);
                transition
            }
            _ => Transition::None,
        }
    }

    pub fn promotion_selected(&mut self, kind: PieceKind, now: Instant) -> Transition {
        if self.state != SessionState::Playing {
            return Transition::None;
        }
        let transition = self.reconciler.promotion_piece_selected(&mut self.game, kind);
        self.after(&transition, now);
        transition
    }

    pub fn menu_selected(&mut self, selection: MenuSelection, now: Instant) -> Result<Transition, SessionError> {
        match selection {
            MenuSelection::NewGame { opponent, clock } => {
                info!(?opponent, initial_secs = clock.initial_secs, "new game");
                self.opponent = opponent;
                self.config.clock = clock;
                self.reset();
                Ok(Transition::None)
            }
            MenuSelection::Resign(color) => {
                self.game.resign(color)?;
                self.finish(now);
                Ok(Transition::None)
            }
            MenuSelection::ForceResync => {
                let snapshot = self
                    .last_snapshot
                    .unwrap_or_else(|| self.reconciler.physical().occupancy());
                let result = self.reconciler.force_resync(&self.game, snapshot);
                self.collect();
                let transition = result?;
                if self.state == SessionState::Playing {
                    self.clocks.rearm(self.game.side_to_move(), now);
                }
                Ok(transition)
            }
        }
    }

    /// Clock upkeep. Returns the side whose flag fell, once.
    pub fn tick(&mut self, now: Instant) -> Option<Color> {
        if self.state != SessionState::Playing {
            return None;
        }
        self.clocks.update(now);
        let loser = self.clocks.flagged(now)?;
        match self.game.flag_fall(loser) {
            Ok(()) => {
                info!(loser = %loser, "flag fell");
                self.finish(now);
                Some(loser)
            }
            Err(e) => {
                warn!(error = %e, "flag fall ignored");
                None
            }
        }
    }

    pub fn clock_display(&self, now: Instant) -> PresentationRequest {
        let (white, black) = self.clocks.display(now);
        PresentationRequest::Clock {
            white,
            black,
            running: self.clocks.running(),
        }
    }

    /// The search to start on the remote engine, if it is the engine's turn
    /// and none was started yet for this ply.
    pub fn engine_request(&mut self) -> Option<EngineRequest> {
        if self.state != SessionState::Playing || self.engine_asked {
            return None;
        }
        if self.opponent.engine_color() != Some(self.game.side_to_move()) {
            return None;
        }
        if self.reconciler.expected_move().is_some() {
            return None;
        }
        self.engine_asked = true;
        Some(EngineRequest {
            fen: self.game.position_fen(),
            depth: self.config.engine.depth,
            movetime_ms: self.config.engine.movetime_ms,
        })
    }

    /// Forget the search in flight so the next cycle asks again.
    pub fn retry_engine(&mut self) {
        self.engine_asked = false;
    }

    /// Consumes one poll result. A best move becomes the only move the
    /// reconciler accepts until it is played.
    pub fn engine_reply(&mut self, poll: EnginePoll) -> Option<Notation> {
        match poll {
            EnginePoll::Pending => None,
            EnginePoll::Info(info) => {
                debug!(depth = ?info.depth, score = ?info.score, pv = ?info.pv, "engine info");
                None
            }
            EnginePoll::BestMove { mv, .. } => {
                if self.state != SessionState::Playing || !self.engine_asked {
                    debug!(%mv, "stale best move dropped");
                    return None;
                }
                match self.game.notation_from_uci(&mv) {
                    Some(notation) => {
                        self.reconciler.set_expected_move(&self.game, Some(notation));
                        self.collect();
                        Some(notation)
                    }
                    None => {
                        warn!(%mv, fen = %self.game.position_fen(), "engine move is not legal here");
                        self.engine_asked = false;
                        None
                    }
                }
            }
        }
    }

    fn check_setup(&mut self, snapshot: Bitboard) {
        if snapshot == STARTING_OCCUPANCY {
            if self.state != SessionState::ReadyToStart {
                self.state = SessionState::ReadyToStart;
                self.push(PresentationRequest::Clear);
                self.push(PresentationRequest::status("ready: press the white button to start"));
            }
            return;
        }
        self.state = SessionState::AwaitingSetup;
        let mismatch = Delta::between(STARTING_OCCUPANCY, snapshot);
        self.push(PresentationRequest::ShowPosition {
            fen: Position::startpos().to_fen(),
            mismatched: squares(mismatch.changed()),
        });
    }

    fn start(&mut self, now: Instant) {
        info!("game started");
        self.state = SessionState::Playing;
        self.clocks.start(Color::White, now);
        self.push(PresentationRequest::Clear);
        self.push(PresentationRequest::status("White to move"));
    }

    fn reset(&mut self) {
        self.game = Game::new();
        self.reconciler = Reconciler::new(&self.game);
        self.clocks = GameClocks::new(self.config.clock.initial(), self.config.clock.increment());
        self.engine_asked = false;
        self.state = SessionState::AwaitingSetup;
        self.push(PresentationRequest::Clear);
        if let Some(snapshot) = self.last_snapshot {
            self.check_setup(snapshot);
        }
    }

    fn finish(&mut self, now: Instant) {
        self.clocks.stop_all(now);
        self.state = SessionState::Finished;
        self.push(PresentationRequest::GameOver {
            result: self.game.result().to_string(),
            termination: self
                .game
                .termination()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        });
    }

    fn after(&mut self, transition: &Transition, now: Instant) {
        self.collect();
        match transition {
            Transition::Applied(outcome) => {
                self.engine_asked = false;
                if self.game.is_game_over() {
                    self.clocks.stop_all(now);
                    self.state = SessionState::Finished;
                } else {
                    self.clocks.switch_after_move(outcome.mover, now);
                }
            }
            Transition::ClockRearm(_) => self.clocks.rearm(self.game.side_to_move(), now),
            _ => {}
        }
    }

    fn collect(&mut self) {
        let requests = self.reconciler.drain_requests();
        self.outbox.extend(requests);
    }

    fn push(&mut self, request: PresentationRequest) {
        self.collect();
        self.outbox.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ScriptedSensor;
    use chess_core::Square;
    use std::time::Duration;
    use uci::EngineInfo;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn playing(config: BoardConfig, t0: Instant) -> Session {
        let mut session = Session::new(config);
        session.sensor_snapshot(STARTING_OCCUPANCY);
        assert_eq!(session.state(), SessionState::ReadyToStart);
        session.button_pressed(Button::Confirm(Color::White), t0);
        assert_eq!(session.state(), SessionState::Playing);
        session.drain_requests();
        session
    }

    fn play(session: &mut Session, from: &str, to: &str, now: Instant) -> Transition {
        let side = session.game().side_to_move();
        let base = session.reconciler().baseline();
        session.sensor_snapshot(base.without(sq(from)));
        session.sensor_snapshot(base.without(sq(from)).with(sq(to)));
        session.button_pressed(Button::Confirm(side), now)
    }

    #[test]
    fn setup_waits_for_the_starting_occupancy() {
        let t0 = Instant::now();
        let mut session = Session::new(BoardConfig::default());
        assert_eq!(session.state(), SessionState::AwaitingSetup);

        let missing_pawn = STARTING_OCCUPANCY.without(sq("e2"));
        session.sensor_snapshot(missing_pawn);
        assert_eq!(session.state(), SessionState::AwaitingSetup);
        let requests = session.drain_requests();
        assert!(requests.contains(&PresentationRequest::ShowPosition {
            fen: Position::startpos().to_fen(),
            mismatched: vec![sq("e2")],
        }));

        // Black cannot start the game.
        session.sensor_snapshot(STARTING_OCCUPANCY);
        session.button_pressed(Button::Confirm(Color::Black), t0);
        assert_eq!(session.state(), SessionState::ReadyToStart);
        session.button_pressed(Button::Confirm(Color::White), t0);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.clocks().running(), Some(Color::White));
    }

    #[test]
    fn signal_gates_sensor_reads() {
        let t0 = Instant::now();
        let mut session = playing(BoardConfig::default(), t0);
        let mut sensor = ScriptedSensor::new(STARTING_OCCUPANCY);
        let signal = SensorSignal::new();

        sensor.push_script("e2.").unwrap();
        sensor.step();
        assert_eq!(session.poll_sensor(&mut sensor, &signal).unwrap(), None);
        assert_eq!(session.reconciler().phase(), crate::Phase::Idle);

        signal.raise();
        let transition = session.poll_sensor(&mut sensor, &signal).unwrap();
        assert_eq!(transition, Some(Transition::Progress(crate::Phase::PieceLifted)));
    }

    #[test]
    fn confirmed_move_switches_the_clock() {
        let t0 = Instant::now();
        let config = BoardConfig {
            clock: ClockConfig {
                initial_secs: 60,
                increment_secs: 5,
            },
            ..BoardConfig::default()
        };
        let mut session = playing(config, t0);

        let t1 = t0 + Duration::from_secs(10);
        let transition = play(&mut session, "e2", "e4", t1);
        assert!(matches!(transition, Transition::Applied(_)));
        assert_eq!(session.clocks().running(), Some(Color::Black));
        assert_eq!(
            session.clocks().remaining(Color::White, t1),
            Duration::from_secs(55)
        );
        assert_eq!(session.game().side_to_move(), Color::Black);
    }

    #[test]
    fn confirm_without_a_move_only_rearms() {
        let t0 = Instant::now();
        let mut session = playing(BoardConfig::default(), t0);
        let before = session.game().position_fen();
        assert_eq!(
            session.button_pressed(Button::Confirm(Color::White), t0),
            Transition::ClockRearm(Color::White)
        );
        assert_eq!(session.game().position_fen(), before);
        assert_eq!(session.clocks().running(), Some(Color::White));
    }

    #[test]
    fn both_buttons_reset_to_setup() {
        let t0 = Instant::now();
        let mut session = playing(BoardConfig::default(), t0);
        play(&mut session, "e2", "e4", t0);
        session.button_pressed(Button::Both, t0);
        assert_eq!(session.state(), SessionState::AwaitingSetup);
        assert_eq!(session.game().move_history().len(), 0);
        assert_eq!(session.clocks().running(), None);
    }

    #[test]
    fn flag_fall_ends_the_game() {
        let t0 = Instant::now();
        let config = BoardConfig {
            clock: ClockConfig {
                initial_secs: 2,
                increment_secs: 0,
            },
            ..BoardConfig::default()
        };
        let mut session = playing(config, t0);
        assert_eq!(session.tick(t0 + Duration::from_secs(1)), None);
        assert_eq!(session.tick(t0 + Duration::from_secs(3)), Some(Color::White));
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.game().result().token(), "0-1");
        assert_eq!(session.tick(t0 + Duration::from_secs(4)), None);

        let requests = session.drain_requests();
        assert!(requests.iter().any(|r| matches!(r, PresentationRequest::GameOver { .. })));
    }

    #[test]
    fn resign_from_the_menu() {
        let t0 = Instant::now();
        let mut session = playing(BoardConfig::default(), t0);
        session
            .menu_selected(MenuSelection::Resign(Color::Black), t0)
            .unwrap();
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.game().result().token(), "1-0");
        assert!(matches!(
            session.menu_selected(MenuSelection::Resign(Color::White), t0),
            Err(SessionError::Game(GameError::GameAlreadyOver))
        ));
    }

    #[test]
    fn new_game_from_the_menu_keeps_a_set_up_board_ready() {
        let t0 = Instant::now();
        let mut session = playing(BoardConfig::default(), t0);
        session
            .menu_selected(
                MenuSelection::NewGame {
                    opponent: OpponentConfig::Engine { color: Color::Black },
                    clock: ClockConfig {
                        initial_secs: 180,
                        increment_secs: 2,
                    },
                },
                t0,
            )
            .unwrap();
        assert_eq!(session.state(), SessionState::ReadyToStart);
        assert_eq!(session.opponent().engine_color(), Some(Color::Black));
        assert_eq!(
            session.clocks().remaining(Color::White, t0),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn engine_turn_is_requested_once_and_its_move_expected() {
        let t0 = Instant::now();
        let config = BoardConfig {
            opponent: OpponentConfig::Engine { color: Color::Black },
            ..BoardConfig::default()
        };
        let mut session = playing(config, t0);
        assert_eq!(session.engine_request(), None);

        play(&mut session, "e2", "e4", t0);
        let request = session.engine_request().unwrap();
        assert_eq!(request.fen, session.game().position_fen());
        assert_eq!(request.depth, 1);
        assert_eq!(request.movetime_ms, 1000);
        assert_eq!(session.engine_request(), None);

        assert_eq!(session.engine_reply(EnginePoll::Pending), None);
        let info = EngineInfo::parse("info depth 1 score cp -20 pv e7e5").unwrap();
        assert_eq!(session.engine_reply(EnginePoll::Info(info)), None);

        let expected = session.engine_reply(EnginePoll::BestMove {
            mv: "e7e5".to_string(),
            ponder: None,
        });
        assert_eq!(expected, Some(Notation::quiet(sq("e7"), sq("e5"))));
        assert_eq!(session.reconciler().expected_move(), expected);

        // A different black move is not accepted.
        let base = session.reconciler().baseline();
        let transition = session.sensor_snapshot(base.without(sq("d7")).with(sq("d5")));
        assert_eq!(transition, Transition::Illegal);
        session.sensor_snapshot(base);

        let applied = play(&mut session, "e7", "e5", t0);
        assert!(matches!(applied, Transition::Applied(_)));
        assert_eq!(session.reconciler().expected_move(), None);
        assert_eq!(session.engine_request(), None);
    }

    #[test]
    fn unplayable_engine_move_asks_again() {
        let t0 = Instant::now();
        let config = BoardConfig {
            opponent: OpponentConfig::Engine { color: Color::White },
            ..BoardConfig::default()
        };
        let mut session = playing(config, t0);
        assert!(session.engine_request().is_some());
        let reply = session.engine_reply(EnginePoll::BestMove {
            mv: "e2e5".to_string(),
            ponder: None,
        });
        assert_eq!(reply, None);
        assert!(session.engine_request().is_some());
    }
}
