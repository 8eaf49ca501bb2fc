//! Board Firmware - the reconciliation loop of the sensor chessboard.
//!
//! Without the hardware attached, the sensors, buttons and touchscreen are
//! played from a script (see [`script`]) and presentation requests are
//! written to stdout as JSON lines. Logs go to stderr; set `RUST_LOG` to
//! choose the level.

mod engine;
mod script;

use anyhow::Context;
use chess_core::{Bitboard, Color};
use chess_engine::PgnHeaders;
use clap::Parser;
use engine::EngineLink;
use move_reconciler::{
    BoardConfig, Button, JsonLinesPresenter, MenuSelection, PresentationRequest, Presenter,
    ScriptedSensor, SensorSignal, Session, STARTING_OCCUPANCY,
};
use script::Command;
use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type SharedPresenter = Arc<Mutex<JsonLinesPresenter<Stdout>>>;

/// Board Firmware - drives the chessboard loop from a sensor script.
#[derive(Parser)]
#[command(name = "board-firmware")]
#[command(about = "Runs the chessboard reconciliation loop against a sensor script")]
struct Args {
    /// Path to the board configuration
    #[arg(long, default_value = BoardConfig::FILE_NAME)]
    config: PathBuf,

    /// Script of sensor changes and button presses; stdin when omitted
    #[arg(long)]
    script: Option<PathBuf>,

    /// Write the game as PGN here when the script ends
    #[arg(long)]
    pgn: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = BoardConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let text = match &args.script {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    let commands = script::parse_script(&text)?;
    info!(commands = commands.len(), "script loaded");

    let presenter: SharedPresenter = Arc::new(Mutex::new(JsonLinesPresenter::new(std::io::stdout())));
    let mut board = Firmware::new(config, presenter.clone());
    let (clock_tx, clock_rx) = watch::channel(board.session.clock_display(Instant::now()));
    let refresher = tokio::spawn(refresh_clocks(clock_rx, presenter));

    for command in commands {
        board.run(command, &clock_tx).await?;
    }

    drop(clock_tx);
    if let Err(e) = refresher.await {
        warn!(error = %e, "clock refresher failed");
    }
    board.shutdown(args.pgn.as_deref()).await
}

/// Republishes the clock display whenever its text changes.
async fn refresh_clocks(mut shown: watch::Receiver<PresentationRequest>, presenter: SharedPresenter) {
    while shown.changed().await.is_ok() {
        let request = shown.borrow_and_update().clone();
        if let Err(e) = presenter.lock().await.present(&request) {
            warn!(error = %e, "clock refresh dropped");
        }
    }
}

struct Firmware {
    session: Session,
    sensor: ScriptedSensor,
    signal: SensorSignal,
    engine: EngineLink,
    presenter: SharedPresenter,
    poll_interval: Duration,
}

impl Firmware {
    fn new(config: BoardConfig, presenter: SharedPresenter) -> Self {
        Firmware {
            engine: EngineLink::new(config.engine.clone()),
            poll_interval: config.sensor.poll_interval(),
            session: Session::new(config),
            sensor: ScriptedSensor::new(Bitboard::EMPTY),
            signal: SensorSignal::new(),
            presenter,
        }
    }

    async fn run(&mut self, command: Command, clocks: &watch::Sender<PresentationRequest>) -> anyhow::Result<()> {
        debug!(?command, "script command");
        let now = Instant::now();
        match command {
            Command::Setup => {
                self.sensor.load(STARTING_OCCUPANCY);
                self.signal.raise();
            }
            Command::Sensor(text) => {
                self.sensor.push_script(&text)?;
                while self.sensor.step().is_some() {
                    self.signal.raise();
                    self.cycle(clocks).await?;
                }
                return Ok(());
            }
            Command::Confirm(color) => {
                self.session.button_pressed(Button::Confirm(color), now);
            }
            Command::Both => {
                self.session.button_pressed(Button::Both, now);
            }
            Command::Promote(kind) => {
                self.session.promotion_selected(kind, now);
            }
            Command::Resign(color) => self.menu(MenuSelection::Resign(color), now),
            Command::Resync => self.menu(MenuSelection::ForceResync, now),
            Command::NewGame(opponent) => {
                let clock = self.session.config().clock;
                self.menu(MenuSelection::NewGame { opponent, clock }, now);
            }
            Command::Wait(duration) => {
                let until = now + duration;
                loop {
                    self.cycle(clocks).await?;
                    let left = until.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    tokio::time::sleep(left.min(self.poll_interval)).await;
                }
                return Ok(());
            }
        }
        self.cycle(clocks).await
    }

    fn menu(&mut self, selection: MenuSelection, now: Instant) {
        if let Err(e) = self.session.menu_selected(selection, now) {
            warn!(error = %e, "menu selection refused");
        }
    }

    /// One pass of the loop: sensors, clocks, engine, display.
    async fn cycle(&mut self, clocks: &watch::Sender<PresentationRequest>) -> anyhow::Result<()> {
        if let Some(transition) = self.session.poll_sensor(&mut self.sensor, &self.signal)? {
            debug!(?transition, phase = %self.session.reconciler().phase(), "sensor pass");
        }
        let now = Instant::now();
        if let Some(loser) = self.session.tick(now) {
            info!(%loser, "lost on time");
        }
        self.engine.service(&mut self.session).await;

        let requests = self.session.drain_requests();
        if !requests.is_empty() {
            self.presenter.lock().await.present_all(&requests);
        }
        let display = self.session.clock_display(now);
        clocks.send_if_modified(|shown| {
            if *shown == display {
                return false;
            }
            *shown = display;
            true
        });
        Ok(())
    }

    async fn shutdown(self, pgn: Option<&Path>) -> anyhow::Result<()> {
        let game = self.session.game();
        info!(
            fen = %game.position_fen(),
            result = %game.result(),
            moves = %game.history_text(),
            "script finished"
        );
        if let Some(path) = pgn {
            let (white, black) = match self.session.opponent().engine_color() {
                Some(Color::White) => ("Engine", "Human"),
                Some(Color::Black) => ("Human", "Engine"),
                None => ("Human", "Human"),
            };
            let headers = PgnHeaders {
                event: "Board game".to_string(),
                white: white.to_string(),
                black: black.to_string(),
                ..PgnHeaders::default()
            };
            tokio::fs::write(path, game.to_pgn(&headers))
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "game saved");
        }
        self.engine.shutdown().await;
        Ok(())
    }
}
