//! Fire-and-poll client for an engine reachable over a byte stream.

use crate::{EngineCommand, EngineInfo, EngineMessage, GoOptions, UciError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of one poll for engine output.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePoll {
    Info(EngineInfo),
    BestMove { mv: String, ponder: Option<String> },
    /// Nothing arrived within the poll timeout. Try again next cycle.
    Pending,
}

/// An engine behind a TCP connection.
pub type TcpEngine = RemoteEngine<BufReader<OwnedReadHalf>, OwnedWriteHalf>;

/// A remote engine speaking UCI over `reader`/`writer`.
///
/// Every call is either a write or a bounded read, so the caller's loop
/// never blocks on a slow engine.
pub struct RemoteEngine<R, W> {
    lines: Lines<R>,
    writer: W,
    name: Option<String>,
    searching: bool,
}

impl TcpEngine {
    /// Connects to `host:port` and runs the handshake, setting the engine's
    /// skill level. `limit` bounds the connect and each handshake reply.
    pub async fn connect(host: &str, port: u16, skill: u32, limit: Duration) -> Result<Self, UciError> {
        let stream = timeout(limit, TcpStream::connect((host, port)))
            .await
            .map_err(|_| UciError::Timeout("connection"))??;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();

        let mut engine = RemoteEngine::new(BufReader::new(read), write);
        engine.handshake(skill, limit).await?;
        info!(host, port, name = engine.name().unwrap_or("?"), "engine connected");
        Ok(engine)
    }
}

impl<R, W> RemoteEngine<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            name: None,
            searching: false,
        }
    }

    /// Name from the engine's `id name` line, once the handshake has seen it.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// A search was started and its `bestmove` has not been polled yet.
    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub async fn send(&mut self, cmd: &EngineCommand) -> Result<(), UciError> {
        let line = cmd.to_line();
        debug!(%line, "to engine");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// `uci` → `uciok`, skill level, `isready` → `readyok`, then a new game.
    pub async fn handshake(&mut self, skill: u32, limit: Duration) -> Result<(), UciError> {
        self.send(&EngineCommand::Uci).await?;
        timeout(limit, self.wait_for(&EngineMessage::UciOk))
            .await
            .map_err(|_| UciError::Timeout("uciok"))??;

        self.send(&EngineCommand::skill_level(skill)).await?;
        self.send(&EngineCommand::IsReady).await?;
        timeout(limit, self.wait_for(&EngineMessage::ReadyOk))
            .await
            .map_err(|_| UciError::Timeout("readyok"))??;

        self.new_game().await
    }

    pub async fn new_game(&mut self) -> Result<(), UciError> {
        self.send(&EngineCommand::UciNewGame).await?;
        self.send(&EngineCommand::Position { fen: None }).await?;
        self.searching = false;
        Ok(())
    }

    /// Starts a search on `fen` and returns without waiting for a reply.
    pub async fn go(&mut self, fen: &str, depth: u32, movetime_ms: u64) -> Result<(), UciError> {
        self.send(&EngineCommand::Position {
            fen: Some(fen.to_string()),
        })
        .await?;
        self.send(&EngineCommand::Go(GoOptions {
            depth: Some(depth),
            movetime: Some(movetime_ms),
        }))
        .await?;
        self.searching = true;
        Ok(())
    }

    /// Waits at most `wait` for the next line of engine output.
    ///
    /// Lines other than `info` and `bestmove` are logged and reported as
    /// [`EnginePoll::Pending`].
    pub async fn poll(&mut self, wait: Duration) -> Result<EnginePoll, UciError> {
        let line = match timeout(wait, self.lines.next_line()).await {
            Err(_) => return Ok(EnginePoll::Pending),
            Ok(line) => line?,
        };
        let Some(line) = line else {
            self.searching = false;
            return Err(UciError::Closed);
        };

        match EngineMessage::parse(&line) {
            Ok(EngineMessage::Info(info)) => Ok(EnginePoll::Info(info)),
            Ok(EngineMessage::BestMove { mv, ponder }) => {
                info!(%mv, "engine best move");
                self.searching = false;
                Ok(EnginePoll::BestMove { mv, ponder })
            }
            Ok(other) => {
                debug!(line = %other.to_uci(), "ignored engine output");
                Ok(EnginePoll::Pending)
            }
            Err(e) => {
                warn!(error = %e, "unreadable engine output");
                Ok(EnginePoll::Pending)
            }
        }
    }

    /// Asks the engine to cut the running search short. Its `bestmove`
    /// still arrives through [`poll`](Self::poll).
    pub async fn stop(&mut self) -> Result<(), UciError> {
        self.send(&EngineCommand::Stop).await
    }

    pub async fn quit(mut self) -> Result<(), UciError> {
        self.send(&EngineCommand::Quit).await
    }

    async fn wait_for(&mut self, expected: &EngineMessage) -> Result<(), UciError> {
        loop {
            let line = self.lines.next_line().await?.ok_or(UciError::Closed)?;
            match EngineMessage::parse(&line) {
                Ok(EngineMessage::Id { name: Some(name), .. }) => self.name = Some(name),
                Ok(msg) if msg == *expected => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "skipping engine line during handshake"),
            }
        }
    }
}
