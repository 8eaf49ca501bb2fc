//! Connection to the remote engine, serviced once per loop pass.

use move_reconciler::{EngineConfig, Session};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uci::TcpEngine;

/// Wait between failed connection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct EngineLink {
    config: EngineConfig,
    engine: Option<TcpEngine>,
    retry_at: Option<Instant>,
}

impl EngineLink {
    pub fn new(config: EngineConfig) -> Self {
        EngineLink {
            config,
            engine: None,
            retry_at: None,
        }
    }

    /// Starts a search when the session asks for one and polls a running
    /// search once. Engine trouble is logged and retried, never fatal.
    pub async fn service(&mut self, session: &mut Session) {
        if self.engine.is_none() && self.retry_at.is_some_and(|at| Instant::now() < at) {
            return;
        }

        if let Some(request) = session.engine_request() {
            if let Err(e) = self.start_search(&request.fen, request.depth, request.movetime_ms).await {
                warn!(error = %e, "engine search not started");
                self.drop_connection();
                session.retry_engine();
                return;
            }
        }

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !engine.is_searching() {
            return;
        }
        match engine.poll(self.config.poll_timeout()).await {
            Ok(poll) => {
                session.engine_reply(poll);
            }
            Err(e) => {
                warn!(error = %e, "engine connection lost");
                self.drop_connection();
                session.retry_engine();
            }
        }
    }

    async fn start_search(&mut self, fen: &str, depth: u32, movetime_ms: u64) -> Result<(), uci::UciError> {
        if self.engine.is_none() {
            let engine = TcpEngine::connect(
                &self.config.host,
                self.config.port,
                self.config.skill_level,
                self.config.connect_timeout(),
            )
            .await?;
            self.engine = Some(engine);
            self.retry_at = None;
        }
        match self.engine.as_mut() {
            Some(engine) => engine.go(fen, depth, movetime_ms).await,
            None => Ok(()),
        }
    }

    fn drop_connection(&mut self) {
        self.engine = None;
        self.retry_at = Some(Instant::now() + RECONNECT_DELAY);
    }

    pub async fn shutdown(self) {
        if let Some(engine) = self.engine {
            if let Err(e) = engine.quit().await {
                warn!(error = %e, "engine did not take quit");
            } else {
                info!("engine disconnected");
            }
        }
    }
}
