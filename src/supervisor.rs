use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::matching_engine::MatchingEngine;
use crate::persistence::{save_state, EngineState};
use crate::positions_engine::PositionsEngine;

/// Owns both engines' tokio tasks and their shared shutdown signal, mirroring
/// how `main.rs` spawns the market maker's background tasks off an `Arc`
/// and tears them down on exit.
pub struct Supervisor {
    matching_engine: Arc<MatchingEngine>,
    positions_engine: Arc<PositionsEngine>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    matching_handle: Option<JoinHandle<()>>,
    positions_handle: Option<JoinHandle<()>>,
    state_path: String,
}

impl Supervisor {
    pub fn new(matching_engine: Arc<MatchingEngine>, positions_engine: Arc<PositionsEngine>, state_path: String) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            matching_engine,
            positions_engine,
            shutdown_tx,
            shutdown_rx,
            matching_handle: None,
            positions_handle: None,
            state_path,
        }
    }

    pub fn start(&mut self) {
        log::info!("[SUPERVISOR] starting matching engine and positions engine");

        let matching = self.matching_engine.clone();
        let rx = self.shutdown_rx.clone();
        self.matching_handle = Some(tokio::spawn(async move {
            matching.run(rx).await;
        }));

        let positions = self.positions_engine.clone();
        let rx = self.shutdown_rx.clone();
        self.positions_handle = Some(tokio::spawn(async move {
            positions.run(rx).await;
        }));
    }

    pub async fn stop(&mut self) {
        log::info!("[SUPERVISOR] stop requested, signaling engines");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.matching_handle.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.positions_handle.take() {
            let _ = handle.await;
        }

        let state = EngineState {
            watermark: self.positions_engine.watermark().await,
            processed_order_ids: self.positions_engine.processed_order_ids().await.into_iter().collect(),
            saved_at: Utc::now(),
        };
        if let Err(e) = save_state(&self.state_path, &state) {
            log::warn!("[SUPERVISOR] failed to persist engine state: {e}");
        }
    }
}
