use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable snapshot of the positions engine's scan position: the watermark
/// it resumes the filled-perp-order scan from, and the recently-processed
/// order ids that guard against reprocessing an order still inside the
/// window on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub watermark: DateTime<Utc>,
    pub processed_order_ids: Vec<Uuid>,
    pub saved_at: DateTime<Utc>,
}

impl EngineState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            watermark: now,
            processed_order_ids: Vec::new(),
            saved_at: now,
        }
    }
}

pub fn load_state<P: AsRef<Path>>(path: P, now: DateTime<Utc>) -> EngineState {
    if path.as_ref().exists() {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<EngineState>(&content) {
                Ok(state) => {
                    info!(
                        "[PERSISTENCE] loaded state from {:?}: watermark={}, processed={}",
                        path.as_ref(),
                        state.watermark,
                        state.processed_order_ids.len()
                    );
                    return state;
                }
                Err(e) => error!("[PERSISTENCE] failed to parse state file: {e}"),
            },
            Err(e) => error!("[PERSISTENCE] failed to read state file: {e}"),
        }
    }
    info!("[PERSISTENCE] state file not found, starting from watermark={now}");
    EngineState::fresh(now)
}

pub fn save_state<P: AsRef<Path>>(path: P, state: &EngineState) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_processed_orders() {
        let now = Utc::now();
        let state = EngineState::fresh(now);
        assert!(state.processed_order_ids.is_empty());
        assert_eq!(state.watermark, now);
    }
}
