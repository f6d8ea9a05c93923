mod enums;
mod errors;
mod ledger;
mod matching_engine;
mod models;
mod oracle;
mod order_domain;
mod persistence;
mod position_domain;
mod positions_engine;
mod settings;
mod store;
mod supervisor;

use std::sync::Arc;

use chrono::Utc;

use matching_engine::MatchingEngine;
use oracle::{HttpPriceOracle, PriceOracleClient};
use persistence::load_state;
use positions_engine::PositionsEngine;
use settings::Settings;
use store::Store;
use supervisor::Supervisor;

const STATE_PATH: &str = "./data/engine_state.json";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("exchange-simulator-core starting");

    let settings = Settings::from_env();
    log::info!("  active markets: {:?}", settings.active_markets);
    log::info!("  oracle endpoint: {}{}", settings.mm_api_path, settings.mm_subscription_path);

    let store = Arc::new(Store::new());
    let oracle: Arc<dyn PriceOracleClient> = Arc::new(HttpPriceOracle::new(&settings));
    if let Err(e) = oracle.subscribe(&settings.active_markets).await {
        log::error!("[MAIN] failed to subscribe to price oracle: {e}");
    }

    let state = load_state(STATE_PATH, Utc::now());

    let matching_engine = Arc::new(MatchingEngine::new(store.clone(), oracle.clone()));
    let positions_engine = Arc::new(PositionsEngine::new(
        store.clone(),
        oracle.clone(),
        state.watermark,
        state.processed_order_ids,
    ));

    let mut supervisor = Supervisor::new(matching_engine, positions_engine, STATE_PATH.to_string());
    supervisor.start();

    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("[MAIN] shutdown signal received"),
        Err(e) => log::error!("[MAIN] failed to listen for shutdown signal: {e}"),
    }

    supervisor.stop().await;
    log::info!("exchange-simulator-core stopped");
}
