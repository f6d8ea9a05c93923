use crate::enums::Market;

/// Process-wide configuration, loaded once at boot from the environment
/// (with `.env` support via `dotenvy`). Mirrors the upstream `Setting`/
/// `DatabaseConfig` pair: a flat settings struct plus a separate connection
/// tuple that is parsed and carried even though this crate's store is
/// in-memory, since a complete config surface is ambient, not functional.
#[derive(Debug, Clone)]
pub struct Settings {
    pub active_markets: Vec<Market>,
    pub default_spot_maker_fee: f64,
    pub default_spot_taker_fee: f64,
    pub default_perp_maker_fee: f64,
    pub default_perp_taker_fee: f64,
    pub mm_api_path: String,
    pub mm_api_version: String,
    pub mm_subscription_path: String,
    pub exception_logs_path: String,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

fn parse_market(raw: &str) -> Option<Market> {
    match raw.trim() {
        "BTCUSD" => Some(Market::BtcUsd),
        "ETHUSD" => Some(Market::EthUsd),
        "BTCUSD_PERP" => Some(Market::BtcUsdPerp),
        "ETHUSD_PERP" => Some(Market::EthUsdPerp),
        other => {
            log::warn!("[SETTINGS] unknown market in ACTIVE_MARKETS: {other}");
            None
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let active_markets = std::env::var("ACTIVE_MARKETS")
            .map(|v| v.split(',').filter_map(parse_market).collect())
            .unwrap_or_else(|_| vec![Market::BtcUsd, Market::EthUsd, Market::BtcUsdPerp, Market::EthUsdPerp]);

        let fee = |key: &str, default: f64| -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            active_markets,
            default_spot_maker_fee: fee("DEFAULT_SPOT_MAKER_FEE", 0.001),
            default_spot_taker_fee: fee("DEFAULT_SPOT_TAKER_FEE", 0.002),
            default_perp_maker_fee: fee("DEFAULT_PERP_MAKER_FEE", 0.0002),
            default_perp_taker_fee: fee("DEFAULT_PERP_TAKER_FEE", 0.0005),
            mm_api_path: std::env::var("MM_API_PATH").unwrap_or_else(|_| "http://localhost:8001".into()),
            mm_api_version: std::env::var("MM_API_VERSION").unwrap_or_else(|_| "v1".into()),
            mm_subscription_path: std::env::var("MM_SUBSCRIPTION_PATH")
                .unwrap_or_else(|_| "/subscriptions/last-trade".into()),
            exception_logs_path: std::env::var("EXCEPTION_LOGS_PATH").unwrap_or_else(|_| "./logs/exceptions.log".into()),
            database: DatabaseConfig {
                host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".into()),
                port: std::env::var("DATABASE_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5432),
                user: std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".into()),
                password: std::env::var("DATABASE_PASS").unwrap_or_default(),
                name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "exchange_simulator".into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_market_accepts_known_symbols_only() {
        assert_eq!(parse_market("BTCUSD_PERP"), Some(Market::BtcUsdPerp));
        assert_eq!(parse_market("DOGEUSD"), None);
    }
}
