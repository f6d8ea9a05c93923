use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    BtcUsd,
    EthUsd,
    BtcUsdPerp,
    EthUsdPerp,
}

impl Market {
    /// Mirrors `is_perptual()` from the upstream source: any market whose
    /// symbol carries a "perp" suffix is a perpetual.
    pub fn is_perpetual(&self) -> bool {
        matches!(self, Market::BtcUsdPerp | Market::EthUsdPerp)
    }

    /// Symbol as the upstream source spells it, e.g. "BTCUSD_PERP".
    pub fn symbol(&self) -> &'static str {
        match self {
            Market::BtcUsd => "BTCUSD",
            Market::EthUsd => "ETHUSD",
            Market::BtcUsdPerp => "BTCUSD_PERP",
            Market::EthUsdPerp => "ETHUSD_PERP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Usd,
    Btc,
    Eth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Filled,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Close,
    Liquid,
}
