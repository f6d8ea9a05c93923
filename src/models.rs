use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{Asset, Market, OrderSide, OrderStatus, OrderType, PositionSide, PositionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    pub perp_maker_fee: f64,
    pub perp_taker_fee: f64,
    pub spot_maker_fee: f64,
    pub spot_taker_fee: f64,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub asset: Asset,
    pub quantity: f64,
    pub available: f64,
    pub frozen: f64,
    pub burned: f64,
    pub fee_paid: f64,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leverage {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub market: Market,
    pub value: f64,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub market: Market,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
    pub side: OrderSide,
    pub r#type: OrderType,
    pub status: OrderStatus,
    pub position_id: Option<Uuid>,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub market: Market,
    pub side: PositionSide,
    pub status: PositionStatus,
    pub entry_price: f64,
    pub close_price: f64,
    pub size: f64,
    pub closed_size: f64,
    pub leverage: f64,
    pub lqd_price: f64,
    pub margin: f64,
    pub pnl: f64,
    pub timestamps: Timestamps,
}
