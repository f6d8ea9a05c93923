use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::enums::{Asset, PositionStatus};
use crate::ledger;
use crate::models::{Order, Position, Timestamps};
use crate::oracle::PriceOracleClient;
use crate::position_domain;
use crate::store::Store;

const TICK_INTERVAL: Duration = Duration::from_millis(200);
/// How far back a processed order id is kept before it ages out. Filled
/// orders from the watermark scan are reprocessed at most once per tick, so
/// this only needs to outlive a handful of ticks' worth of jitter.
const PROCESSED_WINDOW: chrono::Duration = chrono::Duration::minutes(10);

struct ProcessedOrder {
    id: Uuid,
    seen_at: DateTime<Utc>,
}

/// Scans filled perpetual orders since a watermark, folds each one into its
/// portfolio's open position (opening, merging, partially closing, or fully
/// closing it), then sweeps every open position for liquidation against the
/// oracle's last trade price.
pub struct PositionsEngine {
    store: Arc<Store>,
    oracle: Arc<dyn PriceOracleClient>,
    watermark: Mutex<DateTime<Utc>>,
    processed_orders: Mutex<Vec<ProcessedOrder>>,
}

impl PositionsEngine {
    /// `processed_order_ids` seeds the dedup window from a restored
    /// `EngineState`; restored ids are stamped with `watermark` as their
    /// `seen_at` since only the bare id survives a save/restore round trip.
    pub fn new(
        store: Arc<Store>,
        oracle: Arc<dyn PriceOracleClient>,
        watermark: DateTime<Utc>,
        processed_order_ids: Vec<Uuid>,
    ) -> Self {
        let processed_orders = processed_order_ids
            .into_iter()
            .map(|id| ProcessedOrder { id, seen_at: watermark })
            .collect();
        Self {
            store,
            oracle,
            watermark: Mutex::new(watermark),
            processed_orders: Mutex::new(processed_orders),
        }
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.lock().await
    }

    pub async fn processed_order_ids(&self) -> HashSet<Uuid> {
        self.processed_orders.lock().await.iter().map(|p| p.id).collect()
    }

    async fn mark_processed(&self, order_id: Uuid, now: DateTime<Utc>) {
        let mut processed = self.processed_orders.lock().await;
        processed.retain(|p| now - p.seen_at < PROCESSED_WINDOW);
        processed.push(ProcessedOrder { id: order_id, seen_at: now });
    }

    pub async fn tick(&self) {
        let check_time = Utc::now();
        let last_update = *self.watermark.lock().await;
        let filled_perp_orders = self.store.get_filled_perp_orders(last_update).await;
        if !filled_perp_orders.is_empty() {
            *self.watermark.lock().await = check_time;
        }

        let already_processed = self.processed_order_ids().await;
        for order in &filled_perp_orders {
            if already_processed.contains(&order.id) {
                continue;
            }
            let open_position = self
                .store
                .get_by_portfolio_and_market(order.portfolio_id, order.market, PositionStatus::Open)
                .await;
            match open_position {
                Some(position) => self.apply_order_to_position(order, &position).await,
                None => self.create_position_by_order(order).await,
            }
            self.mark_processed(order.id, check_time).await;
        }

        let open_positions = self.store.get_all_positions(None, None, Some(PositionStatus::Open)).await;
        for position in open_positions {
            let Some(last_trade) = self.oracle.get_last_trade_of(position.market).await else {
                continue;
            };
            let should_liquidate = match position.side {
                crate::enums::PositionSide::Long => position.lqd_price >= last_trade,
                crate::enums::PositionSide::Short => position.lqd_price <= last_trade,
            };
            if should_liquidate {
                self.liquid_position(&position).await;
            }
        }
    }

    async fn apply_order_to_position(&self, order: &Order, position: &Position) {
        let against = position_domain::is_order_against_position(order.market, position.market, order.side, position.side);
        if against {
            if order.size >= position.size {
                self.close_position(order, position).await;
            } else {
                self.close_partially_position(order, position).await;
            }
        } else {
            self.merge_order_with_position(order, position).await;
        }
    }

    async fn merge_order_with_position(&self, order: &Order, position: &Position) {
        let handle = match self.store.positions.row_lock(position.id).await {
            Some(h) => h,
            None => return,
        };
        let mut position = handle.lock().await;
        position.entry_price = position_domain::weighted_average_entry_price(&position, order);
        position.lqd_price = position_domain::lqd_price_calc(position.entry_price, position.leverage, position.side);
        position.size += order.size;
        position.margin = position_domain::margin_calc(position.size, position.leverage, position.entry_price);
        position.timestamps.touch(Utc::now());
        let position_id = position.id;
        drop(position);
        self.set_order_position_id(order.id, position_id).await;
    }

    /// Like `liquid_position`, locks balance before position so this engine
    /// never acquires the two in a different order depending on which
    /// operation is running.
    async fn close_partially_position(&self, order: &Order, position: &Position) {
        let new_pnl = position.pnl + position_domain::pnl_value(position.entry_price, order.price, order.size, position.side);
        let new_closed_size = position.closed_size + order.size;
        let new_margin =
            position_domain::margin_calc(position.size - new_closed_size, position.leverage, position.entry_price);
        let freed_margin = position.margin - new_margin;

        let balance_handle = match self.balance_row(position.portfolio_id, Asset::Usd).await {
            Some(h) => h,
            None => return,
        };
        {
            let mut balance = balance_handle.lock().await;
            ledger::unlock_balance(&mut balance, freed_margin);
            ledger::add_balance(&mut balance, new_pnl);
        }

        let handle = match self.store.positions.row_lock(position.id).await {
            Some(h) => h,
            None => return,
        };
        {
            let mut position = handle.lock().await;
            position.close_price = order.price;
            position.pnl = new_pnl;
            position.closed_size = new_closed_size;
            position.margin = new_margin;
            position.timestamps.touch(Utc::now());
        }

        self.set_order_position_id(order.id, position.id).await;
    }

    /// Like `liquid_position`, locks balance before position so this engine
    /// never acquires the two in a different order depending on which
    /// operation is running.
    async fn close_position(&self, order: &Order, position: &Position) {
        let new_pnl = position.pnl + position_domain::pnl_value(position.entry_price, order.price, order.size, position.side);
        let margin = position.margin;

        let balance_handle = match self.balance_row(position.portfolio_id, Asset::Usd).await {
            Some(h) => h,
            None => return,
        };
        {
            let mut balance = balance_handle.lock().await;
            ledger::unlock_balance(&mut balance, margin);
            ledger::add_balance(&mut balance, new_pnl);
        }

        let handle = match self.store.positions.row_lock(position.id).await {
            Some(h) => h,
            None => return,
        };
        {
            let mut position = handle.lock().await;
            position.close_price = order.price;
            position.pnl = new_pnl;
            position.status = PositionStatus::Close;
            position.closed_size = position.size;
            position.timestamps.touch(Utc::now());
        }

        self.set_order_position_id(order.id, position.id).await;
    }

    async fn create_position_by_order(&self, order: &Order) {
        let leverage = self
            .store
            .get_leverage_by_portfolio_id_and_market(order.portfolio_id, order.market)
            .await
            .map(|l| l.value)
            .unwrap_or(1.0);
        let side = position_domain::get_position_side_with_order(order);
        let lqd_price = position_domain::lqd_price_calc(order.price, leverage, side);
        let margin = position_domain::margin_calc(order.size, leverage, order.price);
        let now = Utc::now();
        let position = Position {
            id: Uuid::new_v4(),
            portfolio_id: order.portfolio_id,
            market: order.market,
            side,
            status: PositionStatus::Open,
            entry_price: order.price,
            close_price: 0.0,
            size: order.size,
            closed_size: 0.0,
            leverage,
            lqd_price,
            margin,
            pnl: 0.0,
            timestamps: Timestamps::new(now),
        };
        let position_id = position.id;
        self.store.positions.insert(position_id, position).await;
        self.set_order_position_id(order.id, position_id).await;
    }

    async fn liquid_position(&self, position: &Position) {
        let balance_handle = match self.balance_row(position.portfolio_id, Asset::Usd).await {
            Some(h) => h,
            None => return,
        };
        {
            let mut balance = balance_handle.lock().await;
            if balance.frozen < position.margin {
                log::warn!(
                    "[POSITIONS] cannot liquidate position {}: frozen balance below margin",
                    position.id
                );
                return;
            }
            ledger::burn_balance(&mut balance, position.margin);
        }
        if let Some(handle) = self.store.positions.row_lock(position.id).await {
            let mut position = handle.lock().await;
            position.pnl = -position.margin;
            position.status = PositionStatus::Liquid;
            position.timestamps.touch(Utc::now());
        }
    }

    async fn balance_row(&self, portfolio_id: Uuid, asset: Asset) -> Option<Arc<Mutex<crate::models::Balance>>> {
        let balances = self.store.get_balances_by_portfolio_id(portfolio_id).await;
        let row = balances.iter().find(|b| b.asset == asset)?;
        self.store.balances.row_lock(row.id).await
    }

    async fn set_order_position_id(&self, order_id: Uuid, position_id: Uuid) {
        if let Some(handle) = self.store.orders.row_lock(order_id).await {
            let mut order = handle.lock().await;
            if order.position_id.is_none() {
                order.position_id = Some(position_id);
                order.timestamps.touch(Utc::now());
            }
        }
    }

    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("[POSITIONS] shutdown signal received, stopping");
                        return;
                    }
                }
            }
        }
    }
}
