use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::enums::{Market, OrderStatus, PositionStatus};
use crate::errors::EngineError;
use crate::models::{Balance, Leverage, Order, Portfolio, Position};

/// A generic table keyed by id, one lock per row. Acquiring a row's guard
/// before reading is this crate's equivalent of `with_for_update()`: the
/// guard is held across the read-then-mutate and released (lock dropped)
/// when the borrow scope ends.
pub struct Table<T> {
    rows: Mutex<HashMap<Uuid, Arc<Mutex<T>>>>,
}

impl<T: Clone> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// `id` must be the row's own id field; `row_lock`/`get_one_by_id` look
    /// rows up by that field's value elsewhere in this crate.
    pub async fn insert(&self, id: Uuid, row: T) {
        self.rows.lock().await.insert(id, Arc::new(Mutex::new(row)));
    }

    /// Returns the row's own lock handle, for callers that need a guard
    /// held across a read-then-mutate sequence (`with_for_update`).
    pub async fn row_lock(&self, id: Uuid) -> Option<Arc<Mutex<T>>> {
        self.rows.lock().await.get(&id).cloned()
    }

    pub async fn get_one_by_id(&self, id: Uuid) -> Option<T> {
        let handle = self.rows.lock().await.get(&id).cloned()?;
        let guard: MutexGuard<'_, T> = handle.lock().await;
        Some(guard.clone())
    }

    pub async fn get_many_by_ids(&self, ids: &[Uuid]) -> Vec<T> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.get_one_by_id(*id).await {
                out.push(row);
            }
        }
        out
    }

    pub async fn remove_by_id(&self, id: Uuid) {
        self.rows.lock().await.remove(&id);
    }

    pub async fn all(&self) -> Vec<T> {
        let rows = self.rows.lock().await;
        let mut out = Vec::with_capacity(rows.len());
        for handle in rows.values() {
            out.push(handle.lock().await.clone());
        }
        out
    }
}

impl<T: Clone> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Store {
    pub portfolios: Table<Portfolio>,
    pub balances: Table<Balance>,
    pub leverages: Table<Leverage>,
    pub orders: Table<Order>,
    pub positions: Table<Position>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            portfolios: Table::new(),
            balances: Table::new(),
            leverages: Table::new(),
            orders: Table::new(),
            positions: Table::new(),
        }
    }

    pub async fn create_portfolio(&self, portfolio: Portfolio) -> Result<Portfolio, EngineError> {
        let existing = self.portfolios.all().await;
        if existing.iter().any(|p| p.name == portfolio.name) {
            return Err(EngineError::InvalidOrder(format!(
                "portfolio name already exists: {}",
                portfolio.name
            )));
        }
        self.portfolios.insert(portfolio.id, portfolio.clone()).await;
        Ok(portfolio)
    }

    pub async fn get_by_name(&self, name: &str) -> Option<Portfolio> {
        self.portfolios.all().await.into_iter().find(|p| p.name == name)
    }

    pub async fn get_portfolio_asset(&self, portfolio_id: Uuid, asset: crate::enums::Asset) -> Option<Balance> {
        self.balances
            .all()
            .await
            .into_iter()
            .find(|b| b.portfolio_id == portfolio_id && b.asset == asset)
    }

    pub async fn get_balances_by_portfolio_id(&self, portfolio_id: Uuid) -> Vec<Balance> {
        self.balances
            .all()
            .await
            .into_iter()
            .filter(|b| b.portfolio_id == portfolio_id)
            .collect()
    }

    pub async fn get_leverage_by_portfolio_id_and_market(
        &self,
        portfolio_id: Uuid,
        market: Market,
    ) -> Option<Leverage> {
        self.leverages
            .all()
            .await
            .into_iter()
            .find(|l| l.portfolio_id == portfolio_id && l.market == market)
    }

    pub async fn get_all_order(&self, status: Option<OrderStatus>) -> Vec<Order> {
        let all = self.orders.all().await;
        match status {
            Some(s) => all.into_iter().filter(|o| o.status == s).collect(),
            None => all,
        }
    }

    pub async fn get_filled_perp_orders(&self, from_update_time: DateTime<Utc>) -> Vec<Order> {
        self.orders
            .all()
            .await
            .into_iter()
            .filter(|o| {
                o.status == OrderStatus::Filled
                    && o.market.is_perpetual()
                    && o.timestamps.updated_at >= from_update_time
            })
            .collect()
    }

    pub async fn get_all_positions(
        &self,
        portfolio_id: Option<Uuid>,
        market: Option<Market>,
        status: Option<PositionStatus>,
    ) -> Vec<Position> {
        self.positions
            .all()
            .await
            .into_iter()
            .filter(|p| portfolio_id.map_or(true, |id| p.portfolio_id == id))
            .filter(|p| market.map_or(true, |m| p.market == m))
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect()
    }

    pub async fn get_by_portfolio_and_market(
        &self,
        portfolio_id: Uuid,
        market: Market,
        status: PositionStatus,
    ) -> Option<Position> {
        self.get_all_positions(Some(portfolio_id), Some(market), Some(status))
            .await
            .into_iter()
            .next()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
