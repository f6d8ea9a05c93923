use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::enums::{Market, OrderSide, OrderStatus, OrderType, PositionStatus};
use crate::errors::EngineError;
use crate::ledger;
use crate::models::{Order, Timestamps};
use crate::oracle::PriceOracleClient;
use crate::order_domain;
use crate::store::Store;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Admits, cancels, fills and sweeps orders against the oracle's last trade
/// price. There is no continuous order book here: a resting LIMIT order is
/// checked against the latest price on every tick rather than matched
/// against other resting orders.
pub struct MatchingEngine {
    store: Arc<Store>,
    oracle: Arc<dyn PriceOracleClient>,
}

impl MatchingEngine {
    pub fn new(store: Arc<Store>, oracle: Arc<dyn PriceOracleClient>) -> Self {
        Self { store, oracle }
    }

    /// Open-position netting check: if the portfolio already holds an open
    /// position on `market` that this order would close/reduce, the order
    /// skips balance admission entirely. Raises when the order would flip
    /// the position past flat instead of closing into it.
    async fn perpetual_open_position_check(
        &self,
        market: Market,
        portfolio_id: Uuid,
        size: f64,
        side: OrderSide,
    ) -> Result<bool, EngineError> {
        let open = self
            .store
            .get_by_portfolio_and_market(portfolio_id, market, PositionStatus::Open)
            .await;
        let Some(position) = open else {
            return Ok(false);
        };
        if crate::position_domain::is_order_against_position(market, position.market, side, position.side) {
            if position.size >= size {
                return Ok(true);
            }
            return Err(EngineError::InvalidOrder(
                "order size exceeds open position, cannot flip position through a single order".into(),
            ));
        }
        Ok(false)
    }

    pub async fn create_order(
        &self,
        market: Market,
        portfolio_id: Uuid,
        price: Option<f64>,
        size: f64,
        side: OrderSide,
        order_type: OrderType,
    ) -> Result<Order, EngineError> {
        let portfolio = self
            .store
            .portfolios
            .get_one_by_id(portfolio_id)
            .await
            .ok_or_else(|| EngineError::InvalidOrder(format!("unknown portfolio: {portfolio_id}")))?;

        let resolved_price = match order_type {
            OrderType::Market => self
                .oracle
                .get_last_trade_of(market)
                .await
                .ok_or_else(|| EngineError::InvalidOrder(format!("no last trade for market {}", market.symbol())))?,
            OrderType::Limit => price.ok_or_else(|| EngineError::InvalidOrder("limit order requires a price".into()))?,
        };

        let payment_asset = order_domain::get_payment_asset(market, side);

        let mut leverage = 1.0;
        let mut checked_open_position = false;
        if market.is_perpetual() {
            if let Some(lev) = self
                .store
                .get_leverage_by_portfolio_id_and_market(portfolio_id, market)
                .await
            {
                leverage = lev.value;
            }
            checked_open_position = self
                .perpetual_open_position_check(market, portfolio_id, size, side)
                .await?;
        }

        let payment_total =
            order_domain::get_order_payment_asset_total(market, resolved_price, size, side, leverage);

        let mut checked_available_qty = false;
        if !checked_open_position {
            let balance_handle = self
                .balance_row_or_err(portfolio_id, payment_asset)
                .await?;
            let mut balance = balance_handle.lock().await;
            checked_available_qty = ledger::check_available_qty(&balance, payment_total);
            if !checked_available_qty {
                return Err(EngineError::NotEnoughBalance(format!(
                    "portfolio {portfolio_id} lacks {payment_total} of payment asset for this order"
                )));
            }
            ledger::lock_balance(&mut balance, payment_total);
        }
        debug_assert!(checked_open_position || checked_available_qty);

        let fee = order_domain::fee_calc(&portfolio, market, resolved_price, size, side, order_type);

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            portfolio_id,
            market,
            price: resolved_price,
            size,
            fee,
            side,
            r#type: order_type,
            status: OrderStatus::Active,
            position_id: None,
            timestamps: Timestamps::new(now),
        };
        self.store.orders.insert(order.id, order.clone()).await;

        if order_type == OrderType::Market {
            return Ok(self.fill_order(order.id).await?);
        }
        Ok(order)
    }

    async fn balance_row_or_err(
        &self,
        portfolio_id: Uuid,
        asset: crate::enums::Asset,
    ) -> Result<Arc<tokio::sync::Mutex<crate::models::Balance>>, EngineError> {
        let balances = self.store.get_balances_by_portfolio_id(portfolio_id).await;
        let row = balances
            .iter()
            .find(|b| b.asset == asset)
            .ok_or_else(|| EngineError::NotEnoughBalance(format!("no balance row for asset {asset:?}")))?;
        self.store
            .balances
            .row_lock(row.id)
            .await
            .ok_or_else(|| EngineError::NotEnoughBalance(format!("no balance row for asset {asset:?}")))
    }

    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        // Locks are taken balance-before-order throughout this engine, the
        // same fixed order the positions engine uses, so the two can never
        // deadlock on a shared portfolio. The order row is only briefly
        // locked up front to read its fields and check status.
        let handle = self
            .store
            .orders
            .row_lock(order_id)
            .await
            .ok_or_else(|| EngineError::NotFoundOrder(format!("order {order_id} not found")))?;
        let snapshot = {
            let order = handle.lock().await;
            if order.status != OrderStatus::Active {
                return Err(EngineError::InvalidOrder(format!(
                    "order {order_id} is not active, cannot cancel"
                )));
            }
            order.clone()
        };

        let payment_asset = order_domain::get_payment_asset(snapshot.market, snapshot.side);
        let payment_total = order_domain::get_order_payment_asset_total(
            snapshot.market,
            snapshot.price,
            snapshot.size,
            snapshot.side,
            1.0,
        );
        let balance_handle = self.balance_row_or_err(snapshot.portfolio_id, payment_asset).await?;
        {
            let mut balance = balance_handle.lock().await;
            ledger::unlock_balance(&mut balance, payment_total);
        }

        let mut order = handle.lock().await;
        order.status = OrderStatus::Canceled;
        order.timestamps.touch(Utc::now());
        Ok(order.clone())
    }

    /// Idempotent: filling an order that is no longer ACTIVE is a no-op.
    pub async fn fill_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        let handle = self
            .store
            .orders
            .row_lock(order_id)
            .await
            .ok_or_else(|| EngineError::NotFoundOrder(format!("order {order_id} not found")))?;
        let snapshot = {
            let order = handle.lock().await;
            if order.status != OrderStatus::Active {
                return Ok(order.clone());
            }
            order.clone()
        };

        let received_asset = order_domain::get_received_asset(snapshot.market, snapshot.side);

        if !snapshot.market.is_perpetual() {
            let payment_asset = order_domain::get_payment_asset(snapshot.market, snapshot.side);
            let payment_total = order_domain::get_order_payment_asset_total(
                snapshot.market,
                snapshot.price,
                snapshot.size,
                snapshot.side,
                1.0,
            );
            let received_total = order_domain::get_order_received_asset_total(
                snapshot.market,
                snapshot.price,
                snapshot.size,
                snapshot.side,
            );

            let payment_handle = self.balance_row_or_err(snapshot.portfolio_id, payment_asset).await?;
            {
                let mut payment_balance = payment_handle.lock().await;
                ledger::unlock_balance(&mut payment_balance, payment_total);
                ledger::pay_balance(&mut payment_balance, payment_total);
            }
            let received_handle = self.balance_row_or_err(snapshot.portfolio_id, received_asset).await?;
            {
                let mut received_balance = received_handle.lock().await;
                ledger::add_balance(&mut received_balance, received_total);
            }
        }

        let fee_handle = self.balance_row_or_err(snapshot.portfolio_id, received_asset).await?;
        {
            let mut fee_balance = fee_handle.lock().await;
            ledger::pay_fee(&mut fee_balance, snapshot.fee);
        }

        let mut order = handle.lock().await;
        order.status = OrderStatus::Filled;
        order.timestamps.touch(Utc::now());

        Ok(order.clone())
    }

    pub async fn match_open_orders(&self, open_orders: &[Order]) -> Vec<Order> {
        let mut filled = Vec::new();
        for order in open_orders {
            if order.r#type == OrderType::Market {
                continue;
            }
            let Some(last_trade) = self.oracle.get_last_trade_of(order.market).await else {
                continue;
            };
            let should_fill = match order.side {
                OrderSide::Buy => order.price >= last_trade,
                OrderSide::Sell => order.price <= last_trade,
            };
            if !should_fill {
                continue;
            }
            match self.fill_order(order.id).await {
                Ok(filled_order) => filled.push(filled_order),
                Err(e) => log::warn!("[MATCHING] failed to fill order {}: {e}", order.id),
            }
        }
        filled
    }

    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if let Err(e) = self.oracle.poll().await {
                log::warn!("[MATCHING] oracle poll failed: {e}");
            }
            let open_orders = self.store.get_all_order(Some(OrderStatus::Active)).await;
            if !open_orders.is_empty() {
                self.match_open_orders(&open_orders).await;
            }
            tokio::select! {
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("[MATCHING] shutdown signal received, stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Asset, PositionSide};
    use crate::models::Position;

    async fn setup() -> (MatchingEngine, Arc<Store>, Arc<crate::oracle::SimPriceOracle>, Uuid) {
        let store = Arc::new(Store::new());
        let oracle = Arc::new(crate::oracle::SimPriceOracle::new());
        let portfolio_id = Uuid::new_v4();
        store
            .create_portfolio(crate::models::Portfolio {
                id: portfolio_id,
                name: "trader-1".into(),
                perp_maker_fee: 0.0002,
                perp_taker_fee: 0.0005,
                spot_maker_fee: 0.001,
                spot_taker_fee: 0.002,
                timestamps: Timestamps::new(Utc::now()),
            })
            .await
            .unwrap();
        let usd_balance = ledger::create_by_qty(portfolio_id, Asset::Usd, 2000.0);
        store.balances.insert(usd_balance.id, usd_balance).await;
        let btc_balance = ledger::create_by_qty(portfolio_id, Asset::Btc, 0.05);
        store.balances.insert(btc_balance.id, btc_balance).await;
        let engine = MatchingEngine::new(store.clone(), oracle.clone());
        (engine, store, oracle, portfolio_id)
    }

    #[tokio::test]
    async fn market_order_fills_immediately_and_locks_no_balance() {
        let (engine, store, oracle, portfolio_id) = setup().await;
        oracle.set_last_trade(Market::BtcUsd, 20000.0).await;

        let order = engine
            .create_order(Market::BtcUsd, portfolio_id, None, 0.01, OrderSide::Buy, OrderType::Market)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let usd = store.get_portfolio_asset(portfolio_id, Asset::Usd).await.unwrap();
        // 2000 - (0.01*20000) - fee, fee = taker_fee * notional
        let notional = 0.01 * 20000.0;
        let fee = 0.002 * notional;
        assert!((usd.quantity - (2000.0 - notional - fee)).abs() < 1e-9);
        assert_eq!(usd.frozen, 0.0);
    }

    #[tokio::test]
    async fn limit_order_locks_balance_until_filled() {
        let (engine, store, oracle, portfolio_id) = setup().await;
        oracle.set_last_trade(Market::BtcUsd, 20000.0).await;

        let order = engine
            .create_order(Market::BtcUsd, portfolio_id, Some(19000.0), 0.01, OrderSide::Buy, OrderType::Limit)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Active);

        let usd = store.get_portfolio_asset(portfolio_id, Asset::Usd).await.unwrap();
        assert_eq!(usd.frozen, 190.0);
        assert_eq!(usd.available, 2000.0 - 190.0);

        let filled = engine.match_open_orders(&[order]).await;
        assert!(filled.is_empty(), "buy limit below last trade should not fill");
    }

    #[tokio::test]
    async fn limit_buy_fills_when_price_at_or_above_last_trade() {
        let (engine, store, oracle, portfolio_id) = setup().await;
        oracle.set_last_trade(Market::BtcUsd, 20000.0).await;

        let order = engine
            .create_order(Market::BtcUsd, portfolio_id, Some(20500.0), 0.01, OrderSide::Buy, OrderType::Limit)
            .await
            .unwrap();

        let filled = engine.match_open_orders(&[order]).await;
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].status, OrderStatus::Filled);

        let btc = store.get_portfolio_asset(portfolio_id, Asset::Btc).await.unwrap();
        assert_eq!(btc.quantity, 0.05 + 0.01);
    }

    #[tokio::test]
    async fn cancel_unlocks_the_order_balance() {
        let (engine, store, _oracle, portfolio_id) = setup().await;
        let order = engine
            .create_order(Market::BtcUsd, portfolio_id, Some(19000.0), 0.01, OrderSide::Buy, OrderType::Limit)
            .await
            .unwrap();
        let canceled = engine.cancel_order(order.id).await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        let usd = store.get_portfolio_asset(portfolio_id, Asset::Usd).await.unwrap();
        assert_eq!(usd.frozen, 0.0);
        assert_eq!(usd.available, 2000.0);
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_order() {
        let (engine, _store, _oracle, portfolio_id) = setup().await;
        let result = engine
            .create_order(Market::BtcUsd, portfolio_id, Some(19000.0), 100.0, OrderSide::Buy, OrderType::Limit)
            .await;
        assert!(matches!(result, Err(EngineError::NotEnoughBalance(_))));
    }

    #[tokio::test]
    async fn netting_check_accepts_exact_size_and_rejects_a_larger_order() {
        let (engine, store, _oracle, portfolio_id) = setup().await;
        let position = Position {
            id: Uuid::new_v4(),
            portfolio_id,
            market: Market::BtcUsdPerp,
            side: PositionSide::Long,
            status: PositionStatus::Open,
            entry_price: 20000.0,
            close_price: 0.0,
            size: 0.01,
            closed_size: 0.0,
            leverage: 1.0,
            lqd_price: 0.0,
            margin: 200.0,
            pnl: 0.0,
            timestamps: Timestamps::new(Utc::now()),
        };
        store.positions.insert(position.id, position).await;

        let closes = engine
            .perpetual_open_position_check(Market::BtcUsdPerp, portfolio_id, 0.01, OrderSide::Sell)
            .await
            .unwrap();
        assert!(closes, "an order exactly netting the open position should be treated as a close");

        let result = engine
            .perpetual_open_position_check(Market::BtcUsdPerp, portfolio_id, 0.01 + 1e-9, OrderSide::Sell)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn fill_order_called_twice_is_a_no_op_the_second_time() {
        let (engine, store, oracle, portfolio_id) = setup().await;
        oracle.set_last_trade(Market::BtcUsd, 20000.0).await;
        let order = engine
            .create_order(Market::BtcUsd, portfolio_id, None, 0.01, OrderSide::Buy, OrderType::Market)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let usd_after_first = store.get_portfolio_asset(portfolio_id, Asset::Usd).await.unwrap();
        let btc_after_first = store.get_portfolio_asset(portfolio_id, Asset::Btc).await.unwrap();

        let refilled = engine.fill_order(order.id).await.unwrap();
        assert_eq!(refilled.status, OrderStatus::Filled);

        let usd_after_second = store.get_portfolio_asset(portfolio_id, Asset::Usd).await.unwrap();
        let btc_after_second = store.get_portfolio_asset(portfolio_id, Asset::Btc).await.unwrap();
        assert_eq!(usd_after_first.quantity, usd_after_second.quantity);
        assert_eq!(btc_after_first.quantity, btc_after_second.quantity);
    }
}
