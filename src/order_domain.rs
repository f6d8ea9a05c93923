use crate::enums::{Asset, Market, OrderSide, OrderType};
use crate::models::Portfolio;

/// Splits a non-perpetual market symbol into its two coin legs, e.g.
/// "BTCUSD" -> ("USD", "BTC"). Mirrors the upstream source's
/// `market.value.replace("_prep", "")`, which is a typo for "_perp" and
/// therefore a no-op on every symbol that actually exists (perpetual symbols
/// never reach this function, since both callers branch on `is_perpetual()`
/// first). Preserved verbatim rather than "fixed" since nothing downstream
/// depends on it doing anything: first 3 chars are the quote coin, the rest
/// are the base coin.
fn split_market_coins(market: Market) -> (Asset, Asset) {
    let symbol = market.symbol().replace("_prep", "");
    let (second, first) = symbol.split_at(3);
    (coin_to_asset(first), coin_to_asset(second))
}

fn coin_to_asset(coin: &str) -> Asset {
    match coin {
        "USD" => Asset::Usd,
        "BTC" => Asset::Btc,
        "ETH" => Asset::Eth,
        other => panic!("unknown coin in market symbol: {other}"),
    }
}

pub fn get_payment_asset(market: Market, side: OrderSide) -> Asset {
    if market.is_perpetual() {
        return Asset::Usd;
    }
    let (first_coin, second_coin) = split_market_coins(market);
    match side {
        OrderSide::Buy => first_coin,
        OrderSide::Sell => second_coin,
    }
}

pub fn get_received_asset(market: Market, side: OrderSide) -> Asset {
    if market.is_perpetual() {
        return Asset::Usd;
    }
    let (first_coin, second_coin) = split_market_coins(market);
    match side {
        OrderSide::Buy => second_coin,
        OrderSide::Sell => first_coin,
    }
}

pub fn get_order_payment_asset_total(
    market: Market,
    price: f64,
    size: f64,
    side: OrderSide,
    leverage: f64,
) -> f64 {
    let order_total = size * price;
    if market.is_perpetual() {
        if leverage != 0.0 {
            return order_total / leverage;
        }
    }
    match side {
        OrderSide::Buy => order_total,
        OrderSide::Sell => size,
    }
}

pub fn get_order_received_asset_total(market: Market, price: f64, size: f64, side: OrderSide) -> f64 {
    let order_total = size * price;
    if market.is_perpetual() {
        return order_total;
    }
    match side {
        OrderSide::Buy => size,
        OrderSide::Sell => order_total,
    }
}

pub fn fee_calc(
    portfolio: &Portfolio,
    market: Market,
    price: f64,
    size: f64,
    side: OrderSide,
    order_type: OrderType,
) -> f64 {
    let order_total = size * price;
    if market.is_perpetual() {
        match order_type {
            OrderType::Limit => portfolio.perp_maker_fee * order_total,
            OrderType::Market => portfolio.perp_taker_fee * order_total,
        }
    } else {
        match order_type {
            OrderType::Limit => match side {
                OrderSide::Buy => size * portfolio.spot_maker_fee,
                OrderSide::Sell => order_total * portfolio.spot_maker_fee,
            },
            OrderType::Market => match side {
                OrderSide::Buy => size * portfolio.spot_taker_fee,
                OrderSide::Sell => order_total * portfolio.spot_taker_fee,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamps;
    use chrono::Utc;
    use uuid::Uuid;

    fn portfolio() -> Portfolio {
        Portfolio {
            id: Uuid::new_v4(),
            name: "p1".into(),
            perp_maker_fee: 0.0002,
            perp_taker_fee: 0.0005,
            spot_maker_fee: 0.001,
            spot_taker_fee: 0.002,
            timestamps: Timestamps::new(Utc::now()),
        }
    }

    #[test]
    fn perp_payment_and_received_asset_is_always_usd() {
        assert_eq!(
            get_payment_asset(Market::BtcUsdPerp, OrderSide::Buy),
            Asset::Usd
        );
        assert_eq!(
            get_received_asset(Market::BtcUsdPerp, OrderSide::Sell),
            Asset::Usd
        );
    }

    #[test]
    fn spot_buy_pays_quote_receives_base() {
        assert_eq!(get_payment_asset(Market::BtcUsd, OrderSide::Buy), Asset::Usd);
        assert_eq!(
            get_received_asset(Market::BtcUsd, OrderSide::Buy),
            Asset::Btc
        );
    }

    #[test]
    fn spot_sell_pays_base_receives_quote() {
        assert_eq!(get_payment_asset(Market::BtcUsd, OrderSide::Sell), Asset::Btc);
        assert_eq!(
            get_received_asset(Market::BtcUsd, OrderSide::Sell),
            Asset::Usd
        );
    }

    #[test]
    fn perp_payment_total_divides_by_leverage() {
        let total = get_order_payment_asset_total(Market::BtcUsdPerp, 20000.0, 0.1, OrderSide::Buy, 5.0);
        assert_eq!(total, (20000.0 * 0.1) / 5.0);
    }

    #[test]
    fn spot_buy_payment_total_is_quote_notional() {
        let total = get_order_payment_asset_total(Market::BtcUsd, 20000.0, 0.1, OrderSide::Buy, 1.0);
        assert_eq!(total, 20000.0 * 0.1);
    }

    #[test]
    fn spot_sell_payment_total_is_base_size() {
        let total = get_order_payment_asset_total(Market::BtcUsd, 20000.0, 0.1, OrderSide::Sell, 1.0);
        assert_eq!(total, 0.1);
    }

    #[test]
    fn fee_calc_perp_limit_uses_maker_fee() {
        let p = portfolio();
        let fee = fee_calc(&p, Market::BtcUsdPerp, 20000.0, 0.1, OrderSide::Buy, OrderType::Limit);
        assert_eq!(fee, p.perp_maker_fee * 20000.0 * 0.1);
    }

    #[test]
    fn fee_calc_spot_market_sell_uses_notional() {
        let p = portfolio();
        let fee = fee_calc(&p, Market::BtcUsd, 20000.0, 0.1, OrderSide::Sell, OrderType::Market);
        assert_eq!(fee, (20000.0 * 0.1) * p.spot_taker_fee);
    }
}
