use crate::enums::{Market, OrderSide, PositionSide};
use crate::models::{Order, Position};

pub fn get_position_side_with_order(order: &Order) -> PositionSide {
    match order.side {
        OrderSide::Buy => PositionSide::Long,
        OrderSide::Sell => PositionSide::Short,
    }
}

/// True when `order_side` closes/nets against an existing position of
/// `position_side`: a BUY nets a SHORT, a SELL nets a LONG.
pub fn is_order_against_position(
    order_market: Market,
    position_market: Market,
    order_side: OrderSide,
    position_side: PositionSide,
) -> bool {
    assert!(
        order_market == position_market,
        "order and position must share a market"
    );
    match order_side {
        OrderSide::Buy => position_side == PositionSide::Short,
        OrderSide::Sell => position_side == PositionSide::Long,
    }
}

pub fn lqd_price_calc(entry_price: f64, leverage: f64, side: PositionSide) -> f64 {
    let lqd_distance = entry_price / leverage;
    match side {
        PositionSide::Long => entry_price - lqd_distance,
        PositionSide::Short => entry_price + lqd_distance,
    }
}

pub fn margin_calc(size: f64, leverage: f64, price: f64) -> f64 {
    (size / leverage) * price
}

pub fn weighted_average_entry_price(position: &Position, order: &Order) -> f64 {
    (position.size * position.entry_price + order.size * order.price)
        / (position.size + order.size)
}

pub fn pnl_value(entry_price: f64, close_price: f64, size: f64, side: PositionSide) -> f64 {
    match side {
        PositionSide::Long => size * (close_price - entry_price),
        PositionSide::Short => size * (entry_price - close_price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamps;
    use chrono::Utc;
    use uuid::Uuid;

    fn order(side: OrderSide, price: f64, size: f64) -> Order {
        Order {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            market: Market::BtcUsdPerp,
            price,
            size,
            fee: 0.0,
            side,
            r#type: crate::enums::OrderType::Limit,
            status: crate::enums::OrderStatus::Filled,
            position_id: None,
            timestamps: Timestamps::new(Utc::now()),
        }
    }

    fn position(side: PositionSide, entry_price: f64, size: f64, leverage: f64) -> Position {
        Position {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            market: Market::BtcUsdPerp,
            side,
            status: crate::enums::PositionStatus::Open,
            entry_price,
            close_price: 0.0,
            size,
            closed_size: 0.0,
            leverage,
            lqd_price: lqd_price_calc(entry_price, leverage, side),
            margin: margin_calc(size, leverage, entry_price),
            pnl: 0.0,
            timestamps: Timestamps::new(Utc::now()),
        }
    }

    #[test]
    fn buy_order_side_is_long() {
        let o = order(OrderSide::Buy, 100.0, 1.0);
        assert_eq!(get_position_side_with_order(&o), PositionSide::Long);
    }

    #[test]
    fn buy_nets_a_short_position() {
        assert!(is_order_against_position(
            Market::BtcUsdPerp,
            Market::BtcUsdPerp,
            OrderSide::Buy,
            PositionSide::Short
        ));
        assert!(!is_order_against_position(
            Market::BtcUsdPerp,
            Market::BtcUsdPerp,
            OrderSide::Buy,
            PositionSide::Long
        ));
    }

    #[test]
    fn lqd_price_long_below_entry_short_above_entry() {
        assert_eq!(lqd_price_calc(20000.0, 5.0, PositionSide::Long), 16000.0);
        assert_eq!(lqd_price_calc(20000.0, 5.0, PositionSide::Short), 24000.0);
    }

    #[test]
    fn margin_is_notional_over_leverage() {
        assert_eq!(margin_calc(0.5, 5.0, 20000.0), (0.5 / 5.0) * 20000.0);
    }

    #[test]
    fn weighted_average_entry_blends_by_size() {
        let pos = position(PositionSide::Long, 20000.0, 1.0, 5.0);
        let o = order(OrderSide::Buy, 22000.0, 1.0);
        let avg = weighted_average_entry_price(&pos, &o);
        assert_eq!(avg, 21000.0);
    }

    #[test]
    fn weighted_average_entry_price_is_symmetric_in_its_inputs() {
        // The formula is a plain size-weighted average of two (size, price)
        // pairs, so it should not matter which pair arrives as the existing
        // position and which arrives as the incoming order.
        let pos = position(PositionSide::Long, 20000.0, 2.0, 5.0);
        let o = order(OrderSide::Buy, 22000.0, 3.0);
        let avg_a = weighted_average_entry_price(&pos, &o);

        let swapped_pos = position(PositionSide::Long, 22000.0, 3.0, 5.0);
        let swapped_order = order(OrderSide::Buy, 20000.0, 2.0);
        let avg_b = weighted_average_entry_price(&swapped_pos, &swapped_order);

        assert_eq!(avg_a, avg_b);
    }

    #[test]
    fn pnl_long_is_positive_on_price_increase() {
        assert_eq!(pnl_value(20000.0, 21000.0, 1.0, PositionSide::Long), 1000.0);
        assert_eq!(pnl_value(20000.0, 21000.0, 1.0, PositionSide::Short), -1000.0);
    }
}
