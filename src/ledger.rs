use chrono::Utc;
use uuid::Uuid;

use crate::enums::Asset;
use crate::models::{Balance, Timestamps};

/// Deposit path constructor: a fresh balance row with the given quantity
/// fully available, nothing frozen/burned/fee-paid yet.
pub fn create_by_qty(portfolio_id: Uuid, asset: Asset, qty: f64) -> Balance {
    Balance {
        id: Uuid::new_v4(),
        portfolio_id,
        asset,
        quantity: qty,
        available: qty,
        frozen: 0.0,
        burned: 0.0,
        fee_paid: 0.0,
        timestamps: Timestamps::new(Utc::now()),
    }
}

pub fn add_balance(balance: &mut Balance, qty: f64) {
    balance.quantity += qty;
    balance.available += qty;
    balance.timestamps.touch(Utc::now());
}

pub fn lock_balance(balance: &mut Balance, qty: f64) {
    balance.available -= qty;
    balance.frozen += qty;
    balance.timestamps.touch(Utc::now());
}

pub fn unlock_balance(balance: &mut Balance, qty: f64) {
    balance.frozen -= qty;
    balance.available += qty;
    balance.timestamps.touch(Utc::now());
}

pub fn pay_balance(balance: &mut Balance, qty: f64) {
    balance.available -= qty;
    balance.quantity -= qty;
    balance.timestamps.touch(Utc::now());
}

pub fn pay_fee(balance: &mut Balance, qty: f64) {
    balance.available -= qty;
    balance.quantity -= qty;
    balance.fee_paid += qty;
    balance.timestamps.touch(Utc::now());
}

pub fn burn_balance(balance: &mut Balance, qty: f64) {
    balance.frozen -= qty;
    balance.quantity -= qty;
    balance.burned += qty;
    balance.timestamps.touch(Utc::now());
}

pub fn check_available_qty(balance: &Balance, qty: f64) -> bool {
    balance.available >= qty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bal(qty: f64) -> Balance {
        create_by_qty(Uuid::new_v4(), Asset::Usd, qty)
    }

    #[test]
    fn lock_then_unlock_restores_available() {
        let mut b = bal(2000.0);
        lock_balance(&mut b, 500.0);
        assert_eq!(b.available, 1500.0);
        assert_eq!(b.frozen, 500.0);
        unlock_balance(&mut b, 500.0);
        assert_eq!(b.available, 2000.0);
        assert_eq!(b.frozen, 0.0);
        assert_eq!(b.quantity, 2000.0);
    }

    #[test]
    fn pay_balance_reduces_quantity_and_available() {
        let mut b = bal(2000.0);
        lock_balance(&mut b, 500.0);
        pay_balance(&mut b, 500.0);
        assert_eq!(b.quantity, 1500.0);
        assert_eq!(b.available, 1500.0);
        assert_eq!(b.frozen, 500.0);
    }

    #[test]
    fn pay_fee_tracks_fee_paid_separately() {
        let mut b = bal(2000.0);
        pay_fee(&mut b, 10.0);
        assert_eq!(b.quantity, 1990.0);
        assert_eq!(b.available, 1990.0);
        assert_eq!(b.fee_paid, 10.0);
    }

    #[test]
    fn burn_balance_reduces_quantity_and_frozen() {
        let mut b = bal(2000.0);
        lock_balance(&mut b, 400.0);
        burn_balance(&mut b, 400.0);
        assert_eq!(b.quantity, 1600.0);
        assert_eq!(b.frozen, 0.0);
        assert_eq!(b.burned, 400.0);
    }

    #[test]
    fn quantity_always_equals_available_plus_frozen() {
        let mut b = bal(2000.0);
        lock_balance(&mut b, 300.0);
        add_balance(&mut b, 100.0);
        assert_eq!(b.quantity, b.available + b.frozen);
    }

    #[test]
    fn balance_walkthrough_from_2000_usd_matches_expected_running_totals() {
        // Starting balance USD 2000, walked through a lock/unlock/deposit/
        // burn sequence, checking the running total after each step.
        let mut usd = bal(2000.0);

        lock_balance(&mut usd, 300.0);
        assert_eq!(usd.available, 1700.0);

        unlock_balance(&mut usd, 150.0);
        assert_eq!(usd.available, 1850.0);

        add_balance(&mut usd, 25.0);
        assert_eq!(usd.quantity, 2025.0);

        lock_balance(&mut usd, 250.0);
        burn_balance(&mut usd, 250.0);
        assert_eq!(usd.burned, 250.0);
    }

    #[test]
    fn check_available_qty_is_a_pure_read() {
        let b = bal(2000.0);
        assert!(check_available_qty(&b, 2000.0));
        assert!(!check_available_qty(&b, 2000.1));
    }
}
