//! Tiered daily commission.
//!
//! This is the only place commission is computed; performance entry and the
//! salary formula both call [`daily_commission`].

use rust_decimal::Decimal;

use crate::models::DailyPerformance;

/// Orders paid at the first tier rate.
pub const TIER_1_MAX_ORDERS: i64 = 3;

/// Orders up to which the second tier rate applies.
pub const TIER_2_MAX_ORDERS: i64 = 5;

const TIER_1_RATE: i64 = 10;
const TIER_2_RATE: i64 = 20;
const TIER_3_RATE: i64 = 30;

/// Computes the commission for one day's orders.
///
/// | Orders | Commission |
/// |---|---|
/// | ≤ 0 | 0 |
/// | 1–3 | orders × 10 |
/// | 4–5 | 30 + (orders − 3) × 20 |
/// | ≥ 6 | 70 + (orders − 5) × 30 |
///
/// # Example
///
/// ```
/// use callcenter_engine::calculation::daily_commission;
/// use rust_decimal::Decimal;
///
/// assert_eq!(daily_commission(0), Decimal::ZERO);
/// assert_eq!(daily_commission(3), Decimal::from(30));
/// assert_eq!(daily_commission(5), Decimal::from(70));
/// assert_eq!(daily_commission(6), Decimal::from(100));
/// assert_eq!(daily_commission(10), Decimal::from(220));
/// ```
pub fn daily_commission(orders: i64) -> Decimal {
    let tier_1_full = TIER_1_MAX_ORDERS * TIER_1_RATE;
    let tier_2_full = (TIER_2_MAX_ORDERS - TIER_1_MAX_ORDERS) * TIER_2_RATE;

    let amount = match orders {
        n if n <= 0 => 0,
        n if n <= TIER_1_MAX_ORDERS => n * TIER_1_RATE,
        n if n <= TIER_2_MAX_ORDERS => tier_1_full + (n - TIER_1_MAX_ORDERS) * TIER_2_RATE,
        n => tier_1_full + tier_2_full + n.saturating_sub(TIER_2_MAX_ORDERS).saturating_mul(TIER_3_RATE),
    };
    Decimal::from(amount)
}

/// A human-readable explanation of [`daily_commission`].
pub fn commission_breakdown(orders: i64) -> String {
    let total = daily_commission(orders);
    match orders {
        n if n <= 0 => "0单，提成0元".to_string(),
        n if n <= TIER_1_MAX_ORDERS => format!("{}单 × 10元/单 = {}元", n, total),
        n if n <= TIER_2_MAX_ORDERS => format!(
            "前3单(30元) + 第4-{}单({}×20元) = {}元",
            n,
            n - TIER_1_MAX_ORDERS,
            total
        ),
        n => format!(
            "前3单(30元) + 第4-5单(40元) + 第6-{}单({}×30元) = {}元",
            n,
            n - TIER_2_MAX_ORDERS,
            total
        ),
    }
}

/// Sums the commission of several days, recomputed from their order counts.
pub fn total_commission<'a>(records: impl IntoIterator<Item = &'a DailyPerformance>) -> Decimal {
    records
        .into_iter()
        .map(|record| daily_commission(i64::from(record.orders_count)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_negative_orders_pay_nothing() {
        assert_eq!(daily_commission(-4), Decimal::ZERO);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(daily_commission(1), Decimal::from(10));
        assert_eq!(daily_commission(4), Decimal::from(50));
        assert_eq!(daily_commission(7), Decimal::from(130));
    }

    #[test]
    fn test_breakdown_text() {
        assert_eq!(commission_breakdown(0), "0单，提成0元");
        assert_eq!(commission_breakdown(2), "2单 × 10元/单 = 20元");
        assert_eq!(
            commission_breakdown(5),
            "前3单(30元) + 第4-5单(2×20元) = 70元"
        );
        assert_eq!(
            commission_breakdown(10),
            "前3单(30元) + 第4-5单(40元) + 第6-10单(5×30元) = 220元"
        );
    }

    #[test]
    fn test_total_commission_sums_days() {
        let day = |d: u32, orders: u32| DailyPerformance {
            employee_id: 1,
            work_date: NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
            orders_count: orders,
            commission: Decimal::ZERO,
            is_valid_workday: true,
        };
        let records = vec![day(1, 3), day(2, 6), day(3, 0)];
        assert_eq!(total_commission(&records), Decimal::from(130));
    }
}
