use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Price breakdown for switching plans mid-period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProrationQuote {
    pub current_price: Decimal,
    pub new_price: Decimal,
    /// Share of the current period not yet used, rounded to 4 places
    pub fraction_remaining: Decimal,
    pub credit: Decimal,
    pub amount_due: Decimal,
    /// Credit left over on a downgrade. Reported only, never paid out.
    pub unused_credit: Decimal,
}

pub fn quote(
    current_price: Decimal,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    new_price: Decimal,
    now: DateTime<Utc>,
) -> ProrationQuote {
    let fraction = fraction_remaining(period_start, period_end, now);
    let credit = money(current_price * fraction);
    let new_price = money(new_price);

    ProrationQuote {
        current_price: money(current_price),
        new_price,
        fraction_remaining: fraction.round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven),
        credit,
        amount_due: (new_price - credit).max(Decimal::ZERO),
        unused_credit: (credit - new_price).max(Decimal::ZERO),
    }
}

fn fraction_remaining(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    let total = (end - start).num_seconds();
    if total <= 0 {
        return Decimal::ZERO;
    }
    let left = (end - now).num_seconds().clamp(0, total);

    Decimal::from(left) / Decimal::from(total)
}

fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
