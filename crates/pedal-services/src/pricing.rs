//! Duration and rental price calculation
//!
//! Pure functions. Durations are counted in whole minutes (partial minutes
//! are dropped) and priced in tiers:
//!
//! - up to 70 minutes: one hourly rate (10 minute grace on the first hour)
//! - up to 120 minutes: 1.5 hourly rates
//! - beyond: one rate per full hour plus a remainder surcharge; a remainder
//!   that still fits the 10 minute grace costs half a rate, anything longer a
//!   full rate
//!
//! The total is rounded half-up to a whole currency unit.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::constants::{GRACE_MINUTES, MINIMUM_CHARGE_MINUTES, TWO_HOUR_TIER_MINUTES};

const HALF: Decimal = dec!(0.5);
const ONE_AND_HALF: Decimal = dec!(1.5);

/// Length of a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalDuration {
    pub hours: i64,
    pub minutes: i64,
    pub total_minutes: i64,
}

impl RentalDuration {
    pub fn from_minutes(total_minutes: i64) -> Self {
        let total_minutes = total_minutes.max(0);
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
            total_minutes,
        }
    }

    /// Human readable form, e.g. "2 hours 1 minute"
    pub fn formatted(&self) -> String {
        fn unit(n: i64, singular: &str) -> String {
            if n == 1 {
                format!("1 {singular}")
            } else {
                format!("{n} {singular}s")
            }
        }

        match (self.hours, self.minutes) {
            (0, 0) => "0 minutes".to_string(),
            (0, m) => unit(m, "minute"),
            (h, 0) => unit(h, "hour"),
            (h, m) => format!("{} {}", unit(h, "hour"), unit(m, "minute")),
        }
    }
}

/// One priced component of a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub description: String,
    pub amount: Decimal,
}

impl LineItem {
    fn new(description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            description: description.into(),
            amount,
        }
    }
}

/// Price and duration of a rental interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalQuote {
    pub price: Decimal,
    pub duration: RentalDuration,
    pub formatted_duration: String,
    pub breakdown: Vec<LineItem>,
}

impl RentalQuote {
    /// Quote for invalid or empty input
    pub fn zero() -> Self {
        let duration = RentalDuration::default();
        Self {
            price: Decimal::ZERO,
            formatted_duration: duration.formatted(),
            duration,
            breakdown: Vec::new(),
        }
    }
}

/// Whole minutes between `start` and `end`; zero when `end <= start`
pub fn compute_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> RentalDuration {
    if end <= start {
        return RentalDuration::default();
    }
    RentalDuration::from_minutes((end - start).num_minutes())
}

/// Tier components before rounding
fn tier_items(total_minutes: i64, rate: Decimal) -> Vec<LineItem> {
    if total_minutes <= MINIMUM_CHARGE_MINUTES {
        return vec![LineItem::new(
            format!("Minimum charge (up to {MINIMUM_CHARGE_MINUTES} minutes)"),
            rate,
        )];
    }

    if total_minutes <= TWO_HOUR_TIER_MINUTES {
        return vec![LineItem::new(
            format!("Up to {TWO_HOUR_TIER_MINUTES} minutes (1.5 x hourly rate)"),
            rate * ONE_AND_HALF,
        )];
    }

    let full_hours = total_minutes / 60;
    let remainder = total_minutes % 60;

    let mut items = vec![LineItem::new(
        format!("{full_hours} full hours"),
        rate * Decimal::from(full_hours),
    )];

    if remainder > 0 {
        if remainder <= GRACE_MINUTES {
            items.push(LineItem::new(
                format!("{remainder} extra minutes within grace (0.5 x hourly rate)"),
                rate * HALF,
            ));
        } else {
            items.push(LineItem::new(
                format!("{remainder} extra minutes (1 x hourly rate)"),
                rate,
            ));
        }
    }

    items
}

fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Price a rental of `[start, end)` at `hourly_rate`
///
/// Returns [`RentalQuote::zero`] when the interval is empty or inverted or the
/// rate is not positive. Any other interval, even one under a minute, pays at
/// least the minimum charge.
pub fn compute_rental_price(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hourly_rate: Decimal,
) -> RentalQuote {
    if end <= start || hourly_rate <= Decimal::ZERO {
        return RentalQuote::zero();
    }

    let duration = compute_duration(start, end);

    let mut breakdown = tier_items(duration.total_minutes, hourly_rate);
    let exact: Decimal = breakdown.iter().map(|item| item.amount).sum();
    let price = round_price(exact);

    if price != exact {
        breakdown.push(LineItem::new("Rounding adjustment", price - exact));
    }

    RentalQuote {
        price,
        formatted_duration: duration.formatted(),
        duration,
        breakdown,
    }
}

/// Line items of [`compute_rental_price`]; they always sum to the price
pub fn price_breakdown(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hourly_rate: Decimal,
) -> Vec<LineItem> {
    compute_rental_price(start, end, hourly_rate).breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn price_for(minutes: i64, rate: Decimal) -> Decimal {
        compute_rental_price(start(), start() + Duration::minutes(minutes), rate).price
    }

    #[test]
    fn test_reference_prices_at_rate_100() {
        let cases = [
            (70, dec!(100)),
            (71, dec!(150)),
            (120, dec!(150)),
            (121, dec!(250)),
            (130, dec!(250)),
            (190, dec!(350)),
            (191, dec!(400)),
        ];

        for (minutes, expected) in cases {
            assert_eq!(price_for(minutes, dec!(100)), expected, "{minutes} minutes");
        }
    }

    #[test]
    fn test_sub_minute_rental_pays_minimum() {
        let quote = compute_rental_price(start(), start() + Duration::seconds(30), dec!(100));
        assert_eq!(quote.duration.total_minutes, 0);
        assert_eq!(quote.price, dec!(100));
        assert_eq!(quote.formatted_duration, "0 minutes");
        assert_eq!(quote.breakdown.len(), 1);
        assert_eq!(quote.breakdown[0].amount, dec!(100));
    }

    #[test]
    fn test_short_rental_pays_minimum() {
        assert_eq!(price_for(1, dec!(50)), dec!(50));
        assert_eq!(price_for(45, dec!(50)), dec!(50));
    }

    #[test]
    fn test_full_hours_without_remainder() {
        assert_eq!(price_for(180, dec!(100)), dec!(300));
        assert_eq!(price_for(240, dec!(40)), dec!(160));
    }

    #[test]
    fn test_partial_minutes_are_truncated() {
        let end = start() + Duration::minutes(70) + Duration::seconds(59);
        let quote = compute_rental_price(start(), end, dec!(100));
        assert_eq!(quote.duration.total_minutes, 70);
        assert_eq!(quote.price, dec!(100));
    }

    #[test]
    fn test_invalid_input_yields_zero_result() {
        assert_eq!(
            compute_rental_price(start(), start(), dec!(100)),
            RentalQuote::zero()
        );
        assert_eq!(
            compute_rental_price(start(), start() - Duration::hours(1), dec!(100)),
            RentalQuote::zero()
        );
        assert_eq!(
            compute_rental_price(start(), start() + Duration::hours(1), dec!(0)),
            RentalQuote::zero()
        );
        assert_eq!(
            compute_rental_price(start(), start() + Duration::hours(1), dec!(-5)),
            RentalQuote::zero()
        );
    }

    #[test]
    fn test_half_up_rounding_with_adjustment_line() {
        // 1.5 x 33 = 49.5 rounds up to 50
        let quote = compute_rental_price(start(), start() + Duration::minutes(90), dec!(33));
        assert_eq!(quote.price, dec!(50));

        let last = quote.breakdown.last().unwrap();
        assert_eq!(last.description, "Rounding adjustment");
        assert_eq!(last.amount, dec!(0.5));
    }

    #[test]
    fn test_breakdown_sums_to_price() {
        for minutes in [1, 69, 70, 71, 95, 120, 121, 130, 131, 179, 180, 190, 191, 605] {
            for rate in [dec!(33), dec!(49.99), dec!(100), dec!(12.5)] {
                let quote =
                    compute_rental_price(start(), start() + Duration::minutes(minutes), rate);
                let sum: Decimal = quote.breakdown.iter().map(|i| i.amount).sum();
                assert_eq!(sum, quote.price, "{minutes} minutes at {rate}");
            }
        }
    }

    #[test]
    fn test_breakdown_describes_tier() {
        let items = price_breakdown(start(), start() + Duration::minutes(191), dec!(100));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].amount, dec!(300));
        assert_eq!(items[1].amount, dec!(100));

        let items = price_breakdown(start(), start() + Duration::minutes(130), dec!(100));
        assert_eq!(items[1].amount, dec!(50));
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(RentalDuration::from_minutes(0).formatted(), "0 minutes");
        assert_eq!(RentalDuration::from_minutes(1).formatted(), "1 minute");
        assert_eq!(RentalDuration::from_minutes(45).formatted(), "45 minutes");
        assert_eq!(RentalDuration::from_minutes(60).formatted(), "1 hour");
        assert_eq!(RentalDuration::from_minutes(61).formatted(), "1 hour 1 minute");
        assert_eq!(RentalDuration::from_minutes(121).formatted(), "2 hours 1 minute");
        assert_eq!(RentalDuration::from_minutes(150).formatted(), "2 hours 30 minutes");
    }

    #[test]
    fn test_compute_duration_components() {
        let d = compute_duration(start(), start() + Duration::minutes(135));
        assert_eq!(
            d,
            RentalDuration {
                hours: 2,
                minutes: 15,
                total_minutes: 135
            }
        );
    }
}
