//! Tiered price recommendation tables.
//!
//! All tiers and unit prices are data supplied by the operating instance's
//! configuration; the functions here only walk them. Deliberately pure: no
//! async, no IO.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Bracket;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("rating {rating} outside the valid range 0..={max}")]
    RatingOutOfRange { rating: i64, max: i64 },

    #[error("start rating {start} must be below end rating {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("malformed pricing table: {0}")]
    MalformedTable(String),
}

/// A value configured separately per bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerBracket<T> {
    #[serde(rename = "2v2")]
    pub twos: T,
    #[serde(rename = "3v3")]
    pub threes: T,
}

impl<T> PerBracket<T> {
    pub fn get(&self, bracket: Bracket) -> &T {
        match bracket {
            Bracket::TwoVsTwo => &self.twos,
            Bracket::ThreeVsThree => &self.threes,
        }
    }
}

/// Instance-scoped pricing data.
///
/// `set_rating_boundaries` is a monotonic ladder of rating breakpoints; the
/// interval between two adjacent boundaries is priced per rating point by
/// the matching entry of `set_rating_unit_prices` (one fewer entry than
/// boundaries). `one_win_boundaries`/`one_win_prices` follow the same shape
/// with flat per-tier prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PricingTable {
    pub set_rating_boundaries: Vec<i64>,
    pub set_rating_unit_prices: PerBracket<Vec<i64>>,
    pub one_win_boundaries: Vec<i64>,
    pub one_win_prices: PerBracket<Vec<i64>>,
    pub hourly_rates: PerBracket<i64>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            set_rating_boundaries: vec![
                0, 1500, 1600, 1700, 1800, 1900, 2000, 2100, 2200, 2300, 2401,
            ],
            set_rating_unit_prices: PerBracket {
                twos: vec![650, 1700, 2100, 2550, 3400, 3800, 4250, 5100, 5950, 6800],
                threes: vec![
                    1300, 3400, 4250, 5100, 6800, 7650, 8500, 10200, 11900, 13600,
                ],
            },
            one_win_boundaries: vec![0, 1800, 2100, 2400, 3501],
            one_win_prices: PerBracket {
                twos: vec![50_000, 65_000, 80_000, 100_000],
                threes: vec![100_000, 130_000, 160_000, 200_000],
            },
            hourly_rates: PerBracket {
                twos: 325_000,
                threes: 650_000,
            },
        }
    }
}

/// Index of the tier a rating falls into: number of boundaries at or below
/// the value (a right bisect).
fn bisect_right(boundaries: &[i64], value: i64) -> usize {
    boundaries.partition_point(|&b| b <= value)
}

impl PricingTable {
    /// Highest rating a set-rating boost may target.
    pub fn max_set_rating(&self) -> i64 {
        self.set_rating_boundaries.last().map(|b| b - 1).unwrap_or(0)
    }

    /// Highest rating a single-value (1 win / hourly / glad) entry may use.
    pub fn max_single_rating(&self) -> i64 {
        self.one_win_boundaries.last().map(|b| b - 1).unwrap_or(0)
    }

    /// Structural sanity, run once at configuration load so the walk
    /// functions can index freely.
    pub fn validate(&self) -> Result<(), PricingError> {
        let check_ladder = |name: &str, bounds: &[i64]| {
            if bounds.len() < 2 || bounds[0] != 0 {
                return Err(PricingError::MalformedTable(format!(
                    "{name} must start at 0 and have at least two entries"
                )));
            }
            if !bounds.windows(2).all(|w| w[0] < w[1]) {
                return Err(PricingError::MalformedTable(format!(
                    "{name} must be strictly increasing"
                )));
            }
            Ok(())
        };

        check_ladder("set_rating_boundaries", &self.set_rating_boundaries)?;
        check_ladder("one_win_boundaries", &self.one_win_boundaries)?;

        for bracket in Bracket::ALL {
            if self.set_rating_unit_prices.get(bracket).len() + 1
                != self.set_rating_boundaries.len()
            {
                return Err(PricingError::MalformedTable(format!(
                    "set rating unit prices for {bracket} must have one entry per interval"
                )));
            }
            if self.one_win_prices.get(bracket).len() + 1 != self.one_win_boundaries.len() {
                return Err(PricingError::MalformedTable(format!(
                    "one win prices for {bracket} must have one entry per tier"
                )));
            }
        }

        Ok(())
    }

    /// Price of climbing from `start_rating` to `end_rating`: for every
    /// boundary interval spanned, the rating points inside it are charged at
    /// that interval's unit price, plus the final partial interval.
    pub fn set_rating_price(
        &self,
        bracket: Bracket,
        start_rating: i64,
        end_rating: i64,
    ) -> Result<i64, PricingError> {
        let max = self.max_set_rating();
        for rating in [start_rating, end_rating] {
            if !(0..=max).contains(&rating) {
                return Err(PricingError::RatingOutOfRange { rating, max });
            }
        }
        if start_rating >= end_rating {
            return Err(PricingError::InvalidRange {
                start: start_rating,
                end: end_rating,
            });
        }

        let bounds = &self.set_rating_boundaries;
        let unit_prices = self.set_rating_unit_prices.get(bracket);

        let mut price = 0;
        let mut current = start_rating;

        // Jump interval by interval until current sits in the same tier as
        // the end rating, then charge the remaining partial interval.
        while bisect_right(bounds, current) < bisect_right(bounds, end_rating) {
            let tier = bisect_right(bounds, current);
            let next = bounds[tier];
            price += (next - current) * unit_prices[tier - 1];
            current = next;
        }
        price += (end_rating - current) * unit_prices[bisect_right(bounds, current) - 1];

        Ok(price)
    }

    /// Flat per-win price for the tier `current_rating` falls into, clamped
    /// to the top configured tier.
    pub fn one_win_price(&self, bracket: Bracket, current_rating: i64) -> Result<i64, PricingError> {
        if current_rating < 0 {
            return Err(PricingError::RatingOutOfRange {
                rating: current_rating,
                max: self.max_single_rating(),
            });
        }

        let top = self
            .one_win_boundaries
            .last()
            .copied()
            .ok_or_else(|| PricingError::MalformedTable("empty one win boundaries".into()))?;
        let prices = self.one_win_prices.get(bracket);

        let clamped = current_rating.min(top);
        let tier = bisect_right(&self.one_win_boundaries, clamped)
            .saturating_sub(1)
            .min(prices.len().saturating_sub(1));

        Ok(prices[tier])
    }

    pub fn hourly_price(&self, bracket: Bracket) -> i64 {
        *self.hourly_rates.get(bracket)
    }
}
