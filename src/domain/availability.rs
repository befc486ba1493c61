use crate::domain::money::ServiceFee;
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How two date ranges that merely touch at a boundary are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// A stay ending on the day another begins conflicts with it.
    #[default]
    Inclusive,
    /// The checkout instant is free for the next check-in.
    HalfOpen,
}

impl std::str::FromStr for BoundaryPolicy {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(Self::Inclusive),
            "half-open" | "half_open" | "halfopen" => Ok(Self::HalfOpen),
            other => Err(BookingError::Config(format!(
                "unknown booking boundary policy '{other}'"
            ))),
        }
    }
}

/// A check-in/check-out pair. Construction guarantees `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(BookingError::InvalidDateRange)
        }
    }

    /// True when `other` lies entirely inside this range, boundaries included.
    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn overlaps(&self, other: &DateRange, policy: BoundaryPolicy) -> bool {
        match policy {
            BoundaryPolicy::Inclusive => other.start <= self.end && other.end >= self.start,
            BoundaryPolicy::HalfOpen => other.start < self.end && other.end > self.start,
        }
    }

    pub fn nights(&self) -> u32 {
        let millis = (self.end - self.start).num_milliseconds();
        let nights = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
        u32::try_from(nights).unwrap_or(u32::MAX)
    }
}

/// A priced, bookable window on an apartment listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub price_per_night: Decimal,
    pub is_blocked: bool,
}

impl AvailabilityWindow {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn covers(&self, range: &DateRange) -> bool {
        self.range().contains(range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub service_fee: Decimal,
    pub total_price: Decimal,
}

/// Returns the unblocked window that fully contains `range`.
pub fn find_availability<'a>(
    windows: &'a [AvailabilityWindow],
    range: &DateRange,
) -> Result<&'a AvailabilityWindow> {
    windows
        .iter()
        .find(|w| !w.is_blocked && w.covers(range))
        .ok_or(BookingError::DatesUnavailable)
}

/// Whole nights between check-in and check-out, rounding partial days up.
pub fn compute_nights(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Result<u32> {
    Ok(DateRange::new(check_in, check_out)?.nights())
}

pub fn compute_price(
    window: &AvailabilityWindow,
    nights: u32,
    service_fee: Decimal,
) -> Result<PriceBreakdown> {
    let fee = ServiceFee::new(service_fee)?;
    let base_price = window
        .price_per_night
        .checked_mul(Decimal::from(nights))
        .ok_or_else(|| BookingError::InvalidAmount("nightly total is out of range".to_string()))?;
    let total_price = base_price
        .checked_add(fee.value())
        .ok_or(BookingError::InvalidServiceFee)?;
    Ok(PriceBreakdown {
        base_price,
        service_fee: fee.value(),
        total_price,
    })
}

pub fn has_overlap<'a, I>(existing: I, candidate: &DateRange, policy: BoundaryPolicy) -> bool
where
    I: IntoIterator<Item = &'a DateRange>,
{
    existing
        .into_iter()
        .any(|range| range.overlaps(candidate, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>, blocked: bool) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            start_date: start,
            end_date: end,
            price_per_night: dec!(100),
            is_blocked: blocked,
        }
    }

    #[test]
    fn test_compute_nights_whole_days() {
        assert_eq!(compute_nights(at(2024, 4, 1, 0), at(2024, 4, 4, 0)).unwrap(), 3);
    }

    #[test]
    fn test_compute_nights_rounds_partial_day_up() {
        assert_eq!(compute_nights(at(2024, 4, 1, 0), at(2024, 4, 1, 12)).unwrap(), 1);
    }

    #[test]
    fn test_compute_nights_rejects_empty_and_reversed_ranges() {
        assert!(matches!(
            compute_nights(at(2024, 4, 1, 0), at(2024, 4, 1, 0)),
            Err(BookingError::InvalidDateRange)
        ));
        assert!(matches!(
            compute_nights(at(2024, 4, 4, 0), at(2024, 4, 1, 0)),
            Err(BookingError::InvalidDateRange)
        ));
    }

    #[test]
    fn test_compute_price() {
        let w = window(at(2024, 4, 1, 0), at(2024, 4, 30, 0), false);
        let price = compute_price(&w, 3, dec!(20)).unwrap();
        assert_eq!(price.base_price, dec!(300));
        assert_eq!(price.service_fee, dec!(20));
        assert_eq!(price.total_price, dec!(320));
    }

    #[test]
    fn test_compute_price_rejects_non_positive_fee() {
        let w = window(at(2024, 4, 1, 0), at(2024, 4, 30, 0), false);
        assert!(matches!(
            compute_price(&w, 3, dec!(0)),
            Err(BookingError::InvalidServiceFee)
        ));
        assert!(matches!(
            compute_price(&w, 3, dec!(-5)),
            Err(BookingError::InvalidServiceFee)
        ));
    }

    #[test]
    fn test_compute_price_rejects_overflowing_fee() {
        let w = window(at(2024, 4, 1, 0), at(2024, 4, 30, 0), false);
        assert!(matches!(
            compute_price(&w, 3, Decimal::MAX),
            Err(BookingError::InvalidServiceFee)
        ));

        let mut pricey = w.clone();
        pricey.price_per_night = Decimal::MAX;
        assert!(matches!(
            compute_price(&pricey, 3, dec!(20)),
            Err(BookingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_find_availability_skips_blocked_and_partial_windows() {
        let blocked = window(at(2024, 4, 1, 0), at(2024, 4, 30, 0), true);
        let partial = window(at(2024, 4, 5, 0), at(2024, 4, 30, 0), false);
        let open = window(at(2024, 3, 25, 0), at(2024, 4, 10, 0), false);
        let windows = vec![blocked, partial, open.clone()];
        let range = DateRange::new(at(2024, 4, 1, 0), at(2024, 4, 4, 0)).unwrap();

        let found = find_availability(&windows, &range).unwrap();
        assert_eq!(found.id, open.id);

        let outside = DateRange::new(at(2024, 5, 1, 0), at(2024, 5, 4, 0)).unwrap();
        assert!(matches!(
            find_availability(&windows, &outside),
            Err(BookingError::DatesUnavailable)
        ));
    }

    #[test]
    fn test_overlap_boundary_policies() {
        let first = DateRange::new(at(2024, 4, 1, 0), at(2024, 4, 4, 0)).unwrap();
        let touching = DateRange::new(at(2024, 4, 4, 0), at(2024, 4, 6, 0)).unwrap();
        let inside = DateRange::new(at(2024, 4, 2, 0), at(2024, 4, 3, 0)).unwrap();
        let later = DateRange::new(at(2024, 4, 5, 0), at(2024, 4, 6, 0)).unwrap();

        assert!(has_overlap([&first], &touching, BoundaryPolicy::Inclusive));
        assert!(!has_overlap([&first], &touching, BoundaryPolicy::HalfOpen));
        assert!(has_overlap([&first], &inside, BoundaryPolicy::HalfOpen));
        assert!(!has_overlap([&first], &later, BoundaryPolicy::Inclusive));
    }

    #[test]
    fn test_boundary_policy_parsing() {
        assert_eq!(
            "half-open".parse::<BoundaryPolicy>().unwrap(),
            BoundaryPolicy::HalfOpen
        );
        assert!("sideways".parse::<BoundaryPolicy>().is_err());
    }
}
