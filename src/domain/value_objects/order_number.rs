//! Order number value object and its generator.
//!
//! An order number is the human-facing reference a customer quotes to support.
//! It is derived from the creation instant in the store's business timezone and
//! carries the fixed tag `21` at the end. Uniqueness is enforced by storage, not
//! here; see [`crate::application::OrderService`] for the retry protocol.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::{EcommerceError, Result};

/// The retailer's local time. Not the server's, not the customer's.
pub const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

/// Format marker appended to every number.
pub const ORDER_NUMBER_TAG: &str = "21";

/// Range of the tiebreaker appended after a uniqueness conflict.
pub const CONFLICT_SUFFIX_RANGE: Range<u16> = 0..1000;

/// Human-shareable order reference. Digits only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EcommerceError::InvalidOrderNumber(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Candidate with a numeric tiebreaker appended, unpadded.
    pub fn with_suffix(&self, suffix: u16) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for OrderNumber {
    type Err = EcommerceError;
    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for OrderNumber {
    type Error = EcommerceError;
    fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self { value.0 }
}

/// Layout of the timestamp digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderNumberFormat {
    /// `D M YY h m s SSS 21`, only the milliseconds padded. Matches numbers
    /// already issued by the storefront; variable length, not sortable.
    #[default]
    Legacy,
    /// `YYMMDDhhmmssSSS21`, every field padded. Fixed 17 digits.
    Sortable,
}

impl FromStr for OrderNumberFormat {
    type Err = EcommerceError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "sortable" => Ok(Self::Sortable),
            other => Err(EcommerceError::Configuration(format!("unknown order number format `{other}`"))),
        }
    }
}

/// Stateless formatter bound to a resolved timezone.
#[derive(Clone, Copy, Debug)]
pub struct OrderNumberGenerator {
    timezone: Tz,
    format: OrderNumberFormat,
}

impl OrderNumberGenerator {
    pub fn new(timezone: &str, format: OrderNumberFormat) -> Result<Self> {
        let timezone = Tz::from_str(timezone)
            .map_err(|e| EcommerceError::Configuration(format!("timezone `{timezone}` unavailable: {e}")))?;
        Ok(Self { timezone, format })
    }

    pub fn timezone(&self) -> Tz { self.timezone }
    pub fn format(&self) -> OrderNumberFormat { self.format }

    pub fn generate(&self, now: DateTime<Utc>) -> OrderNumber {
        let local = now.with_timezone(&self.timezone);
        // chrono encodes a leap second as nanos >= 1e9
        let millis = (local.nanosecond() / 1_000_000).min(999);
        let year = local.year().rem_euclid(100);
        let digits = match self.format {
            OrderNumberFormat::Legacy => format!(
                "{}{}{}{}{}{}{:03}{}",
                local.day(), local.month(), year, local.hour(), local.minute(), local.second(), millis, ORDER_NUMBER_TAG
            ),
            OrderNumberFormat::Sortable => format!(
                "{:02}{:02}{:02}{:02}{:02}{:02}{:03}{}",
                year, local.month(), local.day(), local.hour(), local.minute(), local.second(), millis, ORDER_NUMBER_TAG
            ),
        };
        OrderNumber(digits)
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self { timezone: chrono_tz::Asia::Ho_Chi_Minh, format: OrderNumberFormat::Legacy }
    }
}

/// Legacy-format number for `now` in `timezone`.
pub fn generate(now: DateTime<Utc>, timezone: &str) -> Result<OrderNumber> {
    Ok(OrderNumberGenerator::new(timezone, OrderNumberFormat::Legacy)?.generate(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> { s.parse().unwrap() }

    #[test]
    fn test_legacy_literal_first_of_september() {
        // 2025-09-01 13:50:21.000 in Ho Chi Minh City
        let n = generate(utc("2025-09-01T06:50:21Z"), DEFAULT_TIMEZONE).unwrap();
        assert_eq!(n.as_str(), "192513502100021");
    }

    #[test]
    fn test_legacy_literal_ninth_of_january() {
        // 2025-01-09 13:50:21.000 local: 9‖1‖25‖13‖50‖21‖000‖21
        let n = generate(utc("2025-01-09T06:50:21Z"), DEFAULT_TIMEZONE).unwrap();
        assert_eq!(n.as_str(), "912513502100021");
    }

    #[test]
    fn test_local_date_rolls_over_before_utc() {
        // 23:30 UTC on Dec 31 is already Jan 1, 06:30 in Vietnam
        let n = generate(utc("2024-12-31T23:30:00.007Z"), DEFAULT_TIMEZONE).unwrap();
        assert_eq!(n.as_str(), "1125630000721");
    }

    #[test]
    fn test_milliseconds_zero_padded_and_tagged() {
        let n = generate(utc("2025-03-15T02:04:05.042Z"), DEFAULT_TIMEZONE).unwrap();
        assert!(n.as_str().ends_with("04221"));
        assert!(n.as_str().bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_deterministic() {
        let g = OrderNumberGenerator::default();
        let t = utc("2025-06-30T17:59:59.999Z");
        assert_eq!(g.generate(t), g.generate(t));
    }

    #[test]
    fn test_distinct_across_milliseconds() {
        let g = OrderNumberGenerator::default();
        let t = utc("2025-06-30T10:00:00.000Z");
        let numbers: Vec<_> = (0..2000).map(|i| g.generate(t + Duration::milliseconds(i))).collect();
        let unique: std::collections::HashSet<_> = numbers.iter().collect();
        assert_eq!(unique.len(), numbers.len());
    }

    #[test]
    fn test_sortable_is_fixed_width() {
        let g = OrderNumberGenerator::new(DEFAULT_TIMEZONE, OrderNumberFormat::Sortable).unwrap();
        let n = g.generate(utc("2025-09-01T06:50:21Z"));
        assert_eq!(n.as_str(), "25090113502100021");
        let earlier = g.generate(utc("2025-01-09T06:50:21.5Z"));
        assert_eq!(earlier.as_str().len(), 17);
        assert!(earlier.as_str() < n.as_str());
    }

    #[test]
    fn test_unknown_timezone_is_configuration_error() {
        let err = generate(Utc::now(), "Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, EcommerceError::Configuration(_)));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(OrderNumber::parse("ORD-123").is_err());
        assert!(OrderNumber::parse("").is_err());
        assert_eq!(OrderNumber::parse(" 12321 ").unwrap().as_str(), "12321");
    }

    #[test]
    fn test_with_suffix_appends_unpadded() {
        let n = OrderNumber::parse("912513502100021").unwrap();
        assert_eq!(n.with_suffix(7).as_str(), "9125135021000217");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("Sortable".parse::<OrderNumberFormat>().unwrap(), OrderNumberFormat::Sortable);
        assert!("iso".parse::<OrderNumberFormat>().is_err());
    }
}
