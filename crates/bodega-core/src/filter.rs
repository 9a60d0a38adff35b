//! # Sale Filters
//!
//! Parsing of the filter set shared by the sales export and the
//! "any matching sale?" validation query.
//!
//! ```text
//! ?start_date=2024-03-01&end_date=2024-03-31&seller=4&product=abc&payment=card
//!        │                     │               │          │            │
//!        ▼                     ▼               ▼          ▼            ▼
//!   NaiveDate (strict)   NaiveDate (strict)  Some(4)    ignored    Some(Card)
//!        └────── start ≤ end, else InvalidRange ─────┘
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::PaymentMethod;
use crate::validation::{parse_date, validate_date_range, ValidationResult};

/// Filter values exactly as received from a query string or form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilterInput {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub seller_id: Option<String>,
    pub product_id: Option<String>,
    pub payment_method: Option<String>,
}

/// A validated sale filter. Every `None` means "no constraint".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub seller_id: Option<i64>,
    pub product_id: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Ids are only honoured when they are plain digits.
fn numeric_id(value: &Option<String>) -> Option<i64> {
    non_blank(value)
        .filter(|v| v.chars().all(|c| c.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}

impl SaleFilter {
    /// Validates raw filter input.
    ///
    /// ## Errors
    /// - `InvalidFormat` for a date that is not `YYYY-MM-DD`
    /// - `InvalidRange` when the start date is after the end date
    /// - `NotAllowed` for an unknown payment method
    pub fn parse(input: &SaleFilterInput) -> ValidationResult<SaleFilter> {
        let start_date = non_blank(&input.start_date)
            .map(|v| parse_date("start date", v))
            .transpose()?;
        let end_date = non_blank(&input.end_date)
            .map(|v| parse_date("end date", v))
            .transpose()?;
        validate_date_range(start_date, end_date)?;

        let payment_method = non_blank(&input.payment_method)
            .map(str::parse::<PaymentMethod>)
            .transpose()?;

        Ok(SaleFilter {
            start_date,
            end_date,
            seller_id: numeric_id(&input.seller_id),
            product_id: numeric_id(&input.product_id),
            payment_method,
        })
    }

    /// Restricts the filter to `today` when no date was given.
    pub fn default_to_today(mut self, today: NaiveDate) -> Self {
        if self.start_date.is_none() && self.end_date.is_none() {
            self.start_date = Some(today);
            self.end_date = Some(today);
        }
        self
    }

    /// Converts the local-date range into a half-open UTC interval
    /// `[from, until)` for the given local offset.
    pub fn utc_bounds(&self, offset: FixedOffset) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ValidationError> {
        let from = self
            .start_date
            .map(|d| local_midnight_utc(d, offset))
            .transpose()?;
        let until = self
            .end_date
            .map(|d| {
                d.succ_opt()
                    .ok_or_else(|| ValidationError::invalid_format("end date", "out of range"))
                    .and_then(|next| local_midnight_utc(next, offset))
            })
            .transpose()?;
        Ok((from, until))
    }
}

fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, ValidationError> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::invalid_format("date", "out of range"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn input(start: &str, end: &str) -> SaleFilterInput {
        SaleFilterInput {
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_valid_range() {
        let filter = SaleFilter::parse(&input("2024-03-01", "2024-03-31")).unwrap();
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(filter.end_date, NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn test_parse_rejects_bad_dates() {
        assert!(matches!(
            SaleFilter::parse(&input("03/01/2024", "2024-03-31")),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            SaleFilter::parse(&input("2024-04-01", "2024-03-31")),
            Err(ValidationError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_non_numeric_ids_are_ignored() {
        let filter = SaleFilter::parse(&SaleFilterInput {
            seller_id: Some("4".to_string()),
            product_id: Some("abc".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.seller_id, Some(4));
        assert_eq!(filter.product_id, None);
    }

    #[test]
    fn test_payment_method() {
        let filter = SaleFilter::parse(&SaleFilterInput {
            payment_method: Some("tarjeta".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.payment_method, Some(PaymentMethod::Card));

        assert!(SaleFilter::parse(&SaleFilterInput {
            payment_method: Some("barter".to_string()),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_blank_values_mean_no_constraint() {
        let filter = SaleFilter::parse(&input("", " ")).unwrap();
        assert_eq!(filter, SaleFilter::default());
    }

    #[test]
    fn test_default_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let filter = SaleFilter::default().default_to_today(today);
        assert_eq!(filter.start_date, Some(today));
        assert_eq!(filter.end_date, Some(today));

        let explicit = SaleFilter::parse(&input("2024-01-01", "2024-01-02"))
            .unwrap()
            .default_to_today(today);
        assert_eq!(explicit.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_utc_bounds_are_half_open_and_offset() {
        let filter = SaleFilter::parse(&input("2024-03-01", "2024-03-01")).unwrap();
        let bogota = FixedOffset::west_opt(5 * 3600).unwrap();
        let (from, until) = filter.utc_bounds(bogota).unwrap();
        assert_eq!(from.unwrap().to_rfc3339(), "2024-03-01T05:00:00+00:00");
        assert_eq!(until.unwrap().to_rfc3339(), "2024-03-02T05:00:00+00:00");
    }
}
