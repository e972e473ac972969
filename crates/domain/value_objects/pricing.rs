use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::stay_ranges::StayRange;

pub const SERVICE_FEE_PERCENT: i64 = 10;
pub const TAX_PERCENT: i64 = 12;
pub const PLATFORM_COMMISSION_PERCENT: i64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("nightly rate and cleaning fee must not be negative")]
    NegativeRate,
    #[error("booking amount is too large")]
    Overflow,
}

/// Price snapshot taken when a booking is created. All amounts are in minor currency units
/// (cents), so every derived value is rounded to two decimals by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub nights: i64,
    pub nightly_rate_minor: i64,
    pub subtotal_minor: i64,
    pub cleaning_fee_minor: i64,
    pub service_fee_minor: i64,
    pub tax_minor: i64,
    pub total_price_minor: i64,
    pub platform_commission_minor: i64,
    pub host_earnings_minor: i64,
}

pub fn price_stay(
    stay: &StayRange,
    nightly_rate_minor: i64,
    cleaning_fee_minor: i64,
) -> Result<PriceBreakdown, PricingError> {
    if nightly_rate_minor < 0 || cleaning_fee_minor < 0 {
        return Err(PricingError::NegativeRate);
    }

    let nights = stay.nights();
    let subtotal_minor = nights
        .checked_mul(nightly_rate_minor)
        .ok_or(PricingError::Overflow)?;
    let service_fee_minor = percent_half_up(subtotal_minor, SERVICE_FEE_PERCENT)?;
    let taxable_minor = subtotal_minor
        .checked_add(service_fee_minor)
        .ok_or(PricingError::Overflow)?;
    let tax_minor = percent_half_up(taxable_minor, TAX_PERCENT)?;
    let total_price_minor = [cleaning_fee_minor, service_fee_minor, tax_minor]
        .into_iter()
        .try_fold(subtotal_minor, |acc, part| acc.checked_add(part))
        .ok_or(PricingError::Overflow)?;
    let platform_commission_minor = percent_half_up(subtotal_minor, PLATFORM_COMMISSION_PERCENT)?;
    let host_earnings_minor = subtotal_minor - platform_commission_minor;

    Ok(PriceBreakdown {
        nights,
        nightly_rate_minor,
        subtotal_minor,
        cleaning_fee_minor,
        service_fee_minor,
        tax_minor,
        total_price_minor,
        platform_commission_minor,
        host_earnings_minor,
    })
}

/// `amount * percent / 100`, rounded half-up to the nearest minor unit.
pub fn percent_half_up(amount_minor: i64, percent: i64) -> Result<i64, PricingError> {
    let scaled = amount_minor
        .checked_mul(percent)
        .and_then(|v| v.checked_add(50))
        .ok_or(PricingError::Overflow)?;
    Ok(scaled.div_euclid(100))
}

/// Renders minor units as a two-decimal string, the format PayPal and Sadad expect.
pub fn format_minor(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a decimal amount such as `"389.6"` or `"389.60"` into minor units. More than two
/// fractional digits is rejected rather than rounded.
pub fn parse_minor(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty()
        || fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse::<i64>().ok()?,
    };
    let amount = whole.parse::<i64>().ok()?.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -amount } else { amount })
}
