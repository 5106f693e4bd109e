//! Payment-method details attached to a deposit or withdrawal.
//!
//! Each variant has two views: the raw form, which only travels inside a
//! queue item on its way to the gateway, and the masked form, which is the
//! only one persisted or returned to callers.

use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::validation::{
    self, validate_alphanumeric, validate_enum, validate_len_range, validate_numeric,
    validate_required, ValidationError, ValidationResult,
};

/// Minimum number of months a card must remain valid for.
pub const MIN_CARD_VALIDITY_MONTHS: u32 = 6;

pub const BANK_CODE_TYPES: &[&str] = &["SWIFT", "IBAN", "ROUTING", "SORTCODE", "IFSC", "CLABE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(ValidationError::new(
                "method",
                format!("unsupported payment method: {}", other),
            )),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardDetails {
    pub number: String,
    pub expiry: String,
    pub cvv: String,
}

impl CreditCardDetails {
    fn validate_at(&self, today: NaiveDate) -> ValidationResult {
        validation::validate_card_number(&self.number)?;
        validate_expiry(&self.expiry, today)?;
        validation::validate_cvv(&self.cvv)
    }

    fn masked(&self) -> Self {
        Self {
            number: format!("**** **** **** {}", last_four(&self.number)),
            expiry: self.expiry.clone(),
            cvv: "***".to_string(),
        }
    }
}

// Raw card data must never reach a log line through `{:?}`.
impl fmt::Debug for CreditCardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.masked();
        f.debug_struct("CreditCardDetails")
            .field("number", &masked.number)
            .field("expiry", &masked.expiry)
            .field("cvv", &masked.cvv)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferDetails {
    pub account_number: String,
    pub bank_code: String,
    pub bank_code_type: String,
}

impl BankTransferDetails {
    fn validate(&self) -> ValidationResult {
        validate_required("account_number", &self.account_number)?;
        validate_numeric("account_number", &self.account_number)?;
        validate_len_range(
            "account_number",
            &self.account_number,
            validation::ACCOUNT_NUMBER_MIN_LEN,
            validation::ACCOUNT_NUMBER_MAX_LEN,
        )?;

        validate_required("bank_code", &self.bank_code)?;
        validate_alphanumeric("bank_code", &self.bank_code)?;
        validate_len_range(
            "bank_code",
            &self.bank_code,
            validation::BANK_CODE_MIN_LEN,
            validation::BANK_CODE_MAX_LEN,
        )?;

        validate_required("bank_code_type", &self.bank_code_type)?;
        validate_enum("bank_code_type", &self.bank_code_type, BANK_CODE_TYPES)?;
        validate_bank_code_scheme(&self.bank_code_type, &self.bank_code)
    }

    fn masked(&self) -> Self {
        Self {
            account_number: format!("****{}", last_four(&self.account_number)),
            bank_code: format!("****{}", last_four(&self.bank_code)),
            bank_code_type: self.bank_code_type.clone(),
        }
    }
}

impl fmt::Debug for BankTransferDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.masked();
        f.debug_struct("BankTransferDetails")
            .field("account_number", &masked.account_number)
            .field("bank_code", &masked.bank_code)
            .field("bank_code_type", &masked.bank_code_type)
            .finish()
    }
}

/// Validated payment-method details. The only way to build one from
/// caller input is [`PaymentMethodDetails::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethodDetails {
    CreditCard(CreditCardDetails),
    BankTransfer(BankTransferDetails),
}

impl PaymentMethodDetails {
    /// Decodes and validates `raw` as the details of `method`.
    pub fn parse(method: PaymentMethod, raw: &Value) -> Result<Self, ValidationError> {
        Self::parse_at(method, raw, Utc::now().date_naive())
    }

    pub(crate) fn parse_at(
        method: PaymentMethod,
        raw: &Value,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let details = match method {
            PaymentMethod::CreditCard => serde_json::from_value(raw.clone())
                .map(PaymentMethodDetails::CreditCard)
                .map_err(|e| {
                    ValidationError::new(
                        "method_details",
                        format!("failed to decode credit card details: {}", e),
                    )
                })?,
            PaymentMethod::BankTransfer => serde_json::from_value(raw.clone())
                .map(PaymentMethodDetails::BankTransfer)
                .map_err(|e| {
                    ValidationError::new(
                        "method_details",
                        format!("failed to decode bank transfer details: {}", e),
                    )
                })?,
        };

        details.validate_at(today)?;
        Ok(details)
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentMethodDetails::CreditCard(_) => PaymentMethod::CreditCard,
            PaymentMethodDetails::BankTransfer(_) => PaymentMethod::BankTransfer,
        }
    }

    fn validate_at(&self, today: NaiveDate) -> ValidationResult {
        match self {
            PaymentMethodDetails::CreditCard(card) => card.validate_at(today),
            PaymentMethodDetails::BankTransfer(bank) => bank.validate(),
        }
    }

    /// Redacted view, safe to persist and return.
    pub fn masked(&self) -> Value {
        let value = match self {
            PaymentMethodDetails::CreditCard(card) => serde_json::to_value(card.masked()),
            PaymentMethodDetails::BankTransfer(bank) => serde_json::to_value(bank.masked()),
        };
        value.unwrap_or(Value::Null)
    }

    /// Full view, only for the trip to the gateway.
    pub fn raw(&self) -> Value {
        let value = match self {
            PaymentMethodDetails::CreditCard(card) => serde_json::to_value(card),
            PaymentMethodDetails::BankTransfer(bank) => serde_json::to_value(bank),
        };
        value.unwrap_or(Value::Null)
    }
}

fn last_four(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

fn validate_expiry(expiry: &str, today: NaiveDate) -> ValidationResult {
    validate_required("expiry", expiry)?;

    let (month, year) = expiry
        .split_once('/')
        .ok_or_else(|| ValidationError::new("expiry", "invalid format, expected MM/YY"))?;

    let month: u32 = month
        .parse()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| ValidationError::new("expiry", format!("invalid month: {}", month)))?;

    let year: i32 = year
        .parse()
        .ok()
        .filter(|y| (0..100).contains(y))
        .ok_or_else(|| ValidationError::new("expiry", format!("invalid year: {}", year)))?;

    let expires = NaiveDate::from_ymd_opt(2000 + year, month, 1)
        .ok_or_else(|| ValidationError::new("expiry", "invalid date"))?;

    let earliest = today
        .checked_add_months(Months::new(MIN_CARD_VALIDITY_MONTHS))
        .unwrap_or(today);

    if expires < earliest {
        return Err(ValidationError::new(
            "expiry",
            format!(
                "must be at least {} months from now",
                MIN_CARD_VALIDITY_MONTHS
            ),
        ));
    }

    Ok(())
}

fn validate_bank_code_scheme(scheme: &str, code: &str) -> ValidationResult {
    let chars: Vec<char> = code.chars().collect();
    let all_digits = chars.iter().all(|c| c.is_ascii_digit());

    let ok = match scheme {
        "SWIFT" => {
            (chars.len() == 8 || chars.len() == 11)
                && chars[..6].iter().all(|c| c.is_ascii_alphabetic())
        }
        "IBAN" => {
            (15..=34).contains(&chars.len())
                && chars[..2].iter().all(|c| c.is_ascii_alphabetic())
                && chars[2..4].iter().all(|c| c.is_ascii_digit())
        }
        "ROUTING" => chars.len() == 9 && all_digits,
        "SORTCODE" => chars.len() == 6 && all_digits,
        "IFSC" => {
            chars.len() == 11
                && chars[..4].iter().all(|c| c.is_ascii_alphabetic())
                && chars[4] == '0'
        }
        "CLABE" => chars.len() == 18 && all_digits,
        _ => false,
    };

    if !ok {
        return Err(ValidationError::new(
            "bank_code",
            format!("is not a valid {} code", scheme),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn card(expiry: &str) -> Value {
        json!({"number": "4111111111111111", "expiry": expiry, "cvv": "123"})
    }

    #[test]
    fn test_parse_credit_card() {
        let details =
            PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card("12/27"), today())
                .unwrap();
        assert_eq!(details.method(), PaymentMethod::CreditCard);
    }

    #[test]
    fn test_card_expiring_too_soon_is_rejected() {
        let err =
            PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card("05/26"), today())
                .unwrap_err();
        assert_eq!(err.field, "expiry");

        // first month past the six-month mark
        assert!(
            PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card("08/26"), today())
                .is_ok()
        );
    }

    #[test]
    fn test_card_expiry_format() {
        for bad in ["1227", "13/27", "00/27", "ab/27", "12/2027"] {
            assert!(
                PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card(bad), today())
                    .is_err(),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_card_masking_keeps_last_four_only() {
        let details =
            PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card("12/27"), today())
                .unwrap();
        let masked = details.masked();
        assert_eq!(masked["number"], "**** **** **** 1111");
        assert_eq!(masked["cvv"], "***");
        assert_eq!(masked["expiry"], "12/27");

        let raw = details.raw();
        assert_eq!(raw["number"], "4111111111111111");
        assert_eq!(raw["cvv"], "123");
    }

    #[test]
    fn test_debug_output_is_masked() {
        let details =
            PaymentMethodDetails::parse_at(PaymentMethod::CreditCard, &card("12/27"), today())
                .unwrap();
        let debug = format!("{:?}", details);
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("123\""));
    }

    #[test]
    fn test_parse_bank_transfer() {
        let raw = json!({
            "account_number": "12345678901234",
            "bank_code": "DEUTDEFF500",
            "bank_code_type": "SWIFT"
        });
        let details =
            PaymentMethodDetails::parse_at(PaymentMethod::BankTransfer, &raw, today()).unwrap();
        let masked = details.masked();
        assert_eq!(masked["account_number"], "****1234");
        assert_eq!(masked["bank_code"], "****F500");
        assert_eq!(masked["bank_code_type"], "SWIFT");
    }

    #[test]
    fn test_bank_code_scheme_formats() {
        let cases = [
            ("SWIFT", "DEUTDEFF", true),
            ("SWIFT", "DEUTDEFF5", false),
            ("IBAN", "DE89370400440532013000", true),
            ("IBAN", "1289370400440532013000", false),
            ("ROUTING", "021000021", true),
            ("ROUTING", "02100002", false),
            ("SORTCODE", "123456", true),
            ("IFSC", "HDFC0001234", true),
            ("IFSC", "HDFC1001234", false),
            ("CLABE", "032180000118359719", true),
        ];

        for (scheme, code, expected) in cases {
            let raw = json!({
                "account_number": "12345678901234",
                "bank_code": code,
                "bank_code_type": scheme
            });
            let result = PaymentMethodDetails::parse_at(PaymentMethod::BankTransfer, &raw, today());
            assert_eq!(result.is_ok(), expected, "{} {}", scheme, code);
        }
    }

    #[test]
    fn test_bank_transfer_rejects_unknown_scheme() {
        let raw = json!({
            "account_number": "12345678901234",
            "bank_code": "DEUTDEFF",
            "bank_code_type": "BIC"
        });
        let err =
            PaymentMethodDetails::parse_at(PaymentMethod::BankTransfer, &raw, today()).unwrap_err();
        assert_eq!(err.field, "bank_code_type");
    }

    #[test]
    fn test_wrong_shape_is_a_decode_error() {
        let err = PaymentMethodDetails::parse_at(
            PaymentMethod::BankTransfer,
            &card("12/27"),
            today(),
        )
        .unwrap_err();
        assert_eq!(err.field, "method_details");
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!(
            "credit_card".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CreditCard
        );
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_masked_never_exposes_more_than_four_digits() {
        let raw = json!({
            "account_number": "9876543210987654",
            "bank_code": "021000021",
            "bank_code_type": "ROUTING"
        });
        let details =
            PaymentMethodDetails::parse_at(PaymentMethod::BankTransfer, &raw, today()).unwrap();
        let masked = details.masked();
        let account = masked["account_number"].as_str().unwrap();
        assert_eq!(account.chars().filter(|c| c.is_ascii_digit()).count(), 4);
    }
}
