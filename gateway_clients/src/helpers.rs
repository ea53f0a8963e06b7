use std::str::FromStr;

use marketpay_engine::ProviderError;
use mpg_common::Money;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

/// Providers that take major-unit decimal amounts expect a JSON number, e.g. `49.99`.
pub fn decimal_amount(amount: Money) -> Result<Value, ProviderError> {
    Number::from_str(&amount.to_string())
        .map(Value::Number)
        .map_err(|e| ProviderError::InvalidAmount(format!("{amount} cannot be sent as a JSON number. {e}")))
}

/// Reads an amount that a provider may send either as a JSON number or as a string.
pub fn parse_amount(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => Money::from_str(&n.to_string()).ok(),
        Value::String(s) => Money::from_str(s).ok(),
        _ => None,
    }
}

/// The value of an HTTP Basic `Authorization` header.
pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", base64::encode(format!("{user}:{password}")))
}

pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Fetches a string field, returning an empty string if it is missing.
pub fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value[field].as_str().unwrap_or_default()
}
