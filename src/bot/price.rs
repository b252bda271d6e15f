use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::BotError;

/// Fetches a single numeric field from a public price API.
pub struct PriceClient {
    http: reqwest::Client,
    url: String,
    field: String,
}

impl PriceClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            field: field.into(),
        }
    }

    pub async fn quote(&self) -> Result<f64, BotError> {
        debug!("💱 Fetching price from {}", self.url);

        let body: Value = self
            .http
            .get(&self.url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_price(&body, &self.field)
    }
}

/// Reads the number at `pointer`. Strings such as `"61,234.56"` are accepted
/// because some APIs format their rates.
pub fn extract_price(body: &Value, pointer: &str) -> Result<f64, BotError> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| BotError::PriceFormat(format!("Feld {pointer} fehlt")))?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| BotError::PriceFormat(format!("{pointer} ist keine Zahl: {value}")))
}

pub fn format_quote(price: f64) -> String {
    format!("1 BTC = {price:.2} USD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reads_numbers_and_formatted_strings() {
        let body = json!({
            "bpi": { "USD": { "rate": "61,234.5600", "rate_float": 61234.56 } }
        });

        assert_eq!(extract_price(&body, "/bpi/USD/rate_float").unwrap(), 61234.56);
        assert_eq!(extract_price(&body, "/bpi/USD/rate").unwrap(), 61234.56);
        assert_eq!(format_quote(61234.56), "1 BTC = 61234.56 USD");
    }

    #[test]
    fn missing_or_non_numeric_fields_are_errors() {
        let body = json!({ "bpi": { "USD": { "code": "USD" } } });

        assert!(matches!(
            extract_price(&body, "/bpi/EUR/rate_float"),
            Err(BotError::PriceFormat(_))
        ));
        assert!(matches!(
            extract_price(&body, "/bpi/USD/code"),
            Err(BotError::PriceFormat(_))
        ));
    }
}
