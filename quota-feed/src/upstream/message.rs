use crate::{error::UpstreamError, model::candle::Candle};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt::Display, str::FromStr};

/// Upstream `/price` response.
///
/// ### Raw Payload Example
/// ```json
/// { "price": "2341.27000" }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct PriceResponse {
    #[serde(deserialize_with = "de_str")]
    pub price: f64,
}

/// Upstream `/time_series` response, bars newest first.
///
/// ### Raw Payload Example
/// ```json
/// {
///     "meta": { "symbol": "XAU/USD", "interval": "5min", "type": "Physical Currency" },
///     "values": [
///         {
///             "datetime": "2024-05-01 10:05:00",
///             "open": "2301.10",
///             "high": "2303.95",
///             "low": "2299.80",
///             "close": "2302.40"
///         }
///     ],
///     "status": "ok"
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct TimeSeriesResponse {
    #[serde(default)]
    pub meta: Option<TimeSeriesMeta>,
    pub values: Vec<TimeSeriesBar>,
}

#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct TimeSeriesMeta {
    pub symbol: String,
    pub interval: String,
}

#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct TimeSeriesBar {
    pub datetime: String,
    #[serde(deserialize_with = "de_str")]
    pub open: f64,
    #[serde(deserialize_with = "de_str")]
    pub high: f64,
    #[serde(deserialize_with = "de_str")]
    pub low: f64,
    #[serde(deserialize_with = "de_str")]
    pub close: f64,
    #[serde(default, deserialize_with = "de_opt_str_f64")]
    pub volume: Option<f64>,
}

impl From<TimeSeriesBar> for Candle {
    fn from(bar: TimeSeriesBar) -> Self {
        Self {
            datetime: bar.datetime,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Application level error payload, delivered with `"status": "error"`.
///
/// ### Raw Payload Example
/// ```json
/// {
///     "code": 429,
///     "message": "You have run out of API credits for the current minute.",
///     "status": "error"
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Extract an [`UpstreamError::Rejected`] if the body reports an application level error.
pub fn detect_rejection(body: &Value) -> Option<UpstreamError> {
    if body.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }

    let ErrorResponse { code, message } =
        ErrorResponse::deserialize(body).unwrap_or(ErrorResponse {
            code: None,
            message: None,
        });

    Some(UpstreamError::Rejected {
        code,
        message: message.unwrap_or_else(|| "unspecified upstream error".to_string()),
    })
}

/// Deserialize a string encoded number.
fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse::<T>().map_err(serde::de::Error::custom)
}

/// Deserialize an optional string as an optional f64.
fn de_opt_str_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_price_response() {
            let input = r#"{ "price": "2341.27000" }"#;
            let actual = serde_json::from_str::<PriceResponse>(input).unwrap();
            assert_eq!(actual, PriceResponse { price: 2341.27 });

            // Unquoted numbers are not part of the upstream contract
            assert!(serde_json::from_str::<PriceResponse>(r#"{ "price": 1.0 }"#).is_err());
        }

        #[test]
        fn test_time_series_response() {
            let input = r#"
                {
                    "meta": { "symbol": "XAU/USD", "interval": "5min", "type": "Physical Currency" },
                    "values": [
                        { "datetime": "2024-05-01 10:05:00", "open": "2301.10", "high": "2303.95", "low": "2299.80", "close": "2302.40" },
                        { "datetime": "2024-05-01 10:00:00", "open": "2300.00", "high": "2301.50", "low": "2298.10", "close": "2301.10", "volume": "" }
                    ],
                    "status": "ok"
                }
            "#;

            let actual = serde_json::from_str::<TimeSeriesResponse>(input).unwrap();

            assert_eq!(
                actual.meta,
                Some(TimeSeriesMeta {
                    symbol: "XAU/USD".to_string(),
                    interval: "5min".to_string(),
                })
            );
            assert_eq!(actual.values.len(), 2);
            assert_eq!(
                Candle::from(actual.values[0].clone()),
                Candle {
                    datetime: "2024-05-01 10:05:00".to_string(),
                    open: 2301.10,
                    high: 2303.95,
                    low: 2299.80,
                    close: 2302.40,
                    volume: None,
                }
            );
            assert_eq!(actual.values[1].volume, None);
        }
    }

    #[test]
    fn test_detect_rejection() {
        struct TestCase {
            input: Value,
            expected: Option<UpstreamError>,
        }

        let tests = vec![
            TestCase {
                // TC0: healthy payload
                input: serde_json::json!({ "price": "1.0" }),
                expected: None,
            },
            TestCase {
                // TC1: explicit ok status
                input: serde_json::json!({ "values": [], "status": "ok" }),
                expected: None,
            },
            TestCase {
                // TC2: upstream side quota exhaustion
                input: serde_json::json!({
                    "code": 429,
                    "message": "You have run out of API credits for the current minute.",
                    "status": "error"
                }),
                expected: Some(UpstreamError::Rejected {
                    code: Some(429),
                    message: "You have run out of API credits for the current minute."
                        .to_string(),
                }),
            },
            TestCase {
                // TC3: error status without details
                input: serde_json::json!({ "status": "error" }),
                expected: Some(UpstreamError::Rejected {
                    code: None,
                    message: "unspecified upstream error".to_string(),
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = detect_rejection(&test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
