use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use quota_feed::{Candle, PricePoint, Quote, Stamped, Timeframe};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

/// Build market data sub-router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/price", get(price))
        .route("/api/quote", get(quote))
        .route("/api/candles", get(candles))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Ok,
    /// Nothing has been fetched successfully yet.
    Loading,
}

/// Cached value, or the loading placeholder `{ "status": "loading", "data": null }`.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct CachedResponse<T> {
    pub status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Timeframe>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl<T> CachedResponse<T> {
    pub fn loading() -> Self {
        Self {
            status: CacheStatus::Loading,
            interval: None,
            data: None,
            updated_at: None,
        }
    }

    pub fn with_interval(self, interval: Timeframe) -> Self {
        Self {
            interval: Some(interval),
            ..self
        }
    }
}

impl<T> From<Option<&Stamped<T>>> for CachedResponse<T>
where
    T: Clone,
{
    fn from(entry: Option<&Stamped<T>>) -> Self {
        match entry {
            Some(entry) => Self {
                status: CacheStatus::Ok,
                interval: None,
                data: Some(entry.value.clone()),
                updated_at: Some(entry.updated_at_ms()),
            },
            None => Self::loading(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CandlesQuery {
    pub interval: Option<String>,
}

/// GET /api/price: Latest cached price.
pub async fn price(State(state): State<Arc<AppState>>) -> Json<CachedResponse<PricePoint>> {
    let entry = state.feed.cache().price();
    Json(CachedResponse::from(entry.as_deref()))
}

/// GET /api/quote: Quote derived from the active timeframe's candles.
pub async fn quote(State(state): State<Arc<AppState>>) -> Json<CachedResponse<Quote>> {
    let entry = state.feed.cache().quote();
    Json(CachedResponse::from(entry.as_deref()))
}

/// GET /api/candles?interval=<tf>: Switch the active timeframe, then return its candles.
///
/// An omitted interval switches back to the default timeframe.
pub async fn candles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandlesQuery>,
) -> Result<Json<CachedResponse<Arc<[Candle]>>>, ServerError> {
    let timeframe = match query.interval.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw.parse::<Timeframe>()?,
        _ => state.feed.default_timeframe(),
    };

    let outcome = state.feed.switch_timeframe(timeframe).await?;
    debug!(%timeframe, refresh = ?outcome.refresh, "candles requested");

    let entry = state
        .feed
        .cache()
        .candles(timeframe)
        .map(|entry| Stamped::new(Arc::clone(&entry.value.bars), entry.updated_at));

    Ok(Json(
        CachedResponse::from(entry.as_ref()).with_interval(timeframe),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::feed;
    use serde_json::json;

    #[tokio::test]
    async fn test_loading_placeholder_before_first_poll() {
        let (state, _scheduler) = feed();

        let Json(price_response) = price(State(Arc::clone(&state))).await;
        let Json(quote_response) = quote(State(state)).await;

        let loading = json!({ "status": "loading", "data": null });
        assert_eq!(serde_json::to_value(&price_response).unwrap(), loading);
        assert_eq!(serde_json::to_value(&quote_response).unwrap(), loading);
    }

    #[tokio::test]
    async fn test_price_served_from_cache() {
        let (state, scheduler) = feed();
        scheduler.poll_price().await;
        let updated_at = state.feed.cache().price().unwrap().updated_at_ms();

        let Json(response) = price(State(state)).await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "ok",
                "data": { "symbol": "XAU/USD", "price": 2341.5 },
                "updated_at": updated_at,
            })
        );
    }

    #[tokio::test]
    async fn test_candles_switch_and_fetch() {
        struct TestCase {
            interval: Option<&'static str>,
            expected: Timeframe,
        }

        let tests = vec![
            TestCase {
                // TC0: explicit interval
                interval: Some("1h"),
                expected: Timeframe::OneHour,
            },
            TestCase {
                // TC1: interval is case insensitive
                interval: Some("4H"),
                expected: Timeframe::FourHours,
            },
            TestCase {
                // TC2: omitted interval switches back to the default
                interval: None,
                expected: Timeframe::FiveMinutes,
            },
        ];

        let (state, scheduler) = feed();
        let task = tokio::spawn(scheduler.run());

        for (index, test) in tests.into_iter().enumerate() {
            let query = CandlesQuery {
                interval: test.interval.map(str::to_string),
            };

            let Json(response) = candles(State(Arc::clone(&state)), Query(query))
                .await
                .unwrap();

            assert_eq!(response.status, CacheStatus::Ok, "TC{} failed", index);
            assert_eq!(response.interval, Some(test.expected), "TC{} failed", index);
            assert_eq!(response.data.unwrap().len(), 3, "TC{} failed", index);
            assert_eq!(state.feed.active_timeframe(), test.expected, "TC{} failed", index);

            let Json(quote_response) = quote(State(Arc::clone(&state))).await;
            let derived = quote_response.data.unwrap();
            assert_eq!(derived.interval, test.expected, "TC{} failed", index);
        }

        drop(state);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_candles_unknown_interval_is_bad_request() {
        let (state, _scheduler) = feed();

        let result = candles(
            State(state),
            Query(CandlesQuery {
                interval: Some("2h".to_string()),
            }),
        )
        .await;

        assert!(matches!(result, Err(ServerError::BadRequest(_))));
    }
}
