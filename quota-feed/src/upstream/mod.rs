use crate::{
    error::UpstreamError,
    model::{candle::CandleSet, price::PricePoint},
    quota::QuotaTracker,
    timeframe::Timeframe,
};
use serde_json::Value;
use smol_str::SmolStr;
use std::{fmt::Display, sync::Arc, time::Duration};
use tracing::{debug, trace};
use url::Url;

/// Upstream wire payloads and their deserialisers.
pub mod message;

/// [`UpstreamTransport`] abstraction over the HTTP call.
pub mod transport;

use message::{PriceResponse, TimeSeriesResponse, detect_rejection};
use transport::{DEFAULT_REQUEST_TIMEOUT, ReqwestTransport, TransportResponse, UpstreamTransport};

/// Default upstream REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

/// Default fixed instrument.
pub const DEFAULT_SYMBOL: &str = "XAU/USD";

/// Connection details for the upstream market data provider.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: Url,
    pub api_key: String,
    pub symbol: SmolStr,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>, symbol: impl Into<SmolStr>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            symbol: symbol.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("symbol", &self.symbol)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Category of upstream request.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UpstreamRequest {
    Price,
    TimeSeries {
        timeframe: Timeframe,
        outputsize: u16,
    },
}

impl UpstreamRequest {
    pub fn path(&self) -> &'static str {
        match self {
            UpstreamRequest::Price => "price",
            UpstreamRequest::TimeSeries { .. } => "time_series",
        }
    }
}

impl Display for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamRequest::Price => write!(f, "price"),
            UpstreamRequest::TimeSeries { timeframe, .. } => write!(f, "time_series({timeframe})"),
        }
    }
}

/// Quota-guarded client issuing one categorised request per call.
///
/// Every call passes through [`QuotaTracker::try_admit`] first. A denied call never touches
/// the network and yields [`UpstreamError::RateLimited`].
#[derive(Debug)]
pub struct UpstreamClient<Transport = ReqwestTransport> {
    transport: Transport,
    quota: Arc<QuotaTracker>,
    config: UpstreamConfig,
}

impl UpstreamClient<ReqwestTransport> {
    /// Construct a client using the default [`ReqwestTransport`].
    pub fn from_config(
        config: UpstreamConfig,
        quota: Arc<QuotaTracker>,
    ) -> Result<Self, UpstreamError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::new(transport, quota, config))
    }
}

impl<Transport> UpstreamClient<Transport>
where
    Transport: UpstreamTransport,
{
    pub fn new(transport: Transport, quota: Arc<QuotaTracker>, config: UpstreamConfig) -> Self {
        Self {
            transport,
            quota,
            config,
        }
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    pub fn symbol(&self) -> &SmolStr {
        &self.config.symbol
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Issue a single upstream request and return the parsed JSON body.
    pub async fn fetch(&self, request: UpstreamRequest) -> Result<Value, UpstreamError> {
        let url = self.endpoint(request)?;

        if !self.quota.try_admit() {
            debug!(%request, limit = self.quota.limit(), "upstream call denied by local quota");
            return Err(UpstreamError::RateLimited {
                limit: self.quota.limit(),
            });
        }

        trace!(%request, used = self.quota.used(), "sending upstream request");
        let response = self.transport.get(url).await?;
        parse_response(response)
    }

    pub async fn fetch_price(&self) -> Result<PricePoint, UpstreamError> {
        let body = self.fetch(UpstreamRequest::Price).await?;
        let response = serde_json::from_value::<PriceResponse>(body)
            .map_err(|error| UpstreamError::Transport(format!("unexpected price payload: {error}")))?;

        Ok(PricePoint {
            symbol: self.config.symbol.clone(),
            price: response.price,
        })
    }

    pub async fn fetch_candles(
        &self,
        timeframe: Timeframe,
        outputsize: u16,
    ) -> Result<CandleSet, UpstreamError> {
        let body = self
            .fetch(UpstreamRequest::TimeSeries {
                timeframe,
                outputsize,
            })
            .await?;

        let response = serde_json::from_value::<TimeSeriesResponse>(body).map_err(|error| {
            UpstreamError::Transport(format!("unexpected time_series payload: {error}"))
        })?;

        Ok(CandleSet::new(
            timeframe,
            response.values.into_iter().map(Into::into).collect(),
        ))
    }

    fn endpoint(&self, request: UpstreamRequest) -> Result<Url, UpstreamError> {
        let mut url = self.config.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| {
                UpstreamError::Transport(format!(
                    "base url cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .push(request.path());

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("symbol", &self.config.symbol);

            if let UpstreamRequest::TimeSeries {
                timeframe,
                outputsize,
            } = request
            {
                query
                    .append_pair("interval", timeframe.as_str())
                    .append_pair("outputsize", &outputsize.to_string());
            }

            query.append_pair("apikey", &self.config.api_key);
        }

        Ok(url)
    }
}

/// Classify a raw response as data, an application level rejection, or a transport failure.
fn parse_response(response: TransportResponse) -> Result<Value, UpstreamError> {
    let TransportResponse { status, body } = response;

    let value = serde_json::from_str::<Value>(&body).map_err(|error| {
        UpstreamError::Transport(format!("malformed body (HTTP {status}): {error}"))
    })?;

    if let Some(rejection) = detect_rejection(&value) {
        return Err(rejection);
    }

    if !(200..300).contains(&status) {
        return Err(UpstreamError::Transport(format!("HTTP {status}")));
    }

    Ok(value)
}
