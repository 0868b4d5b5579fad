use crate::{
    broadcast::{BroadcastConfig, Broadcaster, Subscription},
    cache::SharedCache,
    error::{FeedError, UpstreamError},
    quota::{DEFAULT_QUOTA_LIMIT, QuotaTracker},
    scheduler::{PollScheduler, SchedulerConfig, SchedulerHandle, SwitchOutcome},
    status::FeedStatus,
    timeframe::{Timeframe, TimeframeSelector},
    upstream::{
        UpstreamClient, UpstreamConfig,
        transport::{ReqwestTransport, UpstreamTransport},
    },
};
use smol_str::SmolStr;
use std::sync::Arc;

/// Everything needed to assemble a [`Feed`].
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub upstream: UpstreamConfig,
    pub quota_limit: usize,
    pub default_timeframe: Timeframe,
    pub scheduler: SchedulerConfig,
    pub broadcast: BroadcastConfig,
}

impl FeedConfig {
    pub fn new(upstream: UpstreamConfig) -> Self {
        Self {
            upstream,
            quota_limit: DEFAULT_QUOTA_LIMIT,
            default_timeframe: Timeframe::default(),
            scheduler: SchedulerConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

/// Read and control surface over a running [`PollScheduler`].
///
/// Cheap to clone. The paired scheduler stops once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Feed {
    symbol: SmolStr,
    default_timeframe: Timeframe,
    quota: Arc<QuotaTracker>,
    cache: Arc<SharedCache>,
    selector: Arc<TimeframeSelector>,
    broadcaster: Arc<Broadcaster>,
    scheduler: SchedulerHandle,
}

impl Feed {
    /// Assemble a [`Feed`] polling upstream over HTTP. The returned scheduler must be driven,
    /// eg/ `tokio::spawn(scheduler.run())`.
    pub fn init(config: FeedConfig) -> Result<(Self, PollScheduler), UpstreamError> {
        let transport = ReqwestTransport::new(config.upstream.timeout)?;
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport<Transport>(
        transport: Transport,
        config: FeedConfig,
    ) -> (Self, PollScheduler<Transport>)
    where
        Transport: UpstreamTransport,
    {
        let FeedConfig {
            upstream,
            quota_limit,
            default_timeframe,
            scheduler,
            broadcast,
        } = config;

        let symbol = upstream.symbol.clone();
        let quota = Arc::new(QuotaTracker::new(quota_limit));
        let cache = Arc::new(SharedCache::new());
        let selector = Arc::new(TimeframeSelector::new(default_timeframe));
        let broadcaster = Broadcaster::new(Arc::clone(&cache), Arc::clone(&selector), broadcast);

        let client = UpstreamClient::new(transport, Arc::clone(&quota), upstream);
        let (scheduler, handle) = PollScheduler::new(
            client,
            Arc::clone(&cache),
            Arc::clone(&broadcaster),
            Arc::clone(&selector),
            scheduler,
        );

        let feed = Self {
            symbol,
            default_timeframe,
            quota,
            cache,
            selector,
            broadcaster,
            scheduler: handle,
        };

        (feed, scheduler)
    }

    pub fn symbol(&self) -> &SmolStr {
        &self.symbol
    }

    pub fn default_timeframe(&self) -> Timeframe {
        self.default_timeframe
    }

    pub fn active_timeframe(&self) -> Timeframe {
        self.selector.active()
    }

    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// Open a push connection. See [`Broadcaster::subscribe`].
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// See [`SchedulerHandle::switch_timeframe`].
    pub async fn switch_timeframe(&self, timeframe: Timeframe) -> Result<SwitchOutcome, FeedError> {
        self.scheduler.switch_timeframe(timeframe).await
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus::collect(
            self.symbol.clone(),
            &self.quota,
            &self.cache,
            &self.broadcaster,
            &self.selector,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scheduler::{PollOutcome, SwitchRefresh},
        upstream::transport::mock::{MockTransport, healthy_upstream},
    };
    use url::Url;

    fn config() -> FeedConfig {
        let mut config = FeedConfig::new(UpstreamConfig::new(
            Url::parse("https://upstream.test").unwrap(),
            "secret-key",
            "XAU/USD",
        ));
        config.default_timeframe = Timeframe::FifteenMinutes;
        config
    }

    #[tokio::test]
    async fn test_feed_shares_state_with_scheduler() {
        let transport = Arc::new(MockTransport::new(healthy_upstream(5)));
        let (feed, mut scheduler) = Feed::with_transport(Arc::clone(&transport), config());

        assert_eq!(feed.active_timeframe(), Timeframe::FifteenMinutes);
        assert_eq!(feed.quota().limit(), DEFAULT_QUOTA_LIMIT);

        scheduler.tick().await;
        scheduler.tick().await;

        let status = feed.status();
        assert_eq!(status.symbol, "XAU/USD");
        assert_eq!(status.quota_used, 2);
        assert!(feed.cache().price().is_some());
        assert_eq!(
            feed.cache().quote().unwrap().value.interval,
            Timeframe::FifteenMinutes
        );
    }

    #[tokio::test]
    async fn test_feed_switch_reaches_running_scheduler() {
        let transport = Arc::new(MockTransport::new(healthy_upstream(5)));
        let (feed, scheduler) = Feed::with_transport(Arc::clone(&transport), config());
        let task = tokio::spawn(scheduler.run());

        let outcome = feed.switch_timeframe(Timeframe::FourHours).await.unwrap();

        assert_eq!(outcome.previous, Timeframe::FifteenMinutes);
        assert_eq!(
            outcome.refresh,
            SwitchRefresh::Polled(PollOutcome::CandlesUpdated {
                timeframe: Timeframe::FourHours,
                quote: true,
            })
        );
        assert_eq!(feed.active_timeframe(), Timeframe::FourHours);
        assert_eq!(feed.default_timeframe(), Timeframe::FifteenMinutes);

        drop(feed);
        task.await.unwrap();
    }
}
