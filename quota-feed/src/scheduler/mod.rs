//! Single actor deciding when and what to poll upstream.
//!
//! The [`PollScheduler`] owns the tick counter, the background rotation cursor and the
//! [`UpstreamClient`]. It is the only writer of the [`SharedCache`] and the only caller of
//! [`Broadcaster::publish`]. Timeframe switches reach it as commands from a
//! [`SchedulerHandle`], so every upstream call is issued from one task.

use crate::{
    broadcast::{Broadcaster, FeedEvent},
    cache::SharedCache,
    error::{FeedError, UpstreamError},
    model::{candle::Candle, quote::Quote},
    timeframe::{Timeframe, TimeframeSelector},
    upstream::{
        UpstreamClient,
        transport::{ReqwestTransport, UpstreamTransport},
    },
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// [`SchedulerConfig`] with defaults for the fixed tick period and bootstrap.
pub mod config;

/// Pure tick planning: [`PollTarget`](policy::PollTarget) selection and background rotation.
pub mod policy;

pub use config::SchedulerConfig;
use policy::{BackgroundRotation, PollTarget, plan};

/// Capacity of the [`SchedulerHandle`] command channel.
const COMMAND_CAPACITY: usize = 32;

/// Result of one poll attempt.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum PollOutcome {
    PriceUpdated,
    CandlesUpdated {
        timeframe: Timeframe,
        /// `true` if the [`Quote`] was recomputed and published from these candles.
        quote: bool,
    },
    /// Denied by the local quota or failed upstream. Cache untouched and nothing published.
    Skipped(UpstreamError),
}

impl PollOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PollOutcome::Skipped(_))
    }
}

/// How a timeframe switch obtained data for the newly active timeframe.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SwitchRefresh {
    /// Cached candles were fresh; no upstream call was made.
    Cached,
    /// Cached candles were missing or stale; one out of band poll was attempted.
    Polled(PollOutcome),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SwitchOutcome {
    pub previous: Timeframe,
    pub active: Timeframe,
    pub refresh: SwitchRefresh,
}

#[derive(Debug)]
enum SchedulerCommand {
    SwitchTimeframe {
        timeframe: Timeframe,
        reply: oneshot::Sender<SwitchOutcome>,
    },
}

/// Cloneable handle used to steer a running [`PollScheduler`].
///
/// The scheduler stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    selector: Arc<TimeframeSelector>,
}

impl SchedulerHandle {
    /// Make `timeframe` active, refreshing it out of band if its cached candles are not fresh.
    ///
    /// Resolves once the switch, and any out of band poll, has completed.
    pub async fn switch_timeframe(&self, timeframe: Timeframe) -> Result<SwitchOutcome, FeedError> {
        let (reply, outcome) = oneshot::channel();

        self.commands
            .send(SchedulerCommand::SwitchTimeframe { timeframe, reply })
            .await
            .map_err(|_| FeedError::SchedulerTerminated)?;

        outcome.await.map_err(|_| FeedError::SchedulerTerminated)
    }

    pub fn active(&self) -> Timeframe {
        self.selector.active()
    }

    pub fn is_terminated(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Rate-budgeted polling actor. See the module documentation.
pub struct PollScheduler<Transport = ReqwestTransport> {
    client: UpstreamClient<Transport>,
    cache: Arc<SharedCache>,
    broadcaster: Arc<Broadcaster>,
    selector: Arc<TimeframeSelector>,
    config: SchedulerConfig,
    tick: u64,
    rotation: BackgroundRotation,
    commands: mpsc::Receiver<SchedulerCommand>,
}

impl<Transport> PollScheduler<Transport>
where
    Transport: UpstreamTransport,
{
    pub fn new(
        client: UpstreamClient<Transport>,
        cache: Arc<SharedCache>,
        broadcaster: Arc<Broadcaster>,
        selector: Arc<TimeframeSelector>,
        config: SchedulerConfig,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

        let handle = SchedulerHandle {
            commands: tx,
            selector: Arc::clone(&selector),
        };

        let scheduler = Self {
            client,
            cache,
            broadcaster,
            selector,
            config,
            tick: 0,
            rotation: BackgroundRotation::default(),
            commands: rx,
        };

        (scheduler, handle)
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn client(&self) -> &UpstreamClient<Transport> {
        &self.client
    }

    /// Drive the scheduler until every [`SchedulerHandle`] is dropped.
    ///
    /// Polls price immediately, the active timeframe's candles after the bootstrap delay, and
    /// then fires a tick every `tick_period`. A tick that overruns delays the next one rather
    /// than bursting, so one poll is outstanding at a time.
    pub async fn run(mut self) {
        info!(
            symbol = %self.client.symbol(),
            active = %self.selector.active(),
            tick_period = ?self.config.tick_period,
            quota_limit = self.client.quota().limit(),
            "poll scheduler starting"
        );

        self.poll_price().await;

        let bootstrap = tokio::time::sleep(self.config.bootstrap_delay);
        tokio::pin!(bootstrap);
        let mut bootstrapped = false;

        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.config.tick_period,
            self.config.tick_period,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut bootstrap, if !bootstrapped => {
                    bootstrapped = true;
                    self.poll_candles(self.selector.active()).await;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        info!(ticks = self.tick, "poll scheduler stopped, every handle dropped");
    }

    /// Fire the next tick and poll whatever it plans.
    pub async fn tick(&mut self) -> PollOutcome {
        self.tick += 1;

        let target = plan(
            self.tick,
            self.selector.active(),
            &mut self.rotation,
            self.config.background_every,
        );
        debug!(tick = self.tick, %target, "scheduler tick");

        match target {
            PollTarget::Price => self.poll_price().await,
            PollTarget::Candles { timeframe, .. } => self.poll_candles(timeframe).await,
        }
    }

    /// Poll the latest price, caching and publishing it on success.
    pub async fn poll_price(&self) -> PollOutcome {
        match self.client.fetch_price().await {
            Ok(price) => {
                let entry = self.cache.put_price(price, Utc::now());
                self.broadcaster.publish(FeedEvent::from(entry.as_ref()));
                PollOutcome::PriceUpdated
            }
            Err(error) => skipped(PollTarget::Price, error),
        }
    }

    /// Poll candles for `timeframe`, caching and publishing them on success.
    ///
    /// The [`Quote`] is recomputed and published only when `timeframe` is the active one.
    pub async fn poll_candles(&self, timeframe: Timeframe) -> PollOutcome {
        let foreground = timeframe == self.selector.active();
        let target = PollTarget::Candles {
            timeframe,
            foreground,
        };

        let candles = match self
            .client
            .fetch_candles(timeframe, self.config.candle_outputsize)
            .await
        {
            Ok(candles) => candles,
            Err(error) => return skipped(target, error),
        };

        let now = Utc::now();
        let entry = self.cache.put_candles(candles, now);
        self.broadcaster.publish(FeedEvent::from(entry.as_ref()));

        let quote = foreground && self.publish_quote(timeframe, &entry.value.bars, now);

        debug!(%target, bars = entry.value.len(), quote, "candles updated");
        PollOutcome::CandlesUpdated { timeframe, quote }
    }

    /// Make `timeframe` active. See [`SchedulerHandle::switch_timeframe`].
    pub async fn switch_timeframe(&mut self, timeframe: Timeframe) -> SwitchOutcome {
        let previous = self.selector.set(timeframe);
        let now = Utc::now();

        let fresh = self
            .cache
            .candles(timeframe)
            .filter(|entry| entry.age(now) <= self.config.freshness_threshold);

        let refresh = match fresh {
            Some(entry) => {
                if previous != timeframe {
                    self.publish_quote(timeframe, &entry.value.bars, now);
                }
                SwitchRefresh::Cached
            }
            None => SwitchRefresh::Polled(self.poll_candles(timeframe).await),
        };

        info!(%previous, active = %timeframe, ?refresh, "active timeframe switched");

        SwitchOutcome {
            previous,
            active: timeframe,
            refresh,
        }
    }

    async fn handle(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::SwitchTimeframe { timeframe, reply } => {
                let outcome = self.switch_timeframe(timeframe).await;
                // Requester may have given up waiting
                let _ = reply.send(outcome);
            }
        }
    }

    fn publish_quote(
        &self,
        timeframe: Timeframe,
        bars: &[Candle],
        now: DateTime<Utc>,
    ) -> bool {
        let Some(quote) = Quote::derive(timeframe, bars, self.config.quote_window) else {
            return false;
        };

        let entry = self.cache.put_quote(quote, now);
        self.broadcaster.publish(FeedEvent::from(entry.as_ref()));
        true
    }
}

fn skipped(target: PollTarget, error: UpstreamError) -> PollOutcome {
    if error.is_rate_limited() {
        debug!(%target, %error, "poll skipped");
    } else {
        warn!(%target, %error, "poll failed, retrying at a later tick");
    }
    PollOutcome::Skipped(error)
}
