//! Analytics facade over an [`AnalyticsStore`].
//!
//! Every request runs its store reads on the blocking pool under the
//! configured per-query timeout. A player progression report fans out five
//! independent sections; a section that fails or times out is reported as
//! [`Section::Unavailable`] and the rest of the report still renders.

pub mod progression;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use roundlog_config::RoundlogConfig;
use roundlog_error::{RoundlogError, one_line};
use roundlog_forecast::build_insight;
use roundlog_ports::{ActivityFilter, AnalyticsStore, RoundFilter, SampleFilter};
use roundlog_schema::analytics::{BusyIndicator, Milestone, ServerInsight};
use roundlog_schema::progression::{PlayerProgression, Section};
use roundlog_schema::round::Round;
use roundlog_stats::{BusyClassifier, milestones};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Analytics {
    store: Arc<dyn AnalyticsStore>,
    config: Arc<RoundlogConfig>,
}

impl Analytics {
    pub fn new(store: Arc<dyn AnalyticsStore>, config: RoundlogConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RoundlogConfig {
        &self.config
    }

    /// Run `work` on the blocking pool, bounded by the query timeout.
    async fn blocking<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AnalyticsStore, &RoundlogConfig) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let budget_ms = self.config.analytics.query_timeout_ms;
        let task = tokio::task::spawn_blocking(move || work(&*store, &*config));

        match tokio::time::timeout(std::time::Duration::from_millis(budget_ms), task).await {
            Ok(joined) => joined.with_context(|| format!("{operation} task failed"))?,
            Err(_) => Err(RoundlogError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: budget_ms,
            }
            .into()),
        }
    }

    async fn section<T, F>(&self, name: &'static str, work: F) -> Section<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AnalyticsStore, &RoundlogConfig) -> Result<T> + Send + 'static,
    {
        match self.blocking(name, work).await {
            Ok(value) => Section::Ready(value),
            Err(err) => {
                let reason = one_line(&err);
                warn!(section = name, error = %reason, "analytics section unavailable");
                Section::Unavailable { reason }
            }
        }
    }

    /// Composite progression report for one player as of `now`.
    pub async fn player_progression(&self, player: &str, now: DateTime<Utc>) -> PlayerProgression {
        let name = player.to_string();
        let rounds_of = |name: String| {
            move |store: &dyn AnalyticsStore| {
                store
                    .rounds(&RoundFilter::player(name.clone()))
                    .with_context(|| format!("load rounds for {name}"))
            }
        };
        let samples_of = |name: String| {
            move |store: &dyn AnalyticsStore| {
                let filter = SampleFilter {
                    player: Some(name.clone()),
                    ..SampleFilter::default()
                };
                store
                    .samples(&filter)
                    .map(|fetched| fetched.rows)
                    .with_context(|| format!("load samples for {name}"))
            }
        };

        let overall = {
            let (rounds, samples) = (rounds_of(name.clone()), samples_of(name.clone()));
            self.section("overall", move |store, config| {
                Ok(progression::overall(&rounds(store)?, &samples(store)?, now, &config.trend))
            })
        };
        let per_map = {
            let (rounds, samples) = (rounds_of(name.clone()), samples_of(name.clone()));
            self.section("per_map", move |store, config| {
                Ok(progression::per_map(&rounds(store)?, &samples(store)?, now, &config.trend))
            })
        };
        let trajectory = {
            let (rounds, samples) = (rounds_of(name.clone()), samples_of(name.clone()));
            self.section("trajectory", move |store, config| {
                Ok(progression::player_trajectory(
                    &rounds(store)?,
                    &samples(store)?,
                    now,
                    &config.trend,
                ))
            })
        };
        let recent_activity = {
            let rounds = rounds_of(name.clone());
            self.section("recent_activity", move |store, config| {
                Ok(progression::recent_activity(
                    &rounds(store)?,
                    now,
                    config.analytics.recent_days,
                ))
            })
        };
        let comparative = {
            let samples = samples_of(name.clone());
            let name = name.clone();
            self.section("comparative", move |store, _| {
                let mine = samples(store)?;
                let servers: Vec<&str> = mine
                    .iter()
                    .map(|s| s.server_id.as_str())
                    .sorted_unstable()
                    .dedup()
                    .collect();
                let mut population = Vec::new();
                for server in servers {
                    let filter = SampleFilter {
                        server: Some(server.to_string()),
                        ..SampleFilter::default()
                    };
                    let fetched = store
                        .samples(&filter)
                        .with_context(|| format!("load samples on {server}"))?;
                    population.extend(fetched.rows);
                }
                progression::comparative(&name, &population)
            })
        };

        let (overall, per_map, trajectory, recent_activity, comparative) =
            tokio::join!(overall, per_map, trajectory, recent_activity, comparative);
        debug!(player = %name, "built progression report");
        PlayerProgression {
            player_name: name,
            generated_at: now,
            overall,
            per_map,
            trajectory,
            recent_activity,
            comparative,
        }
    }

    /// Busy indicator for one server, or for all servers combined.
    pub async fn busy_indicator(
        &self,
        server: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BusyIndicator> {
        let server = server.map(str::to_string);
        self.blocking("busy_indicator", move |store, config| {
            let filter = ActivityFilter {
                server,
                since: Some(now - Duration::days(config.busy.lookback_days)),
                until: None,
                include_bots: config.busy.include_bots,
            };
            let observations = store.activity(&filter).context("load activity")?;
            let classifier = BusyClassifier::new(&config.busy);
            let current = classifier.current_value(&observations, now);
            Ok(classifier.indicator(&observations, current, now))
        })
        .await
    }

    /// Forecast, peak hours and recommendation for one server.
    pub async fn server_insight(&self, server: &str, now: DateTime<Utc>) -> Result<ServerInsight> {
        let server = server.to_string();
        self.blocking("server_insight", move |store, config| {
            let lookback = config.busy.lookback_days.max(config.forecast.lookback_days);
            let filter = ActivityFilter {
                server: Some(server.clone()),
                since: Some(now - Duration::days(lookback)),
                until: None,
                include_bots: config.busy.include_bots,
            };
            let observations = store
                .activity(&filter)
                .with_context(|| format!("load activity for {server}"))?;
            let classifier = BusyClassifier::new(&config.busy);
            let busy = classifier.indicator(
                &observations,
                classifier.current_value(&observations, now),
                now,
            );
            Ok(build_insight(&server, &busy, &observations, now, &config.forecast))
        })
        .await
    }

    pub async fn milestones(&self, player: &str) -> Result<Vec<Milestone>> {
        let player = player.to_string();
        self.blocking("milestones", move |store, config| {
            let rounds = store
                .rounds(&RoundFilter::player(player.clone()))
                .with_context(|| format!("load rounds for {player}"))?;
            Ok(milestones(&rounds, &config.milestones.thresholds))
        })
        .await
    }

    pub async fn rounds(&self, filter: RoundFilter) -> Result<Vec<Round>> {
        self.blocking("rounds", move |store, _| store.rounds(&filter)).await
    }

    pub async fn servers(&self) -> Result<Vec<String>> {
        self.blocking("servers", |store, _| store.servers()).await
    }
}
