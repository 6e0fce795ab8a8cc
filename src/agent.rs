//! Agent lifecycle: wiring, task spawning, shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::auth::{ApiAuthenticator, AuthConfig, AuthError};
use crate::config::{Config, ConfigError};
use crate::correlate::{Correlator, CorrelatorConfig};
use crate::events::{EventSink, JsonLinesSink};
use crate::notify::{AutoDiscoveryConfig, ManualTarget, Notifier, NotifyError};
use crate::router::{websocket_url, RouterClient, RouterClientConfig, RouterError};
use crate::schedule::{ScheduleCache, ScheduleClient, ScheduleClientConfig, ScheduleError};
use crate::store::{BusStateStore, CountersStore};
use crate::tasks;

/// Fatal startup errors. Anything after startup is logged and retried, not
/// propagated here.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
}

/// The route validation agent.
pub struct Agent {
    config: Config,
}

impl Agent {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start everything and block until the shutdown signal.
    ///
    /// Returns once every background task has stopped and the final
    /// bus-state snapshot is on disk.
    pub async fn run(self) -> Result<(), AgentError> {
        let config = self.config;

        // Authenticate first; an agent without a credential is useless.
        let auth = ApiAuthenticator::connect(AuthConfig {
            client_id: config.api.auth.client_id.clone(),
            client_secret: config.api.auth.client_secret.clone(),
            token_url: config.api.auth.token_url.clone(),
        })
        .await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx.clone());

        let schedule_cache = ScheduleCache::new();
        let bus_states = BusStateStore::open(&config.snapshot_path);
        let counters = CountersStore::new();
        let sink: Arc<dyn EventSink> = Arc::new(JsonLinesSink::new());

        let notifier = build_notifier(&config).await?;
        let detector_host = detector_host(&config);

        let correlator = Arc::new(Correlator::new(
            CorrelatorConfig {
                mapping: config.mapping.clone(),
                zorro: config.zorro.clone(),
                tda: config.tda.clone(),
                detector_host,
            },
            schedule_cache.clone(),
            bus_states.clone(),
            counters,
            sink,
            notifier,
        ));

        let schedule_client = ScheduleClient::new(ScheduleClientConfig::new(
            &config.elasticsearch.address,
            &config.elasticsearch.index,
        ))?;

        let router_client = RouterClient::new(
            auth.client(),
            RouterClientConfig::new(&config.api.url).with_limit(config.api.limit),
        );

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        handles.push(auth.spawn_refresher(shutdown_rx.clone()));
        handles.push(tasks::spawn_schedule_refresher(
            schedule_client,
            schedule_cache,
            config.schedule_period(),
            shutdown_rx.clone(),
        ));
        handles.push(tasks::spawn_snapshotter(
            bus_states.clone(),
            shutdown_rx.clone(),
        ));

        for tag in &config.tags {
            handles.push(tasks::spawn_poller(
                router_client.clone(),
                correlator.clone(),
                tag.clone(),
                config.poll_period(),
                shutdown_rx.clone(),
            ));
        }

        if config.api.notifications {
            let ws_url = websocket_url(&config.api.url)?;

            for tag in &config.tags {
                handles.push(tasks::spawn_subscriber(
                    ws_url.clone(),
                    auth.token(),
                    correlator.clone(),
                    tag.clone(),
                    shutdown_rx.clone(),
                ));
            }
        }

        info!(
            tags = config.tags.len(),
            subscriptions = config.api.notifications,
            "routewatch is running, ctrl-c to stop"
        );

        wait_for_shutdown(shutdown_rx).await;

        for task in handles {
            let _ = task.await;
        }

        info!("shutdown complete");

        Ok(())
    }
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("cannot listen for shutdown signal");
            return;
        }

        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Resolve notifier targets from configuration.
///
/// Manual targets win when declared; otherwise the locator-based discovery
/// runs. A discovery failure is fatal: operators asked for alerts they
/// would never receive.
async fn build_notifier(config: &Config) -> Result<Option<Notifier>, NotifyError> {
    let Some(notifiers) = &config.notifiers else {
        return Ok(None);
    };

    if !notifiers.manual.is_empty() {
        let targets: Vec<ManualTarget> = notifiers
            .manual
            .iter()
            .map(|n| ManualTarget {
                node: n.node.clone(),
                port: n.port,
            })
            .collect();

        return Ok(Some(Notifier::manual(&targets)?));
    }

    if let Some(auto) = &notifiers.auto {
        let notifier = Notifier::discover(&AutoDiscoveryConfig {
            host: auto.host.clone(),
            username: auto.username.clone(),
            password: auto.password.clone(),
            types: auto.types.clone(),
        })
        .await?;

        return Ok(Some(notifier));
    }

    Ok(None)
}

fn detector_host(config: &Config) -> String {
    config
        .notifiers
        .as_ref()
        .and_then(|n| n.origin.clone())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "routewatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config::from_toml(
            r#"
            tags = ["MES"]

            [api]
            url = "https://router.example/graphql/v1.1"
            [api.auth]
            client_id = "agent"
            client_secret = "secret"
            token_url = "https://router.example/auth/token"

            [elasticsearch]
            address = "https://search.example:9200"
            index = "log-scheduler-*"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn detector_host_prefers_configured_origin() {
        let mut config = minimal_config();
        config.notifiers = Some(crate::config::NotifiersConfig {
            origin: Some("ops-agent-1".to_string()),
            ..Default::default()
        });

        assert_eq!(detector_host(&config), "ops-agent-1");
    }

    #[tokio::test]
    async fn no_notifier_config_means_no_notifier() {
        let config = minimal_config();
        assert!(build_notifier(&config).await.unwrap().is_none());
    }
}
