use anyhow::{Context, Result};
use arb_bot_core::config::ChainConfig;
use arb_bot_core::Network;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Source of new-block notifications for one network.
///
/// Dropping the returned receiver cancels the subscription; the producer
/// task notices the closed channel and exits.
#[async_trait]
pub trait BlockSource: Send + Sync + std::fmt::Debug {
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>>;
}

/// Builds a [`BlockSource`] for a bot's network at worker spawn time.
///
/// Workers own their source construction so a missing credential surfaces
/// as a worker error message instead of failing the spawn itself.
pub trait BlockSourceFactory: Send + Sync {
    /// # Errors
    /// Returns error if the network has no usable configuration.
    fn create(&self, network: Network) -> Result<Arc<dyn BlockSource>>;
}

fn rpc_url(network: Network, api_key: &str) -> String {
    let slug = match network {
        Network::Arb => "arb-mainnet",
        Network::Base => "base-mainnet",
        Network::Pol => "polygon-mainnet",
        Network::Bnb => "bnb-mainnet",
    };
    format!("https://{slug}.g.alchemy.com/v2/{api_key}")
}

/// JSON-RPC polling block source.
///
/// Polls `eth_blockNumber` at a fixed cadence and emits each height once.
/// Poll failures are logged and retried on the next tick.
#[derive(Debug)]
pub struct RpcBlockSource {
    url: String,
    network: Network,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl RpcBlockSource {
    #[must_use]
    pub fn new(network: Network, api_key: &str, poll_interval: Duration) -> Self {
        Self {
            url: rpc_url(network, api_key),
            network,
            poll_interval,
            client: reqwest::Client::new(),
        }
    }

    async fn block_number(&self) -> Result<u64> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1,
        });

        let response: serde_json::Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("eth_blockNumber request failed")?
            .json()
            .await
            .context("eth_blockNumber response was not JSON")?;

        let hex = response["result"]
            .as_str()
            .context("eth_blockNumber response missing result")?;

        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .context("eth_blockNumber result was not hex")
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>> {
        let (tx, rx) = mpsc::channel(32);
        let network = self.network;
        let poll_interval = self.poll_interval;
        let source = Self {
            url: self.url.clone(),
            network,
            poll_interval,
            client: self.client.clone(),
        };

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(poll_interval);
            let mut last: Option<u64> = None;

            loop {
                tick.tick().await;
                match source.block_number().await {
                    Ok(height) => {
                        if last.is_some_and(|seen| height <= seen) {
                            continue;
                        }
                        last = Some(height);
                        if tx.send(height).await.is_err() {
                            tracing::debug!(%network, "Block subscriber gone, stopping poll");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%network, "Block poll failed: {e:#}");
                    }
                }
            }
        });

        Ok(rx)
    }
}

pub struct RpcBlockSourceFactory {
    config: ChainConfig,
}

impl RpcBlockSourceFactory {
    #[must_use]
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }
}

impl BlockSourceFactory for RpcBlockSourceFactory {
    fn create(&self, network: Network) -> Result<Arc<dyn BlockSource>> {
        let api_key = self
            .config
            .api_keys
            .get(&network)
            .with_context(|| format!("No API key configured for network {network}"))?;

        Ok(Arc::new(RpcBlockSource::new(
            network,
            api_key,
            Duration::from_millis(self.config.poll_interval_ms),
        )))
    }
}

/// Emits consecutive heights on a timer. Used by tests and offline runs.
#[derive(Debug)]
pub struct SimulatedBlockSource {
    start: u64,
    interval: Duration,
}

impl SimulatedBlockSource {
    #[must_use]
    pub const fn new(start: u64, interval: Duration) -> Self {
        Self { start, interval }
    }
}

#[async_trait]
impl BlockSource for SimulatedBlockSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>> {
        let (tx, rx) = mpsc::channel(32);
        let start = self.start;
        let interval = self.interval;

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            let mut height = start;
            loop {
                tick.tick().await;
                if tx.send(height).await.is_err() {
                    break;
                }
                height += 1;
            }
        });

        Ok(rx)
    }
}

pub struct SimulatedBlockSourceFactory {
    interval: Duration,
}

impl SimulatedBlockSourceFactory {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl BlockSourceFactory for SimulatedBlockSourceFactory {
    fn create(&self, _network: Network) -> Result<Arc<dyn BlockSource>> {
        Ok(Arc::new(SimulatedBlockSource::new(1, self.interval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_maps_network_slugs() {
        assert_eq!(
            rpc_url(Network::Arb, "k"),
            "https://arb-mainnet.g.alchemy.com/v2/k"
        );
        assert_eq!(
            rpc_url(Network::Pol, "k"),
            "https://polygon-mainnet.g.alchemy.com/v2/k"
        );
    }

    #[test]
    fn rpc_factory_requires_api_key() {
        let factory = RpcBlockSourceFactory::new(ChainConfig::default());
        let err = factory.create(Network::Arb).unwrap_err();
        assert!(err.to_string().contains("No API key"));
    }

    #[tokio::test]
    async fn simulated_source_emits_increasing_heights() {
        let source = SimulatedBlockSource::new(100, Duration::from_millis(1));
        let mut rx = source.subscribe().await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first, 100);
        assert_eq!(second, 101);
    }

    #[tokio::test]
    async fn dropping_receiver_stops_producer() {
        let source = SimulatedBlockSource::new(1, Duration::from_millis(1));
        let rx = source.subscribe().await.unwrap();
        drop(rx);
        // Producer exits on the next failed send; nothing to assert beyond
        // not hanging, which the test runtime enforces.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
