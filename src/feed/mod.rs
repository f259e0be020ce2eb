// feed/mod.rs
//! Adafruit IO feed that IFTTT applets write commands into.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{error::FeedError, events::EventDispatcher, metrics::FEED_MESSAGES};

const API_BASE: &str = "https://io.adafruit.com/api/v2";
const SOURCE: &str = "adafruit_io";
/// Written back after a command has been taken, so it is not seen twice.
pub const ACK_VALUE: &str = "0";

#[derive(Debug, Deserialize)]
struct DataPoint {
    value: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct NewDataPoint<'a> {
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct NewFeed<'a> {
    feed: FeedName<'a>,
}

#[derive(Debug, Serialize)]
struct FeedName<'a> {
    name: &'a str,
}

pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    key: String,
    feed: String,
}

impl FeedClient {
    pub fn new(username: &str, key: &str, feed: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{API_BASE}/{username}"),
            key: key.to_string(),
            feed: feed.to_string(),
        })
    }

    fn feed_url(&self) -> String {
        format!("{}/feeds/{}", self.base_url, self.feed)
    }

    /// Creates the feed when the account does not have it yet.
    pub async fn ensure_feed(&self) -> Result<(), FeedError> {
        let response = self
            .client
            .get(self.feed_url())
            .header("X-AIO-Key", &self.key)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                info!(feed = %self.feed, "Creating feed");
                self.client
                    .post(format!("{}/feeds", self.base_url))
                    .header("X-AIO-Key", &self.key)
                    .json(&NewFeed {
                        feed: FeedName { name: &self.feed },
                    })
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            status => Err(FeedError::Unexpected(status)),
        }
    }

    /// Most recent value, `None` if the feed has no data yet.
    pub async fn last_value(&self) -> Result<Option<String>, FeedError> {
        let response = self
            .client
            .get(format!("{}/data/last", self.feed_url()))
            .header("X-AIO-Key", &self.key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let point: Option<DataPoint> = response.error_for_status()?.json().await?;
        Ok(point.map(|p| value_text(p.value)))
    }

    pub async fn acknowledge(&self) -> Result<(), FeedError> {
        self.client
            .post(format!("{}/data", self.feed_url()))
            .header("X-AIO-Key", &self.key)
            .json(&NewDataPoint { value: ACK_VALUE })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn value_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

fn pending_command(value: Option<String>) -> Option<String> {
    value.filter(|v| v != ACK_VALUE)
}

/// Polls the feed until `shutdown` flips, handing new commands to the
/// dispatcher after acknowledging them.
pub async fn poll(
    feed: FeedClient,
    dispatcher: EventDispatcher,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut connected = false;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let value = match feed.last_value().await {
            Ok(value) => {
                if !connected {
                    connected = true;
                    dispatcher.on_connect(SOURCE);
                }
                value
            }
            Err(e) => {
                if connected {
                    connected = false;
                    dispatcher.on_disconnect(SOURCE);
                }
                warn!(error = %e, "Feed poll failed");
                continue;
            }
        };

        let Some(command) = pending_command(value) else {
            continue;
        };
        // Unacknowledged commands would come back on the next poll.
        if let Err(e) = feed.acknowledge().await {
            warn!(error = %e, "Feed acknowledge failed, retrying");
            continue;
        }
        debug!(%command, "Feed command received");
        metrics::counter!(FEED_MESSAGES).increment(1);
        dispatcher.on_message(&command).await;
    }

    if connected {
        dispatcher.on_disconnect(SOURCE);
    }
    info!("Feed poller stopped");
}
