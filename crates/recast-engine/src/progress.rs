//! Progress publication channel: scoped, ephemeral, best-effort.
//!
//! One broadcast channel per run relays the four phase-transition topics to
//! whatever subscribers are attached when an event is published. Nothing is
//! persisted and nothing is replayed — a late joiner reconciles from the
//! run document. Publishing is lossy by design: zero subscribers is not an
//! error, and a slow subscriber that lags out of the buffer just misses
//! events (they are hints, never authoritative state).

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

use recast_core::models::{ProgressEvent, ProgressTopic};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub struct ProgressHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>,
    /// Publisher-side logical clock; monotonic across the hub, so per
    /// channel as well.
    seq: AtomicU64,
    capacity: usize,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            capacity,
        }
    }

    /// Publish a topic to a channel. Fire-and-forget: returns the assigned
    /// logical timestamp once the event is handed to the transport,
    /// regardless of how many subscribers (if any) receive it.
    pub fn publish(&self, channel: &str, topic: ProgressTopic, message: impl Into<String>) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ProgressEvent {
            channel: channel.to_string(),
            topic,
            message: message.into(),
            seq,
            emitted_at: Utc::now(),
        };

        let mut channels = self.channels.lock().expect("channel lock");
        if let Some(tx) = channels.get(channel) {
            // Lossy send; also the GC point for channels nobody listens to.
            if tx.send(event).is_err() {
                channels.remove(channel);
            }
        }
        tracing::debug!(channel = %channel, topic = %topic, seq = seq, "Progress event published");
        seq
    }

    /// Attach a subscriber to a channel, delivering only the requested
    /// topics. Events published before this call are not replayed.
    pub fn subscribe(
        &self,
        channel: &str,
        topics: HashSet<ProgressTopic>,
    ) -> ProgressSubscription {
        let mut channels = self.channels.lock().expect("channel lock");
        let tx = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        ProgressSubscription {
            rx: tx.subscribe(),
            topics,
        }
    }

    /// Number of live subscribers on a channel, for tests and diagnostics.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .expect("channel lock")
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// A live, topic-filtered stream over one channel.
pub struct ProgressSubscription {
    rx: broadcast::Receiver<ProgressEvent>,
    topics: HashSet<ProgressTopic>,
}

impl ProgressSubscription {
    /// Next matching event, or `None` once the channel is closed. Lagging
    /// behind the buffer drops the missed events and continues.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.topics.contains(&event.topic) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed = missed, "Progress subscriber lagged, skipping ahead");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Claims of a channel-scoped progress credential.
#[derive(Debug, Serialize, Deserialize)]
struct ChannelClaims {
    /// The one channel this token can read.
    sub: String,
    topics: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Verified grant: the channel and topics a presented token may read.
#[derive(Debug, Clone)]
pub struct ChannelGrant {
    pub channel: String,
    pub topics: HashSet<ProgressTopic>,
}

/// Issues and verifies short-lived progress-channel credentials. A token is
/// scoped to exactly one channel and the four fixed topics; a credential
/// for one run's channel is unusable against another's.
pub struct ProgressTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl ProgressTokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, channel: &str) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = ChannelClaims {
            sub: channel.to_string(),
            topics: ProgressTopic::ALL.iter().map(|t| t.to_string()).collect(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to sign progress token: {}", e))
    }

    /// Verify a token against the channel the caller is trying to read.
    pub fn verify(&self, token: &str, expected_channel: &str) -> anyhow::Result<ChannelGrant> {
        let data = decode::<ChannelClaims>(token, &self.decoding, &Validation::default())
            .map_err(|e| anyhow::anyhow!("Invalid progress token: {}", e))?;

        if data.claims.sub != expected_channel {
            anyhow::bail!(
                "Progress token is scoped to another channel ({})",
                data.claims.sub
            );
        }

        let topics = data
            .claims
            .topics
            .iter()
            .filter_map(|t| t.parse().ok())
            .collect();
        Ok(ChannelGrant {
            channel: data.claims.sub,
            topics,
        })
    }
}
