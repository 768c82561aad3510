use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::slot::{Field, SlotKey, SlotKind};
use crate::store::SlotStore;

/// Timing contract for the long-poll wait loop. Defaults match the deployed
/// service: the deadline sits comfortably under typical proxy idle timeouts,
/// so a dequeue returns a normal 408 instead of a truncated TCP close.
#[derive(Debug, Clone)]
pub struct PollTimings {
    pub dequeue_timeout: Duration,
    pub fast_poll: Duration,
    pub slow_poll: Duration,
    pub allowed_fast_polls: i64,
    pub channel_ttl_secs: u64,
}

impl Default for PollTimings {
    fn default() -> Self {
        Self {
            dequeue_timeout: Duration::from_secs(15),
            fast_poll: Duration::from_millis(100),
            slow_poll: Duration::from_secs(2),
            allowed_fast_polls: 10,
            channel_ttl_secs: 60 * 60 * 24,
        }
    }
}

/// What to do when a new request arrives while the channel's reply slot
/// still holds a message nobody picked up.
///
/// `Strict` fails the enqueue and is the mode the test harness uses to catch
/// misbehaving peers. `Relaxed` drops the stale reply with a warning, which
/// recovers automatically from a kernel restarted between request and reply,
/// and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffPolicy {
    Strict,
    #[default]
    Relaxed,
}

/// Enqueue/dequeue semantics on top of the slot store: single-cell mailbox
/// per slot, long-poll wait with adaptive cadence, zombie-reader reset.
pub struct RendezvousEngine {
    store: Arc<dyn SlotStore>,
    timings: PollTimings,
    policy: HandoffPolicy,
}

impl std::fmt::Debug for RendezvousEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousEngine")
            .field("timings", &self.timings)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RendezvousEngine {
    pub fn new(store: Arc<dyn SlotStore>, timings: PollTimings, policy: HandoffPolicy) -> Self {
        Self {
            store,
            timings,
            policy,
        }
    }

    /// Park a message in the channel's slot. Fails if the slot already holds
    /// an undelivered message. A request enqueue additionally checks the
    /// companion reply slot per the configured [`HandoffPolicy`].
    pub async fn enqueue(&self, kind: SlotKind, channel: &str, payload: Vec<u8>) -> Result<()> {
        debug!(channel, slot = %kind, bytes = payload.len(), "into enqueue");

        if kind == SlotKind::Request {
            self.reclaim_reply_slot(channel).await?;
        }

        let key = SlotKey::new(channel, kind);
        if self.store.get_field(&key, Field::Message).await?.is_some() {
            return Err(BridgeError::SlotOccupied(key.to_string()));
        }

        self.store
            .set_fields(
                &key,
                vec![
                    (Field::Message, payload),
                    (Field::PostedTime, wallclock()),
                    (Field::PickupWait, Vec::new()),
                    (Field::PickupTime, Vec::new()),
                ],
            )
            .await?;
        self.store.expire(&key, self.timings.channel_ttl_secs).await?;

        debug!(channel, slot = %kind, "out of enqueue");
        Ok(())
    }

    /// Wait for a message to appear in the channel's slot, up to the dequeue
    /// deadline. Returns `None` on timeout; the HTTP layer renders that as
    /// 408. `reset_first` clears any payload left behind by a now-defunct
    /// reader before the wait begins.
    pub async fn dequeue(
        &self,
        kind: SlotKind,
        channel: &str,
        reset_first: bool,
    ) -> Result<Option<Vec<u8>>> {
        debug!(channel, slot = %kind, reset_first, "into dequeue");

        let key = SlotKey::new(channel, kind);
        if reset_first {
            warn!(channel, slot = %kind, "resetting slot before wait");
            self.store.delete_field(&key, Field::Message, true).await?;
        }

        self.store
            .set_fields(
                &key,
                vec![(Field::PickupWait, wallclock()), (Field::PickupTime, Vec::new())],
            )
            .await?;
        self.store.expire(&key, self.timings.channel_ttl_secs).await?;

        let interval = self.polling_interval(&key).await?;

        // Poll until the deadline. The store has no blocking wait, so this
        // is the one place the relay burns cycles; the cadence chosen above
        // bounds what a zombie poller can cost.
        let deadline = Instant::now() + self.timings.dequeue_timeout;
        let mut message = self.store.get_field(&key, Field::Message).await?;
        while message.is_none() && Instant::now() < deadline {
            tokio::time::sleep(interval).await;
            message = self.store.get_field(&key, Field::Message).await?;
        }

        match message {
            Some(payload) => {
                self.store.delete_field(&key, Field::Message, false).await?;
                self.store
                    .set_fields(
                        &key,
                        vec![
                            (Field::PickupTime, wallclock()),
                            (
                                Field::FastPollsLeft,
                                self.timings.allowed_fast_polls.to_string().into_bytes(),
                            ),
                        ],
                    )
                    .await?;
                debug!(channel, slot = %kind, bytes = payload.len(), "out of dequeue");
                Ok(Some(payload))
            }
            None => {
                debug!(
                    channel,
                    slot = %kind,
                    polling_secs = interval.as_secs_f64(),
                    "dequeue timed out"
                );
                Ok(None)
            }
        }
    }

    /// Snapshot of every live slot's metadata, for status introspection.
    /// Message payloads render as JSON when they parse, as text otherwise.
    pub async fn snapshot(&self) -> Result<Value> {
        let mut channels: BTreeMap<String, BTreeMap<&'static str, Value>> = BTreeMap::new();
        for key in self.store.channels().await? {
            let fields = self.store.fields(&key).await?;
            let mut slot = serde_json::Map::new();
            for (name, raw) in fields {
                let rendered = if name == Field::Message.as_str() {
                    serde_json::from_slice(&raw)
                        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw).into_owned()))
                } else {
                    Value::String(String::from_utf8_lossy(&raw).into_owned())
                };
                slot.insert(name, rendered);
            }
            channels
                .entry(key.channel().to_string())
                .or_default()
                .insert(key.kind().as_str(), Value::Object(slot));
        }
        Ok(json!(channels))
    }

    /// Cross-slot rule: a new request may not be posted over an unconsumed
    /// reply. Strict mode fails; relaxed mode drops the stale reply so a
    /// restarted kernel can carry on.
    async fn reclaim_reply_slot(&self, channel: &str) -> Result<()> {
        let reply = SlotKey::new(channel, SlotKind::Reply);
        let Some(stale) = self.store.get_field(&reply, Field::Message).await? else {
            return Ok(());
        };

        match self.policy {
            HandoffPolicy::Strict => Err(BridgeError::ProtocolViolation(channel.to_string())),
            HandoffPolicy::Relaxed => {
                warn!(
                    channel,
                    stale_bytes = stale.len(),
                    "reply not picked up before new request; dropping it"
                );
                self.store.delete_field(&reply, Field::Message, false).await?;
                Ok(())
            }
        }
    }

    /// Adaptive cadence: each dequeue burns one unit of the fast-poll
    /// allowance; once it is gone the waiter drops to the slow interval
    /// until a successful pickup refills the allowance. Zombie pollers
    /// (abandoned browser sessions keep long-polling on behalf of nobody)
    /// are capped at the slow rate, so legitimate channels keep the store
    /// bandwidth.
    async fn polling_interval(&self, key: &SlotKey) -> Result<Duration> {
        let fast_polls_left = match self.store.get_field(key, Field::FastPollsLeft).await? {
            Some(raw) => String::from_utf8_lossy(&raw)
                .trim()
                .parse::<i64>()
                .unwrap_or(self.timings.allowed_fast_polls),
            None => self.timings.allowed_fast_polls,
        };

        if fast_polls_left > 0 {
            self.store
                .set_fields(
                    key,
                    vec![(
                        Field::FastPollsLeft,
                        (fast_polls_left - 1).to_string().into_bytes(),
                    )],
                )
                .await?;
            Ok(self.timings.fast_poll)
        } else {
            Ok(self.timings.slow_poll)
        }
    }
}

fn wallclock() -> Vec<u8> {
    Utc::now().to_rfc3339().into_bytes()
}
