use std::fmt;

/// The two mailboxes of a channel. Requests flow kernel -> browser,
/// replies flow browser -> kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Request,
    Reply,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Request => "request",
            SlotKind::Reply => "reply",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a slot hash. The string names are the wire format shared with
/// the historical deployment, so a mixed fleet can point at one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Message,
    PostedTime,
    PickupWait,
    PickupTime,
    /// Adaptive polling allowance. The name is historical; the counter is
    /// kept on whichever slot is being dequeued.
    FastPollsLeft,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Message => "message",
            Field::PostedTime => "posted_time",
            Field::PickupWait => "pickup_wait",
            Field::PickupTime => "pickup_time",
            Field::FastPollsLeft => "reply_fast_polls_left",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addresses one mailbox of one channel. Renders as `<channel>:<slot>`,
/// which is the store key layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    channel: String,
    kind: SlotKind,
}

impl SlotKey {
    pub fn new(channel: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            channel: channel.into(),
            kind,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Parse a store key back into a slot address. Splits on the last `:`
    /// so channel ids containing colons survive the round trip.
    pub fn parse(raw: &str) -> Option<Self> {
        let (channel, kind) = raw.rsplit_once(':')?;
        let kind = match kind {
            "request" => SlotKind::Request,
            "reply" => SlotKind::Reply,
            _ => return None,
        };
        Some(Self::new(channel, kind))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.kind)
    }
}
