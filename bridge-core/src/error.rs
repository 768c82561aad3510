use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Channel {0} contains unprocessed message")]
    SlotOccupied(String),

    #[error("Reply on channel {0} was not picked up before new request")]
    ProtocolViolation(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
