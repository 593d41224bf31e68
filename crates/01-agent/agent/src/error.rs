use thiserror::Error;

use crate::transport::TransportKind;

pub type AgentResult<T> = Result<T, AgentError>;
pub type HostResult<T> = Result<T, HostError>;

/// Failure raised by a host primitive (browser API or test double).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host capability unavailable: {0}")]
    Unavailable(&'static str),

    #[error("host call failed: {0}")]
    Call(String),

    #[error("history.pushState is already wrapped")]
    AlreadyPatched,
}

impl HostError {
    pub fn call(msg: impl Into<String>) -> Self {
        HostError::Call(msg.into())
    }
}

/// Why a single strategy did not deliver an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{0} transport unavailable")]
    Unavailable(TransportKind),

    #[error("{0} transport disabled by config")]
    Disabled(TransportKind),

    #[error("{kind} transport rejected the event: {reason}")]
    Rejected { kind: TransportKind, reason: String },

    #[error("failed to encode event: {0}")]
    Encode(String),
}

impl TransportError {
    pub fn rejected(kind: TransportKind, reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            kind,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("config key `{key}` expects {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("unknown transport `{0}`")]
    UnknownTransport(String),
}

/// Malformed queue command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command must be a non-empty array starting with a kind string")]
    NotATuple,

    #[error("unknown command kind `{0}`")]
    UnknownKind(String),

    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("{0} already installed")]
    AlreadyInstalled(&'static str),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("command error: {0}")]
    Command(#[from] CommandError),
}
