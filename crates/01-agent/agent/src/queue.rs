//! Pre-initialization command queue.
//!
//! Page code may push commands before the agent is attached. On install the
//! buffered commands are drained in order, after which every push is handed
//! straight back to the caller for synchronous dispatch. The transition
//! `Buffering -> Draining -> Direct` is one-way.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::error::{AgentError, AgentResult, CommandError};
use crate::event::PageviewOverrides;

pub const PAGEVIEW: &str = "pageview";
pub const CONFIG: &str = "config";

/// A `[kind, payload]` tuple accepted by the queue.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Pageview(PageviewOverrides),
    Config(Map<String, Value>),
}

impl Command {
    /// A pageview built entirely from the live page at dispatch time.
    pub fn pageview() -> Self {
        Command::Pageview(PageviewOverrides::default())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Pageview(_) => PAGEVIEW,
            Command::Config(_) => CONFIG,
        }
    }

    /// Parses the JSON tuple form, e.g. `["pageview", {"path": "/"}]`.
    pub fn from_value(value: &Value) -> Result<Self, CommandError> {
        let items = value.as_array().ok_or(CommandError::NotATuple)?;
        let (kind, rest) = items.split_first().ok_or(CommandError::NotATuple)?;
        let kind = kind.as_str().ok_or(CommandError::NotATuple)?;
        let payload = rest.first().unwrap_or(&Value::Null);

        match kind {
            PAGEVIEW => {
                if payload.is_null() {
                    return Ok(Command::pageview());
                }
                serde_json::from_value(payload.clone())
                    .map(Command::Pageview)
                    .map_err(|err| CommandError::InvalidPayload {
                        kind: PAGEVIEW,
                        reason: err.to_string(),
                    })
            }
            CONFIG => match payload {
                Value::Object(map) => Ok(Command::Config(map.clone())),
                _ => Err(CommandError::InvalidPayload {
                    kind: CONFIG,
                    reason: "expected an object".into(),
                }),
            },
            other => Err(CommandError::UnknownKind(other.to_owned())),
        }
    }
}

/// What the caller must do with a pushed command.
#[derive(Clone, Debug, PartialEq)]
pub enum Enqueued {
    /// Stored; it will be dispatched by the drain.
    Buffered,
    /// The queue is direct; dispatch this command now.
    Dispatch(Command),
}

#[derive(Debug)]
enum QueueState {
    Buffering(VecDeque<Command>),
    Draining(VecDeque<Command>),
    Direct,
}

#[derive(Debug)]
pub struct CommandQueue {
    state: QueueState,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            state: QueueState::Buffering(VecDeque::new()),
        }
    }

    /// Seeds the queue with commands captured before the agent existed.
    pub fn with_pending(pending: impl IntoIterator<Item = Command>) -> Self {
        Self {
            state: QueueState::Buffering(pending.into_iter().collect()),
        }
    }

    pub fn push(&mut self, cmd: Command) -> Enqueued {
        match &mut self.state {
            QueueState::Buffering(buf) | QueueState::Draining(buf) => {
                buf.push_back(cmd);
                Enqueued::Buffered
            }
            QueueState::Direct => Enqueued::Dispatch(cmd),
        }
    }

    /// Starts the one-time drain. Fails if a drain already started.
    pub fn begin_drain(&mut self) -> AgentResult<()> {
        match std::mem::replace(&mut self.state, QueueState::Direct) {
            QueueState::Buffering(buf) => {
                self.state = QueueState::Draining(buf);
                Ok(())
            }
            other => {
                self.state = other;
                Err(AgentError::AlreadyInstalled("command queue"))
            }
        }
    }

    /// Pops the next command of the drain. Returns `None` and switches to
    /// direct dispatch once the drain is empty.
    ///
    /// Commands pushed while draining land behind the ones already buffered.
    pub fn next_drained(&mut self) -> Option<Command> {
        let QueueState::Draining(buf) = &mut self.state else {
            return None;
        };
        let next = buf.pop_front();
        if next.is_none() {
            self.state = QueueState::Direct;
        }
        next
    }

    pub fn buffered_len(&self) -> usize {
        match &self.state {
            QueueState::Buffering(buf) | QueueState::Draining(buf) => buf.len(),
            QueueState::Direct => 0,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.state, QueueState::Direct)
    }
}
