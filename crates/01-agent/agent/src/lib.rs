//! Host-independent core of the pageview tracking agent.
//!
//! The agent watches a page for navigations, builds a [`PageviewEvent`] for
//! each one and hands it to a [`TransportChain`] that tries Beacon, Request and
//! Pixel delivery in that order. Page code talks to the agent through a
//! [`CommandQueue`] that buffers commands until the agent is installed and
//! dispatches them directly afterwards.
//!
//! Browser access goes through three traits so the same logic runs in wasm
//! and in native tests:
//! * [`PageContext`] – live location/referrer reads.
//! * [`TransportHost`] – beacon, text POST and image-request primitives.
//! * [`NavigationSource`] – load, `pushState` and `popstate` hooks.
//!
//! Nothing here ever surfaces an error to the host page: exhausted transports
//! drop the event and report through an optional [`FailureHook`].

mod agent;
pub mod config;
mod error;
pub mod event;
pub mod navigation;
pub mod queue;
pub mod record;
pub mod transport;

pub use agent::{Agent, ConfigObserver, FailureHook, PushOutcome};
pub use config::{Config, DEFAULT_ENDPOINT};
pub use error::{
    AgentError, AgentResult, CommandError, ConfigError, HostError, HostResult, TransportError,
};
pub use event::{PageContext, PageviewEvent, PageviewOverrides, ReadyState};
pub use navigation::{NavigationSignal, NavigationSource, NavigationWatcher};
pub use queue::{Command, CommandQueue, Enqueued};
pub use record::{pageviews_path, PageviewRecord};
pub use transport::{
    pixel_url, DeliveryOutcome, DeliveryReport, TransportChain, TransportHost, TransportKind,
    REQUEST_CONTENT_TYPE,
};
