//! Recording in-memory host for agent tests.
//!
//! `MockHost` is a cheap handle over shared state, so a test can move one clone
//! into an [`Agent`](updog_agent::Agent) and keep another to drive navigations
//! and inspect what was sent.

use std::cell::RefCell;
use std::rc::Rc;

use updog_agent::{
    HostError, HostResult, NavigationSource, PageContext, ReadyState, TransportHost,
    TransportKind,
};

/// One network request issued through the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Beacon {
        url: String,
        body: String,
    },
    Request {
        url: String,
        body: String,
        content_type: String,
    },
    Image {
        url: String,
    },
}

impl Sent {
    pub fn kind(&self) -> TransportKind {
        match self {
            Sent::Beacon { .. } => TransportKind::Beacon,
            Sent::Request { .. } => TransportKind::Request,
            Sent::Image { .. } => TransportKind::Pixel,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Sent::Beacon { url, .. } | Sent::Request { url, .. } | Sent::Image { url } => url,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Sent::Beacon { body, .. } | Sent::Request { body, .. } => Some(body),
            Sent::Image { .. } => None,
        }
    }
}

/// Which host APIs exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub beacon: bool,
    pub request: bool,
    pub pixel: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        beacon: true,
        request: true,
        pixel: true,
    };

    pub const PIXEL_ONLY: Capabilities = Capabilities {
        beacon: false,
        request: false,
        pixel: true,
    };

    pub const NONE: Capabilities = Capabilities {
        beacon: false,
        request: false,
        pixel: false,
    };

    fn has(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Beacon => self.beacon,
            TransportKind::Request => self.request,
            TransportKind::Pixel => self.pixel,
        }
    }
}

/// How available APIs misbehave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    /// `sendBeacon` returns `false`.
    pub beacon_refuses: bool,
    /// `sendBeacon` throws.
    pub beacon_throws: bool,
    pub request_throws: bool,
    pub image_throws: bool,
    /// The underlying `pushState` throws.
    pub push_state_throws: bool,
}

struct State {
    caps: Capabilities,
    faults: Faults,
    hostname: String,
    pathname: String,
    referrer: String,
    ready_state: ReadyState,
    sent: Vec<Sent>,
    attempts: Vec<TransportKind>,
    history: Vec<String>,
    load_hooks: Vec<Box<dyn FnOnce()>>,
    push_hook: Option<Rc<dyn Fn()>>,
    pop_hooks: Vec<Rc<dyn Fn()>>,
}

#[derive(Clone)]
pub struct MockHost {
    state: Rc<RefCell<State>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new("example.com", "/")
    }
}

impl MockHost {
    /// A fully loaded page with every transport available.
    pub fn new(hostname: &str, pathname: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                caps: Capabilities::ALL,
                faults: Faults::default(),
                hostname: hostname.to_owned(),
                pathname: pathname.to_owned(),
                referrer: String::new(),
                ready_state: ReadyState::Complete,
                sent: Vec::new(),
                attempts: Vec::new(),
                history: Vec::new(),
                load_hooks: Vec::new(),
                push_hook: None,
                pop_hooks: Vec::new(),
            })),
        }
    }

    pub fn with_capabilities(self, caps: Capabilities) -> Self {
        self.state.borrow_mut().caps = caps;
        self
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.state.borrow_mut().faults = faults;
        self
    }

    pub fn with_referrer(self, referrer: &str) -> Self {
        self.state.borrow_mut().referrer = referrer.to_owned();
        self
    }

    pub fn with_ready_state(self, ready_state: ReadyState) -> Self {
        self.state.borrow_mut().ready_state = ready_state;
        self
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.borrow_mut().faults = faults;
    }

    pub fn set_path(&self, pathname: &str) {
        self.state.borrow_mut().pathname = pathname.to_owned();
    }

    /// Every request that reached the network, in order.
    pub fn sent(&self) -> Vec<Sent> {
        self.state.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// Every send primitive invoked, including ones that failed.
    pub fn attempts(&self) -> Vec<TransportKind> {
        self.state.borrow().attempts.clone()
    }

    /// URLs forwarded to the underlying history API.
    pub fn history(&self) -> Vec<String> {
        self.state.borrow().history.clone()
    }

    pub fn pending_load_hooks(&self) -> usize {
        self.state.borrow().load_hooks.len()
    }

    pub fn pop_hooks(&self) -> usize {
        self.state.borrow().pop_hooks.len()
    }

    pub fn push_wrapped(&self) -> bool {
        self.state.borrow().push_hook.is_some()
    }

    /// Completes loading and runs the one-shot load handlers.
    pub fn fire_load(&self) {
        let hooks = {
            let mut state = self.state.borrow_mut();
            state.ready_state = ReadyState::Complete;
            std::mem::take(&mut state.load_hooks)
        };
        for hook in hooks {
            hook();
        }
    }

    /// Page code calling `history.pushState(null, "", url)`.
    pub fn push_state(&self, url: &str) -> HostResult<()> {
        let hook = {
            let mut state = self.state.borrow_mut();
            if state.faults.push_state_throws {
                return Err(HostError::call("SecurityError: pushState denied"));
            }
            state.history.push(url.to_owned());
            state.pathname = url.to_owned();
            state.push_hook.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    /// Browser back/forward landing on `pathname`.
    pub fn pop_state(&self, pathname: &str) {
        let hooks = {
            let mut state = self.state.borrow_mut();
            state.pathname = pathname.to_owned();
            state.pop_hooks.clone()
        };
        for hook in hooks {
            hook();
        }
    }

    fn record_attempt(&self, kind: TransportKind) -> Faults {
        let mut state = self.state.borrow_mut();
        state.attempts.push(kind);
        state.faults
    }

    fn record_sent(&self, sent: Sent) {
        self.state.borrow_mut().sent.push(sent);
    }
}

impl PageContext for MockHost {
    fn hostname(&self) -> String {
        self.state.borrow().hostname.clone()
    }

    fn pathname(&self) -> String {
        self.state.borrow().pathname.clone()
    }

    fn referrer(&self) -> String {
        self.state.borrow().referrer.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }
}

impl TransportHost for MockHost {
    fn supports(&self, kind: TransportKind) -> bool {
        self.state.borrow().caps.has(kind)
    }

    fn send_beacon(&self, url: &str, body: &str) -> HostResult<bool> {
        let faults = self.record_attempt(TransportKind::Beacon);
        if faults.beacon_throws {
            return Err(HostError::call("TypeError: sendBeacon failed"));
        }
        if faults.beacon_refuses {
            return Ok(false);
        }
        self.record_sent(Sent::Beacon {
            url: url.to_owned(),
            body: body.to_owned(),
        });
        Ok(true)
    }

    fn post_text(&self, url: &str, body: &str, content_type: &str) -> HostResult<()> {
        let faults = self.record_attempt(TransportKind::Request);
        if faults.request_throws {
            return Err(HostError::call("InvalidStateError: open failed"));
        }
        self.record_sent(Sent::Request {
            url: url.to_owned(),
            body: body.to_owned(),
            content_type: content_type.to_owned(),
        });
        Ok(())
    }

    fn request_image(&self, url: &str) -> HostResult<()> {
        let faults = self.record_attempt(TransportKind::Pixel);
        if faults.image_throws {
            return Err(HostError::call("Image constructor unavailable"));
        }
        self.record_sent(Sent::Image {
            url: url.to_owned(),
        });
        Ok(())
    }
}

impl NavigationSource for MockHost {
    fn on_load(&self, callback: Box<dyn FnOnce()>) -> HostResult<()> {
        self.state.borrow_mut().load_hooks.push(callback);
        Ok(())
    }

    fn wrap_push_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()> {
        let mut state = self.state.borrow_mut();
        if state.push_hook.is_some() {
            return Err(HostError::AlreadyPatched);
        }
        state.push_hook = Some(callback);
        Ok(())
    }

    fn on_pop_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()> {
        self.state.borrow_mut().pop_hooks.push(callback);
        Ok(())
    }
}
