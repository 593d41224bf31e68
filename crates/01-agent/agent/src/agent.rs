use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::config::Config;
use crate::error::{AgentResult, TransportError};
use crate::event::{PageContext, PageviewEvent, PageviewOverrides};
use crate::navigation::{NavigationSignal, NavigationSource, NavigationWatcher};
use crate::queue::{Command, CommandQueue, Enqueued};
use crate::transport::{DeliveryOutcome, DeliveryReport, TransportHost};

/// Called once per event that no strategy could deliver.
pub type FailureHook = Rc<dyn Fn(&PageviewEvent, &[TransportError])>;
/// Called after every `config` command with the merged config.
pub type ConfigObserver = Rc<dyn Fn(&Config)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    Dispatched,
}

/// Tracking agent bound to one page.
///
/// Single-threaded: all state sits behind `RefCell` and borrows are released
/// before any host or user callback runs, so callbacks may re-enter the agent.
pub struct Agent<H> {
    host: H,
    config: RefCell<Config>,
    queue: RefCell<CommandQueue>,
    watcher: NavigationWatcher,
    on_failure: RefCell<Option<FailureHook>>,
    on_config: RefCell<Option<ConfigObserver>>,
}

impl<H> Agent<H>
where
    H: PageContext + TransportHost,
{
    pub fn new(host: H, config: Config) -> Self {
        Self::with_queue(host, config, CommandQueue::new())
    }

    /// Creates an agent whose queue already holds commands pushed by page code.
    pub fn with_pending(host: H, config: Config, pending: Vec<Command>) -> Self {
        Self::with_queue(host, config, CommandQueue::with_pending(pending))
    }

    fn with_queue(host: H, config: Config, queue: CommandQueue) -> Self {
        Self {
            host,
            config: RefCell::new(config),
            queue: RefCell::new(queue),
            watcher: NavigationWatcher::new(),
            on_failure: RefCell::new(None),
            on_config: RefCell::new(None),
        }
    }

    pub fn config(&self) -> Config {
        self.config.borrow().clone()
    }

    pub fn buffered_len(&self) -> usize {
        self.queue.borrow().buffered_len()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_installed()
    }

    pub fn set_failure_hook(&self, hook: impl Fn(&PageviewEvent, &[TransportError]) + 'static) {
        *self.on_failure.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn set_config_observer(&self, observer: impl Fn(&Config) + 'static) {
        *self.on_config.borrow_mut() = Some(Rc::new(observer));
    }

    /// Queue entry point shared by page code and navigation hooks.
    pub fn push(&self, cmd: Command) -> PushOutcome {
        let enqueued = self.queue.borrow_mut().push(cmd);
        match enqueued {
            Enqueued::Buffered => PushOutcome::Buffered,
            Enqueued::Dispatch(cmd) => {
                self.dispatch(cmd);
                PushOutcome::Dispatched
            }
        }
    }

    /// Parses a JSON command tuple and pushes it.
    pub fn push_value(&self, value: &Value) -> AgentResult<PushOutcome> {
        let cmd = Command::from_value(value)?;
        Ok(self.push(cmd))
    }

    /// Drains buffered commands in order and switches the queue to direct
    /// dispatch. Returns how many commands the drain dispatched.
    pub fn install_queue(&self) -> AgentResult<usize> {
        self.queue.borrow_mut().begin_drain()?;
        let mut drained = 0;
        loop {
            let next = self.queue.borrow_mut().next_drained();
            let Some(cmd) = next else { break };
            self.dispatch(cmd);
            drained += 1;
        }
        log::debug!("command queue drained {drained} command(s), now direct");
        Ok(drained)
    }

    pub fn dispatch(&self, cmd: Command) {
        log::trace!("dispatching {} command", cmd.kind());
        match cmd {
            Command::Pageview(overrides) => {
                self.track(overrides);
            }
            Command::Config(patch) => {
                let merged = {
                    let mut config = self.config.borrow_mut();
                    // Rejected keys are logged by `merge`; the rest still apply.
                    let _ = config.merge(&patch);
                    config.clone()
                };
                let observer = self.on_config.borrow().clone();
                if let Some(observer) = observer {
                    observer(&merged);
                }
            }
        }
    }

    /// Builds the event from the page now and delivers it.
    pub fn track(&self, overrides: PageviewOverrides) -> DeliveryReport {
        let event = overrides.resolve(&self.host);
        self.deliver(&event)
    }

    pub fn deliver(&self, event: &PageviewEvent) -> DeliveryReport {
        let (endpoint, chain) = {
            let config = self.config.borrow();
            (config.endpoint.clone(), config.transport_chain())
        };
        let report = chain.deliver(&self.host, &endpoint, event);

        if report.outcome == DeliveryOutcome::Failed {
            log::debug!("dropping pageview {}: all transports exhausted", event.path);
            let hook = self.on_failure.borrow().clone();
            if let Some(hook) = hook {
                hook(event, &report.failures);
            }
        }
        report
    }
}

impl<H> Agent<H>
where
    H: PageContext + TransportHost + NavigationSource + 'static,
{
    /// Subscribes to navigation signals; each one enqueues a pageview.
    pub fn watch(self: &Rc<Self>) -> AgentResult<()> {
        let agent = Rc::downgrade(self);
        self.watcher.install(&self.host, move |signal: NavigationSignal| {
            if let Some(agent) = agent.upgrade() {
                log::trace!("navigation signal {signal:?}");
                agent.push(Command::pageview());
            }
        })
    }

    /// Drains the queue, then starts watching navigation.
    pub fn start(self: &Rc<Self>) -> AgentResult<usize> {
        let drained = self.install_queue()?;
        self.watch()?;
        Ok(drained)
    }
}
