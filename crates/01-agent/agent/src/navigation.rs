//! Navigation signal source and the one-shot watcher that subscribes to it.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{AgentError, AgentResult, HostResult};
use crate::event::PageContext;

/// A navigation the agent reports as a pageview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationSignal {
    InitialLoad,
    PushState,
    PopState,
}

/// Host hooks the watcher subscribes to.
pub trait NavigationSource: PageContext {
    /// Registers a one-shot handler for the page's load-complete signal.
    fn on_load(&self, callback: Box<dyn FnOnce()>) -> HostResult<()>;

    /// Wraps the history push API.
    ///
    /// The wrapper must forward the caller's arguments to the original
    /// implementation first and invoke `callback` only after that returns. If
    /// the original throws, the exception reaches the caller and `callback`
    /// does not run.
    fn wrap_push_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()>;

    /// Registers a handler that runs on every back/forward navigation.
    fn on_pop_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()>;
}

/// Installs navigation hooks at most once.
#[derive(Debug, Default)]
pub struct NavigationWatcher {
    installed: Cell<bool>,
}

impl NavigationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }

    /// Subscribes `sink` to every navigation signal of `source`.
    ///
    /// A second call returns [`AgentError::AlreadyInstalled`] without touching
    /// the host. A host failure part way through leaves the watcher marked as
    /// installed so hooks that did register are never doubled by a retry.
    pub fn install<S, F>(&self, source: &S, sink: F) -> AgentResult<()>
    where
        S: NavigationSource + ?Sized,
        F: Fn(NavigationSignal) + 'static,
    {
        if self.installed.replace(true) {
            return Err(AgentError::AlreadyInstalled("navigation watcher"));
        }
        let sink: Rc<dyn Fn(NavigationSignal)> = Rc::new(sink);

        if source.ready_state().is_complete() {
            log::trace!("document already complete, reporting initial load");
            sink(NavigationSignal::InitialLoad);
        } else {
            let on_load = Rc::clone(&sink);
            source.on_load(Box::new(move || on_load(NavigationSignal::InitialLoad)))?;
        }

        let on_push = Rc::clone(&sink);
        source.wrap_push_state(Rc::new(move || on_push(NavigationSignal::PushState)))?;

        let on_pop = sink;
        source.on_pop_state(Rc::new(move || on_pop(NavigationSignal::PopState)))?;

        log::debug!("navigation watcher installed");
        Ok(())
    }
}
