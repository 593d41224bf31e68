//! Browser runtime for the pageview agent (wasm32 only).
//!
//! Loading the module starts the agent: commands already pushed onto
//! `window.updog` are drained in order, `window.updog.push` becomes a direct
//! dispatcher, and navigation hooks are installed. Nothing here throws into
//! the host page.

/// Page-global array page code pushes commands onto.
pub const GLOBAL_QUEUE: &str = "updog";
/// Property set on the installed `pushState` wrapper so it is never wrapped twice.
pub const WRAPPED_MARKER: &str = "__updogWrapped";

#[cfg(target_arch = "wasm32")]
mod console;
#[cfg(target_arch = "wasm32")]
mod global;
#[cfg(target_arch = "wasm32")]
mod host;


#[cfg(target_arch = "wasm32")]
pub use host::WebHost;

#[cfg(target_arch = "wasm32")]
pub use wasm::{updog_on_failure, updog_start};

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;

    use js_sys::{Array, Function, JSON};
    use updog_agent::{Agent, Config};
    use wasm_bindgen::prelude::*;

    use crate::host::WebHost;
    use crate::{console, global};

    thread_local! {
        static AGENT: RefCell<Option<Rc<Agent<WebHost>>>> = RefCell::new(None);
    }

    // Test builds drive the pieces by hand instead of booting on load.
    #[cfg_attr(not(test), wasm_bindgen(start))]
    pub fn updog_start() {
        if let Err(err) = boot() {
            log::debug!("agent not started: {err:?}");
        }
    }

    fn boot() -> Result<(), JsValue> {
        if AGENT.with(|slot| slot.borrow().is_some()) {
            return Ok(());
        }
        let host = WebHost::from_global().ok_or_else(|| JsValue::from_str("no window"))?;
        let (queue, pending) = global::take_pending(host.window());

        let agent = Rc::new(Agent::with_pending(host, Config::default(), pending));
        agent.set_config_observer(|config| console::set_debug(config.debug));

        let weak = Rc::downgrade(&agent);
        global::install_push(&queue, move |cmd| {
            if let Some(agent) = weak.upgrade() {
                agent.push(cmd);
            }
        })?;

        AGENT.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&agent)));
        agent
            .start()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(())
    }

    /// Registers `callback(event, reasons)` for pageviews no transport could
    /// deliver. Exceptions thrown by the callback are swallowed.
    #[wasm_bindgen]
    pub fn updog_on_failure(callback: Function) {
        AGENT.with(|slot| {
            let Some(agent) = slot.borrow().as_ref().map(Rc::clone) else {
                return;
            };
            agent.set_failure_hook(move |event, failures| {
                let payload = event
                    .to_json()
                    .ok()
                    .and_then(|json| JSON::parse(&json).ok())
                    .unwrap_or(JsValue::NULL);
                let reasons: Array = failures
                    .iter()
                    .map(|failure| JsValue::from_str(&failure.to_string()))
                    .collect();
                let _ = callback.call2(&JsValue::NULL, &payload, &reasons);
            });
        });
    }
}
