//! Glue between the agent and the page-global command array.

use js_sys::{Array, Function, Reflect, JSON};
use updog_agent::Command;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::GLOBAL_QUEUE;

/// Takes every command page code pushed onto `window.updog` before the agent
/// loaded and empties the array. Creates the array when the page has none.
pub fn take_pending(window: &Window) -> (Array, Vec<Command>) {
    let key = JsValue::from_str(GLOBAL_QUEUE);
    let queue = match Reflect::get(window, &key) {
        Ok(value) if Array::is_array(&value) => value.unchecked_into::<Array>(),
        _ => {
            let fresh = Array::new();
            let _ = Reflect::set(window, &key, &fresh);
            fresh
        }
    };

    let pending = queue
        .iter()
        .filter_map(|item| match parse_command(&item) {
            Ok(cmd) => Some(cmd),
            Err(err) => {
                log::debug!("dropping malformed queued command: {err}");
                None
            }
        })
        .collect();
    queue.set_length(0);
    (queue, pending)
}

/// Body of the `push` replacement. `Array.prototype.push` is variadic, so every
/// argument is handed to `dispatch` in order. Returns the array length, which
/// stays zero once the agent is direct.
const PUSH_SHIM: &str = "return function () { \
    for (var i = 0; i < arguments.length; i++) { dispatch(arguments[i]); } \
    return queue.length; \
};";

/// Replaces `queue.push` with a function that parses and dispatches each
/// command immediately.
pub fn install_push<F>(queue: &Array, dispatch: F) -> Result<(), JsValue>
where
    F: Fn(Command) + 'static,
{
    let dispatch = Closure::wrap(Box::new(move |value: JsValue| {
        match parse_command(&value) {
            Ok(cmd) => dispatch(cmd),
            Err(err) => log::debug!("dropping malformed command: {err}"),
        }
    }) as Box<dyn FnMut(JsValue)>)
    .into_js_value();

    let push = Function::new_with_args("dispatch, queue", PUSH_SHIM).call2(
        &JsValue::NULL,
        &dispatch,
        queue,
    )?;
    Reflect::set(queue, &JsValue::from_str("push"), &push)?;
    Ok(())
}

fn parse_command(value: &JsValue) -> Result<Command, String> {
    let text = JSON::stringify(value)
        .map_err(|_| "command is not JSON-serializable".to_owned())?
        .as_string()
        .ok_or_else(|| "command is not JSON-serializable".to_owned())?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|err| err.to_string())?;
    Command::from_value(&json).map_err(|err| err.to_string())
}
