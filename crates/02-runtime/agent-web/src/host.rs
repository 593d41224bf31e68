//! `web-sys` implementation of the agent host traits.

use std::rc::Rc;

use js_sys::{Function, Reflect};
use updog_agent::{
    HostError, HostResult, NavigationSource, PageContext, ReadyState, TransportHost,
    TransportKind,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, Document, Event, HtmlImageElement, Window, XmlHttpRequest};

use crate::WRAPPED_MARKER;

pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    /// Binds to the page's global `window`, if there is one.
    pub fn from_global() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

fn js_err(err: JsValue) -> HostError {
    HostError::call(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn has_property(target: &JsValue, name: &str) -> bool {
    Reflect::get(target, &JsValue::from_str(name))
        .map(|value| !value.is_undefined() && !value.is_null())
        .unwrap_or(false)
}

impl PageContext for WebHost {
    fn hostname(&self) -> String {
        self.window.location().hostname().unwrap_or_default()
    }

    fn pathname(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn referrer(&self) -> String {
        self.document.referrer()
    }

    fn ready_state(&self) -> ReadyState {
        let state = Reflect::get(&self.document, &JsValue::from_str("readyState"))
            .ok()
            .and_then(|value| value.as_string())
            .unwrap_or_default();
        ReadyState::parse(&state)
    }
}

impl TransportHost for WebHost {
    fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Beacon => has_property(self.window.navigator().as_ref(), "sendBeacon"),
            TransportKind::Request => has_property(self.window.as_ref(), "XMLHttpRequest"),
            TransportKind::Pixel => has_property(self.window.as_ref(), "Image"),
        }
    }

    fn send_beacon(&self, url: &str, body: &str) -> HostResult<bool> {
        self.window
            .navigator()
            .send_beacon_with_opt_str(url, Some(body))
            .map_err(js_err)
    }

    fn post_text(&self, url: &str, body: &str, content_type: &str) -> HostResult<()> {
        let xhr = XmlHttpRequest::new().map_err(js_err)?;
        xhr.open_with_async("POST", url, true).map_err(js_err)?;
        xhr.set_request_header("Content-Type", content_type)
            .map_err(js_err)?;
        xhr.send_with_opt_str(Some(body)).map_err(js_err)
    }

    fn request_image(&self, url: &str) -> HostResult<()> {
        let img = HtmlImageElement::new().map_err(js_err)?;
        img.set_src(url);
        Ok(())
    }
}

impl NavigationSource for WebHost {
    fn on_load(&self, callback: Box<dyn FnOnce()>) -> HostResult<()> {
        let listener = Closure::once_into_js(move || callback());
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        self.window
            .add_event_listener_with_callback_and_add_event_listener_options(
                "load",
                listener.unchecked_ref(),
                &options,
            )
            .map_err(js_err)
    }

    fn wrap_push_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()> {
        let history = self.window.history().map_err(js_err)?;
        let key = JsValue::from_str("pushState");
        let original: Function = Reflect::get(&history, &key)
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| HostError::Unavailable("history.pushState"))?;

        let marker = JsValue::from_str(WRAPPED_MARKER);
        if Reflect::get(&original, &marker)
            .map(|value| value.is_truthy())
            .unwrap_or(false)
        {
            return Err(HostError::AlreadyPatched);
        }

        let target = history.clone();
        let wrapper = Closure::wrap(Box::new(
            move |state: JsValue, title: JsValue, url: JsValue| -> Result<JsValue, JsValue> {
                // Host exceptions propagate to the caller untouched; no pageview then.
                let ret = original.call3(&target, &state, &title, &url)?;
                callback();
                Ok(ret)
            },
        )
            as Box<dyn FnMut(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>)
        .into_js_value();

        Reflect::set(&wrapper, &marker, &JsValue::TRUE).map_err(js_err)?;
        Reflect::set(&history, &key, &wrapper).map_err(js_err)?;
        Ok(())
    }

    fn on_pop_state(&self, callback: Rc<dyn Fn()>) -> HostResult<()> {
        let listener = Closure::wrap(Box::new(move |_event: Event| callback()) as Box<dyn FnMut(Event)>);
        self.window
            .add_event_listener_with_callback("popstate", listener.as_ref().unchecked_ref())
            .map_err(js_err)?;
        // Lives for the rest of the page.
        listener.forget();
        Ok(())
    }
}
