//! WebAssembly bindings for the tracking-protection shim engine
//!
//! The JavaScript host (an extension background page) owns the event bus
//! and the request registry. It passes callbacks for both to [`init`],
//! forwards classifier events through [`on_before_block_channel`] and
//! [`on_stop_request`], and exposes the command surface to consumers.
//!
//! State lives in one per-thread engine: `init` is idempotent and
//! `teardown` drops everything so the next `init` starts fresh.

use std::cell::RefCell;

use js_sys::Function;
use wasm_bindgen::prelude::*;
use tp_core::{
    BlockedChannel, ChannelId, ChannelResolver, ClassifierEvent, EventHub, RequestHandle,
    RequestScope, Topic, TrackingProtection,
};

type Engine = TrackingProtection<JsEventHub, JsResolver>;

thread_local! {
    static ENGINE: RefCell<Option<Engine>> = RefCell::new(None);
}

// =============================================================================
// Host Adapters
// =============================================================================

/// Observer topic names as the host's event bus knows them.
pub fn topic_name(topic: Topic) -> &'static str {
    match topic {
        Topic::StopRequest => "http-on-stop-request",
        Topic::BeforeBlockChannel => "urlclassifier-before-block-channel",
    }
}

/// JS numbers carry ids; anything that is not a non-negative integer is rejected.
pub fn id_from_js(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

struct JsEventHub {
    add_listener: Function,
    remove_listener: Function,
}

impl JsEventHub {
    fn notify(callback: &Function, topic: Topic) {
        if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(topic_name(topic))) {
            log::warn!("listener callback for {} failed: {:?}", topic_name(topic), err);
        }
    }
}

impl EventHub for JsEventHub {
    fn add_listener(&mut self, topic: Topic) {
        Self::notify(&self.add_listener, topic);
    }

    fn remove_listener(&mut self, topic: Topic) {
        Self::notify(&self.remove_listener, topic);
    }
}

struct JsResolver {
    resolve: Function,
}

impl ChannelResolver for JsResolver {
    fn resolve_channel_id(&self, handle: RequestHandle, scope: &RequestScope) -> Option<ChannelId> {
        let result = self
            .resolve
            .call3(
                &JsValue::NULL,
                &JsValue::from(handle.0 as f64),
                &JsValue::from_str(&scope.consumer),
                &JsValue::from(scope.browser_id as f64),
            )
            .ok()?;
        result.as_f64().and_then(id_from_js)
    }
}

fn with_engine<T>(f: impl FnOnce(&mut Engine) -> T) -> Option<T> {
    ENGINE.with(|engine| engine.borrow_mut().as_mut().map(f))
}

fn not_initialized() -> JsValue {
    JsValue::from_str("Not initialized. Call init() first.")
}

// =============================================================================
// Console Logging
// =============================================================================

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}: {}", record.level(), record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Route engine logs to the browser console at `level` ("off" .. "trace").
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter: log::LevelFilter = level
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Unknown log level: {}", level)))?;
    // Installing twice is harmless; only the level changes
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
    Ok(())
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Create the engine. Calling it again while initialized does nothing.
#[wasm_bindgen]
pub fn init(add_listener: Function, remove_listener: Function, resolve_channel_id: Function) {
    ENGINE.with(|engine| {
        let mut engine = engine.borrow_mut();
        if engine.is_some() {
            return;
        }
        *engine = Some(TrackingProtection::new(
            JsEventHub {
                add_listener,
                remove_listener,
            },
            JsResolver {
                resolve: resolve_channel_id,
            },
        ));
    });
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE.with(|engine| engine.borrow().is_some())
}

/// Shut the engine down and drop all state.
#[wasm_bindgen]
pub fn teardown() {
    let engine = ENGINE.with(|engine| engine.borrow_mut().take());
    if let Some(mut engine) = engine {
        engine.shutdown();
    }
}

#[wasm_bindgen]
pub fn get_state_info() -> JsValue {
    let result = js_sys::Object::new();
    let info = with_engine(|engine| {
        let manager = engine.manager();
        let consumers = js_sys::Array::new();
        for id in manager.consumers() {
            consumers.push(&JsValue::from_str(id));
        }
        (manager.is_started(), consumers, manager.unblocked_count())
    });
    match info {
        Some((started, consumers, unblocked)) => {
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(true));
            let _ = js_sys::Reflect::set(&result, &"started".into(), &JsValue::from(started));
            let _ = js_sys::Reflect::set(&result, &"consumers".into(), &consumers);
            let _ = js_sys::Reflect::set(&result, &"unblocked".into(), &JsValue::from(unblocked as u32));
        }
        None => {
            let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(false));
        }
    }
    result.into()
}

// =============================================================================
// Command Surface
// =============================================================================

#[wasm_bindgen]
pub fn shim(consumer_id: &str, patterns: Vec<String>, not_hosts: Vec<String>) -> Result<(), JsValue> {
    with_engine(|engine| engine.shim(consumer_id, &patterns, &not_hosts))
        .ok_or_else(not_initialized)?
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn allow(consumer_id: &str, patterns: Vec<String>, hosts: Vec<String>) -> Result<(), JsValue> {
    with_engine(|engine| engine.allow(consumer_id, &patterns, &hosts))
        .ok_or_else(not_initialized)?
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn revoke(consumer_id: &str) {
    with_engine(|engine| engine.revoke(consumer_id));
}

#[wasm_bindgen]
pub fn was_request_unblocked(request_id: f64, consumer_id: &str, browser_id: f64) -> bool {
    let (handle, browser_id) = match (id_from_js(request_id), id_from_js(browser_id)) {
        (Some(handle), Some(browser_id)) => (RequestHandle(handle), browser_id),
        _ => return false,
    };
    let scope = RequestScope::new(consumer_id, browser_id);
    with_engine(|engine| engine.was_request_unblocked(handle, &scope)).unwrap_or(false)
}

// =============================================================================
// Host Events
// =============================================================================

/// Returns "replace", "allow", or `undefined` when the block stands.
#[wasm_bindgen]
pub fn on_before_block_channel(channel_id: f64, url: &str, top_level_url: &str) -> Option<String> {
    let channel_id = id_from_js(channel_id)?;
    let channel = BlockedChannel::new(channel_id, url, top_level_url);
    with_engine(|engine| engine.observe(ClassifierEvent::BeforeBlockChannel(&channel)))
        .flatten()
        .map(|verdict| verdict.as_str().to_string())
}

#[wasm_bindgen]
pub fn on_stop_request(channel_id: f64) {
    if let Some(channel_id) = id_from_js(channel_id) {
        with_engine(|engine| engine.observe(ClassifierEvent::RequestStopped { channel_id }));
    }
}
