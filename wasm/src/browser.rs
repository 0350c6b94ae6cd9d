//! Browser implementations of the core's platform traits.

use factorlock_core::logger::{LogLevel, Logger};
use factorlock_core::storage::{StateStore, StorageError, StorageResult};
use factorlock_core::Navigator;
use log::error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Which Web Storage area a [`BrowserStore`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// `window.localStorage`: durable per origin, shared by tabs.
    Local,
    /// `window.sessionStorage`: per tab, cleared when the tab closes.
    Session,
}

/// `StateStore` over Web Storage.
///
/// The storage handle is looked up on every call; nothing JS-side is held.
#[derive(Debug, Clone, Copy)]
pub struct BrowserStore {
    kind: StorageKind,
}

impl BrowserStore {
    /// Store over `localStorage`.
    #[must_use]
    pub const fn local() -> Self {
        Self {
            kind: StorageKind::Local,
        }
    }

    /// Store over `sessionStorage`.
    #[must_use]
    pub const fn session() -> Self {
        Self {
            kind: StorageKind::Session,
        }
    }

    fn storage(self) -> StorageResult<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no global window".to_string()))?;
        let storage = match self.kind {
            StorageKind::Local => window.local_storage(),
            StorageKind::Session => window.session_storage(),
        }
        .map_err(|err| StorageError::Unavailable(format!("{err:?}")))?;
        storage.ok_or_else(|| {
            StorageError::Unavailable(format!("{:?} storage is disabled", self.kind))
        })
    }
}

impl StateStore for BrowserStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.storage()?
            .get_item(key)
            .map(|value| value.map(String::into_bytes))
            .map_err(|err| StorageError::Read(format!("{err:?}")))
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let value = std::str::from_utf8(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.storage()?
            .set_item(key, value)
            .map_err(|err| StorageError::Write(format!("{err:?}")))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage()?
            .remove_item(key)
            .map_err(|err| StorageError::Write(format!("{err:?}")))
    }
}

/// Redirects through `window.location` after a `setTimeout`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn redirect_after(&self, location: &str, delay_ms: u64) {
        let Some(window) = web_sys::window() else {
            error!("cannot redirect to {location}: no global window");
            return;
        };
        let target = location.to_string();
        let callback = Closure::once_into_js(move || {
            if let Some(window) = web_sys::window() {
                if let Err(err) = window.location().set_href(&target) {
                    error!("redirect to {target} failed: {err:?}");
                }
            }
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        if let Err(err) = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            error!("failed to schedule redirect to {location}: {err:?}");
        }
    }
}

/// Forwards core log records to the browser console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: String) {
        let message = JsValue::from_str(&format!("[factorlock] {message}"));
        match level {
            LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&message),
            LogLevel::Info => web_sys::console::info_1(&message),
            LogLevel::Warn => web_sys::console::warn_1(&message),
            LogLevel::Error => web_sys::console::error_1(&message),
        }
    }
}
