//! WebAssembly bindings for `factorlock_core`.
//!
//! This crate exposes the validation controller to browser pages through
//! `wasm-bindgen`. Durable state lives in `localStorage`, session state in
//! `sessionStorage`; the page supplies the animation sequencer as a plain JS
//! object and redirects happen through `window.setTimeout`.
//!
//! Everything here is browser-only; on other targets the crate is empty.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod browser;
#[cfg(target_arch = "wasm32")]
mod sequencer;

#[cfg(target_arch = "wasm32")]
pub use bindings::*;
#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserNavigator, BrowserStore, ConsoleLogger, StorageKind};
#[cfg(target_arch = "wasm32")]
pub use sequencer::JsSequencer;
