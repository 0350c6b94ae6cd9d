//! Page-provided animation sequencer.

use factorlock_core::{AnimationSequencer, SecurityViolation};
use js_sys::{Array, Function, Reflect};
use log::{error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

const PLAY_SUCCESS: &str = "playSuccessSequence";
const PLAY_VIOLATION: &str = "playSecurityViolation";
const HIDE: &str = "hide";

/// [`AnimationSequencer`] backed by a JS object with `playSuccessSequence`,
/// `playSecurityViolation` and `hide` methods.
///
/// A missing method or a throwing call is logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct JsSequencer {
    target: JsValue,
}

impl JsSequencer {
    /// Wraps `target`.
    ///
    /// # Errors
    /// Returns an error when `target` is not an object.
    pub fn new(target: JsValue) -> Result<Self, JsValue> {
        if !target.is_object() {
            return Err(JsValue::from_str("sequencer must be an object"));
        }
        Ok(Self { target })
    }

    fn call(&self, name: &str, args: &[JsValue]) {
        let method = match Reflect::get(&self.target, &JsValue::from_str(name)) {
            Ok(value) => value,
            Err(err) => {
                error!("sequencer.{name} lookup failed: {err:?}");
                return;
            }
        };
        let Ok(method) = method.dyn_into::<Function>() else {
            warn!("sequencer has no {name} method");
            return;
        };
        let args = args.iter().collect::<Array>();
        if let Err(err) = method.apply(&self.target, &args) {
            error!("sequencer.{name} threw: {err:?}");
        }
    }
}

impl AnimationSequencer for JsSequencer {
    fn play_success_sequence(&self, user_label: Option<String>) {
        let label = user_label.map_or(JsValue::NULL, |label| JsValue::from_str(&label));
        self.call(PLAY_SUCCESS, &[label]);
    }

    fn play_security_violation(&self, violation: &SecurityViolation) {
        let details = serde_wasm_bindgen::to_value(violation).unwrap_or_else(|err| {
            error!("failed to convert violation details: {err}");
            JsValue::NULL
        });
        self.call(
            PLAY_VIOLATION,
            &[details, JsValue::from_str(&violation.message())],
        );
    }

    fn hide(&self) {
        self.call(HIDE, &[]);
    }
}
