//! `wasm-bindgen` surface of the validation controller.

use std::sync::Arc;

use factorlock_core::logger::set_logger;
use factorlock_core::{
    ControllerConfig, Factor, FactorLockError, UserId, ValidationController, ValidationResponse,
};
use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::browser::{BrowserNavigator, BrowserStore, ConsoleLogger};
use crate::sequencer::JsSequencer;

/// Routes core logs to the browser console. Later calls are ignored.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    set_logger(Arc::new(ConsoleLogger));
}

/// Page-side handle to the validation controller.
#[wasm_bindgen]
pub struct Controller(Arc<ValidationController>);

#[wasm_bindgen]
impl Controller {
    /// Loads state from `localStorage` and `sessionStorage`.
    ///
    /// When this tab already completed validation before a reload the success
    /// sequence is requested from `sequencer` before the constructor returns.
    ///
    /// # Errors
    /// Returns a stringified error when `sequencer` is not an object or
    /// `config_json` is not a valid configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(sequencer: JsValue, config_json: Option<String>) -> Result<Self, JsValue> {
        let config = match config_json {
            Some(json) => {
                ControllerConfig::from_json(&json).map_err(|err| error_to_jsvalue(&err))?
            }
            None => ControllerConfig::default(),
        };
        let controller = ValidationController::load(
            config,
            Arc::new(BrowserStore::local()),
            Arc::new(BrowserStore::session()),
            Arc::new(JsSequencer::new(sequencer)?),
            Arc::new(BrowserNavigator),
        );
        Ok(Self(Arc::new(controller)))
    }

    /// Reports a capture widget's verdict for `factor`.
    ///
    /// `user_id` may be a string, an integer or `null`. Unknown factor names are
    /// logged and ignored.
    #[wasm_bindgen(js_name = notifyFactorResult)]
    pub fn notify_factor_result(&self, factor: &str, success: bool, user_id: &JsValue) {
        self.0
            .notify_factor_result(factor, success, user_id_from_js(user_id));
    }

    /// Marks `factor` as not validated.
    ///
    /// # Errors
    /// Returns an error for an unknown factor name.
    pub fn invalidate(&self, factor: &str) -> Result<(), JsValue> {
        let factor = parse_factor(factor)?;
        self.0.set_validated(factor, false, None);
        Ok(())
    }

    /// Applies the JSON body returned by the validation endpoint for `factor`.
    ///
    /// # Errors
    /// Returns an error for an unknown factor name or a malformed body.
    #[wasm_bindgen(js_name = applyServerResponse)]
    pub fn apply_server_response(&self, factor: &str, json: &str) -> Result<(), JsValue> {
        let factor = parse_factor(factor)?;
        let response =
            ValidationResponse::from_json(json).map_err(|err| error_to_jsvalue(&err))?;
        self.0.apply_server_response(factor, &response);
        Ok(())
    }

    /// Must be called by the sequencer right before it draws the success
    /// sequence. Drawing is only allowed when this returns `true`.
    #[wasm_bindgen(js_name = confirmRender)]
    #[must_use]
    pub fn confirm_render(&self) -> bool {
        self.0.confirm_render()
    }

    /// Whether the welcome presentation should play. Returns `true` at most
    /// once per session.
    #[wasm_bindgen(js_name = takeWelcome)]
    #[must_use]
    pub fn take_welcome(&self) -> bool {
        self.0.take_welcome()
    }

    /// Tells the controller the success overlay is gone.
    #[wasm_bindgen(js_name = sequenceFinished)]
    pub fn sequence_finished(&self) {
        self.0.sequence_finished();
    }

    /// Whether the success overlay is on screen.
    #[wasm_bindgen(js_name = isAnimationVisible)]
    #[must_use]
    pub fn is_animation_visible(&self) -> bool {
        self.0.is_animation_visible()
    }

    /// Whether every validated factor belongs to the same user.
    #[wasm_bindgen(js_name = doValidatedBiometricsMatchSameUser)]
    #[must_use]
    pub fn do_validated_biometrics_match_same_user(&self) -> bool {
        self.0.do_validated_biometrics_match_same_user()
    }

    /// Clears durable and session validation state.
    #[wasm_bindgen(js_name = resetAll)]
    pub fn reset_all(&self) {
        self.0.reset_all();
    }

    /// Clears this tab's session validations only.
    #[wasm_bindgen(js_name = resetSessionOnly)]
    pub fn reset_session_only(&self) {
        self.0.reset_session_only();
    }

    /// Current state as a plain object.
    ///
    /// # Errors
    /// Returns an error if the value cannot be converted.
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.0.snapshot())
    }

    /// Context to send along with the next validation request.
    ///
    /// # Errors
    /// Returns an error if the value cannot be converted.
    #[wasm_bindgen(js_name = requestContext)]
    pub fn request_context(&self) -> Result<JsValue, JsValue> {
        to_js(&self.0.request_context())
    }

    /// The validated user and their vehicles, or `null`.
    ///
    /// # Errors
    /// Returns an error if the value cannot be converted.
    #[wasm_bindgen(js_name = userBundle)]
    pub fn user_bundle(&self) -> Result<JsValue, JsValue> {
        to_js(&self.0.user_bundle())
    }

    /// The recorded security violation for this session, or `null`.
    ///
    /// # Errors
    /// Returns an error if the value cannot be converted.
    #[wasm_bindgen(js_name = securityViolation)]
    pub fn security_violation(&self) -> Result<JsValue, JsValue> {
        to_js(&self.0.security_violation())
    }

    /// Dismisses the recorded security violation.
    #[wasm_bindgen(js_name = clearSecurityViolation)]
    pub fn clear_security_violation(&self) {
        self.0.clear_security_violation();
    }
}

fn parse_factor(factor: &str) -> Result<Factor, JsValue> {
    Factor::parse(factor).map_err(|err| error_to_jsvalue(&err))
}

#[allow(clippy::cast_possible_truncation)]
fn user_id_from_js(value: &JsValue) -> Option<UserId> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    if let Some(id) = value.as_string() {
        return Some(UserId::from(id));
    }
    let id = value
        .as_f64()
        .filter(|number| number.is_finite() && number.fract() == 0.0)
        .map(|number| UserId::from(number as i64));
    if id.is_none() {
        warn!("user id {value:?} is not a string or an integer, ignoring it");
    }
    id
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn error_to_jsvalue(error: &FactorLockError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[wasm_bindgen(typescript_custom_section)]
const TYPESCRIPT_DEFS: &str = r#"
export interface AnimationSequencer {
    playSuccessSequence(userLabel: string | null): void;
    playSecurityViolation(details: SecurityViolation, message: string): void;
    hide(): void;
}

export type Factor = "face" | "voice" | "retina" | "proximity";

export interface SecurityViolation {
    type: "user_mismatch" | "render_mismatch" | "server_reported";
    user_ids: string[];
}

export class Controller {
    constructor(sequencer: AnimationSequencer, configJson?: string);

    notifyFactorResult(factor: Factor, success: boolean, userId: string | number | null): void;
    invalidate(factor: Factor): void;
    applyServerResponse(factor: Factor, json: string): void;

    confirmRender(): boolean;
    takeWelcome(): boolean;
    sequenceFinished(): void;
    isAnimationVisible(): boolean;
    doValidatedBiometricsMatchSameUser(): boolean;

    resetAll(): void;
    resetSessionOnly(): void;

    snapshot(): object;
    requestContext(): { previous_user_id: string | null; is_second_validation: boolean };
    userBundle(): object | null;
    securityViolation(): SecurityViolation | null;
    clearSecurityViolation(): void;
}

export function initLogging(): void;
"#;
