//! `factorlock-core` tracks which biometric factors (face, voice, retina,
//! proximity) a browser session validated, and for which user.
//!
//! Once two factors validated for the same user during a session the
//! [`ValidationController`] asks the [`AnimationSequencer`] to play the success
//! sequence; validated factors that disagree on the user reset everything and
//! send the page home with a violation flag.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use factorlock_core::storage::MemoryStore;
//! use factorlock_core::{
//!     AnimationSequencer, ControllerConfig, Factor, Navigator, SecurityViolation, UserId,
//!     ValidationController,
//! };
//!
//! struct Quiet;
//!
//! impl AnimationSequencer for Quiet {
//!     fn play_success_sequence(&self, _user_label: Option<String>) {}
//!     fn play_security_violation(&self, _violation: &SecurityViolation) {}
//!     fn hide(&self) {}
//! }
//!
//! impl Navigator for Quiet {
//!     fn redirect_after(&self, _location: &str, _delay_ms: u64) {}
//! }
//!
//! let controller = ValidationController::load(
//!     ControllerConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(Quiet),
//!     Arc::new(Quiet),
//! );
//! controller.set_validated(Factor::Face, true, Some(UserId::from("42")));
//! controller.set_validated(Factor::Retina, true, Some(UserId::from("42")));
//! assert!(controller.is_animation_visible());
//! ```

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod config;
pub use config::*;

mod consistency;
pub use consistency::*;

mod controller;
pub use controller::*;

mod error;
pub use error::*;

mod factor;
pub use factor::*;

mod response;
pub use response::*;

mod sequencer;
pub use sequencer::*;

mod state;
pub use state::*;

pub mod logger;
pub mod storage;
