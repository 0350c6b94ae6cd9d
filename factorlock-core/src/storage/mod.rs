//! Validation state storage: the `StateStore` capability and its implementations.

pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{MaybeSendSync, StateStore};

/// Keys written to the durable store.
pub mod durable_keys {
    /// `{face,voice,retina,proximity: bool}`
    pub const VALIDATED_BIOMETRICS: &str = "validated_biometrics";
    /// `{face,voice,retina,proximity: string|null}`
    pub const VALIDATED_USER_IDS: &str = "validated_user_ids";
}

/// Keys written to the session store.
pub mod session_keys {
    /// `{face,voice,retina,proximity: bool}`
    pub const SESSION_VALIDATIONS: &str = "session_validations";
    /// `"true"` once the welcome presentation played this session.
    pub const WELCOME_SHOWN: &str = "has_shown_biometric_welcome";
    /// `"true"` after an identity mismatch was detected.
    pub const SECURITY_VIOLATION: &str = "biometric_security_violation";
    /// Mismatch details for the banner on the home page.
    pub const SECURITY_VIOLATION_DETAILS: &str = "biometric_security_violation_details";
    /// Last user bundle returned by the server.
    pub const USER_DATA: &str = "validated_user_data";
}
