//! Platform interfaces for validation state storage.

use super::error::StorageResult;

/// Thread-safety bound for host-provided collaborators.
///
/// Native hosts share the controller across threads, so collaborators must be
/// `Send + Sync`. Browser hosts run on a single-threaded event loop and hand
/// in JS-backed objects that are neither; on `wasm32` the bound is empty.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

/// Thread-safety bound for host-provided collaborators (empty on `wasm32`).
#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

/// Key-value capability backing one of the two validation stores.
///
/// The controller only ever writes whole serialized maps under a fixed set of
/// keys, so implementations need no partial-update or listing support. A
/// durable implementation survives reloads (browser `localStorage`, a file);
/// a session implementation is cleared when the session ends.
pub trait StateStore: MaybeSendSync {
    /// Reads the bytes stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
