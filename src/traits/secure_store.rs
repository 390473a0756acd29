//! Secure key-value storage trait abstraction.
//!
//! Models the platform keychain: a flat namespace of string keys holding
//! string secrets. Both the application-password list and the per-site
//! active token live behind this trait.

use async_trait::async_trait;

/// Secure storage operation errors.
#[derive(Debug, Clone)]
pub enum SecureStoreError {
    /// Failed to read a value
    ReadFailed(String),
    /// Failed to write a value
    WriteFailed(String),
    /// IO error
    Io(String),
    /// Serialization/deserialization error
    Serialization(String),
}

impl std::fmt::Display for SecureStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecureStoreError::ReadFailed(msg) => write!(f, "Failed to read secure value: {}", msg),
            SecureStoreError::WriteFailed(msg) => {
                write!(f, "Failed to write secure value: {}", msg)
            }
            SecureStoreError::Io(msg) => write!(f, "IO error: {}", msg),
            SecureStoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for SecureStoreError {}

/// Trait for secure key-value storage.
///
/// # Example
///
/// ```ignore
/// use wpcreds::traits::SecureStore;
///
/// async fn rotate<S: SecureStore>(store: &S, key: &str, token: &str) -> Result<(), SecureStoreError> {
///     if store.get_value(key).await?.as_deref() != Some(token) {
///         store.set_value(key, Some(token)).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Returns
    /// - `Ok(Some(value))` if a value exists
    /// - `Ok(None)` if nothing is stored under `key`
    /// - `Err(error)` if the backing store could not be read
    async fn get_value(&self, key: &str) -> Result<Option<String>, SecureStoreError>;

    /// Store `value` under `key`. Passing `None` removes the key.
    async fn set_value(&self, key: &str, value: Option<&str>) -> Result<(), SecureStoreError>;
}
