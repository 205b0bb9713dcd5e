//! Database credential storage using the OS keyring.
//!
//! The connection password is never written to the config file. When it is
//! not supplied through the environment, it is looked up here.

use crate::config::DatabaseConfig;
use crate::error::{Result, TaskdeskError};
use keyring::Entry;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "taskdesk";

/// Access to secrets kept in the OS keyring.
#[derive(Debug, Clone)]
pub struct SecretStorage {
    keyring_available: bool,
}

impl Default for SecretStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStorage {
    /// Creates a new secret storage instance, probing keyring availability.
    pub fn new() -> Self {
        Self {
            keyring_available: Self::probe_keyring(),
        }
    }

    /// Creates a storage handle that never touches the keyring.
    pub fn unavailable() -> Self {
        Self {
            keyring_available: false,
        }
    }

    /// Probes whether the OS keyring is available.
    fn probe_keyring() -> bool {
        let test_entry = match Entry::new(SERVICE_NAME, "__probe__") {
            Ok(e) => e,
            Err(_) => return false,
        };

        match test_entry.set_password("test") {
            Ok(()) => {
                let _ = test_entry.delete_credential();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns whether the keyring can be used.
    pub fn is_available(&self) -> bool {
        self.keyring_available
    }

    /// Stores a secret in the keyring.
    pub fn store(&self, key: &str, secret: &str) -> Result<()> {
        if !self.keyring_available {
            return Err(TaskdeskError::secret(
                "OS keyring unavailable. Provide the password through the environment instead.",
            ));
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| TaskdeskError::secret(format!("Failed to create keyring entry: {e}")))?;

        entry
            .set_password(secret)
            .map_err(|e| TaskdeskError::secret(format!("Failed to store secret: {e}")))?;

        Ok(())
    }

    /// Retrieves a secret from the keyring.
    pub fn retrieve(&self, key: &str) -> Result<Option<String>> {
        if !self.keyring_available {
            return Ok(None);
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| TaskdeskError::secret(format!("Failed to access keyring: {e}")))?;

        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TaskdeskError::secret(format!(
                "Failed to retrieve secret: {e}"
            ))),
        }
    }

    /// Deletes a secret from the keyring.
    pub fn delete(&self, key: &str) -> Result<()> {
        if !self.keyring_available {
            return Ok(());
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| TaskdeskError::secret(format!("Failed to access keyring: {e}")))?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete secret from keyring: {e}");
                Ok(())
            }
        }
    }

    /// Keyring key for the password of a database endpoint.
    pub fn database_password_key(config: &DatabaseConfig) -> String {
        format!(
            "db:{}@{}:{}/{}",
            config.user.as_deref().unwrap_or(""),
            config.host_or_default(),
            config.port,
            config.database.as_deref().unwrap_or("")
        )
    }

    /// Fills in the password from the keyring when none was configured.
    ///
    /// Returns `true` if a password was found.
    pub fn resolve_password(&self, config: &mut DatabaseConfig) -> Result<bool> {
        if config.password.is_some() {
            return Ok(true);
        }

        let key = Self::database_password_key(config);
        match self.retrieve(&key)? {
            Some(password) => {
                debug!("Using database password from OS keyring");
                config.password = Some(password);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Masks a secret for display, showing only the last 4 characters.
    pub fn mask_secret(secret: &str) -> String {
        let chars: Vec<char> = secret.chars().collect();
        if chars.len() <= 4 {
            "*".repeat(chars.len())
        } else {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("****...{tail}")
        }
    }
}
