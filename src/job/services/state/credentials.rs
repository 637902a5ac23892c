//! Third-party credentials stored per user.
//!
//! Values arrive encrypted; the store never sees them in clear.

use super::{SchedulerStateManager, StateResult};
use crate::job::ports::RecordStore;
use crate::job::records::ThirdPartyCredentialRecord;
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

/// Encrypted credential value with the symmetric key protecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCredential {
    /// Symmetric key encrypted with the scheduler's public key.
    pub encrypted_symmetric_key: Vec<u8>,
    /// Value encrypted with the symmetric key.
    pub encrypted_value: Vec<u8>,
}

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Stores or replaces a credential of `username`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn put_third_party_credential(
        &self,
        username: &str,
        key: &str,
        credential: EncryptedCredential,
    ) -> StateResult<()> {
        let record = ThirdPartyCredentialRecord {
            username: username.to_owned(),
            key: key.to_owned(),
            encrypted_symmetric_key: credential.encrypted_symmetric_key,
            encrypted_value: credential.encrypted_value,
        };
        self.transactions
            .run_with_transaction(false, |session| Ok(session.put_credential(&record)?))
    }

    /// Removes a credential; removing an unknown key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn remove_third_party_credential(&self, username: &str, key: &str) -> StateResult<()> {
        self.transactions.run_with_transaction(false, |session| {
            Ok(session.remove_credential(username, key)?)
        })
    }

    /// Returns the credential keys of `username`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn third_party_credentials_keys(&self, username: &str) -> StateResult<BTreeSet<String>> {
        Ok(self
            .load_credentials(username)?
            .into_iter()
            .map(|record| record.key)
            .collect())
    }

    /// Returns every credential of `username` keyed by credential key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn third_party_credentials_map(
        &self,
        username: &str,
    ) -> StateResult<BTreeMap<String, EncryptedCredential>> {
        Ok(self
            .load_credentials(username)?
            .into_iter()
            .map(|record| {
                (
                    record.key,
                    EncryptedCredential {
                        encrypted_symmetric_key: record.encrypted_symmetric_key,
                        encrypted_value: record.encrypted_value,
                    },
                )
            })
            .collect())
    }

    /// Returns whether `username` has any stored credential.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn has_third_party_credentials(&self, username: &str) -> StateResult<bool> {
        Ok(!self.load_credentials(username)?.is_empty())
    }

    fn load_credentials(&self, username: &str) -> StateResult<Vec<ThirdPartyCredentialRecord>> {
        self.transactions
            .run_with_transaction(true, |session| Ok(session.load_credentials(username)?))
    }
}
