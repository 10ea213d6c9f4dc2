//! Credential persistence.
//!
//! A store holds at most one `CredentialRecord`. The record is always
//! serialized as one document with the keys `accessToken`, `refreshToken`
//! and `user` (itself a JSON string), so readers never observe a partial
//! write.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use crate::models::{CredentialRecord, UserSnapshot};

/// Keychain service name for `KeyringStore`
const SERVICE_NAME: &str = "folio";

/// Keychain account holding the serialized record
const KEYRING_ACCOUNT: &str = "session";

/// Credential file name for `FileStore`
const CREDENTIALS_FILE: &str = "credentials.json";

/// Storage backend for the signed-in user's credentials.
pub trait CredentialStore: Send + Sync {
    /// Replace whatever is stored with `record`.
    fn save(&self, record: &CredentialRecord) -> Result<()>;

    /// Current record, or `None` if nothing was saved or it was cleared.
    fn read(&self) -> Result<Option<CredentialRecord>>;

    /// Remove the whole record.
    fn clear(&self) -> Result<()>;
}

/// On-disk / in-keychain layout of a record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCredentials {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    user: String,
}

impl PersistedCredentials {
    fn encode(record: &CredentialRecord) -> Result<String> {
        let persisted = PersistedCredentials {
            access_token: record.access_token.clone(),
            refresh_token: record.refresh_token.clone(),
            user: serde_json::to_string(&record.user).context("Failed to serialize user")?,
        };
        serde_json::to_string_pretty(&persisted).context("Failed to serialize credentials")
    }

    fn decode(contents: &str) -> Result<CredentialRecord> {
        let persisted: PersistedCredentials =
            serde_json::from_str(contents).context("Failed to parse stored credentials")?;
        let user: UserSnapshot =
            serde_json::from_str(&persisted.user).context("Failed to parse stored user")?;
        Ok(CredentialRecord {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            user,
        })
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let mut slot = self
            .record
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        *slot = Some(record.clone());
        Ok(())
    }

    fn read(&self) -> Result<Option<CredentialRecord>> {
        let slot = self
            .record
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .record
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// JSON file in a per-user data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", CREDENTIALS_FILE))
    }
}

impl CredentialStore for FileStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Write then rename so a reader sees either the old or the new record
        let contents = PersistedCredentials::encode(record)?;
        let tmp = self.temp_path();
        write_private(&tmp, contents.as_bytes()).context("Failed to write credentials file")?;
        std::fs::rename(&tmp, self.path()).context("Failed to replace credentials file")?;
        Ok(())
    }

    fn read(&self) -> Result<Option<CredentialRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credentials file")?;
        PersistedCredentials::decode(&contents).map(Some)
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to delete credentials file")?;
        }
        Ok(())
    }
}

/// Create or truncate `path` readable by the owner only, then write `contents`.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        // A leftover temp file keeps its old mode
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}

// ============================================================================
// OS keychain store
// ============================================================================

/// Single OS keychain entry holding the whole serialized record.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let contents = PersistedCredentials::encode(record)?;
        self.entry()?
            .set_password(&contents)
            .context("Failed to store credentials in keychain")
    }

    fn read(&self) -> Result<Option<CredentialRecord>> {
        match self.entry()?.get_password() {
            Ok(contents) => PersistedCredentials::decode(&contents).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credentials from keychain"),
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credentials from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CredentialRecord {
        CredentialRecord {
            access_token: "header.payload.sig".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: UserSnapshot {
                full_name: "Alice Doe".to_string(),
                email: "alice@example.com".to_string(),
                role: "user".to_string(),
            },
        }
    }

    #[test]
    fn test_memory_store_round_trip_and_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.read().expect("read"), None);

        store.save(&sample_record()).expect("save");
        assert_eq!(store.read().expect("read"), Some(sample_record()));

        store.clear().expect("clear");
        assert_eq!(store.read().expect("read"), None);
    }

    #[test]
    fn test_save_replaces_instead_of_merging() {
        let store = MemoryStore::with_record(sample_record());
        let mut replacement = sample_record();
        replacement.refresh_token = String::new();
        replacement.user.full_name = "Someone Else".to_string();

        store.save(&replacement).expect("save");
        assert_eq!(store.read().expect("read"), Some(replacement));
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.read().expect("read"), None);

        store.save(&sample_record()).expect("save");
        assert_eq!(store.read().expect("read"), Some(sample_record()));
        assert!(!store.temp_path().exists());

        store.clear().expect("clear");
        assert_eq!(store.read().expect("read"), None);
        // Clearing twice is fine
        store.clear().expect("clear again");
    }

    #[test]
    fn test_file_layout_uses_three_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        store.save(&sample_record()).expect("save");

        let raw = std::fs::read_to_string(dir.path().join(CREDENTIALS_FILE)).expect("read file");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("parse file");
        assert_eq!(json["accessToken"], "header.payload.sig");
        assert_eq!(json["refreshToken"], "refresh-1");
        let user: serde_json::Value =
            serde_json::from_str(json["user"].as_str().expect("user is a string")).expect("parse user");
        assert_eq!(user["fullName"], "Alice Doe");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "{ not json").expect("write");
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(store.read().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        // Stale temp file left world-readable by an earlier crash
        std::fs::write(dir.path().join(format!("{}.tmp", CREDENTIALS_FILE)), "old").expect("write");
        std::fs::set_permissions(
            dir.path().join(format!("{}.tmp", CREDENTIALS_FILE)),
            std::fs::Permissions::from_mode(0o644),
        )
        .expect("chmod");

        let store = FileStore::new(dir.path().to_path_buf());
        store.save(&sample_record()).expect("save");

        let mode = std::fs::metadata(dir.path().join(CREDENTIALS_FILE))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.read().expect("read"), Some(sample_record()));
    }
}
