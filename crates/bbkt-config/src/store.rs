//! On-disk profile store.
//!
//! Holds every named [`CredentialRecord`] plus the name of the default profile:
//!
//! ```json
//! {
//!   "active_profile": "work",
//!   "profiles": {
//!     "work": { "auth_type": "api_token", "email": "...", "api_token": "...", "created_at": "..." },
//!     "oss":  { "auth_type": "oauth", "access_token": "...", "created_at": "..." }
//!   }
//! }
//! ```
//!
//! Older releases wrote a single bare record to the same path. Such files are
//! wrapped into a one-profile store named [`DEFAULT_PROFILE`] on load and
//! rewritten in the current shape.
//!
//! The store is always rewritten in full. There is no file locking: two
//! processes saving concurrently race and the last writer wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::credentials::CredentialRecord;
use crate::{ConfigError, Result};

/// Profile name used for migrated legacy credentials and unnamed logins.
pub const DEFAULT_PROFILE: &str = "default";

// ─────────────────────────────────────────────────────────────────────────────
// Profile Store
// ─────────────────────────────────────────────────────────────────────────────

/// All stored profiles plus the default pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStore {
    /// Name of the default profile. May dangle; resolution tolerates that.
    #[serde(default)]
    pub active_profile: String,

    /// Profiles keyed by name.
    #[serde(deserialize_with = "nullable_profiles")]
    pub profiles: HashMap<String, CredentialRecord>,
}

/// Accept `"profiles": null` as an empty map while still requiring the key.
fn nullable_profiles<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, CredentialRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, CredentialRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The two shapes a credentials file can take.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Current(ProfileStore),
    Legacy(CredentialRecord),
}

impl ProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a single legacy record into a one-profile store.
    pub fn from_legacy(mut record: CredentialRecord) -> Self {
        record.profile_name = DEFAULT_PROFILE.to_string();
        Self {
            active_profile: DEFAULT_PROFILE.to_string(),
            profiles: HashMap::from([(DEFAULT_PROFILE.to_string(), record)]),
        }
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<&CredentialRecord> {
        self.profiles.get(name)
    }

    /// Get a mutable profile by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CredentialRecord> {
        self.profiles.get_mut(name)
    }

    /// Whether the store holds no profiles.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Insert or replace a profile by its name.
    ///
    /// An unnamed record is stored as [`DEFAULT_PROFILE`]. If no default is set
    /// yet, the upserted profile becomes the default.
    pub fn upsert(&mut self, mut record: CredentialRecord) {
        if record.profile_name.is_empty() {
            record.profile_name = DEFAULT_PROFILE.to_string();
        }
        if self.active_profile.is_empty() {
            self.active_profile = record.profile_name.clone();
        }
        self.profiles.insert(record.profile_name.clone(), record);
    }

    /// Make `name` the default profile.
    pub fn use_profile(&mut self, name: &str) -> Result<()> {
        if !self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        self.active_profile = name.to_string();
        Ok(())
    }

    /// Profile names in sorted order, for display.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Copy each map key into its record's `profile_name`.
    fn backfill_names(&mut self) {
        for (name, record) in &mut self.profiles {
            record.profile_name = name.clone();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential Store (file handle)
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed persistence for a [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Open the per-user store (`~/.config/bbkt/credentials.json`, or under `BBKT_CONFIG_DIR`).
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(crate::paths::credentials_path()?))
    }

    /// Use a store at a specific path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the store.
    ///
    /// Returns `Ok(None)` when no file exists. Legacy single-record files are
    /// migrated and rewritten before returning; a failed rewrite is logged and
    /// the migrated store is still returned.
    pub fn load(&self) -> Result<Option<ProfileStore>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadFile {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let parsed: StoreFile =
            serde_json::from_str(&contents).map_err(|e| ConfigError::StoreCorrupt {
                path: self.path.display().to_string(),
                source: e,
            })?;

        match parsed {
            StoreFile::Current(mut store) => {
                store.backfill_names();
                debug!(
                    path = %self.path.display(),
                    profiles = store.profiles.len(),
                    "Loaded profile store"
                );
                Ok(Some(store))
            }
            StoreFile::Legacy(record) => {
                let store = ProfileStore::from_legacy(record);
                info!(
                    path = %self.path.display(),
                    "Migrating legacy credentials to profile '{}'", DEFAULT_PROFILE
                );
                if let Err(e) = self.save(&store) {
                    warn!("Failed to rewrite migrated credentials: {}", e);
                }
                Ok(Some(store))
            }
        }
    }

    /// Load the store, or an empty one if no file exists.
    pub fn load_or_default(&self) -> Result<ProfileStore> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Serialize and write the full store with owner-only permissions.
    pub fn save(&self, store: &ProfileStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent).map_err(|e| ConfigError::WriteFile {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(store).map_err(ConfigError::Serialize)?;

        write_private_file(&self.path, json.as_bytes()).map_err(|e| ConfigError::WriteFile {
            path: self.path.display().to_string(),
            source: e,
        })?;

        debug!(path = %self.path.display(), "Profile store saved");
        Ok(())
    }

    /// Upsert one profile into the persisted store and write it back.
    ///
    /// Read-modify-write with no concurrency guard. Returns the saved store.
    pub fn save_profile(&self, record: CredentialRecord) -> Result<ProfileStore> {
        let mut store = self.load_or_default()?;
        store.upsert(record);
        self.save(&store)?;
        Ok(store)
    }

    /// Delete the store file. A missing file counts as success.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConfigError::WriteFile {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Write through a sibling temp file, then rename over the target.
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let tmp = path.with_extension("json.tmp");
    {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AuthKind;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn api_record(name: &str, workspaces: &[&str]) -> CredentialRecord {
        CredentialRecord::api_token(name, format!("{}@example.com", name), "token-value")
            .with_workspaces(workspaces.iter().map(|w| w.to_string()).collect())
    }

    fn oauth_record(name: &str) -> CredentialRecord {
        CredentialRecord::new(
            name,
            AuthKind::OAuth {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                token_type: "bearer".to_string(),
                expires_in: 7200,
                scopes: "repository pullrequest".to_string(),
                client_id: "cid".to_string(),
                client_secret: "csecret".to_string(),
            },
        )
        .with_created_at(Utc::now() - Duration::minutes(10))
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::at(temp.path().join("credentials.json"));
        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
        assert!(store.load_or_default().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("nested/dir/credentials.json"));

        let mut store = ProfileStore::new();
        store.upsert(api_record("work", &["acme"]));
        store.upsert(oauth_record("oss"));
        file.save(&store).unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.active_profile, "work");
        assert_eq!(loaded.get("oss").unwrap().profile_name, "oss");
        assert_eq!(loaded.get("work").unwrap().accessible_workspaces, vec!["acme"]);
    }

    #[test]
    fn test_profile_name_not_persisted() {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("credentials.json"));
        file.save_profile(api_record("work", &[])).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert!(raw["profiles"]["work"].get("profile_name").is_none());
        assert_eq!(raw["active_profile"], "work");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let dir = temp.path().join("bbkt");
        let file = CredentialStore::at(dir.join("credentials.json"));
        file.save(&ProfileStore::new()).unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_save_profile_first_becomes_active() {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("credentials.json"));

        file.save_profile(api_record("first", &[])).unwrap();
        let store = file.save_profile(api_record("second", &[])).unwrap();

        assert_eq!(store.active_profile, "first");
        assert_eq!(store.profiles.len(), 2);
        assert_eq!(file.load().unwrap().unwrap(), store);
    }

    #[test]
    fn test_save_profile_replaces_same_name() {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("credentials.json"));

        file.save_profile(api_record("work", &["old"])).unwrap();
        let store = file.save_profile(api_record("work", &["new"])).unwrap();

        assert_eq!(store.profiles.len(), 1);
        assert_eq!(store.get("work").unwrap().accessible_workspaces, vec!["new"]);
    }

    #[test]
    fn test_unnamed_profile_saved_as_default() {
        let mut store = ProfileStore::new();
        store.upsert(api_record("", &[]));
        assert!(store.get(DEFAULT_PROFILE).is_some());
        assert_eq!(store.active_profile, DEFAULT_PROFILE);
    }

    #[test]
    fn test_legacy_migration() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{
                "auth_type": "api_token",
                "created_at": "2024-06-01T08:00:00Z",
                "email": "me@example.com",
                "api_token": "legacy-token",
                "accessible_workspaces": ["acme"]
            }"#,
        )
        .unwrap();

        let file = CredentialStore::at(&path);
        let store = file.load().unwrap().unwrap();

        assert_eq!(store.active_profile, DEFAULT_PROFILE);
        assert_eq!(store.profiles.len(), 1);
        let record = store.get(DEFAULT_PROFILE).unwrap();
        assert_eq!(record.profile_name, DEFAULT_PROFILE);
        assert_eq!(record.email(), Some("me@example.com"));

        // The file was rewritten in the current shape
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("profiles").is_some());
    }

    #[test]
    fn test_legacy_migration_is_idempotent() {
        let legacy = r#"{
            "auth_type": "oauth",
            "created_at": "2024-06-01T08:00:00Z",
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 7200
        }"#;

        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, legacy).unwrap();
        let file = CredentialStore::at(&path);

        let first = file.load().unwrap().unwrap();
        let second = file.load().unwrap().unwrap();
        assert_eq!(first, second);

        // Migrating the same legacy content again yields the same store
        std::fs::write(&path, legacy).unwrap();
        let third = file.load().unwrap().unwrap();
        assert_eq!(first, third);
        assert_eq!(third.profile_names(), vec![DEFAULT_PROFILE]);
    }

    #[test]
    fn test_null_profiles_accepted() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, r#"{"active_profile": "x", "profiles": null}"#).unwrap();

        let store = CredentialStore::at(&path).load().unwrap().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.active_profile, "x");
    }

    #[test]
    fn test_corrupt_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = CredentialStore::at(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::StoreCorrupt { .. }));
    }

    #[test]
    fn test_unrecognized_shape_is_corrupt() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, r#"{"something": "else"}"#).unwrap();

        let err = CredentialStore::at(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::StoreCorrupt { .. }));
    }

    #[test]
    fn test_save_profile_does_not_clobber_corrupt_store() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, "garbage").unwrap();

        let file = CredentialStore::at(&path);
        assert!(file.save_profile(api_record("work", &[])).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
    }

    #[test]
    fn test_remove() {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("credentials.json"));

        assert!(!file.remove().unwrap());
        file.save(&ProfileStore::new()).unwrap();
        assert!(file.remove().unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn test_use_profile() {
        let mut store = ProfileStore::new();
        store.upsert(api_record("a", &[]));
        store.upsert(api_record("b", &[]));

        store.use_profile("b").unwrap();
        assert_eq!(store.active_profile, "b");

        let err = store.use_profile("missing").unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound(name) if name == "missing"));
        assert_eq!(store.active_profile, "b");
    }

    #[test]
    fn test_profile_names_sorted() {
        let mut store = ProfileStore::new();
        for name in ["zeta", "alpha", "mid"] {
            store.upsert(api_record(name, &[]));
        }
        assert_eq!(store.profile_names(), vec!["alpha", "mid", "zeta"]);
    }
}
