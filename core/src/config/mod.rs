//! Persistent application configuration.
//!
//! The whole document is loaded once, kept in memory behind one
//! reader/writer lock and rewritten in full after every mutation. Credentials
//! are stored sealed and only decrypted on request.

mod types;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use types::{
    AppInfo, BuildInfo, ConfigDocument, GenerationConfig, ModelKey, SealedCredential,
    BUILD_NUMBER, RELEASE_DATE,
};

use crate::crypto::CredentialCipher;
use crate::errors::{LumenError, LumenResult};
use crate::logging::{log_event, EventSink, Level};
use crate::providers::ProviderId;

const MODULE: &str = "config.store";

pub struct ConfigStore {
    path: PathBuf,
    cipher: CredentialCipher,
    events: Arc<dyn EventSink>,
    document: RwLock<ConfigDocument>,
    write_gate: Mutex<()>,
}

impl ConfigStore {
    /// Read `path`, creating, replacing or migrating the document as needed.
    /// Never fails: an unusable file is replaced with a fresh document.
    pub fn load(
        path: impl Into<PathBuf>,
        build: &BuildInfo,
        cipher: CredentialCipher,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let path = path.into();
        let (document, dirty) = read_document(&path, build, events.as_ref());
        let store = Self {
            path,
            cipher,
            events,
            document: RwLock::new(document),
            write_gate: Mutex::new(()),
        };
        if dirty {
            store.persist();
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current document to disk, replacing the file.
    pub fn save(&self) -> LumenResult<()> {
        // Snapshot inside the gate so the last write carries every mutation
        // that completed before it.
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        let body = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| LumenError::Storage(format!("failed to serialise config: {e}")))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LumenError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&self.path, body).map_err(|e| {
            LumenError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    /// Save, logging instead of propagating a failure.
    fn persist(&self) {
        if let Err(err) = self.save() {
            log_event(
                self.events.as_ref(),
                Level::Warn,
                Some(err.code()),
                MODULE,
                "failed to save configuration",
                Some(err.explain()),
                Some(json!({ "error": err.to_string() })),
            );
        }
    }

    pub fn snapshot(&self) -> ConfigDocument {
        self.read().clone()
    }

    pub fn app_info(&self) -> AppInfo {
        self.read().app_info.clone()
    }

    /// Stored parameters for `key`, or the defaults when none were saved.
    pub fn generation_config(&self, key: &ModelKey) -> GenerationConfig {
        self.read().model_configs.get(key).cloned().unwrap_or_default()
    }

    pub fn set_generation_config(&self, key: ModelKey, config: GenerationConfig) {
        self.write().model_configs.insert(key, config);
        self.persist();
    }

    pub fn has_credential(&self, provider: ProviderId) -> bool {
        self.read()
            .credentials
            .get(&provider)
            .is_some_and(|sealed| !sealed.0.is_empty())
    }

    /// Decrypted credential, or an empty string when none is stored.
    pub fn credential(&self, provider: ProviderId) -> LumenResult<String> {
        let sealed = self.read().credentials.get(&provider).cloned();
        match sealed {
            Some(SealedCredential(blob)) if !blob.is_empty() => self.cipher.decrypt(&blob),
            _ => Ok(String::new()),
        }
    }

    /// Seal and store `secret`. An empty secret removes the entry.
    pub fn set_credential(&self, provider: ProviderId, secret: &str) -> LumenResult<()> {
        let secret = secret.trim();
        if secret.is_empty() {
            self.write().credentials.remove(&provider);
        } else {
            let sealed = self.cipher.encrypt(secret)?;
            self.write()
                .credentials
                .insert(provider, SealedCredential(sealed));
        }
        self.persist();
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ConfigDocument> {
        self.document.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ConfigDocument> {
        self.document.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Returns the document to adopt and whether it must be written back.
fn read_document(path: &Path, build: &BuildInfo, events: &dyn EventSink) -> (ConfigDocument, bool) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log_event(
                events,
                Level::Info,
                Some("CFG-0001"),
                MODULE,
                "no configuration found, creating a new one",
                None,
                Some(json!({ "path": path.display().to_string() })),
            );
            return (ConfigDocument::fresh(build, &now_rfc3339()), true);
        }
        Err(err) => {
            warn_replaced(events, path, &err.to_string());
            return (ConfigDocument::fresh(build, &now_rfc3339()), true);
        }
    };

    let parsed = serde_json::from_str::<Value>(&raw).and_then(|mut value| {
        drop_unknown_providers(&mut value, events);
        serde_json::from_value::<ConfigDocument>(value)
    });
    let mut document = match parsed {
        Ok(document) => document,
        Err(err) => {
            warn_replaced(events, path, &err.to_string());
            return (ConfigDocument::fresh(build, &now_rfc3339()), true);
        }
    };

    if document.app_info.build_number >= build.build_number {
        return (document, false);
    }

    let previous = document.app_info.clone();
    document.app_info.version = build.version.clone();
    document.app_info.build_number = build.build_number;
    document.app_info.release_date = build.release_date.clone();
    document.app_info.last_update_date = now_rfc3339();
    log_event(
        events,
        Level::Info,
        Some("CFG-0002"),
        MODULE,
        "application upgraded",
        Some("stored build number is older than this binary"),
        Some(json!({
            "from_version": previous.version,
            "from_build": previous.build_number,
            "to_version": build.version,
            "to_build": build.build_number,
        })),
    );
    (document, true)
}

/// Removes provider-keyed entries this build does not know, keeping the rest
/// of the document usable.
fn drop_unknown_providers(document: &mut Value, events: &dyn EventSink) {
    for section in ["modelConfigs", "credentials"] {
        let Some(entries) = document.get_mut(section).and_then(Value::as_object_mut) else {
            continue;
        };
        let unknown: Vec<String> = entries
            .keys()
            .filter(|name| !is_known_provider(name))
            .cloned()
            .collect();
        for name in unknown {
            entries.remove(&name);
            log_event(
                events,
                Level::Warn,
                Some("CFG-1003"),
                MODULE,
                "ignoring settings for unknown provider",
                Some("the stored configuration names a provider this build does not support"),
                Some(json!({ "section": section, "provider": name })),
            );
        }
    }
}

fn is_known_provider(name: &str) -> bool {
    serde_json::from_value::<ProviderId>(Value::String(name.to_string())).is_ok()
}

fn warn_replaced(events: &dyn EventSink, path: &Path, reason: &str) {
    log_event(
        events,
        Level::Warn,
        Some("CFG-1002"),
        MODULE,
        "configuration unreadable, replacing with defaults",
        Some("the previous file could not be read or parsed"),
        Some(json!({ "path": path.display().to_string(), "error": reason })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EventLog;
    use std::thread;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn build(n: u32) -> BuildInfo {
        BuildInfo {
            version: format!("0.{n}.0"),
            build_number: n,
            release_date: format!("2025-0{n}-01"),
        }
    }

    fn open(path: &Path, n: u32) -> (ConfigStore, Arc<EventLog>) {
        let events = Arc::new(EventLog::new());
        let store = ConfigStore::load(
            path,
            &build(n),
            CredentialCipher::new(KEY).unwrap(),
            events.clone(),
        );
        (store, events)
    }

    fn stored(path: &Path) -> ConfigDocument {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn first_run_creates_and_persists_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let (store, events) = open(&path, 2);

        let info = store.app_info();
        assert_eq!(info.build_number, 2);
        assert_eq!(info.install_date, info.last_update_date);
        assert_eq!(stored(&path).app_info, info);
        assert_eq!(events.with_code("CFG-0001").len(), 1);
    }

    #[test]
    fn corrupt_file_is_replaced_not_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ \"appInfo\": { \"version\": ").unwrap();

        let (store, events) = open(&path, 2);
        assert_eq!(store.app_info().build_number, 2);
        assert!(store.snapshot().model_configs.is_empty());
        assert_eq!(events.with_code("CFG-1002").len(), 1);
        assert_eq!(stored(&path).app_info.build_number, 2);
    }

    #[test]
    fn unknown_provider_entries_are_dropped_not_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (store, _) = open(&path, 2);
        store.set_credential(ProviderId::OpenAi, "sk-keep").unwrap();
        store.set_generation_config(
            ModelKey::new(ProviderId::Ollama, "m"),
            GenerationConfig { top_k: 3, ..Default::default() },
        );
        drop(store);

        let mut raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["modelConfigs"]["mistral"] = json!({ "x": {} });
        raw["credentials"]["cohere"] = json!("c2VhbGVk");
        fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

        let (reloaded, events) = open(&path, 2);
        assert_eq!(reloaded.credential(ProviderId::OpenAi).unwrap(), "sk-keep");
        assert_eq!(
            reloaded.generation_config(&ModelKey::new(ProviderId::Ollama, "m")).top_k,
            3
        );
        assert_eq!(events.with_code("CFG-1003").len(), 2);
        assert!(events.with_code("CFG-1002").is_empty());
    }

    #[test]
    fn older_build_is_stamped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (old, _) = open(&path, 1);
        let installed = old.app_info();
        old.set_generation_config(
            ModelKey::new(ProviderId::Ollama, "llama3"),
            GenerationConfig { temperature: 0.1, ..Default::default() },
        );
        drop(old);

        let (upgraded, events) = open(&path, 3);
        let info = upgraded.app_info();
        assert_eq!(info.version, "0.3.0");
        assert_eq!(info.build_number, 3);
        assert_eq!(info.release_date, "2025-03-01");
        assert_eq!(info.install_date, installed.install_date);
        assert_eq!(stored(&path).app_info, info);
        assert_eq!(events.with_code("CFG-0002").len(), 1);
        assert_eq!(
            upgraded
                .generation_config(&ModelKey::new(ProviderId::Ollama, "llama3"))
                .temperature,
            0.1
        );
    }

    #[test]
    fn same_or_newer_build_leaves_app_info_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (first, _) = open(&path, 3);
        let original = first.app_info();
        drop(first);

        for n in [3, 2] {
            let (again, events) = open(&path, n);
            assert_eq!(again.app_info(), original);
            assert!(events.with_code("CFG-0002").is_empty());
        }
    }

    #[test]
    fn unseen_model_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir.path().join("config.json"), 1);
        let config = store.generation_config(&ModelKey::new(ProviderId::LmStudio, "never-seen"));
        assert_eq!(config, GenerationConfig::default());
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.top_p, 0.9);
        assert_eq!(config.top_k, 40);
        assert_eq!(config.repeat_penalty, 1.1);
        assert_eq!(config.context_size, 2048);
        assert!(config.stop_sequences.is_empty());
    }

    #[test]
    fn credentials_are_sealed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (store, _) = open(&path, 1);

        assert_eq!(store.credential(ProviderId::OpenAi).unwrap(), "");
        store.set_credential(ProviderId::OpenAi, "sk-live-123").unwrap();
        assert!(store.has_credential(ProviderId::OpenAi));
        assert_eq!(store.credential(ProviderId::OpenAi).unwrap(), "sk-live-123");

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("sk-live-123"));
        assert!(stored(&path).credentials.contains_key(&ProviderId::OpenAi));
    }

    #[test]
    fn empty_secret_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (store, _) = open(&path, 1);
        store.set_credential(ProviderId::Google, "AIza-key").unwrap();
        store.set_credential(ProviderId::Google, "   ").unwrap();
        assert!(!store.has_credential(ProviderId::Google));
        assert!(stored(&path).credentials.is_empty());
    }

    #[test]
    fn credential_sealed_with_other_key_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (store, _) = open(&path, 1);
        store.set_credential(ProviderId::Anthropic, "sk-ant-1").unwrap();
        drop(store);

        let other = ConfigStore::load(
            &path,
            &build(1),
            CredentialCipher::new(b"ffffffffffffffffffffffffffffffff").unwrap(),
            Arc::new(EventLog::new()),
        );
        assert!(matches!(
            other.credential(ProviderId::Anthropic),
            Err(LumenError::Credential(_))
        ));
    }

    #[test]
    fn save_failure_is_logged_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail.
        let path = dir.path().join("config.json");
        fs::create_dir_all(&path).unwrap();
        let (store, events) = open(&path, 1);

        store.set_generation_config(
            ModelKey::new(ProviderId::Ollama, "phi3"),
            GenerationConfig { top_k: 5, ..Default::default() },
        );
        assert_eq!(
            store.generation_config(&ModelKey::new(ProviderId::Ollama, "phi3")).top_k,
            5
        );
        assert!(!events.with_code("CFG-1001").is_empty());
    }

    #[test]
    fn concurrent_saves_keep_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (store, _) = open(&path, 1);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.set_generation_config(
                        ModelKey::new(ProviderId::Ollama, format!("model-{i}")),
                        GenerationConfig { top_k: i, ..Default::default() },
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk = stored(&path);
        for i in 0..8u32 {
            let key = ModelKey::new(ProviderId::Ollama, format!("model-{i}"));
            assert_eq!(store.generation_config(&key).top_k, i);
            assert_eq!(on_disk.model_configs[&key].top_k, i);
        }
    }
}
