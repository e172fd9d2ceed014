use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

pub const API_KEY_ENV_KEYS: [&str; 2] = ["LIFELOOP_GOOGLE_API_KEY", "GOOGLE_API_KEY"];

pub trait ApiKeyStore: Send + Sync {
    fn save_api_key(&self, api_key: &str) -> Result<(), InfraError>;
    fn load_api_key(&self) -> Result<Option<String>, InfraError>;
    fn delete_api_key(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringApiKeyStore {
    service_name: String,
    account_name: String,
}

impl KeyringApiKeyStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringApiKeyStore {
    fn default() -> Self {
        Self::new("lifeloop.gemini", "default")
    }
}

impl ApiKeyStore for KeyringApiKeyStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), InfraError> {
        let api_key = normalize_api_key(api_key)?;
        self.entry()?
            .set_password(&api_key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_api_key(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    api_key: Mutex<Option<String>>,
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), InfraError> {
        let api_key = normalize_api_key(api_key)?;
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(api_key);
        Ok(())
    }

    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .api_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_api_key(&self) -> Result<(), InfraError> {
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

fn normalize_api_key(api_key: &str) -> Result<String, InfraError> {
    let normalized = api_key.trim();
    if normalized.is_empty() {
        return Err(InfraError::Credential("api key must not be empty".to_string()));
    }
    Ok(normalized.to_string())
}

pub fn load_api_key_from_env<S: ApiKeyStore + ?Sized>(store: &S) -> Result<String, InfraError> {
    load_api_key_from_lookup(|key| std::env::var(key).ok(), store)
}

/// Environment first, then the credential store.
pub fn load_api_key_from_lookup<F, S>(lookup: F, store: &S) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
    S: ApiKeyStore + ?Sized,
{
    if let Some(api_key) = optional_lookup_value(&lookup, &API_KEY_ENV_KEYS) {
        return Ok(api_key);
    }
    store
        .load_api_key()?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "missing gemini api key (set one of: {} or store it in the keyring)",
                API_KEY_ENV_KEYS.join(", ")
            ))
        })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lookup_wins_over_store() {
        let store = InMemoryApiKeyStore::default();
        store.save_api_key("stored-key").expect("save key");

        let resolved = load_api_key_from_lookup(
            |key| match key {
                "GOOGLE_API_KEY" => Some("  env-key ".to_string()),
                _ => None,
            },
            &store,
        )
        .expect("resolve key");
        assert_eq!(resolved, "env-key");
    }

    #[test]
    fn prefixed_env_key_takes_precedence() {
        let store = InMemoryApiKeyStore::default();
        let resolved = load_api_key_from_lookup(
            |key| match key {
                "LIFELOOP_GOOGLE_API_KEY" => Some("lifeloop-key".to_string()),
                "GOOGLE_API_KEY" => Some("generic-key".to_string()),
                _ => None,
            },
            &store,
        )
        .expect("resolve key");
        assert_eq!(resolved, "lifeloop-key");
    }

    #[test]
    fn blank_env_falls_through_to_store() {
        let store = InMemoryApiKeyStore::default();
        store.save_api_key("stored-key").expect("save key");
        let resolved = load_api_key_from_lookup(|_| Some("   ".to_string()), &store)
            .expect("resolve key");
        assert_eq!(resolved, "stored-key");
    }

    #[test]
    fn missing_key_reports_invalid_config() {
        let store = InMemoryApiKeyStore::default();
        match load_api_key_from_lookup(|_| None, &store) {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("gemini api key"));
            }
            other => panic!("expected invalid config error, got {other:?}"),
        }
    }

    #[test]
    fn in_memory_store_roundtrip_and_delete() {
        let store = InMemoryApiKeyStore::default();
        assert!(store.save_api_key("  ").is_err());
        store.save_api_key("key").expect("save key");
        assert_eq!(store.load_api_key().expect("load"), Some("key".to_string()));
        store.delete_api_key().expect("delete");
        assert_eq!(store.load_api_key().expect("load"), None);
    }
}
