//! Env-file backed secret store

use std::collections::HashMap;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::StackError;
use crate::filesys::file::File;

/// Secret values kept in a `KEY=VALUE` file.
///
/// Values referenced for the first time are generated and persisted, so every
/// later activation of the same stack sees the same secret.
#[derive(Debug)]
pub struct SecretStore {
    file: File,
    lock: Mutex<()>,
}

impl SecretStore {
    pub fn new(file: File) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Value of `key`, generating and persisting one if it is missing
    pub async fn get_or_create(&self, key: &str) -> Result<String, StackError> {
        let mut values = self.get_or_create_all([key]).await?;
        values
            .remove(key)
            .ok_or_else(|| StackError::SecretError(format!("no value for {}", key)))
    }

    /// Values for every key, generating the missing ones in a single write
    pub async fn get_or_create_all<I, S>(&self, keys: I) -> Result<HashMap<String, String>, StackError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        if let Some(blank) = keys.iter().find(|k| k.trim().is_empty()) {
            return Err(StackError::SecretError(format!("invalid secret name '{}'", blank)));
        }
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let mut created = 0;
        for key in &keys {
            if !entries.contains_key(key) {
                entries.insert(key.clone(), generate_value());
                created += 1;
            }
        }
        if created > 0 {
            info!("Generated {} new secret(s) in {}", created, self.file.path().display());
            self.write_entries(&entries).await?;
        }

        Ok(keys
            .into_iter()
            .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
            .collect())
    }

    /// Remove `key`; returns whether it was present
    pub async fn remove(&self, key: &str) -> Result<bool, StackError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.shift_remove(key).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries).await?;
        Ok(true)
    }

    async fn read_entries(&self) -> Result<IndexMap<String, String>, StackError> {
        match self.file.read_optional().await? {
            Some(contents) => Ok(parse_env(&contents)),
            None => {
                debug!("Secret file {} does not exist yet", self.file.path().display());
                Ok(IndexMap::new())
            }
        }
    }

    async fn write_entries(&self, entries: &IndexMap<String, String>) -> Result<(), StackError> {
        let mut contents = String::new();
        for (key, value) in entries {
            contents.push_str(key);
            contents.push('=');
            contents.push_str(value);
            contents.push('\n');
        }
        self.file.write_atomic(&contents, true).await
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments and unquoting values
pub fn parse_env(contents: &str) -> IndexMap<String, String> {
    let mut entries = IndexMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    entries
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() > 1 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn generate_value() -> String {
    Uuid::new_v4().simple().to_string()
}
