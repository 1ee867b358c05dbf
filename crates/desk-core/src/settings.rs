//! Named configuration values behind an explicit read-through cache.
//!
//! The cache is owned by whoever constructs it and passed where needed. Every
//! write made through it drops the cached snapshot; the next read reloads all
//! settings from the store.

use std::{
  collections::BTreeMap,
  sync::{
    Arc, LazyLock,
    atomic::{AtomicU64, Ordering},
  },
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{Error, Result, store::SettingStore};

/// A stored setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
  pub setting_id:    i64,
  pub name:          String,
  pub value:         Value,
  /// The value the setting was created with; restored by
  /// [`SettingsCache::reset`].
  pub initial_value: Value,
}

/// Resolved values keyed by setting name.
pub type SettingsSnapshot = BTreeMap<String, Value>;

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"#\{config\.(.+?)\}").expect("placeholder regex"));

/// Read-through cache over a [`SettingStore`].
pub struct SettingsCache<S> {
  store:      Arc<S>,
  snapshot:   RwLock<Option<Arc<SettingsSnapshot>>>,
  /// Bumped on every invalidation so a load racing a write never caches what
  /// it read before the write.
  generation: AtomicU64,
}

impl<S: SettingStore> SettingsCache<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      snapshot: RwLock::new(None),
      generation: AtomicU64::new(0),
    }
  }

  /// The current snapshot, loading it from the store on a miss.
  pub async fn load(&self) -> Result<Arc<SettingsSnapshot>> {
    if let Some(snapshot) = self.snapshot.read().await.as_ref() {
      return Ok(Arc::clone(snapshot));
    }

    let generation = self.generation.load(Ordering::Acquire);
    let settings = self.store.list_settings().await.map_err(Error::store)?;
    let snapshot = Arc::new(resolve(
      settings.into_iter().map(|s| (s.name, s.value)).collect(),
    ));

    let mut slot = self.snapshot.write().await;
    if self.generation.load(Ordering::Acquire) == generation {
      *slot = Some(Arc::clone(&snapshot));
    }
    Ok(snapshot)
  }

  /// A single resolved value.
  pub async fn get(&self, name: &str) -> Result<Option<Value>> {
    Ok(self.load().await?.get(name).cloned())
  }

  /// Create a new setting.
  pub async fn create(&self, name: &str, value: Value) -> Result<Setting> {
    let setting = self
      .store
      .insert_setting(name, value)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::SettingExists(name.to_owned()))?;
    self.invalidate().await;
    tracing::debug!(setting = name, "setting created");
    Ok(setting)
  }

  /// Replace the value of an existing setting.
  pub async fn set(&self, name: &str, value: Value) -> Result<()> {
    let found = self
      .store
      .update_setting(name, value)
      .await
      .map_err(Error::store)?;
    if !found {
      return Err(Error::SettingNotFound(name.to_owned()));
    }
    self.invalidate().await;
    tracing::debug!(setting = name, "setting updated");
    Ok(())
  }

  /// Restore a setting to the value it was created with.
  pub async fn reset(&self, name: &str) -> Result<()> {
    let setting = self
      .store
      .get_setting(name)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::SettingNotFound(name.to_owned()))?;
    self.set(name, setting.initial_value).await
  }

  /// Drop the cached snapshot.
  pub async fn invalidate(&self) {
    self.generation.fetch_add(1, Ordering::AcqRel);
    *self.snapshot.write().await = None;
  }
}

/// Expand `#{config.<name>}` placeholders in string values against the raw
/// values of the other settings.
fn resolve(raw: SettingsSnapshot) -> SettingsSnapshot {
  raw
    .iter()
    .map(|(name, value)| {
      let value = match value {
        Value::String(s) => Value::String(
          PLACEHOLDER
            .replace_all(s, |caps: &Captures<'_>| render(raw.get(&caps[1])))
            .into_owned(),
        ),
        other => other.clone(),
      };
      (name.clone(), value)
    })
    .collect()
}

fn render(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn raw(pairs: &[(&str, Value)]) -> SettingsSnapshot {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
  }

  #[test]
  fn placeholders_expand_from_raw_values() {
    let resolved = resolve(raw(&[
      ("fqdn", json!("desk.example.com")),
      ("http_type", json!("https")),
      ("port", json!(8443)),
      ("url", json!("#{config.http_type}://#{config.fqdn}:#{config.port}/")),
    ]));
    assert_eq!(resolved["url"], json!("https://desk.example.com:8443/"));
    assert_eq!(resolved["port"], json!(8443));
  }

  #[test]
  fn missing_and_null_references_expand_to_nothing() {
    let resolved = resolve(raw(&[
      ("empty", Value::Null),
      ("greeting", json!("hi #{config.nobody}#{config.empty}!")),
    ]));
    assert_eq!(resolved["greeting"], json!("hi !"));
  }

  #[test]
  fn non_string_values_pass_through() {
    let resolved = resolve(raw(&[("flags", json!({ "a": "#{config.b}" }))]));
    assert_eq!(resolved["flags"], json!({ "a": "#{config.b}" }));
  }
}
