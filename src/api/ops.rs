//! Direct cache operations for write-path code.
//!
//! Admin form handlers know the shape of the data they just persisted and
//! want to push it into the cache without holding a resource binding. These
//! helpers are sugar over [`SharedCache`] for the well-known portfolio keys:
//! targeted invalidation plus add/update/remove-by-id edits of the cached
//! skills listing. Every write broadcasts, so sibling consumers and peer
//! caches converge immediately.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

use crate::cache::SharedCache;

use super::keys::{PROFILE_PATH, PROJECTS_PATH, SETTINGS_PATH, SKILLS_PATH};
use super::types::Skill;

#[derive(Clone)]
pub struct CacheOps {
  cache: SharedCache,
}

impl CacheOps {
  pub fn new(cache: SharedCache) -> Self {
    Self { cache }
  }

  /// Invalidate every key currently present.
  pub fn invalidate_all(&self) {
    for key in self.cache.keys() {
      self.cache.invalidate(&key);
    }
  }

  pub fn invalidate_skills(&self) {
    self.cache.invalidate(SKILLS_PATH);
  }

  /// Invalidate every project listing, whatever its filter combination.
  pub fn invalidate_projects(&self) {
    self.cache.invalidate_prefix(PROJECTS_PATH);
  }

  pub fn invalidate_profile(&self) {
    self.cache.invalidate(PROFILE_PATH);
  }

  pub fn invalidate_settings(&self) {
    self.cache.invalidate(SETTINGS_PATH);
  }

  /// Merge `patch` object fields into the cached skill with the given id.
  ///
  /// Returns whether anything changed; a cold cache or unknown id is a
  /// silent no-op.
  pub fn optimistic_update_skill(&self, id: &str, patch: &Value) -> bool {
    self.edit_skills(|skills| {
      let mut changed = false;
      for item in skills.iter_mut() {
        if item.get("id").and_then(Value::as_str) != Some(id) {
          continue;
        }
        if let (Some(target), Some(fields)) = (item.as_object_mut(), patch.as_object()) {
          for (key, value) in fields {
            target.insert(key.clone(), value.clone());
          }
          changed = true;
        }
      }
      changed
    })
  }

  /// Append a skill to the cached listing.
  pub fn optimistic_add_skill(&self, skill: &Skill) -> Result<bool> {
    let value =
      serde_json::to_value(skill).map_err(|e| eyre!("Failed to serialize skill: {}", e))?;
    Ok(self.edit_skills(|skills| {
      skills.push(value);
      true
    }))
  }

  /// Remove the skill with the given id from the cached listing.
  pub fn optimistic_remove_skill(&self, id: &str) -> bool {
    self.edit_skills(|skills| {
      let before = skills.len();
      skills.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
      skills.len() != before
    })
  }

  /// Apply an edit to the cached skills array and write it back.
  fn edit_skills(&self, edit: impl FnOnce(&mut Vec<Value>) -> bool) -> bool {
    let Some(current) = self.cache.get(SKILLS_PATH) else {
      return false;
    };
    let mut envelope = (*current).clone();
    let Some(Value::Array(skills)) = envelope.data.as_mut() else {
      return false;
    };

    if !edit(skills) {
      return false;
    }
    self.cache.set(SKILLS_PATH, envelope);
    true
  }
}
