//! Response envelope and portfolio resource models.
//!
//! Every endpoint answers with the same envelope shape:
//! `{ success: bool, data?: T, error?: string }`. The cache stores the
//! envelope untyped (`serde_json::Value` payload) and stays agnostic about
//! `success` — checking the discriminant is the consumer's job. Typed views
//! are produced at the resource layer via [`TypedEnvelope`].

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// The untyped server response envelope as stored in the shared cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl Envelope {
  /// Build a success envelope around a JSON payload.
  pub fn ok(data: Value) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
    }
  }

  /// Build a failure envelope with an error message.
  pub fn err(message: impl Into<String>) -> Self {
    Self {
      success: false,
      data: None,
      error: Some(message.into()),
    }
  }

  /// Decode the payload into a typed envelope.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<TypedEnvelope<T>> {
    let data = match &self.data {
      Some(value) => Some(
        serde_json::from_value(value.clone())
          .map_err(|e| eyre!("Failed to decode response payload: {}", e))?,
      ),
      None => None,
    };

    Ok(TypedEnvelope {
      success: self.success,
      data,
      error: self.error.clone(),
    })
  }
}

/// A typed view over an [`Envelope`], produced at the resource layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedEnvelope<T> {
  pub success: bool,
  pub data: Option<T>,
  pub error: Option<String>,
}

impl<T: Serialize> TypedEnvelope<T> {
  /// Build a success envelope around typed data.
  pub fn ok(data: T) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
    }
  }

  /// Encode back into the untyped envelope shape for cache storage.
  pub fn encode(&self) -> Result<Envelope> {
    let data = match &self.data {
      Some(value) => Some(
        serde_json::to_value(value)
          .map_err(|e| eyre!("Failed to encode payload: {}", e))?,
      ),
      None => None,
    };

    Ok(Envelope {
      success: self.success,
      data,
      error: self.error.clone(),
    })
  }
}

// ============================================================================
// Resource models
// ============================================================================

/// A portfolio project entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: String,
  pub title: String,
  pub description: String,
  pub category: String,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub featured: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

/// A skill entry with a 0-100 proficiency score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
  pub id: String,
  pub title: String,
  pub proficiency: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub icon: Option<String>,
}

/// The site owner's profile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub name: String,
  pub title: String,
  pub bio: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar_url: Option<String>,
  #[serde(default)]
  pub social: SocialLinks,
}

/// Social profile links shown in the site footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub github: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub linkedin: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub twitter: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub website: Option<String>,
}

/// Site-wide settings edited from the admin panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
  pub site_title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tagline: Option<String>,
  #[serde(default)]
  pub maintenance_mode: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub analytics_id: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_envelope_decode_typed() {
    let envelope = Envelope::ok(json!([{ "id": "1", "title": "Design", "proficiency": 80 }]));

    let typed: TypedEnvelope<Vec<Skill>> = envelope.decode().unwrap();
    assert!(typed.success);
    assert_eq!(typed.data.as_ref().unwrap()[0].proficiency, 80);
  }

  #[test]
  fn test_envelope_decode_failure_envelope() {
    let envelope = Envelope::err("not found");

    // A failure envelope decodes fine; data is simply absent.
    let typed: TypedEnvelope<Vec<Skill>> = envelope.decode().unwrap();
    assert!(!typed.success);
    assert!(typed.data.is_none());
    assert_eq!(typed.error.as_deref(), Some("not found"));
  }

  #[test]
  fn test_typed_envelope_round_trips_through_encode() {
    let typed = TypedEnvelope::ok(vec![Skill {
      id: "1".into(),
      title: "Design".into(),
      proficiency: 80,
      category: None,
      icon: None,
    }]);

    let envelope = typed.encode().unwrap();
    let back: TypedEnvelope<Vec<Skill>> = envelope.decode().unwrap();
    assert_eq!(back, typed);
  }

  #[test]
  fn test_models_use_camel_case_wire_names() {
    let value = json!({
      "id": "p1",
      "title": "Portfolio",
      "description": "This site",
      "category": "web",
      "featured": true,
      "imageUrl": "https://example.com/p1.png"
    });

    let project: Project = serde_json::from_value(value).unwrap();
    assert_eq!(project.image_url.as_deref(), Some("https://example.com/p1.png"));
    assert!(project.featured);
    assert!(project.tags.is_empty());
  }
}
