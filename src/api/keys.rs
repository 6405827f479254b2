//! Canonical cache keys for portfolio endpoints.
//!
//! A key doubles as the GET request target: endpoint path plus serialized
//! query string. Construction is injective — query values go through
//! percent-encoding and a fixed parameter order, so two different argument
//! combinations can never collide and equal arguments always render the
//! same string.

use url::form_urlencoded;

/// Endpoint paths, shared with the cache-operations helpers.
pub const PROJECTS_PATH: &str = "/api/projects";
pub const SKILLS_PATH: &str = "/api/skills";
pub const PROFILE_PATH: &str = "/api/profile";
pub const SETTINGS_PATH: &str = "/api/settings";

/// Identifies one fetchable portfolio resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKey {
  /// Project listing, optionally filtered by category and featured flag.
  Projects {
    category: Option<String>,
    featured: Option<bool>,
  },
  /// Skills listing.
  Skills,
  /// The owner profile record.
  Profile,
  /// Site-wide settings.
  Settings,
}

impl ResourceKey {
  /// Render the canonical key string (also the request target).
  pub fn render(&self) -> String {
    match self {
      Self::Projects { category, featured } => {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(category) = category {
          query.append_pair("category", category);
        }
        if let Some(featured) = featured {
          query.append_pair("featured", if *featured { "true" } else { "false" });
        }
        let query = query.finish();

        if query.is_empty() {
          PROJECTS_PATH.to_string()
        } else {
          format!("{}?{}", PROJECTS_PATH, query)
        }
      }
      Self::Skills => SKILLS_PATH.to_string(),
      Self::Profile => PROFILE_PATH.to_string(),
      Self::Settings => SETTINGS_PATH.to_string(),
    }
  }

  /// Human-readable description for logs.
  pub fn description(&self) -> String {
    match self {
      Self::Projects { category, featured } => {
        let mut desc = "projects".to_string();
        if let Some(c) = category {
          desc.push_str(&format!(" in {}", c));
        }
        if let Some(f) = featured {
          desc.push_str(if *f { " (featured)" } else { " (not featured)" });
        }
        desc
      }
      Self::Skills => "skills".to_string(),
      Self::Profile => "profile".to_string(),
      Self::Settings => "settings".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_same_arguments_render_same_key() {
    let a = ResourceKey::Projects {
      category: Some("web".into()),
      featured: Some(true),
    };
    let b = ResourceKey::Projects {
      category: Some("web".into()),
      featured: Some(true),
    };

    assert_eq!(a.render(), b.render());
    assert_eq!(a.render(), "/api/projects?category=web&featured=true");
  }

  #[test]
  fn test_different_arguments_render_different_keys() {
    let keys = [
      ResourceKey::Projects {
        category: None,
        featured: None,
      },
      ResourceKey::Projects {
        category: Some("web".into()),
        featured: None,
      },
      ResourceKey::Projects {
        category: None,
        featured: Some(true),
      },
      ResourceKey::Projects {
        category: None,
        featured: Some(false),
      },
      ResourceKey::Skills,
      ResourceKey::Profile,
      ResourceKey::Settings,
    ];

    let rendered: Vec<String> = keys.iter().map(|k| k.render()).collect();
    for (i, a) in rendered.iter().enumerate() {
      for b in rendered.iter().skip(i + 1) {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_encoding_prevents_collision_by_concatenation() {
    // A category value embedding a query separator must not collide with
    // a genuinely different argument combination.
    let tricky = ResourceKey::Projects {
      category: Some("web&featured=true".into()),
      featured: None,
    };
    let plain = ResourceKey::Projects {
      category: Some("web".into()),
      featured: Some(true),
    };

    assert_ne!(tricky.render(), plain.render());
  }
}
