//! User references extracted from analyzer output, and the roles they hold.
//!
//! The analyzer reports users in several shapes: a bare login string, an
//! object with an `id`, or an object with an `email`. [`UserRef::from_json`]
//! normalizes all of them once, so the rest of the pipeline only deals with a
//! single user key per reference.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Role a user holds on a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Creator,
    Assignee,
    Reviewer,
    UpliftAuthor,
}

/// A normalized reference to a tracker user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    /// Bare string: a login or numeric id as text.
    ByIdentifier(String),
    /// Record carrying only a contact address.
    ByContact(String),
    /// Record with an identifier, and possibly a contact address.
    Structured {
        identifier: Option<String>,
        contact: Option<String>,
    },
}

/// A user reference had a shape we cannot key on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user reference: {reason}")]
pub struct InvalidUserReference {
    pub reason: &'static str,
}

impl UserRef {
    /// Normalize an analyzer user value.
    ///
    /// Returns `Ok(None)` for `null`, meaning "no user in this role".
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUserReference`] for objects carrying neither `id` nor
    /// `email`, and for any non-string, non-object value.
    pub fn from_json(value: &Value) -> Result<Option<Self>, InvalidUserReference> {
        match value {
            Value::Null => Ok(None),
            Value::String(raw) => Ok(Some(Self::ByIdentifier(raw.clone()))),
            Value::Object(map) => Self::from_object(map).map(Some),
            _ => Err(InvalidUserReference {
                reason: "unsupported format",
            }),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Result<Self, InvalidUserReference> {
        let identifier = match map.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        let contact = map.get("email").and_then(Value::as_str).map(ToOwned::to_owned);

        match (identifier, contact) {
            (None, None) => Err(InvalidUserReference {
                reason: "no id or email",
            }),
            (None, Some(contact)) => Ok(Self::ByContact(contact)),
            (identifier, contact) => Ok(Self::Structured {
                identifier,
                contact,
            }),
        }
    }

    /// The key used to look the user up on the tracker.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::ByIdentifier(key) | Self::ByContact(key) => key,
            Self::Structured {
                identifier: Some(key),
                ..
            }
            | Self::Structured {
                identifier: None,
                contact: Some(key),
            } => key,
            // from_object never builds this variant; keep the match total.
            Self::Structured {
                identifier: None,
                contact: None,
            } => "",
        }
    }
}

/// Accumulated roles per user key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    roles: BTreeMap<String, Vec<Role>>,
}

impl RoleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user` holds `role`. Repeated roles are collapsed.
    pub fn add(&mut self, user: &UserRef, role: Role) {
        let entry = self.roles.entry(user.key().to_string()).or_default();
        if !entry.contains(&role) {
            entry.push(role);
        }
    }

    /// Unique user keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.roles.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Role]> {
        self.roles.get(key).map(Vec::as_slice)
    }

    /// Roles for a resolved profile, matched by id, then login name, then email.
    #[must_use]
    pub fn roles_for(&self, profile: &UserProfile) -> Vec<Role> {
        let by_id = profile.id.to_string();
        [Some(by_id.as_str()), profile.name.as_deref(), profile.email.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|key| self.roles.get(key))
            .cloned()
            .unwrap_or_default()
    }
}

/// A user as returned by the tracker's user lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl UserProfile {
    #[must_use]
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            email: None,
            real_name: None,
            extra: Map::new(),
            roles: Vec::new(),
        }
    }
}
