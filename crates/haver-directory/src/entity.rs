//! Names, namespaces, and attributes shared by every directory entity.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{Directory, DirectoryError};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Checks a name against `[&]?[A-Za-z][A-Za-z0-9_.'@-]+`.
pub fn validate_name(name: &str) -> Result<(), DirectoryError> {
    let body = name.strip_prefix('&').unwrap_or(name);
    let mut chars = body.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest: Vec<char> = chars.collect();
    let rest_ok = !rest.is_empty()
        && rest.iter().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\'' | '@' | '-')
        });
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(DirectoryError::InvalidName(name.to_string()))
    }
}

/// Whether a name is set aside for server-owned entities.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('&') || name.contains('@')
}

/// Validates a name a client is trying to claim for a new entity.
///
/// This is the single place where the reserved-name rule is enforced;
/// [`User::new`](crate::User::new) and [`Room::new`](crate::Room::new) call
/// it, so no handler needs its own check.
pub fn validate_claimable(name: &str) -> Result<(), DirectoryError> {
    validate_name(name)?;
    if is_reserved(name) {
        return Err(DirectoryError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Directory key for a name. Uniqueness is case-insensitive.
pub fn fold(name: &str) -> String {
    name.to_lowercase()
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// A partition of the directory within which names are unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    User,
    Room,
}

impl Namespace {
    /// The wire tag for this namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Room => "room",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "room" => Ok(Self::Room),
            other => Err(DirectoryError::UnknownNamespace(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// An attribute value: either stored text or a producer evaluated on read.
#[derive(Clone)]
pub enum Attribute {
    Literal(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Attribute {
    /// Wraps a producer closure.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Returns the current value, invoking the producer if there is one.
    pub fn resolve(&self) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Attribute {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Attribute {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

/// An entity's attribute map, ordered by key so listings are stable.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    values: BTreeMap<String, Attribute>,
}

impl Attributes {
    /// Sets (or replaces) an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Attribute>) {
        self.values.insert(key.into(), value.into());
    }

    /// Reads an attribute, resolving computed values.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(Attribute::resolve)
    }

    /// Every attribute as resolved `(key, value)` pairs, in key order.
    pub fn resolved(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.resolve()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Entity trait
// ---------------------------------------------------------------------------

/// Something the [`Directory`] can register under a name.
///
/// Each implementor lives in exactly one namespace; `table`/`table_mut`
/// select that namespace's map so the directory operations can be written
/// once, generically.
pub trait Entity: Sized {
    /// Namespace this entity type is registered in.
    const NAMESPACE: Namespace;

    /// Display name (original case).
    fn name(&self) -> &str;

    /// Attribute map.
    fn attributes(&self) -> &Attributes;

    /// Reads one attribute.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownAttribute`] if the key was never set.
    fn attribute(&self, key: &str) -> Result<String, DirectoryError> {
        self.attributes().get(key).ok_or_else(|| {
            DirectoryError::UnknownAttribute(
                Self::NAMESPACE,
                self.name().to_string(),
                key.to_string(),
            )
        })
    }

    #[doc(hidden)]
    fn table(dir: &Directory) -> &std::collections::HashMap<String, Self>;

    #[doc(hidden)]
    fn table_mut(
        dir: &mut Directory,
    ) -> &mut std::collections::HashMap<String, Self>;
}
