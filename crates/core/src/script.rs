//! Script identity types: owners, scopes and script names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a scope or script name.
pub const MAX_NAME_LEN: usize = 64;

/// Owner (tenant user) identifier as assigned by the upstream identity layer.
pub type OwnerId = i64;

/// Script record identifier as assigned by the metadata store.
pub type ScriptId = i64;

/// Validate a delimiter-safe identifier: `[A-Za-z0-9][A-Za-z0-9_-]{0,63}`.
fn validate_ident(kind: &str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(crate::Error::InvalidName(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "{kind} must be at most {MAX_NAME_LEN} chars, got {}",
            value.len()
        )));
    }
    let mut chars = value.chars();
    if let Some(first) = chars.next()
        && !first.is_ascii_alphanumeric()
    {
        return Err(crate::Error::InvalidName(format!(
            "{kind} must start with an ASCII letter or digit: {value}"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
        return Err(crate::Error::InvalidName(format!(
            "invalid character {bad:?} in {kind}: {value}"
        )));
    }
    Ok(())
}

/// A tenant namespace. Names are only unique within a scope.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    /// Create from a string, validating format.
    pub fn new(scope: impl Into<String>) -> crate::Result<Self> {
        let scope = scope.into();
        validate_ident("scope", &scope)?;
        Ok(Self(scope))
    }

    /// Get the scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A script name, validated before any storage key is derived from it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScriptName(String);

impl ScriptName {
    /// Create from a string, validating format.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        validate_ident("script name", &name)?;
        Ok(Self(name))
    }

    /// Get the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = crate::Error;

            fn try_from(value: String) -> crate::Result<Self> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype_impls!(Scope);
string_newtype_impls!(ScriptName);

/// The (scope, name) identity every storage and cache key is derived from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScriptIdentity {
    pub scope: Scope,
    pub name: ScriptName,
}

impl ScriptIdentity {
    pub fn new(scope: Scope, name: ScriptName) -> Self {
        Self { scope, name }
    }

    /// Parse and validate both halves of an identity.
    pub fn parse(scope: &str, name: &str) -> crate::Result<Self> {
        Ok(Self {
            scope: Scope::new(scope)?,
            name: ScriptName::new(name)?,
        })
    }

    /// Cache key for this identity.
    pub fn cache_key(&self) -> String {
        crate::keys::cache_key(self.scope.as_str(), self.name.as_str())
    }

    /// Content blob key for this identity.
    pub fn content_key(&self) -> String {
        crate::keys::content_key(self.scope.as_str(), self.name.as_str())
    }

    /// Env blob key for this identity.
    pub fn env_key(&self) -> String {
        crate::keys::env_key(self.scope.as_str(), self.name.as_str())
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}
