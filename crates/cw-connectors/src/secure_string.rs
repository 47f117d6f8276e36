//! Credential storage that zeroizes its memory on drop.
//!
//! Catalog tokens and passwords travel through configuration files and
//! request headers; wrapping them keeps them out of `Debug` output and logs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// A string holding a secret, cleared from memory when dropped.
///
/// ```
/// use cw_connectors::SecureString;
///
/// let token = SecureString::from("catalog-token");
/// assert_eq!(token.expose_secret(), "catalog-token");
/// assert_eq!(format!("{:?}", token), "SecureString([REDACTED])");
/// ```
/// Has no `PartialEq`; compare `expose_secret()` values where needed.
#[derive(Clone, Default)]
pub struct SecureString(Zeroizing<String>);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(Zeroizing::new(s))
    }

    /// Returns the secret for use in a request header.
    ///
    /// Copies made from the returned slice are not zeroized.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// Config files round-trip the raw value; redaction for display happens in the CLI.
impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = SecureString::from("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(!format!("{}", secret).contains("hunter2"));
    }

    #[test]
    fn test_deserialize_from_yaml_string() {
        let secret: SecureString = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(secret.expose_secret(), "abc");
        assert!(!secret.is_empty());
        assert!(SecureString::default().is_empty());
    }

    #[test]
    fn test_secrets_are_not_comparable() {
        use std::marker::PhantomData;

        trait Fallback {
            const COMPARABLE: bool = false;
        }
        struct Check<T>(PhantomData<T>);
        impl<T> Fallback for Check<T> {}
        impl<T: PartialEq> Check<T> {
            const COMPARABLE: bool = true;
        }

        assert!(!Check::<SecureString>::COMPARABLE);
        assert!(Check::<String>::COMPARABLE);
    }
}
