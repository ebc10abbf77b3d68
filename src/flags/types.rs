//! Flag keys and user context types.

use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

/// User id used when the request carries none.
pub const ANONYMOUS_USER: &str = "anonymous";
/// Country used when the request carries none.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Every feature flag this service consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum FlagKey {
    /// Serve the `divide` operation.
    EnableDivision,
    /// Return the enhanced response envelope.
    EnhancedResponse,
}

impl FlagKey {
    /// Key as known to the flag service.
    pub fn key(self) -> &'static str {
        self.into()
    }

    /// Value used whenever the flag cannot be evaluated.
    pub const fn default_value(self) -> bool {
        match self {
            FlagKey::EnableDivision => false,
            FlagKey::EnhancedResponse => false,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Identity a flag is evaluated for. Built once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    /// User id (`X-User-ID`).
    pub id: String,
    /// Country (`X-User-Country`).
    pub country: String,
    /// Remote address of the connection, if known.
    pub ip: Option<String>,
}

impl UserContext {
    /// Build a context, substituting defaults for missing or empty values.
    pub fn new(id: Option<&str>, country: Option<&str>, ip: Option<String>) -> Self {
        Self {
            id: non_empty(id).unwrap_or(ANONYMOUS_USER).to_string(),
            country: non_empty(country).unwrap_or(UNKNOWN_COUNTRY).to_string(),
            ip,
        }
    }

    /// The anonymous user.
    pub fn anonymous() -> Self {
        Self::new(None, None, None)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn flag_keys_are_kebab_case() {
        assert_eq!(FlagKey::EnableDivision.key(), "enable-division");
        assert_eq!(FlagKey::EnhancedResponse.key(), "enhanced-response");
        assert_eq!(FlagKey::EnhancedResponse.to_string(), "enhanced-response");
    }

    #[test]
    fn all_flags_default_to_off() {
        for flag in FlagKey::iter() {
            assert!(!flag.default_value(), "{} should default to false", flag);
        }
    }

    #[test]
    fn missing_identity_becomes_anonymous() {
        let user = UserContext::new(None, Some(""), None);
        assert_eq!(user.id, ANONYMOUS_USER);
        assert_eq!(user.country, UNKNOWN_COUNTRY);
        assert_eq!(user, UserContext::anonymous());
    }

    #[test]
    fn provided_identity_is_kept() {
        let user = UserContext::new(Some("u-42"), Some("NL"), Some("10.0.0.1".to_string()));
        assert_eq!(user.id, "u-42");
        assert_eq!(user.country, "NL");
        assert_eq!(user.ip.as_deref(), Some("10.0.0.1"));
    }
}
