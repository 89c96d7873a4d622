//! The user behind a request.
//!
//! The app runs behind a proxy that authenticates users and forwards their
//! identity in headers. Local runs have no proxy and fall back to the
//! configured identity.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::Serialize;

pub const FORWARDED_EMAIL: &str = "x-forwarded-email";
pub const FORWARDED_PREFERRED_USERNAME: &str = "x-forwarded-preferred-username";

/// Identity used when a request carries no forwarded email.
#[derive(Debug, Clone, Default)]
pub struct UserDefaults {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UserDefaults {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        let non_empty = |s: String| (!s.is_empty()).then_some(s);
        Self {
            email: non_empty(email.into()),
            name: non_empty(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestUser {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl RequestUser {
    /// Forwarded headers win. Without a forwarded email the configured
    /// identity fills in, with a forwarded username still taking precedence.
    pub fn from_headers(headers: &HeaderMap, defaults: &UserDefaults) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let name = header(FORWARDED_PREFERRED_USERNAME);
        match header(FORWARDED_EMAIL) {
            Some(email) => Self {
                email: Some(email),
                name,
            },
            None => Self {
                email: defaults.email.clone(),
                name: name.or_else(|| defaults.name.clone()),
            },
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.email {
            Some(email) => email.split('@').next().unwrap_or(email).to_string(),
            None => "Unknown".to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.email.is_some()
    }
}

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
    UserDefaults: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let defaults = UserDefaults::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &defaults))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn forwarded_headers_win() {
        let defaults = UserDefaults::new("dev@example.com", "Dev");
        let user = RequestUser::from_headers(
            &headers(&[
                ("x-forwarded-email", "alice@example.com"),
                ("x-forwarded-preferred-username", "Alice"),
            ]),
            &defaults,
        );
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.display_name(), "Alice");
        assert!(user.is_authenticated());
    }

    #[test]
    fn falls_back_to_defaults() {
        let defaults = UserDefaults::new("dev@example.com", "");
        let user = RequestUser::from_headers(&HeaderMap::new(), &defaults);
        assert_eq!(user.email.as_deref(), Some("dev@example.com"));
        assert_eq!(user.display_name(), "dev");

        let user = RequestUser::from_headers(
            &headers(&[("x-forwarded-preferred-username", "Proxy Name")]),
            &UserDefaults::new("dev@example.com", "Dev"),
        );
        assert_eq!(user.email.as_deref(), Some("dev@example.com"));
        assert_eq!(user.display_name(), "Proxy Name");
    }

    #[test]
    fn anonymous_without_any_identity() {
        let user = RequestUser::from_headers(&HeaderMap::new(), &UserDefaults::default());
        assert_eq!(user.email, None);
        assert_eq!(user.display_name(), "Unknown");
        assert!(!user.is_authenticated());
    }
}
