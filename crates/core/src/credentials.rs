//! Session credentials and the storage contract they live behind.
//!
//! The interactive login flow produces a cookie jar; the agent only ever
//! reads it, merges rotated cookies into it, or clears it on logout.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of the cookie carrying the session JWT.
pub const JWT_COOKIE: &str = "JWTTOKEN";

/// Cookie jar for the single signed-in session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub cookies: BTreeMap<String, String>,
}

impl Credentials {
    /// Credentials consisting of just the session JWT cookie.
    pub fn from_jwt(token: impl Into<String>) -> Self {
        let mut cookies = BTreeMap::new();
        cookies.insert(JWT_COOKIE.to_string(), token.into());
        Self { cookies }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn jwt(&self) -> Option<&str> {
        self.cookies.get(JWT_COOKIE).map(String::as_str)
    }

    /// Value for a `Cookie` request header, or `None` when the jar is empty.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Merge one `Set-Cookie` header value into the jar.
    ///
    /// Only `name=value` and `Max-Age` are interpreted; an empty value or a
    /// non-positive `Max-Age` deletes the cookie. Returns whether the jar
    /// changed.
    pub fn apply_set_cookie(&mut self, header: &str) -> bool {
        let mut parts = header.split(';').map(str::trim);
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        let expired = parts.any(|attr| {
            attr.split_once('=').is_some_and(|(key, v)| {
                key.trim().eq_ignore_ascii_case("max-age")
                    && v.trim().parse::<i64>().is_ok_and(|secs| secs <= 0)
            })
        });

        let value = value.trim().trim_matches('"');
        if expired || value.is_empty() {
            return self.cookies.remove(name).is_some();
        }

        match self.cookies.get(name) {
            Some(existing) if existing == value => false,
            _ => {
                self.cookies.insert(name.to_string(), value.to_string());
                true
            }
        }
    }
}

/// Durable storage for [`Credentials`].
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credentials, `None` when logged out.
    async fn get(&self) -> Result<Option<Credentials>, CoreError>;

    async fn set(&self, credentials: &Credentials) -> Result<(), CoreError>;

    async fn clear(&self) -> Result<(), CoreError>;
}

/// Process-local credential store, for tests and embedders that persist
/// credentials elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Credentials>>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Internal("credential store lock poisoned".into()))
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<Credentials>, CoreError> {
        Ok(self.lock()?.clone())
    }

    async fn set(&self, credentials: &Credentials) -> Result<(), CoreError> {
        *self.lock()? = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        *self.lock()? = None;
        Ok(())
    }
}
