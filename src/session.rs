use axum::http::HeaderMap;
use base64ct::Encoding;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::settings::Session as SessionCfg;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEntry {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Login sessions keyed by cookie value.
///
/// One lock guards the whole map; every operation is a single short critical
/// section.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(cfg: &SessionCfg) -> Self {
        Self::new(Duration::hours(cfg.ttl_hours))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a session for `username` and return its id.
    pub fn create(&self, username: &str) -> String {
        let session_id = random_id();
        self.set(&session_id, username, Utc::now() + self.ttl);
        session_id
    }

    pub fn set(&self, session_id: &str, username: &str, expires_at: DateTime<Utc>) {
        self.lock().insert(
            session_id.to_string(),
            SessionEntry {
                username: username.to_string(),
                expires_at,
            },
        );
    }

    /// User behind a live session; expired sessions are absent.
    pub fn get(&self, session_id: &str) -> Option<String> {
        let sessions = self.lock();
        let entry = sessions.get(session_id)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.username.clone())
    }

    /// End a session. Returns whether it existed.
    pub fn expire(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub session_id: String,
}

impl SessionCookie {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        let cookie_header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some(value) = cookie
                .strip_prefix(cookie_name)
                .and_then(|s| s.strip_prefix('='))
            {
                return Some(Self {
                    session_id: value.to_string(),
                });
            }
        }
        None
    }

    pub fn to_cookie_header(&self, cfg: &SessionCfg) -> String {
        format!(
            "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
            cfg.cookie_name,
            self.session_id,
            cfg.ttl_hours * 3600
        )
    }

    pub fn delete_cookie_header(cfg: &SessionCfg) -> String {
        format!(
            "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
            cfg.cookie_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new(Duration::hours(12));
        let id = store.create("alice");
        assert_eq!(store.get(&id), Some("alice".to_string()));
        assert_eq!(store.get("unknown"), None);
        assert_ne!(store.create("alice"), id);
    }

    #[test]
    fn test_expired_session_is_absent_and_purged() {
        let store = SessionStore::new(Duration::hours(12));
        store.set("old", "bob", Utc::now() - Duration::minutes(1));
        let live = store.create("alice");

        assert_eq!(store.get("old"), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&live), Some("alice".to_string()));
    }

    #[test]
    fn test_expire() {
        let store = SessionStore::new(Duration::hours(1));
        let id = store.create("alice");
        assert!(store.expire(&id));
        assert!(!store.expire(&id));
        assert_eq!(store.get(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cookie_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; groupgate_auth=abc123; other=1"),
        );
        let cookie = SessionCookie::from_headers(&headers, "groupgate_auth").unwrap();
        assert_eq!(cookie.session_id, "abc123");

        assert!(SessionCookie::from_headers(&headers, "missing").is_none());
        assert!(SessionCookie::from_headers(&HeaderMap::new(), "groupgate_auth").is_none());
    }

    #[test]
    fn test_cookie_headers() {
        let cfg = SessionCfg::default();
        let header = SessionCookie::new("abc".into()).to_cookie_header(&cfg);
        assert!(header.starts_with("groupgate_auth=abc;"));
        assert!(header.contains("Max-Age=43200"));
        assert!(SessionCookie::delete_cookie_header(&cfg).contains("Max-Age=0"));
    }
}
