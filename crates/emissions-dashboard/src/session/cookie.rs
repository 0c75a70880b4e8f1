//! Signed session cookie codec.
//!
//! The cookie value is `<base64url(json payload)>.<hex blake3 keyed hash>`.
//! The MAC key is derived from the configured secret, so a cookie signed under
//! one secret is rejected under another.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tracing::debug;

use super::state::SessionCookie;

pub const SESSION_COOKIE_NAME: &str = "session";

const KEY_CONTEXT: &str = "emissions-dashboard 2024 session cookie signing";

#[derive(Clone)]
pub struct SessionCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    pub fn encode(&self, cookie: &SessionCookie) -> anyhow::Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(cookie)?);
        let signature = blake3::keyed_hash(&self.key, payload.as_bytes());
        Ok(format!("{}.{}", payload, signature.to_hex()))
    }

    /// `None` for malformed or forged values.
    pub fn decode(&self, value: &str) -> Option<SessionCookie> {
        let (payload, signature) = value.rsplit_once('.')?;
        let claimed = blake3::Hash::from_hex(signature).ok()?;
        // blake3::Hash equality is constant-time.
        if blake3::keyed_hash(&self.key, payload.as_bytes()) != claimed {
            debug!("Rejected session cookie with invalid signature");
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// First verifiable session cookie among the request's `Cookie` headers.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionCookie> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE_NAME)
            .find_map(|(_, value)| self.decode(value))
    }

    /// No `Max-Age`/`Expires`: the cookie lives as long as the browser session.
    pub fn set_cookie_header(&self, cookie: &SessionCookie) -> anyhow::Result<HeaderValue> {
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE_NAME,
            self.encode(cookie)?
        );
        Ok(HeaderValue::from_str(&value)?)
    }
}
