//! Tenant headers and short-lived service tokens for backend requests.
//!
//! Every request carries `X-User-Id` / `X-Firm-Id` when configured and
//! `ngrok-skip-browser-warning: true`. When both ids are present and a
//! signing secret of at least [`MIN_SECRET_LEN`] bytes is available, an
//! `X-Internal-Auth: Bearer <jwt>` header is added. The token is HS256 over
//! the claims below and is bound to one method and path:
//!
//! ```text
//! { "sub": user_id, "firm_id": firm_id, "iat": now, "exp": now + ttl,
//!   "mth": "GET", "pth": "/runs/r-1/artifacts/json" }
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Shortest secret accepted for token signing.
pub const MIN_SECRET_LEN: usize = 32;

pub const HEADER_USER_ID: &str = "X-User-Id";
pub const HEADER_FIRM_ID: &str = "X-Firm-Id";
pub const HEADER_INTERNAL_AUTH: &str = "X-Internal-Auth";
pub const HEADER_SKIP_BROWSER_WARNING: &str = "ngrok-skip-browser-warning";

/// The tenant a request is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub user_id: Option<String>,
    pub firm_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalClaims {
    pub sub: String,
    pub firm_id: String,
    pub iat: i64,
    pub exp: i64,
    pub mth: String,
    pub pth: String,
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

const JWT_HEADER: JwtHeader = JwtHeader {
    alg: "HS256",
    typ: "JWT",
};

/// Sign an HS256 token for one request. `now` is in unix seconds. Returns
/// `None` when the expiry does not fit in an `i64`.
pub fn sign_internal_jwt(
    user_id: &str,
    firm_id: &str,
    secret: &str,
    ttl_secs: i64,
    method: &str,
    path: &str,
    now: i64,
) -> Option<String> {
    let Some(exp) = now.checked_add(ttl_secs) else {
        tracing::warn!(now, ttl_secs, "token expiry overflows, request goes unsigned");
        return None;
    };
    let claims = InternalClaims {
        sub: user_id.to_string(),
        firm_id: firm_id.to_string(),
        iat: now,
        exp,
        mth: method.to_uppercase(),
        pth: path.to_string(),
    };

    let header = serde_json::to_vec(&JWT_HEADER).ok()?;
    let payload = serde_json::to_vec(&claims).ok()?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes())?;
    Some(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Builds the header set for each backend request.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    identity: ServiceIdentity,
    secret: Option<String>,
    ttl_secs: i64,
}

impl RequestSigner {
    pub fn new(identity: ServiceIdentity, secret: Option<String>, ttl_secs: i64) -> Self {
        let secret = secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let secret = match secret {
            Some(s) if s.len() >= MIN_SECRET_LEN => Some(s),
            other => {
                if identity.user_id.is_some() && identity.firm_id.is_some() {
                    tracing::warn!(
                        configured = other.is_some(),
                        "internal JWT secret not set or shorter than {} bytes; requests will not be signed",
                        MIN_SECRET_LEN
                    );
                }
                None
            }
        };

        Self {
            identity,
            secret,
            ttl_secs,
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(
            ServiceIdentity {
                user_id: auth.user_id.clone(),
                firm_id: auth.firm_id.clone(),
            },
            auth.jwt_secret.clone(),
            auth.jwt_ttl_secs,
        )
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Whether requests carry an `X-Internal-Auth` token.
    pub fn signs_requests(&self) -> bool {
        self.secret.is_some() && self.identity.user_id.is_some() && self.identity.firm_id.is_some()
    }

    /// Headers for a request issued now.
    pub fn headers(&self, method: &str, path: &str) -> Vec<(&'static str, String)> {
        self.headers_at(method, path, chrono::Utc::now().timestamp())
    }

    pub fn headers_at(&self, method: &str, path: &str, now: i64) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(4);

        if let Some(user) = &self.identity.user_id {
            headers.push((HEADER_USER_ID, user.clone()));
        }
        if let Some(firm) = &self.identity.firm_id {
            headers.push((HEADER_FIRM_ID, firm.clone()));
        }
        headers.push((HEADER_SKIP_BROWSER_WARNING, "true".to_string()));

        if let (Some(user), Some(firm), Some(secret)) = (
            &self.identity.user_id,
            &self.identity.firm_id,
            &self.secret,
        ) {
            if let Some(token) =
                sign_internal_jwt(user, firm, secret, self.ttl_secs, method, path, now)
            {
                headers.push((HEADER_INTERNAL_AUTH, format!("Bearer {}", token)));
            }
        }

        headers
    }
}
