//! Session handle identifying the owner of every record

use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::Error;

/// An authenticated session.
///
/// The tracker never signs anyone in; it receives a session from whatever
/// established the caller's identity and scopes every request to
/// [`Session::owner_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The access token sent as the bearer credential
    pub access_token: String,

    /// The refresh token, if the session was issued with one
    pub refresh_token: Option<String>,

    /// The authenticated user; owner of every record read or written
    pub owner_id: Uuid,

    /// The expiry timestamp in seconds since the epoch
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: Option<i64>,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

impl Session {
    /// Create a new session expiring `expires_in` seconds from now
    pub fn new(access_token: &str, owner_id: Uuid, expires_in: i64) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: None,
            owner_id,
            expires_at: Some(now_secs() + expires_in),
        }
    }

    /// Build a session from an access token, reading the `sub` and `exp` claims.
    ///
    /// The signature is not verified here; the store verifies it on every request.
    pub fn from_access_token(access_token: &str) -> Result<Self, Error> {
        let header = decode_header(access_token)?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(access_token, &DecodingKey::from_secret(&[]), &validation)?;
        let owner_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|e| Error::auth(format!("invalid sub claim: {}", e)))?;

        Ok(Self {
            access_token: access_token.to_string(),
            refresh_token: None,
            owner_id,
            expires_at: data.claims.exp,
        })
    }

    /// Attach a refresh token
    pub fn with_refresh_token(mut self, refresh_token: &str) -> Self {
        self.refresh_token = Some(refresh_token.to_string());
        self
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs() >= expires_at,
            None => false,
        }
    }

    /// Whether both sessions belong to the same owner
    pub fn same_owner(&self, other: &Session) -> bool {
        self.owner_id == other.owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    #[test]
    fn test_from_access_token_reads_claims() {
        let owner = Uuid::new_v4();
        let token = encode(
            &Header::default(),
            &json!({ "sub": owner.to_string(), "exp": 4_102_444_800i64, "role": "authenticated" }),
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap();

        let session = Session::from_access_token(&token).unwrap();
        assert_eq!(session.owner_id, owner);
        assert_eq!(session.expires_at, Some(4_102_444_800));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_from_access_token_rejects_non_uuid_subject() {
        let token = encode(
            &Header::default(),
            &json!({ "sub": "anonymous" }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            Session::from_access_token(&token),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let owner = Uuid::new_v4();
        let live = Session::new("token", owner, 3600);
        let expired = Session::new("token", owner, -1);
        assert!(!live.is_expired());
        assert!(expired.is_expired());
        assert!(live.same_owner(&expired));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            Session::from_access_token("not-a-jwt"),
            Err(Error::Jwt(_))
        ));
    }
}
