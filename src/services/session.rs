//! Session tokens: JWT access tokens issued alongside the identity provider login.
//!
//! Only validation happens here; the `sub` claim carries the user's external
//! identity id and is resolved to a ledger user by the auth extractors.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // external identity id
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
}

/// Validate a JWT access token and return the external id it was issued for
pub fn validate_access_token(token: &str, secret: &[u8]) -> Result<String, SessionError> {
    // HS256 only, to rule out algorithm confusion
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(error = ?e, "JWT decode error");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            }
        })?;

    if token_data.claims.sub.is_empty() {
        return Err(SessionError::InvalidToken);
    }
    Ok(token_data.claims.sub)
}

#[cfg(test)]
pub fn create_access_token(external_id: &str, secret: &[u8]) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = Utc::now();
    let claims = Claims {
        sub: external_id.to_string(),
        exp: (now + Duration::minutes(10)).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .expect("encode test token")
}
