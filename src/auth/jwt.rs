//! HS256 bearer tokens carrying the caller's user id.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthResult};
use crate::db::models::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId(self.sub)
    }
}

#[derive(Clone)]
pub struct Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl Jwt {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    pub fn issue(&self, user: UserId) -> AuthResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.0,
            iat: now.timestamp(),
            exp: (now + TimeDelta::hours(self.expiry_hours)).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_roundtrip() {
        let jwt = Jwt::new("test-secret", 1);
        let token = jwt.issue(UserId(42)).unwrap();

        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.user_id(), UserId(42));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = Jwt::new("secret-a", 1).issue(UserId(1)).unwrap();
        assert!(matches!(
            Jwt::new("secret-b", 1).verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_fails() {
        assert!(Jwt::new("secret", 1).verify("not.a.token").is_err());
    }
}
