//! User token validation.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::AuthError;
use super::claims::Claims;

/// Validates HS256 access tokens issued by the account service.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &[u8], access_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
        }
    }

    /// Issue an access token for `user_id`. Used by tooling and tests.
    pub fn issue_access_token(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue(user_id, "access")
    }

    fn issue(&self, user_id: &str, token_type: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = now_secs();
        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.access_ttl_secs,
            token_type: token_type.to_string(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }

    /// Validate `token` and return the user ID it was issued to.
    pub fn authenticate_user(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate(token).map_err(|_| AuthError::InvalidToken)?;
        if !claims.is_access() {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims.sub)
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
