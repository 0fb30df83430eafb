//! Bearer token verification.
//!
//! Tokens are issued by the identity service and signed with HS256 using the shared `TFL_JWT_SECRET`. This server
//! never issues tokens in production. It only verifies them and turns the claims into an engine [`Actor`].
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use tradeflow_engine::db_types::{Actor, Role};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id.
    pub sub: i64,
    pub role: Role,
    /// Expiry, in seconds since the unix epoch.
    pub exp: u64,
}

impl JwtClaims {
    pub fn actor(&self, ip: Option<String>) -> Actor {
        let actor = Actor::new(self.sub, self.role);
        match ip {
            Some(ip) => actor.with_ip(ip),
            None => actor,
        }
    }
}

/// Handlers behind the ACL middleware can take `JwtClaims` as an argument.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("💻️ No JWT claims found in request extensions. Is the route missing the ACL middleware?");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("🔐️ Bearer token rejected. {e}");
            AuthError::ValidationError(e.to_string())
        })?;
        trace!("🔐️ Bearer token is valid for {} {}", data.claims.role, data.claims.sub);
        Ok(data.claims)
    }

    /// Verifies the bearer token carried in the request headers, if there is one.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<JwtClaims, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

/// Signs tokens with the shared secret. Used by the test suite and by operators generating tokens for local use.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
