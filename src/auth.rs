use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::{
    config::{AppConfig, Env},
    models::{Role, UserId},
};

/// Claims
///
/// The JWT payload accepted from the upstream identity provider. Tokens are HS256-signed
/// with `AppConfig::jwt_secret`; issuing them is not this service's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the caller's user id in this service's store.
    pub sub: UserId,
    /// Expiration Time (exp): always validated.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Optional role claim. When present the upstream vouches for the role and the gate
    /// uses it without a store lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Principal
///
/// Who the caller is, as far as this service can tell. Built once per request by the
/// `Caller` extractor and then only read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Principal {
    /// No identity attached, or one that failed verification.
    #[default]
    Anonymous,
    /// A role vouched for by a verified token claim.
    Claimed { role: Role },
    /// A verified caller id; the role must be read from the store.
    Identified { id: UserId },
}

/// Caller Extractor
///
/// Resolves the `Principal` of an incoming request:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header holding a numeric id.
/// 2. Bearer token: a valid JWT yields `Claimed` when it carries a role, `Identified` otherwise.
/// 3. Anything else (no header, bad signature, expired token) yields `Anonymous`.
///
/// The extractor never rejects. Whether an anonymous caller may proceed is the access
/// gate's decision, so ungated operations keep working without credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caller(pub Principal);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(Caller(principal_from_parts(parts, &config)))
    }
}

fn principal_from_parts(parts: &Parts, config: &AppConfig) -> Principal {
    if config.env == Env::Local {
        let bypass = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| crate::resolver::resolve(raw).ok());
        if let Some(id) = bypass {
            return Principal::Identified { id };
        }
    }

    let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return Principal::Anonymous;
    };

    match verify_token(token, &config.jwt_secret) {
        Ok(claims) => match claims.role {
            Some(role) => Principal::Claimed { role },
            None => Principal::Identified { id: claims.sub },
        },
        Err(e) => {
            tracing::debug!(error = %e, "bearer token rejected, treating caller as anonymous");
            Principal::Anonymous
        }
    }
}

/// Decodes and validates an HS256 token, including its expiry.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation).map(|data| data.claims)
}
