//! JWT authentication middleware (requires `jwt` feature)
//!
//! Verification keys come either from a PEM file or from the issuer's JWKS
//! document. The key set is cached and fetched again when a token names an
//! unknown `kid` or the cache is older than `jwks_refresh_secs`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;

use super::claims::AccessClaims;
use super::user::User;
use super::Caller;
use crate::config::AuthConfig;
use crate::error::{ApiError, Error};
use crate::health::HEALTH_PATH;

const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Minimum time between two JWKS fetches triggered by unknown keys
const JWKS_MIN_REFETCH: Duration = Duration::from_secs(30);

/// Strip a case-insensitive `Bearer ` scheme from an authorization header
pub fn strip_bearer(header: &str) -> Result<&str, ApiError> {
    const SCHEME: &str = "bearer ";

    match header.get(..SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => {
            let token = header[SCHEME.len()..].trim();
            if token.is_empty() {
                Err(ApiError::unauthorized("Invalid token."))
            } else {
                Ok(token)
            }
        }
        _ => Err(ApiError::unauthorized("Invalid token.")),
    }
}

/// Read the `Authorization` header value
fn authorization_header(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Invalid token."))
}

#[derive(Clone)]
enum KeySource {
    Static(Arc<DecodingKey>),
    Jwks(Arc<JwksCache>),
}

struct JwksCache {
    url: String,
    client: reqwest::Client,
    max_age: Duration,
    min_refetch: Duration,
    cached: RwLock<Option<CachedKeys>>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

impl JwksCache {
    fn new(url: String, max_age: Duration) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            max_age,
            min_refetch: JWKS_MIN_REFETCH,
            cached: RwLock::new(None),
        }
    }

    /// Key for `kid`, fetching the key set again only when the cache is stale
    /// or misses and the last fetch is older than `min_refetch`
    async fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, Error> {
        {
            let cached = self.cached.read().await;
            if let Some(cached) = cached.as_ref() {
                let age = cached.fetched_at.elapsed();
                let key = select_key(&cached.keys, kid)?;
                if age < self.max_age {
                    if let Some(key) = key {
                        return Ok(key);
                    }
                }
                if age < self.min_refetch {
                    tracing::debug!(kid = ?kid, "JWKS miss within refetch interval");
                    return key.ok_or_else(|| no_matching_key(kid));
                }
            }
        }

        let keys = self.fetch().await?;
        let key = select_key(&keys, kid)?;
        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| no_matching_key(kid))
    }

    async fn fetch(&self) -> Result<JwkSet, Error> {
        tracing::debug!(url = %self.url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Jwks(format!("Failed to fetch {}: {}", self.url, e)))?;

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| Error::Jwks(format!("Invalid JWKS document: {}", e)))?;

        tracing::info!(url = %self.url, keys = keys.keys.len(), "JWKS refreshed");
        Ok(keys)
    }
}

fn no_matching_key(kid: Option<&str>) -> Error {
    Error::Jwks(format!(
        "No signing key matches kid '{}'",
        kid.unwrap_or_default()
    ))
}

/// Pick the key named by `kid`, or the only key when the token names none
fn select_key(keys: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, Error> {
    let jwk = match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    };

    jwk.map(DecodingKey::from_jwk).transpose().map_err(Error::from)
}

/// JWT authentication middleware state
#[derive(Clone)]
pub struct JwtAuth {
    keys: KeySource,
    validation: Arc<Validation>,
    claims_namespace: Arc<str>,
}

impl JwtAuth {
    /// Create a new JWT authentication middleware
    ///
    /// `jwks_url` takes precedence over `public_key_path`. Nothing is fetched
    /// until the first token arrives.
    pub fn new(config: &AuthConfig) -> Result<Self, Error> {
        let algorithm = parse_algorithm(&config.algorithm)?;

        let keys = match (&config.jwks_url, &config.public_key_path) {
            (Some(base), _) => KeySource::Jwks(Arc::new(JwksCache::new(
                format!("{}{}", base.trim_end_matches('/'), JWKS_PATH),
                Duration::from_secs(config.jwks_refresh_secs),
            ))),
            (None, Some(path)) => {
                let pem = std::fs::read(path).map_err(|e| {
                    Error::Config(Box::new(figment::Error::from(format!(
                        "Failed to read JWT key from path '{}': {}",
                        path.display(),
                        e
                    ))))
                })?;
                KeySource::Static(Arc::new(decoding_key(algorithm, &pem)?))
            }
            (None, None) => {
                return Err(Error::Config(Box::new(figment::Error::from(
                    "auth requires either jwks_url or public_key_path".to_string(),
                ))))
            }
        };

        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            keys,
            validation: Arc::new(validation),
            claims_namespace: Arc::from(config.claims_namespace.as_str()),
        })
    }

    /// Verify a bare token and return its claims
    pub async fn verify(&self, token: &str) -> Result<AccessClaims, Error> {
        let key = match &self.keys {
            KeySource::Static(key) => Arc::clone(key),
            KeySource::Jwks(cache) => {
                let header = decode_header(token)?;
                Arc::new(cache.key_for(header.kid.as_deref()).await?)
            }
        };

        let data = decode::<AccessClaims>(token, &key, &self.validation)?;
        Ok(data.claims)
    }

    /// Authenticate a full `Authorization` header value into a [`Caller`]
    pub async fn authenticate(&self, header: &str) -> Result<Caller, ApiError> {
        let token = strip_bearer(header)?;

        let claims = self.verify(token).await.map_err(|e| {
            tracing::warn!(error = %e, "Token verification failed");
            ApiError::unauthorized(format!("Error parsing token: {}.", e))
        })?;

        let custom = claims.custom_claims(&self.claims_namespace).map_err(|e| {
            tracing::warn!(error = %e, "Custom claims are malformed");
            ApiError::unauthorized(format!("Error parsing token: {}.", e))
        })?;

        Ok(Caller {
            user: User::from_claims(&custom),
            permissions: claims.permissions,
            token: header.to_string(),
        })
    }

    /// Middleware function to validate the bearer token and inject the caller
    pub async fn middleware(
        State(auth): State<Self>,
        mut request: Request<Body>,
        next: Next,
    ) -> Result<Response, ApiError> {
        if request.uri().path() == HEALTH_PATH {
            return Ok(next.run(request).await);
        }

        let header = authorization_header(request.headers())?;
        let caller = auth.authenticate(header).await?;

        tracing::debug!(user_type = %caller.user.user_type, "Caller authenticated");
        request.extensions_mut().insert(caller);

        Ok(next.run(request).await)
    }
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.keys {
            KeySource::Static(_) => "pem".to_string(),
            KeySource::Jwks(cache) => cache.url.clone(),
        };
        f.debug_struct("JwtAuth")
            .field("keys", &source)
            .field("claims_namespace", &self.claims_namespace)
            .finish()
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, Error> {
    match name.to_uppercase().as_str() {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        alg => Err(Error::Config(Box::new(figment::Error::from(format!(
            "Unsupported JWT algorithm: {}",
            alg
        ))))),
    }
}

fn decoding_key(algorithm: Algorithm, pem: &[u8]) -> Result<DecodingKey, Error> {
    let key = match algorithm {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => DecodingKey::from_rsa_pem(pem)?,
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem)?,
        _ => DecodingKey::from_secret(pem),
    };
    Ok(key)
}
