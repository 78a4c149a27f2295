// Bearer token verification.

use serde_json::Value;
use thiserror::Error;

use crate::options::{ClaimOptions, JwtOptions};

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
use crate::options::JwtAlgorithm;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid: {0}")]
    Invalid(String),
}

/// Identity and authority claims extracted from a verified token.
#[derive(Clone, Debug, PartialEq)]
pub struct Claims {
    pub subject: String,
    pub authorities: Vec<String>,
    /// Full decoded payload, for claims the gate does not interpret.
    pub raw: Value,
}

impl Claims {
    /// Pull identity and authorities out of a decoded payload.
    ///
    /// Authorities may be a JSON array of strings or a single
    /// comma-separated string.
    pub fn from_payload(payload: Value, names: &ClaimOptions) -> Result<Self, TokenError> {
        let subject = payload
            .get(&names.identity)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::Invalid(format!("missing '{}' claim", names.identity)))?
            .to_string();

        let authorities = match payload.get(&names.authorities) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        TokenError::Invalid(format!("non-string entry in '{}' claim", names.authorities))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect(),
            Some(_) => {
                return Err(TokenError::Invalid(format!(
                    "unsupported '{}' claim type",
                    names.authorities
                )))
            }
        };

        Ok(Self {
            subject,
            authorities,
            raw: payload,
        })
    }
}

/// Verifies signed bearer tokens. Issuance lives elsewhere.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

#[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
pub struct JwtVerifier;

#[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
impl JwtVerifier {
    pub fn new(_jwt: &JwtOptions, _claims: &ClaimOptions) -> anyhow::Result<Self> {
        Err(anyhow::anyhow!(
            "JWT support is disabled (enable one of: jwt-aws-lc-rs, jwt-rust-crypto)"
        ))
    }
}

#[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
impl TokenVerifier for JwtVerifier {
    fn verify(&self, _token: &str) -> Result<Claims, TokenError> {
        Err(TokenError::Invalid("JWT support is disabled".to_string()))
    }
}

/// `jsonwebtoken`-backed verifier. Keys are decoded once at construction.
#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
pub struct JwtVerifier {
    key: jsonwebtoken::DecodingKey,
    validation: jsonwebtoken::Validation,
    claims: ClaimOptions,
}

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
impl JwtVerifier {
    fn algorithm(alg: &JwtAlgorithm) -> jsonwebtoken::Algorithm {
        match alg {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
            JwtAlgorithm::ES384 => jsonwebtoken::Algorithm::ES384,
        }
    }

    pub fn new(jwt: &JwtOptions, claims: &ClaimOptions) -> anyhow::Result<Self> {
        use jsonwebtoken::{DecodingKey, Validation};

        jwt.validate().map_err(|e| anyhow::anyhow!(e))?;

        let key = if jwt.algorithm.is_hmac() {
            let secret = jwt
                .secret
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("JWT secret is not configured"))?;
            DecodingKey::from_secret(secret.as_bytes())
        } else {
            let pem = jwt
                .public_key_pem
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("JWT public key is not configured"))?;
            match jwt.algorithm {
                JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes())?,
                _ => DecodingKey::from_rsa_pem(pem.as_bytes())?,
            }
        };

        let mut validation = Validation::new(Self::algorithm(&jwt.algorithm));
        validation.leeway = jwt.leeway.as_secs();
        if let Some(issuer) = &jwt.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        if jwt.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&jwt.audience.iter().map(|s| s.as_str()).collect::<Vec<_>>());
        }

        Ok(Self {
            key,
            validation,
            claims: claims.clone(),
        })
    }
}

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        use jsonwebtoken::errors::ErrorKind as JwtErrorKind;

        let decoded = jsonwebtoken::decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Claims::from_payload(decoded.claims, &self.claims)
    }
}
