// Gate options and configuration.

use std::time::Duration;

use dog_core::DogConfigSnapshot;
use serde::{Deserialize, Serialize};

/// JWT signing algorithms accepted by the verifier
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    #[default]
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

impl JwtAlgorithm {
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HS256" => Some(Self::HS256),
            "HS384" => Some(Self::HS384),
            "HS512" => Some(Self::HS512),
            "RS256" => Some(Self::RS256),
            "RS384" => Some(Self::RS384),
            "RS512" => Some(Self::RS512),
            "ES256" => Some(Self::ES256),
            "ES384" => Some(Self::ES384),
            _ => None,
        }
    }
}

/// Gate configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GateOptions {
    /// Token verification settings
    pub jwt: JwtOptions,
    /// Where credentials are read from
    pub headers: HeaderOptions,
    /// Which token claims carry identity and authorities
    pub claims: ClaimOptions,
}

impl GateOptions {
    pub fn builder() -> GateOptionsBuilder {
        GateOptionsBuilder::new()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.jwt
            .validate()
            .map_err(|e| format!("JWT validation failed: {}", e))?;
        self.headers
            .validate()
            .map_err(|e| format!("Header validation failed: {}", e))?;
        if self.claims.identity.trim().is_empty() {
            return Err("Identity claim name cannot be empty".to_string());
        }
        if self.claims.authorities.trim().is_empty() {
            return Err("Authorities claim name cannot be empty".to_string());
        }
        Ok(())
    }

    /// Apply `gate.*` overrides from a config snapshot.
    pub fn apply_snapshot(&mut self, config: &DogConfigSnapshot) {
        if let Some(secret) = config.get_string("gate.jwt.secret") {
            self.jwt.secret = Some(secret);
        }
        if let Some(pem) = config.get_string("gate.jwt.public_key_pem") {
            self.jwt.public_key_pem = Some(pem);
        }
        if let Some(alg) = config.get("gate.jwt.algorithm").and_then(JwtAlgorithm::parse) {
            self.jwt.algorithm = alg;
        }
        if let Some(issuer) = config.get_string("gate.jwt.issuer") {
            self.jwt.issuer = Some(issuer);
        }
        if let Some(audience) = config.get_list("gate.jwt.audience") {
            self.jwt.audience = audience;
        }
        if let Some(leeway) = config.get_duration("gate.jwt.leeway") {
            self.jwt.leeway = leeway;
        }
        if let Some(h) = config.get_string("gate.headers.authorization") {
            self.headers.authorization = h;
        }
        if let Some(h) = config.get_string("gate.headers.tenant_id") {
            self.headers.tenant_id = h;
        }
        if let Some(h) = config.get_string("gate.headers.tenant_auth") {
            self.headers.tenant_auth = h;
        }
        if let Some(c) = config.get_string("gate.claims.identity") {
            self.claims.identity = c;
        }
        if let Some(c) = config.get_string("gate.claims.authorities") {
            self.claims.authorities = c;
        }
    }

    pub fn from_snapshot(config: &DogConfigSnapshot) -> Self {
        let mut options = Self::default();
        options.apply_snapshot(config);
        options
    }
}

/// JWT verification options
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    pub algorithm: JwtAlgorithm,
    /// Expected `iss`; not checked when unset
    pub issuer: Option<String>,
    /// Accepted `aud` values; not checked when empty
    pub audience: Vec<String>,
    /// Clock skew tolerated on `exp`/`nbf`
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
    /// HMAC secret
    pub secret: Option<String>,
    /// PEM public key for RSA/ECDSA algorithms
    pub public_key_pem: Option<String>,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            issuer: None,
            audience: Vec::new(),
            leeway: Duration::from_secs(30),
            secret: None,
            public_key_pem: None,
        }
    }
}

impl JwtOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.algorithm.is_hmac() {
            match &self.secret {
                Some(secret) if !secret.is_empty() => {}
                _ => return Err("HMAC algorithms require a secret".to_string()),
            }
        } else if self.public_key_pem.is_none() {
            return Err("RSA/ECDSA algorithms require a public key".to_string());
        }

        if let Some(issuer) = &self.issuer {
            if issuer.trim().is_empty() {
                return Err("JWT issuer cannot be blank when set".to_string());
            }
        }
        Ok(())
    }
}

/// Request header names for the three credential fields
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderOptions {
    pub authorization: String,
    /// Accepted authorization schemes (case-insensitive)
    pub schemes: Vec<String>,
    pub tenant_id: String,
    pub tenant_auth: String,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        Self {
            authorization: "authorization".to_string(),
            schemes: vec!["Bearer".to_string(), "JWT".to_string()],
            tenant_id: "x-sitewhere-tenant-id".to_string(),
            tenant_auth: "x-sitewhere-tenant-auth".to_string(),
        }
    }
}

impl HeaderOptions {
    pub fn validate(&self) -> Result<(), String> {
        for (label, name) in [
            ("authorization", &self.authorization),
            ("tenant id", &self.tenant_id),
            ("tenant auth", &self.tenant_auth),
        ] {
            if name.trim().is_empty() {
                return Err(format!("The {} header name cannot be empty", label));
            }
        }
        if self.schemes.is_empty() {
            return Err("At least one authorization scheme must be accepted".to_string());
        }
        if self.tenant_id.eq_ignore_ascii_case(&self.tenant_auth) {
            return Err("Tenant id and tenant auth must use different headers".to_string());
        }
        Ok(())
    }
}

/// Claim names read from verified tokens
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimOptions {
    pub identity: String,
    pub authorities: String,
}

impl Default for ClaimOptions {
    fn default() -> Self {
        Self {
            identity: "sub".to_string(),
            authorities: "auth".to_string(),
        }
    }
}

/// Builder for GateOptions
#[derive(Debug, Default)]
pub struct GateOptionsBuilder {
    options: GateOptions,
}

impl GateOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.options.jwt.secret = Some(secret.into());
        self
    }

    pub fn jwt_algorithm(mut self, algorithm: JwtAlgorithm) -> Self {
        self.options.jwt.algorithm = algorithm;
        self
    }

    pub fn jwt_public_key_pem(mut self, pem: impl Into<String>) -> Self {
        self.options.jwt.public_key_pem = Some(pem.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.options.jwt.issuer = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.options.jwt.audience.push(audience.into());
        self
    }

    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.options.jwt.leeway = leeway;
        self
    }

    pub fn tenant_headers(mut self, tenant_id: impl Into<String>, tenant_auth: impl Into<String>) -> Self {
        self.options.headers.tenant_id = tenant_id.into();
        self.options.headers.tenant_auth = tenant_auth.into();
        self
    }

    pub fn authorities_claim(mut self, claim: impl Into<String>) -> Self {
        self.options.claims.authorities = claim.into();
        self
    }

    pub fn build(self) -> Result<GateOptions, String> {
        self.options.validate()?;
        Ok(self.options)
    }
}
