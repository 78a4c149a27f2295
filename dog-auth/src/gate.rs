// Token authentication gate.
//
// Runs once per inbound request before handler logic. Turns the request's
// bearer token and tenant credential pair into a tenant-scoped principal on
// the request's SecurityContext, or into a rejection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dog_core::{AdmissionError, DogError, Principal, SecurityContext, SystemIdentityProvider, TenantId};
use tracing::{debug, error, instrument};

use crate::credentials::RequestCredentials;
use crate::directory::TenantDirectory;
use crate::jwt::{JwtVerifier, TokenError, TokenVerifier};
use crate::options::{GateOptions, HeaderOptions};
use crate::resolver::TenantResolver;

/// Extra acceptance step run on a freshly verified principal, e.g. to refuse
/// disabled accounts. An `Err` rejects the token as invalid.
#[async_trait]
pub trait PrincipalCheck: Send + Sync {
    async fn check(&self, principal: &Principal) -> Result<()>;
}

/// Result of running the gate on one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Handler may run. The context holds the principal if a token was sent.
    Continue,
    /// Stop the request; nothing was installed on the context.
    Reject(Rejection),
}

impl GateOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, GateOutcome::Continue)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GateOutcome::Continue => None,
            GateOutcome::Reject(r) => Some(r),
        }
    }
}

#[derive(Debug)]
pub struct Rejection {
    error: AdmissionError,
}

impl Rejection {
    pub fn status(&self) -> u16 {
        self.error.kind().status_code()
    }

    pub fn message(&self) -> &'static str {
        self.error.client_message()
    }

    pub fn error(&self) -> &AdmissionError {
        &self.error
    }

    pub fn into_error(self) -> AdmissionError {
        self.error
    }

    pub fn to_dog_error(&self) -> DogError {
        self.error.to_dog_error()
    }
}

impl From<AdmissionError> for Rejection {
    fn from(error: AdmissionError) -> Self {
        Self { error }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.message())
    }
}

#[derive(Clone)]
pub struct TokenAuthenticationGate {
    verifier: Arc<dyn TokenVerifier>,
    resolver: TenantResolver,
    headers: HeaderOptions,
    check: Option<Arc<dyn PrincipalCheck>>,
}

impl TokenAuthenticationGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, resolver: TenantResolver) -> Self {
        Self {
            verifier,
            resolver,
            headers: HeaderOptions::default(),
            check: None,
        }
    }

    /// Build a gate with a JWT verifier configured from `options`.
    pub fn from_options(
        options: &GateOptions,
        directory: Arc<dyn TenantDirectory>,
        system: Arc<dyn SystemIdentityProvider>,
    ) -> Result<Self> {
        options.validate().map_err(|e| anyhow::anyhow!(e))?;
        let verifier = JwtVerifier::new(&options.jwt, &options.claims)?;
        Ok(Self::new(Arc::new(verifier), TenantResolver::new(directory, system))
            .with_headers(options.headers.clone()))
    }

    pub fn with_headers(mut self, headers: HeaderOptions) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_principal_check(mut self, check: Arc<dyn PrincipalCheck>) -> Self {
        self.check = Some(check);
        self
    }

    pub fn headers(&self) -> &HeaderOptions {
        &self.headers
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    /// Read credentials from `headers` and run the gate.
    pub async fn authenticate_headers(
        &self,
        headers: &HashMap<String, String>,
        ctx: &mut SecurityContext,
    ) -> GateOutcome {
        let creds = RequestCredentials::from_headers(headers, &self.headers);
        self.authenticate(&creds, ctx).await
    }

    #[instrument(skip_all, fields(tenant_id = creds.tenant_id.as_deref().unwrap_or("")))]
    pub async fn authenticate(&self, creds: &RequestCredentials, ctx: &mut SecurityContext) -> GateOutcome {
        match self.admit(creds, ctx).await {
            Ok(None) => GateOutcome::Continue,
            Ok(Some(principal)) => {
                debug!(
                    "Authenticated {} (tenant: {})",
                    principal.identity(),
                    principal.tenant_id().map(TenantId::as_str).unwrap_or("-")
                );
                ctx.install(principal);
                GateOutcome::Continue
            }
            Err(err) => {
                match &err {
                    AdmissionError::Unexpected(e) => error!("Error processing JWT: {:?}", e),
                    AdmissionError::Scope(e) => error!("Error processing JWT: {}", e),
                    other => debug!("Request rejected: {}", other),
                }
                GateOutcome::Reject(err.into())
            }
        }
    }

    async fn admit(
        &self,
        creds: &RequestCredentials,
        ctx: &mut SecurityContext,
    ) -> Result<Option<Principal>, AdmissionError> {
        let Some(token) = creds.bearer.as_deref() else {
            return Ok(None);
        };

        // Checked before the token so a bad pair is reported even with a bad token.
        if creds.tenant_id_without_auth() {
            return Err(AdmissionError::MalformedTenantCredential);
        }

        let claims = self.verifier.verify(token).map_err(|e| match e {
            TokenError::Expired => AdmissionError::TokenExpired,
            TokenError::Invalid(msg) => AdmissionError::TokenInvalid(msg),
        })?;
        let mut principal = Principal::user(claims.subject, claims.authorities);

        if let Some(check) = &self.check {
            check
                .check(&principal)
                .await
                .map_err(|e| AdmissionError::TokenInvalid(e.to_string()))?;
        }

        if let (Some(tenant_id), Some(secret)) = creds.tenant_pair() {
            self.resolver
                .resolve_tenant(ctx, &mut principal, &TenantId::from(tenant_id), secret)
                .await?;
        }

        Ok(Some(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryTenantDirectory;
    use crate::jwt::Claims;
    use dog_core::{StaticSystemIdentity, TenantRecord};
    use serde_json::json;

    /// Accepts tokens of the form `ok:<subject>:<auth,auth>`.
    struct FakeVerifier;

    impl TokenVerifier for FakeVerifier {
        fn verify(&self, token: &str) -> Result<Claims, TokenError> {
            match token.split(':').collect::<Vec<_>>().as_slice() {
                ["ok", sub, auth] => Ok(Claims {
                    subject: sub.to_string(),
                    authorities: auth.split(',').filter(|a| !a.is_empty()).map(str::to_string).collect(),
                    raw: json!({}),
                }),
                ["expired", ..] => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid("bad token".to_string())),
            }
        }
    }

    struct DenyUser(&'static str);

    #[async_trait]
    impl PrincipalCheck for DenyUser {
        async fn check(&self, principal: &Principal) -> Result<()> {
            if principal.identity() == self.0 {
                anyhow::bail!("account disabled");
            }
            Ok(())
        }
    }

    fn gate() -> TokenAuthenticationGate {
        let directory = MemoryTenantDirectory::new()
            .require_system()
            .with_tenant(TenantRecord::new("t1", "s1"));
        TokenAuthenticationGate::new(
            Arc::new(FakeVerifier),
            TenantResolver::new(Arc::new(directory), Arc::new(StaticSystemIdentity::default())),
        )
    }

    fn rejected(outcome: GateOutcome) -> AdmissionError {
        match outcome {
            GateOutcome::Reject(r) => r.into_error(),
            GateOutcome::Continue => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn no_token_passes_through() {
        let mut ctx = SecurityContext::new();
        let outcome = gate().authenticate(&RequestCredentials::default(), &mut ctx).await;
        assert!(outcome.is_continue());
        assert!(!ctx.is_authenticated());

        // A dangling tenant id without a token is not the gate's concern.
        let creds = RequestCredentials::default().with_tenant("t1", None);
        assert!(gate().authenticate(&creds, &mut ctx).await.is_continue());
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn valid_token_installs_principal_with_claims() {
        let mut ctx = SecurityContext::new();
        let creds = RequestCredentials::bearer("ok:admin:ROLE_ADMIN,ViewServerInfo");
        assert!(gate().authenticate(&creds, &mut ctx).await.is_continue());

        let principal = ctx.principal().unwrap();
        assert_eq!(principal.identity(), "admin");
        assert!(principal.has_authority("ROLE_ADMIN"));
        assert!(principal.has_authority("ViewServerInfo"));
        assert_eq!(principal.authorities().len(), 2);
        assert!(principal.tenant().is_none());
    }

    #[tokio::test]
    async fn tenant_id_without_secret_is_malformed_even_for_bad_tokens() {
        for token in ["ok:admin:", "garbage", "expired"] {
            let mut ctx = SecurityContext::new();
            let creds = RequestCredentials::bearer(token).with_tenant("t1", None);
            let err = rejected(gate().authenticate(&creds, &mut ctx).await);
            assert!(matches!(err, AdmissionError::MalformedTenantCredential), "{token}");
            assert!(!ctx.is_authenticated());
        }
    }

    #[tokio::test]
    async fn token_failures_are_forbidden() {
        let mut ctx = SecurityContext::new();
        let outcome = gate().authenticate(&RequestCredentials::bearer("expired"), &mut ctx).await;
        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.status(), 403);
        assert_eq!(rejection.message(), "JWT has expired.");

        let outcome = gate().authenticate(&RequestCredentials::bearer("nope"), &mut ctx).await;
        assert_eq!(outcome.rejection().unwrap().message(), "JWT is invalid.");
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn tenant_pair_attaches_scope() {
        let mut ctx = SecurityContext::new();
        let creds = RequestCredentials::bearer("ok:admin:ROLE_ADMIN").with_tenant("t1", Some("s1"));
        assert!(gate().authenticate(&creds, &mut ctx).await.is_continue());
        assert_eq!(ctx.tenant_id().map(TenantId::as_str), Some("t1"));
        assert_eq!(ctx.elevation_depth(), 0);
    }

    #[tokio::test]
    async fn tenant_failures_install_nothing() {
        let mut ctx = SecurityContext::new();
        let creds = RequestCredentials::bearer("ok:admin:").with_tenant("t1", Some("wrong"));
        let outcome = gate().authenticate(&creds, &mut ctx).await;
        assert_eq!(outcome.rejection().unwrap().status(), 503);
        assert!(!ctx.is_authenticated());

        let creds = RequestCredentials::bearer("ok:admin:").with_tenant("t9", Some("s1"));
        let err = rejected(gate().authenticate(&creds, &mut ctx).await);
        assert!(matches!(err, AdmissionError::UnknownTenant(_)));
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn principal_check_rejects_as_invalid_token() {
        let gate = gate().with_principal_check(Arc::new(DenyUser("mallory")));
        let mut ctx = SecurityContext::new();

        let err = rejected(gate.authenticate(&RequestCredentials::bearer("ok:mallory:"), &mut ctx).await);
        assert!(matches!(err, AdmissionError::TokenInvalid(msg) if msg.contains("disabled")));
        assert!(!ctx.is_authenticated());

        assert!(gate.authenticate(&RequestCredentials::bearer("ok:alice:"), &mut ctx).await.is_continue());
    }

    #[tokio::test]
    async fn reads_configured_headers() {
        let gate = gate().with_headers(HeaderOptions {
            tenant_id: "x-tenant".to_string(),
            tenant_auth: "x-tenant-auth".to_string(),
            ..HeaderOptions::default()
        });
        let headers: HashMap<String, String> = [
            ("Authorization", "Bearer ok:admin:ROLE_ADMIN"),
            ("X-Tenant", "t1"),
            ("X-Tenant-Auth", "s1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut ctx = SecurityContext::new();
        assert!(gate.authenticate_headers(&headers, &mut ctx).await.is_continue());
        assert_eq!(ctx.tenant_id().map(TenantId::as_str), Some("t1"));
    }
}
