// Token gate middleware.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use dog_auth::{GateOutcome, HeaderOptions, TokenAuthenticationGate};
use dog_core::{AdmissionError, SecurityContext};
use tower::{Layer, Service};

use crate::DogAxumError;

/// Runs the token gate once per request.
///
/// Admitted requests carry their [`SecurityContext`] as a request extension;
/// rejected ones are answered here with a DogError JSON body.
#[derive(Clone)]
pub struct TokenGate {
    gate: Arc<TokenAuthenticationGate>,
}

impl TokenGate {
    pub fn new(gate: Arc<TokenAuthenticationGate>) -> Self {
        Self { gate }
    }
}

pub fn gate_layer(gate: Arc<TokenAuthenticationGate>) -> TokenGate {
    TokenGate::new(gate)
}

impl<S> Layer<S> for TokenGate {
    type Service = TokenGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenGateService {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

#[derive(Clone)]
pub struct TokenGateService<S> {
    inner: S,
    gate: Arc<TokenAuthenticationGate>,
}

impl<S> Service<Request<Body>> for TokenGateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = Arc::clone(&self.gate);

        Box::pin(async move {
            let headers = match header_map(req.headers(), gate.headers()) {
                Ok(headers) => headers,
                Err(err) => return Ok(DogAxumError::from(err).into_response()),
            };
            let mut ctx = SecurityContext::new();

            match gate.authenticate_headers(&headers, &mut ctx).await {
                GateOutcome::Continue => {
                    req.extensions_mut().insert(ctx);
                    inner.call(req).await
                }
                GateOutcome::Reject(rejection) => Ok(DogAxumError::from(rejection).into_response()),
            }
        })
    }
}

/// Header map for the gate. Unreadable values of other headers are skipped;
/// an unreadable credential header rejects the request.
fn header_map(headers: &HeaderMap, names: &HeaderOptions) -> Result<HashMap<String, String>, AdmissionError> {
    let mut out = HashMap::new();
    for (k, v) in headers.iter() {
        match v.to_str() {
            Ok(s) => {
                out.insert(k.to_string(), s.to_string());
            }
            Err(_) if k.as_str().eq_ignore_ascii_case(&names.authorization) => {
                return Err(AdmissionError::TokenInvalid(format!("unreadable {} header", k)));
            }
            Err(_) if k.as_str().eq_ignore_ascii_case(&names.tenant_id)
                || k.as_str().eq_ignore_ascii_case(&names.tenant_auth) =>
            {
                return Err(AdmissionError::MalformedTenantCredential);
            }
            Err(_) => tracing::debug!("Skipping unreadable header {}", k),
        }
    }
    Ok(out)
}
