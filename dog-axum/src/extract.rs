// Extractors for the gate's per-request context.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use dog_core::errors::DogError;
use dog_core::{Principal, SecurityContext};

use crate::DogAxumError;

/// The request's security context as installed by the token gate. Empty
/// when the request carried no bearer token.
#[derive(Debug, Clone)]
pub struct RequestSecurity(pub SecurityContext);

impl<S> FromRequestParts<S> for RequestSecurity
where
    S: Send + Sync,
{
    type Rejection = DogAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .map(RequestSecurity)
            .ok_or_else(|| DogError::general_error("Token gate is not installed on this route").into())
    }
}

/// The authenticated principal. Requests without one are refused with 401.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Arc<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = DogAxumError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequestSecurity(ctx) = RequestSecurity::from_request_parts(parts, state).await?;
        ctx.into_principal()
            .map(CurrentPrincipal)
            .ok_or_else(|| DogError::not_authenticated("Authentication required").into())
    }
}
