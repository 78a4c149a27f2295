use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use dog_auth::{Claims, MemoryTenantDirectory, TenantResolver, TokenAuthenticationGate, TokenError, TokenVerifier};
use dog_axum::{axum as dog_axum_app, AxumApp, CurrentPrincipal, DogAxumError, DogAxumState, RequestSecurity};
use dog_core::{DogConfig, StaticSystemIdentity, TenantId, TenantRecord};
use dog_demux::{ChannelBinding, ChannelRegistry, DemuxConfig, MultitenantDemux, ToggleChannel};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const SERVICE: &str = "device-management";

/// Accepts `good-<subject>` tokens.
struct PrefixVerifier;

impl TokenVerifier for PrefixVerifier {
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        match token.strip_prefix("good-") {
            Some(sub) => Ok(Claims {
                subject: sub.to_string(),
                authorities: vec!["ROLE_ADMIN".to_string()],
                raw: Value::Null,
            }),
            None if token == "old" => Err(TokenError::Expired),
            None => Err(TokenError::Invalid("unsigned".to_string())),
        }
    }
}

fn directory() -> Arc<MemoryTenantDirectory> {
    Arc::new(
        MemoryTenantDirectory::new()
            .require_system()
            .with_tenant(TenantRecord::new("t1", "s1").with_name("Tenant One")),
    )
}

fn gate() -> TokenAuthenticationGate {
    TokenAuthenticationGate::new(
        Arc::new(PrefixVerifier),
        TenantResolver::new(directory(), Arc::new(StaticSystemIdentity::default())),
    )
}

async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    Json(json!({
        "identity": principal.identity(),
        "tenant": principal.tenant_id().map(TenantId::as_str),
    }))
}

async fn whoami(RequestSecurity(ctx): RequestSecurity) -> String {
    ctx.principal()
        .map(|p| p.identity().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn devices(
    Extension(state): Extension<DogAxumState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    RequestSecurity(mut ctx): RequestSecurity,
) -> Result<Json<Value>, DogAxumError> {
    let tenant = principal
        .tenant_id()
        .cloned()
        .ok_or_else(|| dog_core::DogError::bad_request("Tenant required"))?;
    let channel = state.channel(&mut ctx, SERVICE, &tenant).await?;
    Ok(Json(json!({ "channel": channel.binding().to_string() })))
}

fn app() -> AxumApp {
    dog_axum_app(gate())
        .use_get("/me", me)
        .use_get("/whoami", whoami)
}

fn request(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn request_without_token_passes_through_unauthenticated() {
    let res = app().into_router().oneshot(request("/whoami", &[])).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"anonymous");
}

#[tokio::test]
async fn current_principal_requires_authentication() {
    let res = app().into_router().oneshot(request("/me", &[])).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotAuthenticated");
    assert_eq!(body["code"], 401);
}

#[tokio::test]
async fn valid_token_and_tenant_reach_the_handler() {
    let res = app()
        .into_router()
        .oneshot(request(
            "/me",
            &[
                ("authorization", "Bearer good-admin"),
                ("x-sitewhere-tenant-id", "t1"),
                ("x-sitewhere-tenant-auth", "s1"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"identity": "admin", "tenant": "t1"}));
}

#[tokio::test]
async fn rejections_use_dogerror_json_and_skip_the_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "ran"
            }
        }),
    );
    let router = dog_axum_app(gate()).use_router("/count", router).into_router();

    let cases: [(&[(&str, &str)], StatusCode, &str, &str); 4] = [
        (&[("authorization", "Bearer old")], StatusCode::FORBIDDEN, "Forbidden", "JWT has expired."),
        (&[("authorization", "Bearer forged")], StatusCode::FORBIDDEN, "Forbidden", "JWT is invalid."),
        (
            &[("authorization", "Bearer good-admin"), ("x-sitewhere-tenant-id", "t1")],
            StatusCode::BAD_REQUEST,
            "BadRequest",
            "Tenant id passed without corresponding tenant auth token.",
        ),
        (
            &[
                ("authorization", "Bearer good-admin"),
                ("x-sitewhere-tenant-id", "t1"),
                ("x-sitewhere-tenant-auth", "wrong"),
            ],
            StatusCode::SERVICE_UNAVAILABLE,
            "Unavailable",
            "Tenant authentication token is invalid.",
        ),
    ];

    for (headers, status, name, message) in cases {
        let res = router.clone().oneshot(request("/count", headers)).await.unwrap();
        assert_eq!(res.status(), status);
        let body = json_body(res).await;
        assert_eq!(body["name"], name);
        assert_eq!(body["message"], message);
        assert_eq!(body["code"], status.as_u16());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn handlers_wait_for_tenant_channels() {
    let registry = Arc::new(ChannelRegistry::new());
    let channel = Arc::new(ToggleChannel::new(ChannelBinding::tenant(SERVICE, "t1")));
    registry.register(channel.clone());
    let demux = MultitenantDemux::new(SERVICE, registry, Arc::new(StaticSystemIdentity::default()))
        .with_config(DemuxConfig {
            timeout: Duration::from_millis(500),
            ..DemuxConfig::default()
        });
    let router = dog_axum_app(gate())
        .with_demux(demux)
        .use_get("/devices", devices)
        .into_router();
    let headers = [
        ("authorization", "Bearer good-admin"),
        ("x-sitewhere-tenant-id", "t1"),
        ("x-sitewhere-tenant-auth", "s1"),
    ];

    let res = router.clone().oneshot(request("/devices", &headers)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(res).await["message"], "Tenant engine not available.");

    channel.set_available(true);
    let res = router.oneshot(request("/devices", &headers)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["channel"], "device-management[t1]");
}

#[tokio::test]
async fn unreadable_credential_headers_are_rejected() {
    let router = app().into_router();

    let mut req = request("/whoami", &[]);
    req.headers_mut()
        .insert("authorization", HeaderValue::from_bytes(b"Bearer \xfftok").unwrap());
    let res = router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(res).await["message"], "JWT is invalid.");

    let mut req = request("/whoami", &[("authorization", "Bearer good-admin"), ("x-sitewhere-tenant-id", "t1")]);
    req.headers_mut()
        .insert("x-sitewhere-tenant-auth", HeaderValue::from_bytes(b"s\xff1").unwrap());
    let res = router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut req = request("/whoami", &[]);
    req.headers_mut()
        .insert("x-trace-note", HeaderValue::from_bytes(b"caf\xe9").unwrap());
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

fn configured(config: &DogConfig) -> anyhow::Result<AxumApp> {
    AxumApp::from_config(config, directory(), Arc::new(StaticSystemIdentity::default()))?
        .with_service(SERVICE, Arc::new(ChannelRegistry::new()))
}

#[tokio::test]
async fn app_from_config_applies_gate_and_demux_keys() {
    let mut config = DogConfig::new();
    config.set("gate.jwt.secret", "config-signing-key");
    config.set("gate.headers.tenant_id", "x-tenant");
    config.set("gate.headers.tenant_auth", "x-tenant-auth");
    config.set("demux.timeout", "300ms");

    let app = configured(&config).unwrap();
    let demux = app.state.demux(SERVICE).unwrap();
    assert_eq!(demux.config().timeout, Duration::from_millis(300));

    let router = app.use_get("/whoami", whoami).into_router();
    let res = router
        .clone()
        .oneshot(request("/whoami", &[("authorization", "Bearer forged"), ("x-tenant", "t1")]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = router
        .oneshot(request("/whoami", &[("authorization", "Bearer forged")]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(res).await["message"], "JWT is invalid.");
}

#[tokio::test]
async fn app_from_config_rejects_bad_settings() {
    let mut config = DogConfig::new();
    assert!(configured(&config).is_err(), "HMAC without a secret");

    config.set("gate.jwt.secret", "config-signing-key");
    config.set("demux.poll.multiplier", "0.5");
    assert!(configured(&config).is_err());
}

#[tokio::test]
async fn app_from_env_reads_prefixed_variables() {
    std::env::set_var("DOGAXUM_ENV_TEST__GATE__JWT__SECRET", "env-signing-key");
    std::env::set_var("DOGAXUM_ENV_TEST__DEMUX__TIMEOUT", "750ms");

    let app = AxumApp::from_env("DOGAXUM_ENV_TEST__", directory(), Arc::new(StaticSystemIdentity::default()))
        .unwrap()
        .with_service(SERVICE, Arc::new(ChannelRegistry::new()))
        .unwrap();

    assert_eq!(app.config().get("gate.jwt.secret"), Some("env-signing-key"));
    assert_eq!(app.state.demux(SERVICE).unwrap().config().timeout, Duration::from_millis(750));
}
