use std::sync::Arc;

use axum::handler::Handler;
use axum::http::HeaderName;
use axum::routing::get;
use axum::{Extension, Router};
use dog_auth::{GateOptions, TenantDirectory, TokenAuthenticationGate};
use dog_core::{DogConfig, DogConfigSnapshot, SystemIdentityProvider};
use dog_demux::{ChannelRegistry, DemuxConfig, MultitenantDemux};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middlewares::gate_layer;
use crate::DogAxumState;

const REQUEST_ID: &str = "x-request-id";

pub struct AxumApp {
    pub state: DogAxumState,
    pub router: Router<()>,
    config: DogConfigSnapshot,
}

impl Clone for AxumApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
            config: self.config.clone(),
        }
    }
}

impl AxumApp {
    pub fn new(gate: TokenAuthenticationGate) -> Self {
        Self {
            state: DogAxumState::new(gate),
            router: Router::new(),
            config: DogConfigSnapshot::default(),
        }
    }

    /// Build the gate from the `gate.*` keys of `config`. The `demux.*` keys
    /// tune every demux added with [`AxumApp::with_service`].
    pub fn from_config(
        config: &DogConfig,
        directory: Arc<dyn TenantDirectory>,
        system: Arc<dyn SystemIdentityProvider>,
    ) -> anyhow::Result<Self> {
        let snapshot = config.snapshot();
        let options = GateOptions::from_snapshot(&snapshot);
        let gate = TokenAuthenticationGate::from_options(&options, directory, system)?;
        Ok(Self {
            config: snapshot,
            ..Self::new(gate)
        })
    }

    /// [`AxumApp::from_config`] over the environment variables starting with
    /// `prefix` (`DOG__GATE__JWT__SECRET` sets `gate.jwt.secret`).
    pub fn from_env(
        prefix: &str,
        directory: Arc<dyn TenantDirectory>,
        system: Arc<dyn SystemIdentityProvider>,
    ) -> anyhow::Result<Self> {
        let mut config = DogConfig::new();
        config.load_env(prefix);
        Self::from_config(&config, directory, system)
    }

    pub fn config(&self) -> &DogConfigSnapshot {
        &self.config
    }

    pub fn gate(&self) -> &Arc<TokenAuthenticationGate> {
        &self.state.gate
    }

    /// Make a demux available to handlers through [`DogAxumState::channel`].
    pub fn with_demux(mut self, demux: MultitenantDemux) -> Self {
        self.state.add_demux(demux);
        self
    }

    /// Add a demux for `service` over `registry`. It probes as the gate's
    /// system identity and reads its timing from the `demux.*` keys.
    pub fn with_service(self, service: impl Into<String>, registry: Arc<ChannelRegistry>) -> anyhow::Result<Self> {
        let config = DemuxConfig::from_snapshot(&self.config);
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        let system = Arc::clone(self.gate().resolver().system_identity());
        let demux = MultitenantDemux::new(service, registry, system).with_config(config);
        Ok(self.with_demux(demux))
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// Final router: request ids, tracing, then the token gate in front of
    /// every route.
    pub fn into_router(self) -> Router<()> {
        let request_id = HeaderName::from_static(REQUEST_ID);
        self.router
            .layer(gate_layer(Arc::clone(&self.state.gate)))
            .layer(Extension(self.state))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

pub fn axum(gate: TokenAuthenticationGate) -> AxumApp {
    AxumApp::new(gate)
}
