//! Explicit `Build(config) -> Facilitator` entrypoint (spec §9 design notes):
//! all side effects (key loading, RPC dialing, socket binding) happen once,
//! here, before the server starts serving traffic.

use axum::Router;
use axum::http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use x402_chain_eip155::{ExactEip155Facilitator, UptoEip155Facilitator};
use x402_chain_solana::ExactSolanaFacilitator;
use x402_chain_starknet::ExactStarknetFacilitator;
use x402_core::{Facilitator, FacilitatorCore, Hooks, SchemeFacilitator};
use x402_types::requirements::Scheme;

use crate::chain::{self, ChainConfigError};
use crate::config::Config;
use crate::sig_down::SigDown;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Chain(#[from] ChainConfigError),
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registers every configured network's scheme handlers and serves the
/// facilitator's `/verify`, `/settle`, `/supported` HTTP surface.
pub async fn run() -> Result<(), RunError> {
    let config = Config::load();
    let providers = chain::build_chain_providers(&config).await?;

    let mut core = FacilitatorCore::new(Hooks::default());

    for (network, evm) in providers.evm {
        let exact: Arc<dyn SchemeFacilitator> = Arc::new(ExactEip155Facilitator::new(evm.clone()));
        core.register(Scheme::Exact, network.clone(), exact);
        let upto: Arc<dyn SchemeFacilitator> = Arc::new(UptoEip155Facilitator::new(evm));
        core.register(Scheme::Upto, network, upto);
    }

    for (network, solana) in providers.solana {
        let exact: Arc<dyn SchemeFacilitator> = Arc::new(ExactSolanaFacilitator::new(solana));
        core.register(Scheme::Exact, network, exact);
    }

    for (network, starknet) in providers.starknet {
        let exact: Arc<dyn SchemeFacilitator> = Arc::new(ExactStarknetFacilitator::new(starknet));
        core.register(Scheme::Exact, network, exact);
    }

    let facilitator: Arc<dyn Facilitator> = Arc::new(core);

    let app: Router = x402_axum::facilitator_routes(facilitator)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("Starting x402 facilitator at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RunError::Bind(addr, e))?;

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    let graceful_shutdown = async move { cancellation_token.cancelled().await };

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    Ok(())
}
