use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use chat_relay::config::{load_config, AppConfig, CONFIG_PATH_ENV};
use chat_relay::observability::init_tracing;
use chat_relay::routing::dispatch::dispatch_request;
use chat_relay::state::AppState;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env: {err}");
        }
    }

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    // Credential warnings fire while loading, before the configured subscriber exists.
    let bootstrap_subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("WARN"))
        .with_target(false)
        .finish();
    let loaded = tracing::subscriber::with_default(bootstrap_subscriber, || {
        load_config(&config_path)
    });
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{config_path}': {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async move {
        run(config).await;
    });
}

async fn run(config: AppConfig) {
    init_tracing(&config.logging);

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::from_config(config));

    tracing::info!(
        models = state.registry.len(),
        credential_policy = %state.credential_policy(),
        "chat-relay starting on {}:{}",
        host,
        port
    );
    for model in state.registry.list_all() {
        tracing::debug!(id = model.id, name = model.name, "registered model");
    }

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });
    tracing::info!("chat-relay listening on http://{host}:{port}");

    serve_accept_loop(listener, AutoBuilder::new(TokioExecutor::new()), state).await;
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    conn_builder: AutoBuilder<TokioExecutor>,
    state: Arc<AppState>,
) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                tracing::warn!("accept error: {err}");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to enable TCP_NODELAY for {remote_addr}: {err}");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let request_state = Arc::clone(&state);
        let hyper_service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(Arc::clone(&request_state), request.map(Body::new))
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!("failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
}
