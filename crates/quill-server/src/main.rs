use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quill_api::auth::{self, AppState, AppStateInner};
use quill_api::middleware::require_auth;
use quill_api::notes;
use quill_gateway::connection;
use quill_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("QUILL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("QUILL_DB_PATH").unwrap_or_else(|_| "quill.db".into());
    let host = std::env::var("QUILL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUILL_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;

    // Init database
    let db = Arc::new(quill_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
    });

    let state = ServerState {
        app: app_state.clone(),
        dispatcher,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/notes/shared/{token}", get(notes::get_shared_note))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/user", get(auth::current_user))
        .route("/notes", get(notes::list_notes))
        .route("/notes", post(notes::create_note))
        .route("/notes/search", get(notes::search_notes))
        .route("/notes/{id}", get(notes::get_note))
        .route("/notes/{id}", put(notes::update_note))
        .route("/notes/{id}", delete(notes::delete_note))
        .route("/notes/{id}/pin", put(notes::toggle_pin))
        .route("/notes/{id}/share", post(notes::generate_share_link))
        .route("/notes/{id}/collaborators", post(notes::add_collaborator))
        .route(
            "/notes/{id}/collaborators/{user_id}",
            delete(notes::remove_collaborator),
        )
        .route("/notes/{id}/activity", get(notes::list_activity))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Quill server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Identity is established here, at the upgrade layer: a missing token is
/// an anonymous connection (allowed, read-only semantics downstream), an
/// invalid one is rejected outright.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = match &query.token {
        Some(token) => match connection::authenticate(token, &state.jwt_secret) {
            Some(identity) => Some(identity),
            None => return StatusCode::UNAUTHORIZED.into_response(),
        },
        None => None,
    };

    let dispatcher = state.dispatcher.clone();
    let db = state.app.db.clone();
    ws.on_upgrade(move |socket| connection::handle_socket(socket, dispatcher, db, identity))
        .into_response()
}
