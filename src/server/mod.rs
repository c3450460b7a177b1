use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::admin::Admin;
use crate::auth::{ConfigIdentityProvider, IdentityProvider};
use crate::config::{self, RosterConfig};

pub mod auth;
pub mod routes;

/// Server state
pub struct AppState {
    pub admin: Admin,
    pub identity: Box<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(admin: Admin, identity: impl IdentityProvider) -> Self {
        Self {
            admin,
            identity: Box::new(identity),
        }
    }
}

/// Run a store operation on the blocking pool. SQLite, file and password
/// hashing work never runs on the async workers.
pub(crate) async fn blocking<T, F>(state: &Arc<AppState>, op: F) -> routes::ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> crate::Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || op(&state))
        .await
        .map_err(|e| routes::ApiError(crate::Error::Io(std::io::Error::other(e))))?
        .map_err(routes::ApiError)
}

/// Build the HTTP router. Everything but `/health` and `/login` requires a
/// superuser.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/companies", get(routes::list_companies).post(routes::create_company))
        .route("/companies/{id}", get(routes::get_company))
        .route("/companies/{id}/update", post(routes::rename_company))
        .route("/companies/{id}/delete", get(routes::delete_company).post(routes::delete_company))
        .route("/companies/{id}/students", get(routes::list_students).post(routes::add_student))
        .route("/companies/{id}/students/{student_id}", get(routes::get_student))
        .route("/companies/{id}/students/{student_id}/edit", post(routes::update_student))
        .route(
            "/companies/{id}/students/{student_id}/delete",
            get(routes::delete_student).post(routes::delete_student),
        )
        .route("/audit", get(routes::audit))
        .route("/audit/repair", post(routes::repair))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_superuser));

    Router::new()
        .route("/health", get(routes::health))
        .route("/login", post(routes::login))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: RosterConfig) -> anyhow::Result<()> {
    config::ensure_db_dir(&config.database)?;
    let admin = Admin::open(&config.database, &config.storage_root)?;

    if !config.accounts.iter().any(|a| a.is_superuser) {
        tracing::warn!("No superuser accounts configured; every protected request will be rejected");
    }
    let state = Arc::new(AppState::new(admin, ConfigIdentityProvider::new(config.accounts.clone())));

    let app = router(state);

    let addr: SocketAddr = config.listen.parse()?;
    tracing::info!("Starting server on {}", addr);
    crate::ui::item(crate::ui::Icons::ROSTER, &format!("Server running at http://{}", addr));
    tracing::info!("Student stores under {}", config.storage_root.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
