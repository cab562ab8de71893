use assessment_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth,
    routes, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    // Reference data is provisioned once at startup; the request path never
    // fabricates a missing section.
    app_state.section_service.seed_sections().await?;

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let student_api = Router::new()
        .route("/test/questions", get(routes::test_routes::get_questions))
        .route("/test/start", post(routes::test_routes::start_test))
        .route("/test/submit", post(routes::test_routes::submit_answers))
        .route(
            "/test/:attempt_id/complete",
            post(routes::test_routes::complete_test),
        )
        .route(
            "/test/:attempt_id/status",
            get(routes::test_routes::get_test_status),
        )
        .route("/test/sections", get(routes::test_routes::get_sections))
        .route(
            "/test/sections/:section_index/questions",
            get(routes::test_routes::get_section_questions),
        )
        .route(
            "/test/sections/:section_index/start",
            post(routes::test_routes::start_section),
        )
        .route(
            "/test/sections/:section_index/pause",
            post(routes::test_routes::pause_section),
        )
        .route(
            "/test/sections/:section_index/resume",
            post(routes::test_routes::resume_section),
        )
        .route(
            "/test/sections/:section_index/timer",
            get(routes::test_routes::get_section_timer),
        )
        .route(
            "/test/sections/:section_index/submit",
            post(routes::test_routes::submit_section),
        )
        .route("/student/result", get(routes::result_routes::list_results))
        .route(
            "/student/result/:attempt_id",
            get(routes::result_routes::get_result),
        )
        .layer(axum::middleware::from_fn(auth::require_student));

    let shared_api = Router::new()
        .route(
            "/test/interpretation/:attempt_id",
            get(routes::test_routes::get_interpretation),
        )
        .layer(axum::middleware::from_fn(
            auth::require_student_or_counsellor,
        ));

    let counsellor_api = Router::new()
        .route(
            "/counsellor/notes",
            post(routes::note_routes::create_or_update_note),
        )
        .layer(axum::middleware::from_fn(auth::require_counsellor));

    let notes_read_api = Router::new()
        .route(
            "/counsellor/notes/:attempt_id",
            get(routes::note_routes::get_note),
        )
        .layer(axum::middleware::from_fn(auth::require_authenticated));

    let admin_api = Router::new()
        .route(
            "/admin/analytics/overview",
            get(routes::analytics_routes::get_overview),
        )
        .layer(axum::middleware::from_fn(auth::require_admin));

    let app = base_routes
        .merge(student_api)
        .merge(shared_api)
        .merge(counsellor_api)
        .merge(notes_read_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
