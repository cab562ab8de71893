use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use assessment_backend::middleware::auth;
use assessment_backend::routes;
use assessment_backend::AppState;

const LIKERT_OPTIONS: &str =
    "A) Strongly Disagree, B) Disagree, C) Neutral, D) Agree, E) Strongly Agree";

fn init_env() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    let _ = assessment_backend::config::init_config();
}

fn bearer(user_id: Uuid, role: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims<'a> {
        sub: String,
        exp: usize,
        role: &'a str,
        full_name: &'a str,
    }
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role,
        full_name: "Test User",
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test_secret_key"),
    )
    .unwrap();
    format!("Bearer {}", token)
}

fn build_app(state: AppState) -> Router {
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
        .layer(axum::middleware::from_fn(auth::require_student));

    let shared_api = Router::new()
        .route(
            "/test/interpretation/:attempt_id",
            get(routes::test_routes::get_interpretation),
        )
        .layer(axum::middleware::from_fn(
            auth::require_student_or_counsellor,
        ));

    student_api.merge(shared_api).with_state(state)
}

async fn seed_student(pool: &sqlx::PgPool) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, $3, 'STUDENT')"#,
    )
    .bind(user_id)
    .bind(format!("student_{}@example.com", user_id))
    .bind("Flow Student")
    .execute(pool)
    .await
    .expect("seed user");
    sqlx::query(r#"INSERT INTO students (user_id, grade_level) VALUES ($1, '12')"#)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("seed student profile");
    user_id
}

/// Seven Likert questions per section, replacing any prior seed data.
async fn seed_questions(pool: &sqlx::PgPool) {
    sqlx::query("DELETE FROM questions")
        .execute(pool)
        .await
        .expect("clear questions");
    let sections = sqlx::query_as::<_, (Uuid, i32)>(
        r#"SELECT id, order_index FROM sections WHERE is_active = TRUE ORDER BY order_index"#,
    )
    .fetch_all(pool)
    .await
    .expect("sections");
    assert_eq!(sections.len(), 5);

    for (section_id, order_index) in sections {
        for q in 1..=7 {
            sqlx::query(
                r#"
                INSERT INTO questions
                    (question_text, question_type, options, section_id, order_index)
                VALUES ($1, 'LIKERT_SCALE', $2, $3, $4)
                "#,
            )
            .bind(format!("Section {} question {}", order_index, q))
            .bind(LIKERT_OPTIONS)
            .bind(section_id)
            .bind((order_index - 1) * 7 + q)
            .execute(pool)
            .await
            .expect("seed question");
        }
    }
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", token);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap_or(json!(null))
    };
    (status, value)
}

fn question_ids(questions: &JsonValue) -> Vec<String> {
    questions
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_id"].as_str().unwrap().to_string())
        .collect()
}

fn answers_payload(attempt_id: &str, ids: &[String], options: &[&str]) -> JsonValue {
    let answers: Vec<JsonValue> = ids
        .iter()
        .zip(options.iter())
        .map(|(id, opt)| json!({"question_id": id, "selected_option": opt}))
        .collect();
    json!({"attempt_id": attempt_id, "answers": answers})
}

#[tokio::test]
async fn section_wise_flow_end_to_end() {
    init_env();
    let Ok(_) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping DB-backed flow test");
        return;
    };

    let pool = assessment_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");

    let state = AppState::new(pool.clone());
    state.section_service.seed_sections().await.expect("seed sections");
    seed_questions(&pool).await;

    let student_id = seed_student(&pool).await;
    let token = bearer(student_id, "STUDENT");
    let app = build_app(state);

    // start is idempotent
    let (status, start) = request(&app, "POST", "/test/start", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let attempt_id = start["test_attempt_id"].as_str().unwrap().to_string();
    assert_eq!(start["status"], "IN_PROGRESS");
    assert_eq!(start["total_questions"], 35);
    let (status, again) = request(&app, "POST", "/test/start", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["test_attempt_id"].as_str().unwrap(), attempt_id);

    // only section 1 is available up front
    let (status, overview) = request(
        &app,
        "GET",
        &format!("/test/sections?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["current_section"], 1);
    let sections = overview["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 5);
    assert_eq!(sections[0]["status"], "available");
    for section in &sections[1..] {
        assert_eq!(section["status"], "locked");
    }

    // a locked section refuses its questions
    let (status, _) = request(
        &app,
        "GET",
        &format!("/test/sections/3/questions?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // completing early is rejected
    let (status, _) = request(
        &app,
        "POST",
        &format!("/test/{}/complete", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // section 1: timer start, pause, resume, then submit the mixed answers
    let (status, timer) = request(
        &app,
        "POST",
        &format!("/test/sections/1/start?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["status"], "IN_PROGRESS");

    let (status, timer) = request(
        &app,
        "POST",
        &format!("/test/sections/1/pause?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["is_paused"], true);

    // pausing twice is an invalid state
    let (status, _) = request(
        &app,
        "POST",
        &format!("/test/sections/1/pause?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, timer) = request(
        &app,
        "POST",
        &format!("/test/sections/1/resume?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["is_paused"], false);

    let (status, reading) = request(
        &app,
        "GET",
        &format!("/test/sections/1/timer?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reading["status"], "IN_PROGRESS");

    let (status, questions) = request(
        &app,
        "GET",
        &format!("/test/sections/1/questions?attempt_id={}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids = question_ids(&questions);
    assert_eq!(ids.len(), 7);
    assert_eq!(questions[0]["options"].as_array().unwrap().len(), 5);

    // short submission is rejected before anything is written
    let (status, _) = request(
        &app,
        "POST",
        "/test/sections/1/submit",
        &token,
        Some(answers_payload(&attempt_id, &ids[..6].to_vec(), &["A"; 6])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mixed = ["A", "C", "E", "B", "D", "C", "A"];
    let (status, submit) = request(
        &app,
        "POST",
        "/test/sections/1/submit",
        &token,
        Some(answers_payload(&attempt_id, &ids, &mixed)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submit["next_section_available"], true);

    // the ledger is write-once per section
    let (status, _) = request(
        &app,
        "POST",
        "/test/sections/1/submit",
        &token,
        Some(answers_payload(&attempt_id, &ids, &mixed)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // remaining sections, all neutral answers
    for section in 2..=5 {
        let (status, questions) = request(
            &app,
            "GET",
            &format!("/test/sections/{}/questions?attempt_id={}", section, attempt_id),
            &token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "section {} questions", section);
        let ids = question_ids(&questions);
        let (status, _) = request(
            &app,
            "POST",
            &format!("/test/sections/{}/submit", section),
            &token,
            Some(answers_payload(&attempt_id, &ids, &["C"; 7])),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "section {} submit", section);
    }

    let (status, status_body) = request(
        &app,
        "GET",
        &format!("/test/{}/status", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["answered_questions"], 35);
    assert_eq!(
        status_body["completed_sections"].as_array().unwrap().len(),
        5
    );

    // complete, then complete again (idempotent)
    let (status, complete) = request(
        &app,
        "POST",
        &format!("/test/{}/complete", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(complete["status"], "COMPLETED");
    let (status, complete_again) = request(
        &app,
        "POST",
        &format!("/test/{}/complete", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(complete_again["status"], "COMPLETED");

    // at-most-once scoring: one row per dimension after repeated completion
    let dims = sqlx::query_as::<_, (String, i64)>(
        r#"SELECT dimension, COUNT(*) FROM scores WHERE test_attempt_id = $1::uuid GROUP BY dimension"#,
    )
    .bind(Uuid::parse_str(&attempt_id).unwrap())
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(dims.len(), 6); // section_1..5 + overall
    assert!(dims.iter().all(|(_, count)| *count == 1));

    // interpretation: no AI key configured, so rule-based fallback
    let (status, interp) = request(
        &app,
        "GET",
        &format!("/test/interpretation/{}", attempt_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // section 1 mean 19/7, others 3.0 -> overall ((103/35 - 1)/4)*100 = 48.57
    assert_eq!(interp["overall_percentage"], 48.57);
    assert_eq!(interp["readiness_status"], "PARTIALLY READY");
    assert_eq!(interp["risk_level"], "MEDIUM");
    assert_eq!(interp["is_ai_generated"], false);
    assert!(interp["career_direction"].as_str().unwrap().contains("(Primary)"));
    assert_eq!(interp["roadmap"]["phase1"]["duration"], "0-3 Months");
    assert_eq!(interp["action_plan"].as_array().unwrap().len(), 3);

    // one lifetime attempt: a new start is refused now
    let (status, _) = request(&app, "POST", "/test/start", &token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // another student cannot read this interpretation
    let other_id = seed_student(&pool).await;
    let other_token = bearer(other_id, "STUDENT");
    let (status, _) = request(
        &app,
        "GET",
        &format!("/test/interpretation/{}", attempt_id),
        &other_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // a counsellor can
    let counsellor_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, 'Counsellor', 'COUNSELLOR')"#,
    )
    .bind(counsellor_id)
    .bind(format!("counsellor_{}@example.com", counsellor_id))
    .execute(&pool)
    .await
    .unwrap();
    let counsellor_token = bearer(counsellor_id, "COUNSELLOR");
    let (status, _) = request(
        &app,
        "GET",
        &format!("/test/interpretation/{}", attempt_id),
        &counsellor_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
