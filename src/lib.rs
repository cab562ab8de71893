pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    analytics_service::AnalyticsService, answer_service::AnswerService,
    attempt_service::AttemptService, interpreter_client::InterpreterClient,
    note_service::NoteService, scoring_service::ScoringService, section_service::SectionService,
    timer::TimerService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub attempt_service: AttemptService,
    pub section_service: SectionService,
    pub answer_service: AnswerService,
    pub timer_service: TimerService,
    pub scoring_service: ScoringService,
    pub note_service: NoteService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let interpreter = InterpreterClient::new(
            config.gemini_api_key.clone(),
            http_client,
            Duration::from_secs(config.ai_timeout_seconds),
        );

        let attempt_service = AttemptService::new(pool.clone(), interpreter);
        let section_service = SectionService::new(pool.clone());
        let answer_service = AnswerService::new(pool.clone());
        let timer_service = TimerService::new(pool.clone());
        let scoring_service = ScoringService::new(pool.clone());
        let note_service = NoteService::new(pool.clone());
        let analytics_service = AnalyticsService::new(pool.clone());

        Self {
            pool,
            attempt_service,
            section_service,
            answer_service,
            timer_service,
            scoring_service,
            note_service,
            analytics_service,
        }
    }
}
