use crate::error::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Inputs handed to the external interpretation service. Model identity and
/// prompt wording are implementation details of this client; callers only see
/// the context in / bundle out contract.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretationContext {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub percentage: f64,
    pub readiness_band: String,
    pub category_scores: Option<BTreeMap<String, f64>>,
}

/// The structured bundle the service must return. Every field is required;
/// a response missing any key fails deserialization and is treated as an
/// engine failure, never partially trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInterpretation {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub career_clusters: Vec<String>,
    pub risk_level: String,
    pub readiness_status: String,
    pub action_plan: Vec<String>,
}

#[derive(Clone)]
pub struct InterpreterClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl InterpreterClient {
    pub fn new(api_key: Option<String>, client: Client, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Single, time-boxed call to the generation service. Any failure here
    /// (missing key, transport, non-JSON, schema violation) is surfaced to the
    /// caller, whose unconditional recovery path is the rule-based fallback.
    pub async fn generate(&self, context: &InterpretationContext) -> Result<AiInterpretation> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not configured"))?;

        let prompt = build_prompt(context);
        let payload = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": 0.4,
                "responseMimeType": "application/json"
            }
        });

        let url = format!(
            "{}/v1beta/models/gemini-pro:generateContent?key={}",
            self.base_url, api_key
        );
        let res = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API error {}: {}", status, sanitize(&text)).into());
        }

        let body: JsonValue = res.json().await?;
        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response format"))?;

        parse_interpretation(text)
    }
}

fn build_prompt(context: &InterpretationContext) -> String {
    let mut category_info = String::new();
    if let Some(scores) = &context.category_scores {
        category_info.push_str("\nCategory Breakdown:\n");
        for (category, score) in scores {
            category_info.push_str(&format!("- {}: {}\n", category, score));
        }
    }

    format!(
        "You are a career guidance AI. Provide guidance only. No medical or psychological diagnosis.\n\n\
ASSESSMENT RESULTS:\n\
- Total Questions: {}\n\
- Correct Answers: {}\n\
- Percentage Score: {}%\n\
- Readiness Band: {}\n{}\n\
TASK:\n\
Generate a structured JSON object with exactly these keys: summary (2-3 sentence overview), \
strengths (list), weaknesses (list), career_clusters (list), risk_level (LOW/MEDIUM/HIGH), \
readiness_status (READY/PARTIALLY READY/NOT READY), action_plan (list of steps).\n\
Return ONLY valid JSON, no markdown, no code blocks. Use positive, encouraging language \
and focus on career development, not diagnosis.",
        context.total_questions,
        context.correct_answers,
        context.percentage,
        context.readiness_band,
        category_info
    )
}

/// Parse the model text into the required bundle, tolerating markdown code
/// fences around otherwise valid JSON.
fn parse_interpretation(text: &str) -> Result<AiInterpretation> {
    let cleaned = strip_code_fences(text);
    let interpretation: AiInterpretation = serde_json::from_str(cleaned)
        .map_err(|e| anyhow::anyhow!("Gemini response failed schema validation: {}", e))?;
    Ok(interpretation)
}

fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Keep upstream error bodies out of logs/responses when they may carry key
/// material.
fn sanitize(text: &str) -> String {
    let lowered = text.to_lowercase();
    if lowered.contains("api key") || lowered.contains("authentication") {
        "authentication failed".to_string()
    } else {
        text.chars().take(300).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> InterpretationContext {
        InterpretationContext {
            total_questions: 35,
            correct_answers: 20,
            percentage: 57.1,
            readiness_band: "PARTIALLY READY".to_string(),
            category_scores: None,
        }
    }

    fn client_for(server: &MockServer) -> InterpreterClient {
        InterpreterClient::new(
            Some("test-key".to_string()),
            Client::new(),
            Duration::from_secs(5),
        )
        .with_base_url(&server.uri())
    }

    fn gemini_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        })
    }

    const VALID_BUNDLE: &str = r#"{
        "summary": "Developing profile with clear potential.",
        "strengths": ["curiosity"],
        "weaknesses": ["focus"],
        "career_clusters": ["Technology"],
        "risk_level": "MEDIUM",
        "readiness_status": "PARTIALLY READY",
        "action_plan": ["explore", "practice", "decide"]
    }"#;

    #[test]
    fn unconfigured_key_is_an_error() {
        let client = InterpreterClient::new(None, Client::new(), Duration::from_secs(5));
        assert!(!client.is_configured());
        let err = tokio_test::block_on(client.generate(&context()));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn valid_response_parses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(VALID_BUNDLE)))
            .mount(&server)
            .await;

        let bundle = client_for(&server).generate(&context()).await.unwrap();
        assert_eq!(bundle.risk_level, "MEDIUM");
        assert_eq!(bundle.action_plan.len(), 3);
    }

    #[tokio::test]
    async fn markdown_fenced_json_is_accepted() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n{}\n```", VALID_BUNDLE);
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&fenced)))
            .mount(&server)
            .await;

        let bundle = client_for(&server).generate(&context()).await.unwrap();
        assert_eq!(bundle.readiness_status, "PARTIALLY READY");
    }

    #[tokio::test]
    async fn missing_required_key_is_rejected() {
        let server = MockServer::start().await;
        // no action_plan
        let partial = r#"{
            "summary": "s", "strengths": [], "weaknesses": [],
            "career_clusters": [], "risk_level": "LOW",
            "readiness_status": "READY"
        }"#;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(partial)))
            .mount(&server)
            .await;

        assert!(client_for(&server).generate(&context()).await.is_err());
    }

    #[tokio::test]
    async fn non_json_text_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_body("I cannot help with that.")),
            )
            .mount(&server)
            .await;

        assert!(client_for(&server).generate(&context()).await.is_err());
    }

    #[tokio::test]
    async fn upstream_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        assert!(client_for(&server).generate(&context()).await.is_err());
    }
}
