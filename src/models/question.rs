use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    LikertScale,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Raw options column: either a JSON array or a `"A) ..., B) ..."` string.
    pub options: Option<String>,
    pub correct_answer: Option<String>,
    pub category: Option<String>,
    pub section_id: Option<Uuid>,
    pub is_active: bool,
    pub order_index: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub key: String,
    pub text: String,
}

impl Question {
    /// Parse the stored options into `{key, text}` pairs. Accepts a JSON array
    /// of objects/strings or a lettered string like
    /// `"A) Strongly Disagree, B) Disagree, C) Neutral"`. Option text may
    /// itself contain commas; splits only happen ahead of a new letter prefix.
    /// Unparseable input yields an empty list, never placeholder options.
    pub fn parsed_options(&self) -> Vec<OptionItem> {
        let Some(raw) = self.options.as_deref() else {
            return Vec::new();
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Vec::new();
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            if let Some(items) = value.as_array() {
                let mut result = Vec::new();
                for item in items {
                    match item {
                        serde_json::Value::Object(obj) => {
                            let key = obj
                                .get("key")
                                .or_else(|| obj.get("value"))
                                .and_then(|v| v.as_str())
                                .unwrap_or_default();
                            let text = obj
                                .get("text")
                                .or_else(|| obj.get("label"))
                                .and_then(|v| v.as_str())
                                .unwrap_or_default();
                            if !key.is_empty() && !text.is_empty() {
                                result.push(OptionItem {
                                    key: key.to_uppercase(),
                                    text: text.trim().to_string(),
                                });
                            }
                        }
                        serde_json::Value::String(s) => {
                            if let Some(opt) = parse_lettered_option(s) {
                                result.push(opt);
                            }
                        }
                        _ => {}
                    }
                }
                return result;
            }
        }

        split_lettered_options(raw)
    }
}

/// Parse one `"A) text"` / `"b. text"` fragment.
fn parse_lettered_option(part: &str) -> Option<OptionItem> {
    let part = part.trim();
    let mut chars = part.chars();
    let key = chars.next()?;
    if !key.is_ascii_alphabetic() || !('A'..='E').contains(&key.to_ascii_uppercase()) {
        return None;
    }
    let sep = chars.next()?;
    if sep != ')' && sep != '.' {
        return None;
    }
    let text = chars.as_str().trim();
    if text.is_empty() {
        return None;
    }
    Some(OptionItem {
        key: key.to_ascii_uppercase().to_string(),
        text: text.to_string(),
    })
}

/// Split `"A) x, B) y, ..."` on commas that are directly followed by another
/// letter prefix, so commas inside option text survive.
fn split_lettered_options(raw: &str) -> Vec<OptionItem> {
    let bytes = raw.as_bytes();
    let mut parts: Vec<&str> = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b',' {
            let rest = raw[i + 1..].trim_start();
            let mut rest_chars = rest.chars();
            let next_is_prefix = matches!(
                (rest_chars.next(), rest_chars.next()),
                (Some(c), Some(sep))
                    if ('A'..='E').contains(&c.to_ascii_uppercase()) && (sep == ')' || sep == '.')
            );
            if next_is_prefix {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
        }
        i += 1;
    }
    parts.push(&raw[start..]);

    parts
        .into_iter()
        .filter_map(parse_lettered_option)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_with_options(options: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            question_text: "q".into(),
            question_type: QuestionType::LikertScale,
            options: Some(options.to_string()),
            correct_answer: None,
            category: None,
            section_id: None,
            is_active: true,
            order_index: 1,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn parses_lettered_string_options() {
        let q = question_with_options(
            "A) Strongly Disagree, B) Disagree, C) Neutral, D) Agree, E) Strongly Agree",
        );
        let opts = q.parsed_options();
        assert_eq!(opts.len(), 5);
        assert_eq!(opts[0].key, "A");
        assert_eq!(opts[0].text, "Strongly Disagree");
        assert_eq!(opts[4].key, "E");
        assert_eq!(opts[4].text, "Strongly Agree");
    }

    #[test]
    fn keeps_commas_inside_option_text() {
        let q = question_with_options("A) Reading, writing and notes, B) Listening");
        let opts = q.parsed_options();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].text, "Reading, writing and notes");
    }

    #[test]
    fn parses_json_array_options() {
        let q = question_with_options(r#"[{"key":"a","text":"Yes"},{"key":"B","text":"No"}]"#);
        let opts = q.parsed_options();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].key, "A");
        assert_eq!(opts[1].text, "No");
    }

    #[test]
    fn unparseable_options_yield_empty_list() {
        let q = question_with_options("just some free text");
        assert!(q.parsed_options().is_empty());
    }
}
