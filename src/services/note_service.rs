use crate::dto::note_dto::NoteResponse;
use crate::error::{Error, Result};
use crate::models::counsellor_note::CounsellorNote;
use crate::models::test_attempt::TestAttempt;
use crate::models::user::UserRole;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct NoteService {
    pool: PgPool,
}

impl NoteService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or update the counsellor's note for an attempt (one note per
    /// (attempt, counsellor)).
    pub async fn upsert_note(
        &self,
        counsellor_id: Uuid,
        counsellor_name: &str,
        attempt_id: Uuid,
        notes: &str,
    ) -> Result<NoteResponse> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        let note = sqlx::query_as::<_, CounsellorNote>(
            r#"
            INSERT INTO counsellor_notes (counsellor_id, student_id, test_attempt_id, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (test_attempt_id, counsellor_id) DO UPDATE
            SET notes = EXCLUDED.notes, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(counsellor_id)
        .bind(attempt.student_id)
        .bind(attempt_id)
        .bind(notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(note_response(note, counsellor_name.to_string()))
    }

    /// Read any counsellor's note for an attempt. Students may only read
    /// notes on their own attempt.
    pub async fn get_note(
        &self,
        requester_id: Uuid,
        requester_role: UserRole,
        attempt_id: Uuid,
    ) -> Result<Option<NoteResponse>> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        if requester_role == UserRole::Student && attempt.student_id != requester_id {
            return Err(Error::Forbidden("Access denied".to_string()));
        }

        let Some(note) = sqlx::query_as::<_, CounsellorNote>(
            r#"SELECT * FROM counsellor_notes WHERE test_attempt_id = $1 LIMIT 1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let counsellor_name = sqlx::query_scalar::<_, String>(
            r#"SELECT full_name FROM users WHERE id = $1"#,
        )
        .bind(note.counsellor_id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_else(|| "Unknown".to_string());

        Ok(Some(note_response(note, counsellor_name)))
    }
}

fn note_response(note: CounsellorNote, counsellor_name: String) -> NoteResponse {
    NoteResponse {
        id: note.id,
        counsellor_id: note.counsellor_id,
        counsellor_name,
        student_id: note.student_id,
        test_attempt_id: note.test_attempt_id,
        notes: note.notes,
        created_at: note.created_at,
        updated_at: note.updated_at,
    }
}
