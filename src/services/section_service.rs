use crate::dto::test_dto::{SectionMetadata, SectionsOverview};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::section::{
    Section, QUESTIONS_PER_SECTION, SECTION_TIME_LIMIT_SECONDS, TOTAL_SECTIONS,
};
use crate::models::test_attempt::TestAttempt;
use sqlx::PgPool;
use std::collections::BTreeSet;
use uuid::Uuid;

/// The five fixed sections, seeded once at startup. Any later lookup miss is a
/// provisioning defect surfaced as an error, never papered over with a
/// request-time placeholder.
const SECTION_SEED: [(i32, &str, &str); 5] = [
    (
        1,
        "Section 1: Intelligence Test (Cognitive Reasoning)",
        "Logical Reasoning, Numerical Reasoning, Verbal Reasoning, Abstract Reasoning",
    ),
    (
        2,
        "Section 2: Aptitude Test",
        "Numerical Aptitude, Logical Aptitude, Verbal Aptitude, Spatial/Mechanical Aptitude",
    ),
    (
        3,
        "Section 3: Study Habits",
        "Concentration, Consistency, Time Management, Exam Preparedness, Self-discipline",
    ),
    (
        4,
        "Section 4: Learning Style",
        "Visual, Auditory, Reading/Writing, Kinesthetic",
    ),
    (
        5,
        "Section 5: Career Interest (RIASEC)",
        "Realistic, Investigative, Artistic, Social, Enterprising, Conventional",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Locked,
    Available,
    Completed,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Locked => "locked",
            GateStatus::Available => "available",
            GateStatus::Completed => "completed",
        }
    }
}

/// Section 1 is never locked; section N>1 unlocks only once every predecessor
/// is completed.
pub fn gate_status(order_index: i32, completed: &BTreeSet<i32>) -> GateStatus {
    if completed.contains(&order_index) {
        return GateStatus::Completed;
    }
    if (1..order_index).all(|prev| completed.contains(&prev)) {
        GateStatus::Available
    } else {
        GateStatus::Locked
    }
}

/// First predecessor of `order_index` that is still incomplete, if any.
pub fn first_incomplete_prerequisite(order_index: i32, completed: &BTreeSet<i32>) -> Option<i32> {
    (1..order_index).find(|prev| !completed.contains(prev))
}

/// Lowest not-yet-completed section; 1 for a fresh attempt, 5 (terminal) once
/// every section is done.
pub fn current_section_index(completed: &BTreeSet<i32>) -> i32 {
    (1..=TOTAL_SECTIONS)
        .find(|idx| !completed.contains(idx))
        .unwrap_or(TOTAL_SECTIONS)
}

pub(crate) async fn fetch_section(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_index: i32,
) -> Result<Section> {
    sqlx::query_as::<_, Section>(
        r#"SELECT * FROM sections WHERE order_index = $1 AND is_active = TRUE"#,
    )
    .bind(order_index)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Section {} not found", order_index)))
}

/// Order indexes of the attempt's completed sections.
pub(crate) async fn completed_indexes(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
) -> Result<BTreeSet<i32>> {
    let rows = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT s.order_index
        FROM section_progresses sp
        JOIN sections s ON s.id = sp.section_id
        WHERE sp.test_attempt_id = $1 AND sp.status = 'COMPLETED'
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Reject entry into a locked section, naming the first incomplete
/// prerequisite.
pub(crate) async fn ensure_unlocked(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
    section_index: i32,
) -> Result<()> {
    if section_index <= 1 {
        return Ok(());
    }
    let completed = completed_indexes(tx, attempt_id).await?;
    if let Some(missing) = first_incomplete_prerequisite(section_index, &completed) {
        let section = fetch_section(tx, missing).await?;
        return Err(Error::SectionLocked(format!(
            "Please complete {} first",
            section.name
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SectionService {
    pool: PgPool,
}

impl SectionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotently seed the five reference sections.
    pub async fn seed_sections(&self) -> Result<()> {
        for (order_index, name, description) in SECTION_SEED {
            sqlx::query(
                r#"
                INSERT INTO sections (name, description, order_index, is_active)
                VALUES ($1, $2, $3, TRUE)
                ON CONFLICT (order_index) DO NOTHING
                "#,
            )
            .bind(name)
            .bind(description)
            .bind(order_index)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!("section reference data seeded");
        Ok(())
    }

    /// Gate status for all five sections plus the one-lifetime-attempt flags.
    pub async fn sections_overview(
        &self,
        student_id: Uuid,
        attempt_id: Option<Uuid>,
    ) -> Result<SectionsOverview> {
        let mut tx = self.pool.begin().await?;

        let completed_attempt = sqlx::query_as::<_, TestAttempt>(
            r#"
            SELECT * FROM test_attempts
            WHERE student_id = $1 AND status = 'COMPLETED'
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;

        let attempt = match attempt_id {
            Some(id) => {
                sqlx::query_as::<_, TestAttempt>(
                    r#"
                    SELECT * FROM test_attempts
                    WHERE id = $1 AND student_id = $2 AND status = 'IN_PROGRESS'
                    "#,
                )
                .bind(id)
                .bind(student_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, TestAttempt>(
                    r#"
                    SELECT * FROM test_attempts
                    WHERE student_id = $1 AND status = 'IN_PROGRESS'
                    "#,
                )
                .bind(student_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let completed = match &attempt {
            Some(a) => completed_indexes(&mut tx, a.id).await?,
            None => BTreeSet::new(),
        };

        let sections = sqlx::query_as::<_, Section>(
            r#"SELECT * FROM sections WHERE is_active = TRUE ORDER BY order_index"#,
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        if sections.len() != TOTAL_SECTIONS as usize {
            return Err(Error::Internal(format!(
                "Expected {} active sections, found {}",
                TOTAL_SECTIONS,
                sections.len()
            )));
        }

        let sections = sections
            .into_iter()
            .map(|s| SectionMetadata {
                order_index: s.order_index,
                name: s.name,
                description: s.description,
                status: gate_status(s.order_index, &completed).as_str().to_string(),
                question_count: QUESTIONS_PER_SECTION,
                time_limit_seconds: SECTION_TIME_LIMIT_SECONDS,
            })
            .collect();

        Ok(SectionsOverview {
            current_section: current_section_index(&completed),
            sections,
            can_attempt_test: completed_attempt.is_none(),
            completed_test_attempt_id: completed_attempt.map(|a| a.id),
        })
    }

    /// Questions for an unlocked section, in order, exactly seven of them.
    pub async fn section_questions(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
    ) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await?;
        super::fetch_attempt_for_student(&mut tx, attempt_id, student_id).await?;
        let section = fetch_section(&mut tx, section_index).await?;
        ensure_unlocked(&mut tx, attempt_id, section_index).await?;

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE section_id = $1 AND is_active = TRUE
            ORDER BY order_index
            "#,
        )
        .bind(section.id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        if questions.len() as i64 != QUESTIONS_PER_SECTION {
            return Err(Error::Internal(format!(
                "Section must have exactly {} questions. Found {} questions.",
                QUESTIONS_PER_SECTION,
                questions.len()
            )));
        }

        Ok(questions)
    }

    /// All active questions across sections, for the legacy whole-test path.
    pub async fn all_active_questions(&self) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions WHERE is_active = TRUE ORDER BY order_index"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }
}
