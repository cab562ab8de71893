use crate::error::{Error, Result};
use crate::models::section_progress::{SectionProgress, SectionStatus};
use crate::models::section::SECTION_TIME_LIMIT_SECONDS;
use crate::utils::time::elapsed_seconds;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Timer state transitions, written as pure functions over a progress row plus
/// an explicit clock so the arithmetic is testable without a database. The
/// service below applies them inside one transaction per request.
///
/// All arithmetic is in whole (floored) seconds.

/// Start the section timer. Idempotent while running; resumes when paused.
pub fn start(progress: &mut SectionProgress, now: DateTime<Utc>) -> Result<()> {
    match progress.status {
        SectionStatus::Completed => Err(Error::Finalized("Section already completed".to_string())),
        SectionStatus::NotStarted => {
            progress.status = SectionStatus::InProgress;
            progress.section_start_time = Some(now);
            progress.paused_at = None;
            Ok(())
        }
        SectionStatus::InProgress => {
            if progress.paused_at.is_some() {
                resume(progress, now)
            } else {
                // already running, no-op
                Ok(())
            }
        }
    }
}

/// Bank the current running interval and mark the section paused.
pub fn pause(progress: &mut SectionProgress, now: DateTime<Utc>) -> Result<()> {
    if progress.status != SectionStatus::InProgress || progress.paused_at.is_some() {
        return Err(Error::InvalidState("Section is not running".to_string()));
    }
    if let Some(started) = progress.section_start_time.take() {
        progress.total_time_spent += elapsed_seconds(started, now);
    }
    progress.paused_at = Some(now);
    Ok(())
}

pub fn resume(progress: &mut SectionProgress, now: DateTime<Utc>) -> Result<()> {
    if progress.paused_at.is_none() {
        return Err(Error::InvalidState("Section is not paused".to_string()));
    }
    progress.paused_at = None;
    progress.section_start_time = Some(now);
    progress.status = SectionStatus::InProgress;
    Ok(())
}

/// Elapsed running time: banked seconds plus the current interval, if any.
pub fn current_elapsed(progress: &SectionProgress, now: DateTime<Utc>) -> i32 {
    match progress.section_start_time {
        Some(started) if progress.paused_at.is_none() => {
            progress.total_time_spent + elapsed_seconds(started, now)
        }
        _ => progress.total_time_spent,
    }
}

/// Expiry check that every timer read runs: once elapsed reaches the cap, the
/// section force-transitions to COMPLETED with its time capped. Returns true
/// when the transition was applied. This is how expiry is detected without a
/// background scheduler.
pub fn check_expiry(progress: &mut SectionProgress, now: DateTime<Utc>) -> bool {
    if progress.status == SectionStatus::Completed {
        return false;
    }
    if current_elapsed(progress, now) >= SECTION_TIME_LIMIT_SECONDS {
        progress.total_time_spent = SECTION_TIME_LIMIT_SECONDS;
        progress.section_start_time = None;
        progress.paused_at = None;
        progress.status = SectionStatus::Completed;
        return true;
    }
    false
}

/// Finalize the timer on submission: bank the running interval, cap at the
/// section limit and mark COMPLETED.
pub fn finalize(progress: &mut SectionProgress, now: DateTime<Utc>) {
    if let Some(started) = progress.section_start_time.take() {
        if progress.paused_at.is_none() {
            progress.total_time_spent += elapsed_seconds(started, now);
        }
    }
    progress.total_time_spent = progress.total_time_spent.min(SECTION_TIME_LIMIT_SECONDS);
    progress.section_start_time = None;
    progress.paused_at = None;
    progress.status = SectionStatus::Completed;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TimerReading {
    pub section_index: i32,
    pub section_name: String,
    pub status: SectionStatus,
    pub total_time_spent: i32,
    pub is_paused: bool,
    pub current_time: i32,
}

#[derive(Clone)]
pub struct TimerService {
    pool: PgPool,
}

impl TimerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start (or resume) the timer for a section, creating the progress row
    /// lazily. The section must be unlocked and the attempt still in progress.
    pub async fn start_section(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
    ) -> Result<TimerReading> {
        let mut tx = self.pool.begin().await?;
        super::ensure_attempt_open(&mut tx, attempt_id, student_id).await?;
        let section = super::section_service::fetch_section(&mut tx, section_index).await?;
        super::section_service::ensure_unlocked(&mut tx, attempt_id, section_index).await?;

        let now = crate::utils::time::now();
        let existing = fetch_progress_for_update(&mut tx, attempt_id, section.id).await?;

        let reading = match existing {
            Some(mut progress) => {
                start(&mut progress, now)?;
                update_progress(&mut tx, &progress).await?;
                reading_of(&section.name, section_index, &progress, now)
            }
            None => {
                let progress = sqlx::query_as::<_, SectionProgress>(
                    r#"
                    INSERT INTO section_progresses
                        (test_attempt_id, section_id, status, total_time_spent, section_start_time)
                    VALUES ($1, $2, 'IN_PROGRESS', 0, $3)
                    RETURNING *
                    "#,
                )
                .bind(attempt_id)
                .bind(section.id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                reading_of(&section.name, section_index, &progress, now)
            }
        };

        tx.commit().await?;
        tracing::info!(
            attempt_id = %attempt_id,
            section = section_index,
            "section timer started"
        );
        Ok(reading)
    }

    pub async fn pause_section(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
    ) -> Result<TimerReading> {
        self.transition(student_id, attempt_id, section_index, pause)
            .await
    }

    pub async fn resume_section(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
    ) -> Result<TimerReading> {
        self.transition(student_id, attempt_id, section_index, resume)
            .await
    }

    /// Read the timer. When the elapsed time has reached the cap, the expiry
    /// transition is applied and persisted in the same transaction as the
    /// read, so a concurrent reader never observes an over-cap running timer.
    pub async fn read_timer(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
    ) -> Result<TimerReading> {
        let mut tx = self.pool.begin().await?;
        super::fetch_attempt_for_student(&mut tx, attempt_id, student_id).await?;
        let section = super::section_service::fetch_section(&mut tx, section_index).await?;

        let now = crate::utils::time::now();
        let Some(mut progress) = fetch_progress_for_update(&mut tx, attempt_id, section.id).await?
        else {
            tx.commit().await?;
            // Section not started yet; nothing to persist.
            return Ok(TimerReading {
                section_index,
                section_name: section.name,
                status: SectionStatus::NotStarted,
                total_time_spent: 0,
                is_paused: false,
                current_time: 0,
            });
        };

        if check_expiry(&mut progress, now) {
            update_progress(&mut tx, &progress).await?;
            tracing::info!(
                attempt_id = %attempt_id,
                section = section_index,
                "section auto-completed on timer expiry"
            );
        }
        tx.commit().await?;

        Ok(reading_of(&section.name, section_index, &progress, now))
    }

    async fn transition(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
        apply: fn(&mut SectionProgress, DateTime<Utc>) -> Result<()>,
    ) -> Result<TimerReading> {
        let mut tx = self.pool.begin().await?;
        super::ensure_attempt_open(&mut tx, attempt_id, student_id).await?;
        let section = super::section_service::fetch_section(&mut tx, section_index).await?;

        let now = crate::utils::time::now();
        let mut progress = fetch_progress_for_update(&mut tx, attempt_id, section.id)
            .await?
            .ok_or_else(|| Error::NotFound("Section progress not found".to_string()))?;

        apply(&mut progress, now)?;
        update_progress(&mut tx, &progress).await?;
        tx.commit().await?;

        Ok(reading_of(&section.name, section_index, &progress, now))
    }
}

fn reading_of(
    section_name: &str,
    section_index: i32,
    progress: &SectionProgress,
    now: DateTime<Utc>,
) -> TimerReading {
    TimerReading {
        section_index,
        section_name: section_name.to_string(),
        status: progress.status,
        total_time_spent: progress.total_time_spent,
        is_paused: progress.is_paused(),
        current_time: current_elapsed(progress, now).min(SECTION_TIME_LIMIT_SECONDS),
    }
}

async fn fetch_progress_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
    section_id: Uuid,
) -> Result<Option<SectionProgress>> {
    let progress = sqlx::query_as::<_, SectionProgress>(
        r#"
        SELECT * FROM section_progresses
        WHERE test_attempt_id = $1 AND section_id = $2
        FOR UPDATE
        "#,
    )
    .bind(attempt_id)
    .bind(section_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(progress)
}

pub(crate) async fn update_progress(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    progress: &SectionProgress,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE section_progresses
        SET status = $1, total_time_spent = $2, section_start_time = $3,
            paused_at = $4, updated_at = NOW()
        WHERE id = $5
        "#,
    )
    .bind(progress.status)
    .bind(progress.total_time_spent)
    .bind(progress.section_start_time)
    .bind(progress.paused_at)
    .bind(progress.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh_progress() -> SectionProgress {
        SectionProgress {
            id: Uuid::new_v4(),
            test_attempt_id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            status: SectionStatus::NotStarted,
            total_time_spent: 0,
            section_start_time: None,
            paused_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn start_pause_resume_accumulates_running_intervals_only() {
        let mut p = fresh_progress();
        let t0 = Utc::now();

        start(&mut p, t0).unwrap();
        assert_eq!(p.status, SectionStatus::InProgress);
        assert_eq!(p.section_start_time, Some(t0));

        // run 100s, pause for 50s, run 30s
        pause(&mut p, t0 + Duration::seconds(100)).unwrap();
        assert_eq!(p.total_time_spent, 100);
        assert!(p.section_start_time.is_none());
        assert!(p.paused_at.is_some());

        resume(&mut p, t0 + Duration::seconds(150)).unwrap();
        assert!(p.paused_at.is_none());

        finalize(&mut p, t0 + Duration::seconds(180));
        assert_eq!(p.total_time_spent, 130);
        assert_eq!(p.status, SectionStatus::Completed);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        start(&mut p, t0 + Duration::seconds(10)).unwrap();
        // original start timestamp is preserved
        assert_eq!(p.section_start_time, Some(t0));
    }

    #[test]
    fn start_on_completed_section_fails() {
        let mut p = fresh_progress();
        p.status = SectionStatus::Completed;
        assert!(matches!(
            start(&mut p, Utc::now()),
            Err(Error::Finalized(_))
        ));
    }

    #[test]
    fn pause_requires_running_timer() {
        let mut p = fresh_progress();
        assert!(matches!(
            pause(&mut p, Utc::now()),
            Err(Error::InvalidState(_))
        ));

        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        pause(&mut p, t0 + Duration::seconds(5)).unwrap();
        // double pause
        assert!(matches!(
            pause(&mut p, t0 + Duration::seconds(6)),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn resume_requires_paused_timer() {
        let mut p = fresh_progress();
        assert!(matches!(
            resume(&mut p, Utc::now()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn elapsed_while_paused_is_frozen() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        pause(&mut p, t0 + Duration::seconds(60)).unwrap();
        assert_eq!(current_elapsed(&p, t0 + Duration::seconds(600)), 60);
    }

    #[test]
    fn expiry_caps_time_and_completes() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();

        // one second past the cap
        let expired = check_expiry(&mut p, t0 + Duration::seconds(421));
        assert!(expired);
        assert_eq!(p.status, SectionStatus::Completed);
        assert_eq!(p.total_time_spent, SECTION_TIME_LIMIT_SECONDS);
        assert!(p.section_start_time.is_none());
        assert!(p.paused_at.is_none());
    }

    #[test]
    fn expiry_not_triggered_below_cap() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        assert!(!check_expiry(&mut p, t0 + Duration::seconds(419)));
        assert_eq!(p.status, SectionStatus::InProgress);
    }

    #[test]
    fn invariant_start_time_and_paused_at_never_both_set() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        assert!(!(p.section_start_time.is_some() && p.paused_at.is_some()));
        pause(&mut p, t0 + Duration::seconds(1)).unwrap();
        assert!(!(p.section_start_time.is_some() && p.paused_at.is_some()));
        resume(&mut p, t0 + Duration::seconds(2)).unwrap();
        assert!(!(p.section_start_time.is_some() && p.paused_at.is_some()));
        finalize(&mut p, t0 + Duration::seconds(3));
        assert!(p.section_start_time.is_none() && p.paused_at.is_none());
    }

    #[test]
    fn finalize_caps_overlong_sessions() {
        let mut p = fresh_progress();
        let t0 = Utc::now();
        start(&mut p, t0).unwrap();
        finalize(&mut p, t0 + Duration::seconds(1000));
        assert_eq!(p.total_time_spent, SECTION_TIME_LIMIT_SECONDS);
    }
}
