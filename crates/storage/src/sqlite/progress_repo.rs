use course_core::model::{CourseId, Enrollment, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row, state_to_json};
use crate::repository::{ProgressRepository, StorageError};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, current_lesson, state, created_at, updated_at
            FROM user_course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_progress_row(&row)
    }

    async fn create_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let state = state_to_json(&enrollment.state)?;
        sqlx::query(
            r"
            INSERT INTO user_course_progress
                (id, user_id, course_id, current_lesson, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(enrollment.id.to_string())
        .bind(enrollment.user_id.to_string())
        .bind(enrollment.course_id.to_string())
        .bind(enrollment.current_lesson_id.map(|id| id.to_string()))
        .bind(state)
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict
            } else {
                conn(e)
            }
        })?;

        Ok(())
    }

    async fn save_progress(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let state = state_to_json(&enrollment.state)?;
        let result = sqlx::query(
            r"
            UPDATE user_course_progress
            SET current_lesson = ?3,
                state = ?4,
                updated_at = ?5
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(enrollment.user_id.to_string())
        .bind(enrollment.course_id.to_string())
        .bind(enrollment.current_lesson_id.map(|id| id.to_string()))
        .bind(state)
        .bind(enrollment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
