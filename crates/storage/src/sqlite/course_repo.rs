use course_core::model::{Course, CourseId, Lesson, LessonOrder};

use super::SqliteRepository;
use super::mapping::{conn, map_course_row, map_lesson_row};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, ord, title, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                ord = excluded.ord,
                title = excluded.title,
                description = excluded.description
            ",
        )
        .bind(course.id.to_string())
        .bind(course.order)
        .bind(course.title.as_str())
        .bind(course.description.as_str())
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, ord, title, description, created_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, course_id, ord, title, description, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                -- a lesson never moves between courses
                ord = excluded.ord,
                title = excluded.title,
                description = excluded.description,
                body = excluded.body
            ",
        )
        .bind(lesson.id.to_string())
        .bind(lesson.course_id.to_string())
        .bind(lesson.order)
        .bind(lesson.title.as_str())
        .bind(lesson.description.as_str())
        .bind(lesson.body.as_str())
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_lessons(
        &self,
        course_id: CourseId,
        order: LessonOrder,
    ) -> Result<Vec<Lesson>, StorageError> {
        let sql = match order {
            LessonOrder::Ascending => {
                r"
                SELECT id, course_id, ord, title, description, body, created_at
                FROM lessons
                WHERE course_id = ?1
                ORDER BY ord ASC, created_at ASC, id ASC
                "
            }
            LessonOrder::Descending => {
                r"
                SELECT id, course_id, ord, title, description, body, created_at
                FROM lessons
                WHERE course_id = ?1
                ORDER BY ord DESC, created_at DESC, id DESC
                "
            }
        };

        let rows = sqlx::query(sql)
            .bind(course_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }
}
