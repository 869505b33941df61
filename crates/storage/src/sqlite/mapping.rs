use std::str::FromStr;

use course_core::model::{CardKind, Course, CourseProgress, Enrollment, Lesson, LessonId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Parse a TEXT column holding one of the UUID newtypes.
pub(crate) fn parse_id<T: FromStr>(field: &'static str, raw: &str) -> Result<T, StorageError> {
    raw.parse::<T>()
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

pub(crate) fn parse_card_kind(raw: &str) -> Result<CardKind, StorageError> {
    CardKind::from_str_opt(raw)
        .ok_or_else(|| StorageError::Serialization(format!("invalid card kind: {raw}")))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Ok(Course {
        id: parse_id("course id", &row.try_get::<String, _>("id").map_err(ser)?)?,
        order: row.try_get("ord").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        id: parse_id("lesson id", &row.try_get::<String, _>("id").map_err(ser)?)?,
        course_id: parse_id(
            "course id",
            &row.try_get::<String, _>("course_id").map_err(ser)?,
        )?,
        order: row.try_get("ord").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        body: row.try_get("body").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

/// The tree is stored as a JSON document in the `state` column.
pub(crate) fn state_to_json(state: &CourseProgress) -> Result<String, StorageError> {
    serde_json::to_string(state).map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let current_lesson = row
        .try_get::<Option<String>, _>("current_lesson")
        .map_err(ser)?
        .map(|raw| parse_id::<LessonId>("current lesson", &raw))
        .transpose()?;
    let state_json: String = row.try_get("state").map_err(ser)?;
    let state: CourseProgress = serde_json::from_str(&state_json).map_err(ser)?;

    Ok(Enrollment {
        id: Uuid::parse_str(&id).map_err(ser)?,
        user_id: parse_id("user id", &row.try_get::<String, _>("user_id").map_err(ser)?)?,
        course_id: parse_id(
            "course id",
            &row.try_get::<String, _>("course_id").map_err(ser)?,
        )?,
        current_lesson_id: current_lesson,
        state,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::DeckId;

    #[test]
    fn parse_id_reports_field_and_value() {
        let err = parse_id::<DeckId>("deck id", "nope").unwrap_err();
        assert_eq!(err.to_string(), "serialization error: invalid deck id: nope");
    }

    #[test]
    fn unknown_card_kind_is_rejected() {
        assert!(parse_card_kind("essay").is_err());
        assert_eq!(
            parse_card_kind("fill_in_the_blanks").unwrap(),
            CardKind::FillInTheBlanks
        );
    }
}
