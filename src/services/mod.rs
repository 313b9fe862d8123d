//! Business rules sitting between the handlers and the repository.
//!
//! Services receive validated DTOs, talk to the `Repository` trait object and return
//! response DTOs or an operational `AppError`.

pub mod pages;
pub mod users;

/// True when the database rejected a write because of a unique constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
