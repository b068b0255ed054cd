//! User queries.

use chrono::Utc;
use rusqlite::Connection;
use tubely_common::{Error, Result, UserId};

use super::{time_column, uuid_column};
use crate::models::User;

/// Create a user with a unique email address.
pub fn create_user(conn: &Connection, email: &str) -> Result<User> {
    let id = UserId::new();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO users (id, email, created_at) VALUES (:id, :email, :created_at)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":email": email,
            ":created_at": created_at.to_rfc3339(),
        },
    )
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            Error::invalid_input(format!("Email '{}' already registered", email))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(User {
        id,
        email: email.to_string(),
        created_at,
    })
}

/// Get a user by ID, `None` if there is no such user.
pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, email, created_at FROM users WHERE id = :id",
        rusqlite::named_params! { ":id": id.to_string() },
        |row| {
            Ok(User {
                id: UserId::from(uuid_column(row, 0)?),
                email: row.get(1)?,
                created_at: time_column(row, 2)?,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}
