//! SQLite-backed applicant repository over the sign-up database.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::info;

use super::domain::{ApplicantRecord, ProfileDetails, ProfileUpdate, Username};
use super::repository::{ApplicantRepository, RepositoryError};

/// Columns added to `users` after sign-up.
pub const PROFILE_COLUMNS: [&str; 6] = [
    "full_name",
    "branch",
    "specialization",
    "phone",
    "gender",
    "requirement",
];

const BASE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
      name TEXT PRIMARY KEY,
      email TEXT NOT NULL,
      password TEXT NOT NULL,
      requirement TEXT
    );
    CREATE TABLE IF NOT EXISTS admins (
      username TEXT NOT NULL
    );
";

const SELECT_APPLICANT: &str = "SELECT name, email, password, full_name, branch, specialization,
    requirement, gender, phone FROM users";

/// Holds one connection for the lifetime of the review session. Dropping the
/// repository releases it; `close` does so explicitly and reports errors.
#[derive(Debug)]
pub struct SqliteApplicantRepository {
    conn: Mutex<Connection>,
}

impl SqliteApplicantRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                RepositoryError::Unavailable(format!("{}: {err}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "applicant database opened");
        Self::bootstrap(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(BASE_SCHEMA)?;
        let repository = Self {
            conn: Mutex::new(conn),
        };
        repository.ensure_columns(&PROFILE_COLUMNS)?;
        Ok(repository)
    }

    pub fn close(self) -> Result<(), RepositoryError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| RepositoryError::Unavailable("connection lock poisoned".to_string()))?;
        conn.close().map_err(|(_, err)| RepositoryError::from(err))
    }

    /// Column names of `users` in declaration order.
    pub fn columns(&self) -> Result<Vec<String>, RepositoryError> {
        let conn = self.connection()?;
        Ok(table_columns(&conn)?)
    }

    pub fn add_admin(&self, username: &str) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        conn.execute("INSERT INTO admins (username) VALUES (?1)", params![username])?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl ApplicantRepository for SqliteApplicantRepository {
    fn list_all(&self) -> Result<Vec<ApplicantRecord>, RepositoryError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("{SELECT_APPLICANT} ORDER BY rowid"))?;
        let records = stmt
            .query_map([], applicant_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get_by_username(&self, username: &Username) -> Result<ApplicantRecord, RepositoryError> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{SELECT_APPLICANT} WHERE name = ?1"),
            params![username.as_str()],
            applicant_from_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(username.clone()))
    }

    fn insert(&self, record: &ApplicantRecord) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        let result = conn.execute(
            "INSERT INTO users (name, email, password, full_name, branch,
               specialization, requirement, gender, phone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.username.as_str(),
                record.email,
                record.password,
                record.full_name,
                record.branch,
                record.specialization,
                record.requirement,
                record.gender,
                record.phone,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::Conflict(record.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_partial(
        &self,
        username: &Username,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        let changed = conn.execute(
            "UPDATE users SET
               full_name = COALESCE(?1, full_name),
               branch = COALESCE(?2, branch),
               specialization = COALESCE(?3, specialization),
               phone = COALESCE(?4, phone)
             WHERE name = ?5",
            params![
                update.full_name,
                update.branch,
                update.specialization,
                update.phone,
                username.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(username.clone()));
        }
        Ok(())
    }

    fn update_full(
        &self,
        username: &Username,
        details: &ProfileDetails,
    ) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        let changed = conn.execute(
            "UPDATE users SET full_name = ?1, branch = ?2, specialization = ?3, phone = ?4
             WHERE name = ?5",
            params![
                details.full_name,
                details.branch,
                details.specialization,
                details.phone,
                username.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(username.clone()));
        }
        Ok(())
    }

    fn delete(&self, username: &Username) -> Result<bool, RepositoryError> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM users WHERE name = ?1",
            params![username.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn ensure_columns(&self, columns: &[&str]) -> Result<(), RepositoryError> {
        if let Some(bad) = columns.iter().find(|column| !is_identifier(column)) {
            return Err(RepositoryError::InvalidColumn(bad.to_string()));
        }

        let conn = self.connection()?;
        let tx = conn.unchecked_transaction()?;
        let mut existing = table_columns(&tx)?;
        for column in columns {
            if existing.iter().any(|name| name.eq_ignore_ascii_case(column)) {
                continue;
            }
            tx.execute_batch(&format!("ALTER TABLE users ADD COLUMN {column} TEXT"))?;
            info!(column = %column, "added users column");
            existing.push(column.to_string());
        }
        tx.commit()?;
        Ok(())
    }

    fn admin_username(&self) -> Result<Option<String>, RepositoryError> {
        let conn = self.connection()?;
        let username = conn
            .query_row(
                "SELECT username FROM admins ORDER BY rowid LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(username)
    }
}

fn applicant_from_row(row: &Row<'_>) -> rusqlite::Result<ApplicantRecord> {
    Ok(ApplicantRecord {
        username: Username(row.get(0)?),
        email: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        password: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        full_name: row.get(3)?,
        branch: row.get(4)?,
        specialization: row.get(5)?,
        requirement: row.get(6)?,
        gender: row.get(7)?,
        phone: row.get(8)?,
    })
}

fn table_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
