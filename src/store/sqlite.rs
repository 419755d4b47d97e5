use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, StockwatchError};
use crate::domain::Subscription;
use crate::store::SubscriptionStore;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, chat_id, url, brand, sizes, last_status, is_active, created_at FROM subscriptions";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| StockwatchError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StockwatchError::Other(format!("Database lock poisoned: {}", e)))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            chat_id: row.get(2)?,
            url: row.get(3)?,
            brand: row.get(4)?,
            sizes: row.get(5)?,
            last_status: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row
                .get::<_, String>(8)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl SubscriptionStore for SqliteStore {
    fn add_subscription(&self, subscription: &Subscription) -> Result<Option<i64>> {
        let conn = self.lock()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subscriptions
                (user_id, chat_id, url, brand, sizes, last_status, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                subscription.user_id,
                subscription.chat_id,
                subscription.url,
                subscription.brand,
                subscription.sizes,
                subscription.last_status,
                subscription.is_active,
                subscription.created_at.to_rfc3339()
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(result)
    }

    fn list_active(&self) -> Result<Vec<Subscription>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE is_active = 1 ORDER BY chat_id, id"),
            [],
        )
    }

    fn list_all(&self) -> Result<Vec<Subscription>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY chat_id, id"), [])
    }

    fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"),
            params![user_id],
        )
    }

    fn update_status(&self, id: i64, status: &str) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE subscriptions SET last_status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        if updated == 0 {
            return Err(StockwatchError::SubscriptionNotFound(id));
        }
        Ok(())
    }

    fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE subscriptions SET is_active = ?1 WHERE id = ?2",
            params![is_active, id],
        )?;
        if updated == 0 {
            return Err(StockwatchError::SubscriptionNotFound(id));
        }
        Ok(())
    }

    fn set_sizes(&self, id: i64, sizes: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE subscriptions SET sizes = ?1 WHERE id = ?2",
            params![sizes, id],
        )?;
        if updated == 0 {
            return Err(StockwatchError::SubscriptionNotFound(id));
        }
        Ok(())
    }

    fn delete_subscription(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn delete_all_for_user(&self, user_id: i64) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted)
    }
}
