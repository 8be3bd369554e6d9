use super::{now, User};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};

/// Directed follow edge: `subscriber_id` follows `subscribing_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: i64,
    pub subscribing_id: i64,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscription {
    pub fn create(conn: &Connection, subscriber_id: i64, subscribing_id: i64) -> Result<Self> {
        let subscribed_at = now();
        conn.execute(
            "INSERT INTO subscriptions (subscriber_id, subscribing_id, subscribed_at) VALUES (?1, ?2, ?3)",
            params![subscriber_id, subscribing_id, subscribed_at],
        )?;
        Ok(Self {
            subscriber_id,
            subscribing_id,
            subscribed_at,
        })
    }

    pub fn find(conn: &Connection, subscriber_id: i64, subscribing_id: i64) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT subscriber_id, subscribing_id, subscribed_at FROM subscriptions
             WHERE subscriber_id = ?1 AND subscribing_id = ?2",
            params![subscriber_id, subscribing_id],
            |row| {
                Ok(Self {
                    subscriber_id: row.get(0)?,
                    subscribing_id: row.get(1)?,
                    subscribed_at: row.get(2)?,
                })
            },
        )
        .optional()
    }

    /// Every edge where the user is either end.
    pub fn involving(conn: &Connection, user_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT subscriber_id, subscribing_id, subscribed_at FROM subscriptions
             WHERE subscriber_id = ?1 OR subscribing_id = ?1
             ORDER BY subscriber_id, subscribing_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Self {
                subscriber_id: row.get(0)?,
                subscribing_id: row.get(1)?,
                subscribed_at: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn delete(conn: &Connection, subscriber_id: i64, subscribing_id: i64) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND subscribing_id = ?2",
            params![subscriber_id, subscribing_id],
        )?;
        Ok(changed > 0)
    }

    /// Users following `user_id`.
    pub fn followers(conn: &Connection, user_id: i64) -> Result<Vec<User>> {
        Self::linked_users(
            conn,
            "SELECT subscriber_id FROM subscriptions WHERE subscribing_id = ?1 ORDER BY subscribed_at, subscriber_id",
            user_id,
        )
    }

    /// Users that `user_id` follows.
    pub fn following(conn: &Connection, user_id: i64) -> Result<Vec<User>> {
        Self::linked_users(
            conn,
            "SELECT subscribing_id FROM subscriptions WHERE subscriber_id = ?1 ORDER BY subscribed_at, subscribing_id",
            user_id,
        )
    }

    fn linked_users(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<User>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>>>()?;

        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = User::find_by_id(conn, id)? {
                users.push(user);
            }
        }
        Ok(users)
    }
}
