use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{MetricsUpdate, NewSubscription, Subscription, SubscriptionConfig};

use super::schema::{MIGRATIONS, SCHEMA_VERSION};

const SUBSCRIPTION_COLUMNS: &str = "id, identifier, name, used_traffic, total_traffic, subscription_url, official_website, expire_time, last_update_time";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        // Foreign keys are off by default and the setting is per connection.
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .await?;

        let repository = Self { conn };
        repository.migrate().await?;
        tracing::debug!("Database schema version {}", repository.schema_version().await?);
        Ok(repository)
    }

    /// Brings the schema up to [`SCHEMA_VERSION`]. A no-op when already current.
    pub async fn migrate(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let current: i64 =
                    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
                if current >= SCHEMA_VERSION {
                    return Ok(());
                }

                // Readers keep working while a refresh writes.
                let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                tracing::debug!("Database journal mode: {}", mode);

                let start = usize::try_from(current).unwrap_or(0);
                for (index, migration) in MIGRATIONS.iter().enumerate().skip(start) {
                    let version = index as i64 + 1;
                    let tx = conn.transaction()?;
                    tx.execute_batch(migration)?;
                    tx.pragma_update(None, "user_version", version)?;
                    tx.commit()?;
                    tracing::info!("Migrated database schema to version {}", version);
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn schema_version(&self) -> Result<i64> {
        let version = self
            .conn
            .call(|conn| {
                let version: i64 =
                    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
                Ok(version)
            })
            .await?;
        Ok(version)
    }

    // Subscription operations

    /// All subscriptions, most recently refreshed first.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY last_update_time DESC, id DESC"
                ))?;
                let subscriptions = stmt
                    .query_map([], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(subscriptions)
            })
            .await?;
        Ok(subscriptions)
    }

    pub async fn get_subscription(&self, identifier: &str) -> Result<Option<Subscription>> {
        let identifier = identifier.to_string();
        let subscription = self
            .conn
            .call(move |conn| {
                let subscription = conn
                    .query_row(
                        &format!(
                            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE identifier = ?1"
                        ),
                        params![identifier],
                        subscription_from_row,
                    )
                    .optional()?;
                Ok(subscription)
            })
            .await?;
        Ok(subscription)
    }

    #[allow(dead_code)]
    pub async fn insert_subscription(&self, subscription: NewSubscription) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| Ok(insert_subscription_row(conn, &subscription)?))
            .await?;
        Ok(id)
    }

    /// Writes the subscription and its config in one transaction and returns
    /// the stored row.
    pub async fn create_subscription(
        &self,
        subscription: NewSubscription,
        config_content: String,
    ) -> Result<Subscription> {
        let created = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id = insert_subscription_row(&tx, &subscription)?;
                insert_config_row(&tx, &subscription.identifier, &config_content)?;
                let created = tx.query_row(
                    &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
                    params![id],
                    subscription_from_row,
                )?;
                tx.commit()?;
                Ok(created)
            })
            .await?;
        Ok(created)
    }

    /// Returns `false` when no subscription has `identifier`.
    /// A `None` website leaves the stored value untouched.
    #[allow(dead_code)]
    pub async fn update_subscription_metrics(
        &self,
        identifier: &str,
        update: MetricsUpdate,
        last_update_time: i64,
    ) -> Result<bool> {
        let identifier = identifier.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                Ok(update_metrics_row(conn, &identifier, &update, last_update_time)?)
            })
            .await?;
        Ok(updated)
    }

    /// Metrics, refresh time and config payload in one transaction.
    /// Returns `false` (and writes nothing) when the subscription is gone.
    pub async fn apply_refresh(
        &self,
        identifier: &str,
        update: MetricsUpdate,
        config_content: String,
        last_update_time: i64,
    ) -> Result<bool> {
        let identifier = identifier.to_string();
        let applied = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if !update_metrics_row(&tx, &identifier, &update, last_update_time)? {
                    return Ok(false);
                }
                tx.execute(
                    r#"INSERT INTO subscription_configs (identifier, config_content)
                       VALUES (?1, ?2)
                       ON CONFLICT(identifier) DO UPDATE SET
                           config_content = excluded.config_content"#,
                    params![identifier, config_content],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(applied)
    }

    /// Removes the subscription; its config row goes with it.
    pub async fn delete_subscription(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    // Config operations

    #[allow(dead_code)]
    pub async fn insert_config(&self, identifier: &str, config_content: String) -> Result<i64> {
        let identifier = identifier.to_string();
        let id = self
            .conn
            .call(move |conn| Ok(insert_config_row(conn, &identifier, &config_content)?))
            .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn update_config(&self, identifier: &str, config_content: String) -> Result<bool> {
        let identifier = identifier.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE subscription_configs SET config_content = ?1 WHERE identifier = ?2",
                    params![config_content, identifier],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    pub async fn get_config(&self, identifier: &str) -> Result<Option<SubscriptionConfig>> {
        let identifier = identifier.to_string();
        let config = self
            .conn
            .call(move |conn| {
                let config = conn
                    .query_row(
                        "SELECT id, identifier, config_content FROM subscription_configs WHERE identifier = ?1",
                        params![identifier],
                        |row| {
                            Ok(SubscriptionConfig {
                                id: row.get(0)?,
                                identifier: row.get(1)?,
                                config_content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            })
                        },
                    )
                    .optional()?;
                Ok(config)
            })
            .await?;
        Ok(config)
    }

    #[cfg(test)]
    pub async fn execute_raw(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn pragma(&self, name: &'static str) -> Result<rusqlite::types::Value> {
        let value = self
            .conn
            .call(move |conn| Ok(conn.pragma_query_value(None, name, |row| row.get(0))?))
            .await?;
        Ok(value)
    }
}

fn insert_subscription_row(
    conn: &rusqlite::Connection,
    subscription: &NewSubscription,
) -> rusqlite::Result<i64> {
    conn.execute(
        r#"INSERT INTO subscriptions
               (identifier, name, subscription_url, official_website, used_traffic, total_traffic, expire_time, last_update_time)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            subscription.identifier,
            subscription.name,
            subscription.subscription_url,
            subscription.official_website,
            subscription.used_traffic,
            subscription.total_traffic.max(1),
            subscription.expire_time,
            subscription.last_update_time,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_config_row(
    conn: &rusqlite::Connection,
    identifier: &str,
    config_content: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO subscription_configs (identifier, config_content) VALUES (?1, ?2)",
        params![identifier, config_content],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_metrics_row(
    conn: &rusqlite::Connection,
    identifier: &str,
    update: &MetricsUpdate,
    last_update_time: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        r#"UPDATE subscriptions SET
               used_traffic = ?1,
               total_traffic = ?2,
               expire_time = ?3,
               official_website = COALESCE(?4, official_website),
               last_update_time = ?5
           WHERE identifier = ?6"#,
        params![
            update.used_traffic,
            update.total_traffic.max(1),
            update.expire_time,
            update.official_website,
            last_update_time,
            identifier,
        ],
    )?;
    Ok(changed > 0)
}

fn subscription_from_row(row: &Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        identifier: row.get(1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        used_traffic: row.get(3)?,
        total_traffic: row.get(4)?,
        subscription_url: row.get(5)?,
        official_website: row.get(6)?,
        expire_time: row.get(7)?,
        last_update_time: row.get(8)?,
    })
}
