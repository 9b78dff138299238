/// Schema version this build expects. Stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Forward-only migrations. Entry `i` upgrades the schema from version `i` to `i + 1`.
pub const MIGRATIONS: &[&str] = &[V1_INITIAL];

const V1_INITIAL: &str = r#"
-- subscriptions table
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE,
    name TEXT,
    used_traffic INTEGER NOT NULL DEFAULT 0,
    total_traffic INTEGER NOT NULL DEFAULT 1 CHECK (total_traffic >= 1),
    subscription_url TEXT,
    official_website TEXT,
    expire_time INTEGER NOT NULL DEFAULT (strftime('%s', 'now', '+30 days')),
    last_update_time INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_last_update ON subscriptions(last_update_time DESC);

-- subscription_configs table (raw payload, one row per subscription)
CREATE TABLE IF NOT EXISTS subscription_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE REFERENCES subscriptions(identifier) ON DELETE CASCADE,
    config_content TEXT
);
"#;
