use anyhow::Context;
use sqlx::AnyPool;

/// Idempotent schema bootstrap. Decimals are stored as canonical text and
/// instants as UTC epoch milliseconds (`*_ms` columns).
const STATEMENTS: &[(&str, &str)] = &[
    (
        "users",
        r#"
CREATE TABLE IF NOT EXISTS users (
  user_id TEXT PRIMARY KEY,
  email TEXT NOT NULL UNIQUE,
  first_name TEXT NOT NULL DEFAULT '',
  last_name TEXT NOT NULL DEFAULT '',
  is_active INTEGER NOT NULL CHECK (is_active IN (0,1)),
  is_staff INTEGER NOT NULL CHECK (is_staff IN (0,1)),
  is_superuser INTEGER NOT NULL CHECK (is_superuser IN (0,1)),
  date_joined_ms BIGINT NOT NULL
);
"#,
    ),
    (
        "profiles",
        r#"
CREATE TABLE IF NOT EXISTS profiles (
  user_id TEXT PRIMARY KEY,
  account_tier TEXT NOT NULL,
  timezone TEXT NOT NULL,
  preferred_currency TEXT NOT NULL,
  max_watchlists BIGINT NOT NULL,
  created_ms BIGINT NOT NULL,
  updated_ms BIGINT NOT NULL
);
"#,
    ),
    (
        "stocks",
        r#"
CREATE TABLE IF NOT EXISTS stocks (
  stock_id TEXT PRIMARY KEY,
  symbol TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  exchange TEXT NOT NULL,
  currency TEXT NOT NULL,
  sector TEXT NOT NULL DEFAULT '',
  industry TEXT NOT NULL DEFAULT '',
  market_cap BIGINT,
  is_active INTEGER NOT NULL CHECK (is_active IN (0,1)),
  created_ms BIGINT NOT NULL,
  updated_ms BIGINT NOT NULL
);
"#,
    ),
    (
        "stock_prices",
        r#"
CREATE TABLE IF NOT EXISTS stock_prices (
  price_id TEXT PRIMARY KEY,
  stock_id TEXT NOT NULL,
  price TEXT NOT NULL,
  volume BIGINT NOT NULL CHECK (volume >= 0),
  source TEXT NOT NULL,
  ts_ms BIGINT NOT NULL,
  created_ms BIGINT NOT NULL,
  UNIQUE (stock_id, ts_ms)
);
"#,
    ),
    (
        "alerts",
        r#"
CREATE TABLE IF NOT EXISTS alerts (
  alert_id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  stock_id TEXT NOT NULL,
  condition_type TEXT NOT NULL,
  threshold TEXT NOT NULL,
  one_time INTEGER NOT NULL CHECK (one_time IN (0,1)),
  is_active INTEGER NOT NULL CHECK (is_active IN (0,1)),
  triggered_ms BIGINT,
  last_checked_ms BIGINT,
  created_ms BIGINT NOT NULL,
  updated_ms BIGINT NOT NULL
);
"#,
    ),
    (
        "notifications",
        r#"
CREATE TABLE IF NOT EXISTS notifications (
  notification_id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  alert_id TEXT,
  kind TEXT NOT NULL,
  channel TEXT NOT NULL,
  subject TEXT NOT NULL,
  body TEXT NOT NULL,
  status TEXT NOT NULL,
  sent_ms BIGINT,
  error_message TEXT NOT NULL DEFAULT '',
  read_ms BIGINT,
  created_ms BIGINT NOT NULL
);
"#,
    ),
    (
        "watchlists",
        r#"
CREATE TABLE IF NOT EXISTS watchlists (
  watchlist_id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  name TEXT NOT NULL,
  is_default INTEGER NOT NULL CHECK (is_default IN (0,1)),
  created_ms BIGINT NOT NULL,
  updated_ms BIGINT NOT NULL,
  UNIQUE (user_id, name)
);
"#,
    ),
    (
        "watchlist_items",
        r#"
CREATE TABLE IF NOT EXISTS watchlist_items (
  item_id TEXT PRIMARY KEY,
  watchlist_id TEXT NOT NULL,
  stock_id TEXT NOT NULL,
  alert_thresholds TEXT NOT NULL DEFAULT '{}',
  added_ms BIGINT NOT NULL,
  UNIQUE (watchlist_id, stock_id)
);
"#,
    ),
    (
        "idx_stock_prices_stock_ts",
        r#"CREATE INDEX IF NOT EXISTS idx_stock_prices_stock_ts ON stock_prices(stock_id, ts_ms DESC);"#,
    ),
    (
        "idx_stock_prices_ts",
        r#"CREATE INDEX IF NOT EXISTS idx_stock_prices_ts ON stock_prices(ts_ms);"#,
    ),
    (
        "idx_alerts_active",
        r#"CREATE INDEX IF NOT EXISTS idx_alerts_active ON alerts(is_active, triggered_ms);"#,
    ),
    (
        "idx_alerts_user",
        r#"CREATE INDEX IF NOT EXISTS idx_alerts_user ON alerts(user_id, is_active);"#,
    ),
    (
        "idx_notifications_user",
        r#"CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_ms);"#,
    ),
    (
        "idx_notifications_status",
        r#"CREATE INDEX IF NOT EXISTS idx_notifications_status ON notifications(status);"#,
    ),
];

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    for (name, sql) in STATEMENTS {
        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("schema step {name} failed"))?;
    }

    tracing::debug!(steps = STATEMENTS.len(), "schema migrated");
    Ok(())
}
