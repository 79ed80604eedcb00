use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

/// Delivery log table. Idempotent; applied on every startup.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS deliveries (
    id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    sent_at TIMESTAMPTZ NOT NULL,
    send_date DATE NOT NULL,
    time_slot TEXT NOT NULL CHECK (time_slot IN ('00-05', '06-11', '12-17', '18-23')),
    template_type TEXT NOT NULL CHECK (template_type IN ('A', 'B')),
    final_message TEXT NOT NULL,
    source_text TEXT,
    student_id7 TEXT CHECK (student_id7 ~ '^[0-9]{7}$'),
    university_name TEXT,
    gender TEXT CHECK (gender IN ('male', 'female', 'other')),
    last_login_at TIMESTAMPTZ,
    offer_status TEXT NOT NULL DEFAULT 'none'
        CHECK (offer_status IN ('none', 'approved', 'on_hold', 'cancelled')),
    approved_at TIMESTAMPTZ,
    on_hold_at TIMESTAMPTZ,
    cancelled_at TIMESTAMPTZ,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_deliveries_send_date ON deliveries(send_date);
CREATE INDEX IF NOT EXISTS idx_deliveries_sent_at ON deliveries(sent_at DESC);
CREATE INDEX IF NOT EXISTS idx_deliveries_student_id7 ON deliveries(student_id7);
CREATE INDEX IF NOT EXISTS idx_deliveries_analytics
    ON deliveries(send_date, time_slot, template_type);
"#;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    pool.execute(SCHEMA_SQL)
        .await
        .context("Failed to apply deliveries schema")?;
    info!("Deliveries schema ready");
    Ok(())
}
