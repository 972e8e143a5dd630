use crate::errors::ResultExt;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the record tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enriched_leads (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                lead_data JSONB NOT NULL,
                intent_data JSONB NOT NULL,
                ai_insights JSONB NOT NULL,
                automation_plan JSONB NOT NULL,
                automation_results JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create enriched_leads")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS competitive_intelligence (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                competitor TEXT NOT NULL,
                customer TEXT NOT NULL,
                intelligence_type TEXT NOT NULL,
                data JSONB NOT NULL,
                observed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create competitive_intelligence")?;

        tracing::info!("Database schema ready");
        Ok(())
    }
}
