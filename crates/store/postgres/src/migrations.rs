use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the records table if it does not exist.
///
/// Attachment sequences are stored as JSONB arrays in document order, so the
/// append-only file semantics of the workflow map directly onto a single
/// column update.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let records_table = config.records_table();

    let create_records = format!(
        "CREATE TABLE IF NOT EXISTS {records_table} (
            id UUID PRIMARY KEY,
            request_id TEXT NOT NULL,
            title TEXT NOT NULL,
            request_name TEXT NOT NULL,
            company_code TEXT NOT NULL,
            request_objective TEXT NOT NULL,
            request_background TEXT NOT NULL,
            remarks TEXT,
            description TEXT,
            department TEXT NOT NULL,
            buyer TEXT NOT NULL,
            currency TEXT NOT NULL,
            po_type TEXT NOT NULL,
            asset_type TEXT NOT NULL,
            total_amount_idr NUMERIC NOT NULL,
            total_amount_original_currency NUMERIC NOT NULL,
            request_date DATE NOT NULL,
            delivery_date DATE NOT NULL,
            assign_to UUID,
            created_by UUID,
            need_approve_files JSONB NOT NULL DEFAULT '[]'::jsonb,
            no_need_approve_files JSONB NOT NULL DEFAULT '[]'::jsonb,
            status TEXT NOT NULL,
            em_approved BOOLEAN NOT NULL DEFAULT FALSE,
            user_approved BOOLEAN NOT NULL DEFAULT FALSE,
            vendor_approved BOOLEAN NOT NULL DEFAULT FALSE,
            reject_reason TEXT,
            rejected_at TIMESTAMPTZ,
            rejected_by UUID,
            resubmission_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            version BIGINT NOT NULL DEFAULT 0
        )"
    );

    let create_created_at_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}created_at_idx ON {records_table} (created_at DESC)",
        config.table_prefix
    );

    let create_status_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}status_idx ON {records_table} (status)",
        config.table_prefix
    );

    let create_assign_to_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}assign_to_idx ON {records_table} (assign_to)",
        config.table_prefix
    );

    sqlx::query(&create_records).execute(pool).await?;
    sqlx::query(&create_created_at_idx).execute(pool).await?;
    sqlx::query(&create_status_idx).execute(pool).await?;
    sqlx::query(&create_assign_to_idx).execute(pool).await?;

    Ok(())
}
