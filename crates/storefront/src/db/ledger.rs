//! Processed-order ledger.

use async_trait::async_trait;
use tracing::instrument;

use nonito_core::CheckoutSessionId;

use super::{PgStore, RepositoryError};
use crate::store::OrderLedger;

#[async_trait]
impl OrderLedger for PgStore {
    #[instrument(skip(self), fields(session_id = %session))]
    async fn claim(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError> {
        let inserted: Option<String> = sqlx::query_scalar(
            r"
            INSERT INTO processed_orders (session_id)
            VALUES ($1)
            ON CONFLICT (session_id) DO NOTHING
            RETURNING session_id
            ",
        )
        .bind(session.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(inserted.is_some())
    }

    #[instrument(skip(self), fields(session_id = %session))]
    async fn is_processed(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_orders WHERE session_id = $1)",
        )
        .bind(session.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }
}
