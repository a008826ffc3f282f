use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Append an audit trail entry. Failures are logged and swallowed so that
/// auditing never fails the request it describes.
pub async fn record(pool: &DbPool, actor: Option<Uuid>, action: &str, resource: &str, detail: Value) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(actor)
    .bind(action)
    .bind(resource)
    .bind(detail)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(action, error = %err, "audit log failed");
    }
}
