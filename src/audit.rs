use serde_json::Value;
use uuid::Uuid;

use crate::{error::AppResult, repository::AuditEntry, state::AppState};

pub async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    state
        .audit
        .record(AuditEntry {
            user_id,
            action: action.to_string(),
            resource: resource.map(str::to_string),
            metadata,
        })
        .await
}
