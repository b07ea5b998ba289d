use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{PartRequest, PartRequestDraft, RequestStatus, StatusChange, User};
use crate::error::{Error, Result};
use crate::validation::Violations;

/// Validate against `now` and store a new request
pub async fn create(
    db: &SqlitePool,
    actor: &User,
    draft: PartRequestDraft,
    now: DateTime<Utc>,
) -> Result<PartRequest> {
    let mut request = draft.into_request(&actor.full_name(), now)?;
    PartRequest::insert(db, &mut request).await?;

    info!(
        id = %request.id,
        items = request.total_items,
        user = %actor.id,
        "Part request created"
    );
    Ok(request)
}

pub async fn get(db: &SqlitePool, id: &str) -> Result<PartRequest> {
    PartRequest::get_by_id(db, id)
        .await?
        .ok_or_else(|| Error::NotFound("Part request not found".to_string()))
}

pub async fn list(db: &SqlitePool) -> Result<Vec<PartRequest>> {
    PartRequest::list(db).await
}

pub async fn find_by_status(db: &SqlitePool, status: RequestStatus) -> Result<Vec<PartRequest>> {
    PartRequest::find_by_status(db, status).await
}

pub async fn find_overdue(db: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<PartRequest>> {
    PartRequest::find_overdue(db, now).await
}

/// Parse a status filter from a query string
pub fn parse_status(raw: &str) -> Result<RequestStatus> {
    raw.trim().parse().map_err(|_| {
        let mut v = Violations::new("PartRequest");
        v.add("status", "Invalid status value");
        Error::Validation(v)
    })
}

/// Move a request along its lifecycle
pub async fn transition(
    db: &SqlitePool,
    actor: &User,
    id: &str,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<PartRequest> {
    let mut request = get(db, id).await?;
    let from = request.status;

    change.apply(&mut request, &actor.full_name(), now)?;
    PartRequest::update(db, &mut request).await?;

    info!(
        id = %request.id,
        from = %from,
        to = %request.status,
        user = %actor.id,
        "Part request status changed"
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use chrono::Duration;

    fn draft(due_in_days: i64) -> PartRequestDraft {
        let due = Utc::now() + Duration::days(due_in_days);
        serde_json::from_value(serde_json::json!({
            "engineerName": "Asha Rao",
            "estimatedDateOfReturn": due.to_rfc3339(),
            "customerName": "Acme Labs",
            "basis": "Returnable",
            "partsRequested": [
                { "serialNumber": 1, "partNumber": "PMP-1", "quantity": 2 },
                { "serialNumber": 2, "partNumber": "SEAL-9", "quantity": 1 }
            ],
            "totalItems": 7
        }))
        .unwrap()
    }

    fn change(status: &str) -> StatusChange {
        StatusChange {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_recomputes_total_items() {
        let pool = testing::pool().await;
        let user = testing::user(&pool).await;

        let created = create(&pool, &user, draft(10), Utc::now()).await.unwrap();
        assert_eq!(created.total_items, 2);

        let stored = get(&pool, &created.id).await.unwrap();
        assert_eq!(stored.total_items, 2);
        assert_eq!(stored.total_quantity(), 3);
        assert_eq!(stored.prepared_by.service_engineer.name.as_deref(), Some("Asha Rao"));
    }

    #[tokio::test]
    async fn test_empty_parts_writes_nothing() {
        let pool = testing::pool().await;
        let user = testing::user(&pool).await;

        let mut empty = draft(10);
        empty.parts_requested.clear();
        let err = create(&pool, &user, empty, Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(list(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_status_and_overdue() {
        let pool = testing::pool().await;
        let user = testing::user(&pool).await;
        let now = Utc::now();

        let soon = create(&pool, &user, draft(1), now).await.unwrap();
        let later = create(&pool, &user, draft(30), now).await.unwrap();

        let pending = find_by_status(&pool, RequestStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(find_by_status(&pool, RequestStatus::Approved).await.unwrap().is_empty());

        let in_a_week = now + Duration::days(7);
        let overdue = find_overdue(&pool, in_a_week).await.unwrap();
        let ids: Vec<&str> = overdue.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![soon.id.as_str()]);

        // Closed requests drop out of the overdue list
        for status in ["Approved", "Dispatched", "Delivered"] {
            transition(&pool, &user, &soon.id, change(status), now).await.unwrap();
        }
        assert!(find_overdue(&pool, in_a_week).await.unwrap().is_empty());
        assert_eq!(find_overdue(&pool, now + Duration::days(31)).await.unwrap()[0].id, later.id);
    }

    #[tokio::test]
    async fn test_transition_persists_and_rejects_illegal_moves() {
        let pool = testing::pool().await;
        let user = testing::user(&pool).await;
        let request = create(&pool, &user, draft(10), Utc::now()).await.unwrap();

        let err = transition(&pool, &user, &request.id, change("Dispatched"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: RequestStatus::Pending,
                to: RequestStatus::Dispatched
            }
        ));

        let approved = transition(&pool, &user, &request.id, change("Partially Approved"), Utc::now())
            .await
            .unwrap();
        assert_eq!(approved.status, RequestStatus::PartiallyApproved);

        let stored = get(&pool, &request.id).await.unwrap();
        assert_eq!(stored.status, RequestStatus::PartiallyApproved);
        assert_eq!(
            stored.approved_by.unwrap().national_manager.name.as_deref(),
            Some("Asha Rao")
        );
        assert_eq!(stored.total_items, 2);
    }

    #[tokio::test]
    async fn test_missing_request() {
        let pool = testing::pool().await;
        let user = testing::user(&pool).await;
        let err = transition(&pool, &user, "nope", change("Approved"), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Part request not found");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Partially Approved").unwrap(), RequestStatus::PartiallyApproved);
        assert!(matches!(parse_status("pending"), Err(Error::Validation(_))));
    }
}
