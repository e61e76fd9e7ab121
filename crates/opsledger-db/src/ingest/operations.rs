//! Bulk upserts for the operational feeds: open/close signals, POS downtime,
//! labor punches, payouts and stockouts.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{finish_entity, precheck, savepoint, BatchScope, Ingestor};
use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::employee;
use crate::repository::operations::{self, RowPlacement};
use opsledger_core::ingest::{
    BatchOutcome, DowntimeEventInput, EntityUpsertResult, IngestBatch, LaborPunchInput,
    OpenCloseSignalInput, PayoutBatch, StockoutInput, WARN_EMPLOYEE_NOT_MAPPED,
};
use opsledger_core::EntityType;

type EntityOutcome = BatchOutcome<EntityUpsertResult>;

impl Ingestor {
    /// Upserts open/close signals for one location.
    pub async fn open_close_signals(
        &self,
        batch: &IngestBatch<OpenCloseSignalInput>,
    ) -> DbResult<EntityOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = load_located(&mut tx, batch).await?;
        let at = placement(&scope, batch.location_id);

        let mut outcome = EntityOutcome::default();
        for signal in &batch.items {
            let key = scope.key(&signal.source_event_id, EntityType::OpenCloseSignal);
            if let Some(done) = precheck(&mut tx, &key).await? {
                outcome.push(done);
                continue;
            }
            let mut item_tx = savepoint(&mut tx).await?;
            let written = operations::insert_signal(&mut item_tx, &at, signal).await;
            outcome.push(finish_entity(item_tx, &key, written).await?);
        }

        tx.commit().await?;
        log_outcome("open_close_signal", &outcome);
        Ok(outcome)
    }

    /// Upserts POS downtime windows for one location.
    pub async fn downtime_events(
        &self,
        batch: &IngestBatch<DowntimeEventInput>,
    ) -> DbResult<EntityOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = load_located(&mut tx, batch).await?;
        let at = placement(&scope, batch.location_id);

        let mut outcome = EntityOutcome::default();
        for event in &batch.items {
            let key = scope.key(&event.source_event_id, EntityType::PosDowntimeEvent);
            if let Some(done) = precheck(&mut tx, &key).await? {
                outcome.push(done);
                continue;
            }
            let mut item_tx = savepoint(&mut tx).await?;
            let written = operations::insert_downtime(&mut item_tx, &at, event).await;
            outcome.push(finish_entity(item_tx, &key, written).await?);
        }

        tx.commit().await?;
        log_outcome("pos_downtime_event", &outcome);
        Ok(outcome)
    }

    /// Upserts labor punches, resolving each employee first.
    ///
    /// A punch whose employee cannot be resolved is `REJECTED` with
    /// `employee_not_mapped`; the rest of the batch continues.
    pub async fn labor_punches(
        &self,
        batch: &IngestBatch<LaborPunchInput>,
    ) -> DbResult<EntityOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = load_located(&mut tx, batch).await?;
        let at = placement(&scope, batch.location_id);

        let mut outcome = EntityOutcome::default();
        for punch in &batch.items {
            let key = scope.key(&punch.source_event_id, EntityType::LaborPunch);
            if let Some(done) = precheck(&mut tx, &key).await? {
                outcome.push(done);
                continue;
            }

            let Some(employee_id) = resolve_employee(&mut tx, &at, punch).await? else {
                debug!(source_event_id = %punch.source_event_id, "Punch employee not mapped");
                outcome.push(EntityUpsertResult::rejected(
                    &punch.source_event_id,
                    WARN_EMPLOYEE_NOT_MAPPED,
                ));
                continue;
            };

            let mut item_tx = savepoint(&mut tx).await?;
            let written =
                operations::insert_labor_punch(&mut item_tx, &at, employee_id, punch).await;
            let mut result = finish_entity(item_tx, &key, written).await?;
            result.resolved_employee_id = Some(employee_id);
            outcome.push(result);
        }

        tx.commit().await?;
        log_outcome("labor_punch", &outcome);
        Ok(outcome)
    }

    /// Upserts payouts. The location is optional and payouts carry no
    /// business day.
    pub async fn payouts(&self, batch: &PayoutBatch) -> DbResult<EntityOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = BatchScope::load(
            &mut tx,
            batch.tenant_id,
            batch.location_id,
            batch.source_system_id,
            None,
        )
        .await?;

        let mut outcome = EntityOutcome::default();
        for payout in &batch.payouts {
            let key = scope.key(&payout.source_event_id, EntityType::Payout);
            if let Some(done) = precheck(&mut tx, &key).await? {
                outcome.push(done);
                continue;
            }
            let mut item_tx = savepoint(&mut tx).await?;
            let written = operations::insert_payout(
                &mut item_tx,
                scope.tenant_id,
                scope.location_id,
                scope.source_system_id,
                payout,
            )
            .await;
            outcome.push(finish_entity(item_tx, &key, written).await?);
        }

        tx.commit().await?;
        log_outcome("payout", &outcome);
        Ok(outcome)
    }

    /// Upserts stockout windows. A feed-supplied `item_id` is stored as given.
    pub async fn stockouts(&self, batch: &IngestBatch<StockoutInput>) -> DbResult<EntityOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = load_located(&mut tx, batch).await?;
        let at = placement(&scope, batch.location_id);

        let mut outcome = EntityOutcome::default();
        for event in &batch.items {
            let key = scope.key(&event.source_event_id, EntityType::StockoutEvent);
            if let Some(done) = precheck(&mut tx, &key).await? {
                outcome.push(done);
                continue;
            }
            let mut item_tx = savepoint(&mut tx).await?;
            let written = operations::insert_stockout(&mut item_tx, &at, event).await;
            outcome.push(finish_entity(item_tx, &key, written).await?);
        }

        tx.commit().await?;
        log_outcome("stockout_event", &outcome);
        Ok(outcome)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_located<T>(conn: &mut SqliteConnection, batch: &IngestBatch<T>) -> DbResult<BatchScope> {
    BatchScope::load(
        conn,
        batch.tenant_id,
        Some(batch.location_id),
        batch.source_system_id,
        batch.business_day_id,
    )
    .await
}

fn placement(scope: &BatchScope, location_id: i64) -> RowPlacement {
    RowPlacement {
        tenant_id: scope.tenant_id,
        location_id,
        business_day_id: scope.business_day_id,
        source_system_id: scope.source_system_id,
    }
}

/// Direct id first, then the location's external key.
async fn resolve_employee(
    conn: &mut SqliteConnection,
    at: &RowPlacement,
    punch: &LaborPunchInput,
) -> DbResult<Option<i64>> {
    if let Some(employee_id) = punch.employee_id {
        return employee::employee_for_tenant(conn, at.tenant_id, employee_id).await;
    }
    match punch.employee_external_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            employee::employee_by_external_key(conn, at.tenant_id, at.location_id, key).await
        }
        _ => Ok(None),
    }
}

fn log_outcome(entity: &str, outcome: &EntityOutcome) {
    info!(
        entity,
        accepted = outcome.accepted,
        updated = outcome.updated,
        rejected = outcome.rejected,
        "Bulk upsert finished"
    );
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::dedup::{DedupFilter, DedupKey};
    use crate::repository::operations::{OperationalFilter, PayoutFilter};
    use crate::testing::{seed_location, seed_source_system, seed_tenant};
    use crate::{Database, DbConfig};
    use chrono::{DateTime, Utc};
    use opsledger_core::ingest::{
        DowntimeEventInput, IngestBatch, LaborPunchInput, OpenCloseSignalInput, PayoutBatch,
        StockoutInput, UpsertStatus,
    };
    use opsledger_core::page::PageRequest;
    use opsledger_core::reference::NewEmployee;
    use opsledger_core::EntityType;
    use serde_json::json;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_signal_resubmission_is_updated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let source = seed_source_system(&db, tenant).await;

        let batch = IngestBatch {
            tenant_id: tenant,
            location_id: location,
            source_system_id: source,
            business_day_id: None,
            items: vec![
                OpenCloseSignalInput {
                    source_event_id: "OC-OPEN".to_string(),
                    signal_type: "OPEN".to_string(),
                    occurred_at: at("2026-01-15T10:05:00+05:00"),
                    metadata: Some(json!({"by": "manager_12"})),
                },
                OpenCloseSignalInput {
                    source_event_id: "  ".to_string(),
                    signal_type: "CLOSE".to_string(),
                    occurred_at: at("2026-01-15T23:05:00+05:00"),
                    metadata: None,
                },
            ],
        };

        let first = db.ingest().open_close_signals(&batch).await.unwrap();
        assert_eq!((first.accepted, first.rejected), (1, 1));
        assert_eq!(first.results[1].warnings, vec!["missing_source_event_id".to_string()]);

        let second = db.ingest().open_close_signals(&batch).await.unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.results[0].upsert_status, UpsertStatus::Updated);
        assert_eq!(second.results[0].entity_id, first.results[0].entity_id);
    }

    #[tokio::test]
    async fn test_punch_resolves_external_key_or_rejects() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let source = seed_source_system(&db, tenant).await;
        let employee = db
            .employees()
            .create(&NewEmployee {
                tenant_id: tenant,
                location_id: Some(location),
                external_key: Some("POS-EMP-12".to_string()),
                full_name: "Sana Tariq".to_string(),
                role: Some("cashier".to_string()),
                is_active: true,
            })
            .await
            .unwrap();

        let punch = |id: &str, key: &str| LaborPunchInput {
            source_event_id: id.to_string(),
            employee_id: None,
            employee_external_key: Some(key.to_string()),
            role: Some("cashier".to_string()),
            clock_in: at("2026-01-15T09:50:00+05:00"),
            clock_out: Some(at("2026-01-15T18:00:00+05:00")),
            metadata: None,
        };
        let batch = IngestBatch {
            tenant_id: tenant,
            location_id: location,
            source_system_id: source,
            business_day_id: None,
            items: vec![punch("PUNCH-1", "POS-EMP-12"), punch("PUNCH-2", "POS-EMP-99")],
        };

        let outcome = db.ingest().labor_punches(&batch).await.unwrap();
        assert_eq!((outcome.accepted, outcome.rejected), (1, 1));
        assert_eq!(outcome.results[0].resolved_employee_id, Some(employee.id));
        assert_eq!(outcome.results[1].warnings, vec!["employee_not_mapped".to_string()]);
        assert_eq!(outcome.results[1].entity_id, None);
    }

    #[tokio::test]
    async fn test_payout_without_location_is_normalized_and_deduped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let source = seed_source_system(&db, tenant).await;

        let batch: PayoutBatch = serde_json::from_value(json!({
            "tenant_id": tenant,
            "source_system_id": source,
            "payouts": [{
                "source_event_id": "PAYOUT-0042",
                "provider": "foodpanda",
                "payout_reference": "FP-2026-01-W3",
                "status": "PAID",
                "currency_code": " pkr ",
                "amount": "18250.50",
                "paid_at": "2026-01-20T10:00:00Z"
            }]
        }))
        .unwrap();

        let first = db.ingest().payouts(&batch).await.unwrap();
        assert_eq!(first.accepted, 1);
        let payout_id = first.results[0].entity_id.unwrap();

        let second = db.ingest().payouts(&batch).await.unwrap();
        assert_eq!(second.results[0].upsert_status, UpsertStatus::Updated);
        assert_eq!(second.results[0].entity_id, Some(payout_id));

        let filter = PayoutFilter {
            tenant_id: Some(tenant),
            ..Default::default()
        };
        let rows = db.operations().payouts(&filter, &PageRequest::default()).await.unwrap();
        assert_eq!(rows.items.len(), 1);
        let payout = &rows.items[0];
        assert_eq!(payout.id, payout_id);
        assert_eq!(payout.location_id, None);
        assert_eq!(payout.currency_code, "PKR");
        assert_eq!(payout.amount.to_string(), "18250.50");
        assert_eq!(payout.paid_at, Some(at("2026-01-20T10:00:00Z")));

        let key = DedupKey::new(tenant, source, "PAYOUT-0042", EntityType::Payout);
        assert_eq!(db.dedup().lookup(&key).await.unwrap(), Some(payout_id));
    }

    #[tokio::test]
    async fn test_stockout_resubmission_keeps_one_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let source = seed_source_system(&db, tenant).await;

        let batch = IngestBatch {
            tenant_id: tenant,
            location_id: location,
            source_system_id: source,
            business_day_id: None,
            items: vec![StockoutInput {
                source_event_id: "86-NAAN-01".to_string(),
                item_id: Some(9001),
                item_name_raw: Some("Garlic Naan".to_string()),
                started_at: at("2026-01-15T20:30:00+05:00"),
                ended_at: None,
                reason: Some("oven down".to_string()),
                metadata: None,
            }],
        };

        let first = db.ingest().stockouts(&batch).await.unwrap();
        let second = db.ingest().stockouts(&batch).await.unwrap();
        assert_eq!(first.accepted, 1);
        assert_eq!(second.updated, 1);
        assert_eq!(second.results[0].entity_id, first.results[0].entity_id);

        let filter = OperationalFilter {
            tenant_id: Some(tenant),
            ..Default::default()
        };
        let rows = db.operations().stockouts(&filter, &PageRequest::default()).await.unwrap();
        assert_eq!(rows.items.len(), 1);
        assert_eq!(rows.items[0].item_id, Some(9001));
        assert_eq!(rows.items[0].item_name_raw.as_deref(), Some("Garlic Naan"));
        assert_eq!(rows.items[0].started_at, at("2026-01-15T15:30:00Z"));

        let mapped = db
            .dedup()
            .list(
                tenant,
                &DedupFilter {
                    entity_type: Some(EntityType::StockoutEvent),
                    ..Default::default()
                },
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(mapped.items.len(), 1);
        assert_eq!(Some(mapped.items[0].entity_id), first.results[0].entity_id);
    }

    #[tokio::test]
    async fn test_downtime_resubmission_keeps_one_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let source = seed_source_system(&db, tenant).await;
        let day = db
            .business_days()
            .resolve(tenant, location, at("2026-01-15T14:00:00+05:00"))
            .await
            .unwrap();

        let batch = IngestBatch {
            tenant_id: tenant,
            location_id: location,
            source_system_id: source,
            business_day_id: Some(day.id),
            items: vec![DowntimeEventInput {
                source_event_id: "DOWN-7".to_string(),
                started_at: at("2026-01-15T14:00:00+05:00"),
                ended_at: Some(at("2026-01-15T14:25:00+05:00")),
                reason: Some("network".to_string()),
                metadata: Some(json!({"terminal": "T2"})),
            }],
        };

        let first = db.ingest().downtime_events(&batch).await.unwrap();
        let second = db.ingest().downtime_events(&batch).await.unwrap();
        assert_eq!(first.results[0].upsert_status, UpsertStatus::Upserted);
        assert_eq!(second.results[0].upsert_status, UpsertStatus::Updated);
        assert_eq!(second.results[0].entity_id, first.results[0].entity_id);

        let filter = OperationalFilter {
            tenant_id: Some(tenant),
            business_day_id: Some(day.id),
            ..Default::default()
        };
        let rows = db
            .operations()
            .downtime_events(&filter, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(rows.items.len(), 1);
        assert_eq!(rows.items[0].ended_at, Some(at("2026-01-15T09:25:00Z")));
        assert_eq!(rows.items[0].reason.as_deref(), Some("network"));

        let key = DedupKey::new(tenant, source, "DOWN-7", EntityType::PosDowntimeEvent);
        assert_eq!(db.dedup().lookup(&key).await.unwrap(), first.results[0].entity_id);
    }
}
