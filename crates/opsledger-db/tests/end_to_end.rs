//! End-to-end ingestion against an in-memory database: reference data,
//! business day, ledger and ticket upsert for one Karachi location.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use opsledger_core::ingest::{IngestBatch, TicketInput, UpsertStatus};
use opsledger_core::ledger::LedgerRoute;
use opsledger_core::money::Amount;
use opsledger_core::page::PageRequest;
use opsledger_core::reference::{NewLocation, NewSourceSystem, NewTenant};
use opsledger_db::repository::ledger::LedgerFilter;
use opsledger_db::{Database, DbConfig, LedgerAppend};

struct Store {
    db: Database,
    tenant: i64,
    location: i64,
    source: i64,
}

async fn karachi_store() -> Store {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let tenant = db
        .tenants()
        .create(&NewTenant {
            name: "Karachi Eats".to_string(),
            status: "ACTIVE".to_string(),
        })
        .await
        .unwrap()
        .id;
    let location = db
        .locations()
        .create(&NewLocation {
            tenant_id: tenant,
            name: "Clifton".to_string(),
            timezone: "Asia/Karachi".to_string(),
            currency_code: "pkr".to_string(),
            is_active: true,
        })
        .await
        .unwrap()
        .id;
    let source = db
        .source_systems()
        .create(&NewSourceSystem {
            tenant_id: tenant,
            system_type: "POS".to_string(),
            provider: Some("pos_square".to_string()),
            name: "Square".to_string(),
            is_active: true,
        })
        .await
        .unwrap()
        .id;

    Store {
        db,
        tenant,
        location,
        source,
    }
}

fn utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn ticket_round_trip_keeps_totals_and_children() {
    let store = karachi_store().await;
    let business_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    let day = store
        .db
        .business_days()
        .ensure(store.tenant, store.location, business_date)
        .await
        .unwrap();
    assert_eq!(day.starts_at, utc("2026-01-15T00:00:00Z"));

    let batch: IngestBatch<TicketInput> = serde_json::from_value(json!({
        "tenant_id": store.tenant,
        "location_id": store.location,
        "source_system_id": store.source,
        "business_day_id": day.id,
        "tickets": [{
            "source_event_id": "TICKET-10001",
            "external_ticket_id": "SQ-T-10001",
            "opened_at": "2026-01-15T12:10:00+05:00",
            "closed_at": "2026-01-15T12:40:00+05:00",
            "status": "CLOSED",
            "covers": 3,
            "gross_amount": "2400.00",
            "net_amount": "2400.00",
            "line_items": [{
                "source_event_id": "TICKET-10001-L1",
                "item_name_raw": "Chicken Pulao",
                "qty": 2,
                "unit_price": "1200.00",
                "gross_amount": "2400.00",
                "net_amount": "2400.00"
            }],
            "payments": [{
                "source_event_id": "TICKET-10001-P1",
                "tender_type": "CARD",
                "amount": "2400.00",
                "paid_at": "2026-01-15T12:41:00+05:00"
            }]
        }]
    }))
    .unwrap();

    let outcome = store.db.ingest().bulk_upsert_tickets(&batch).await.unwrap();
    assert_eq!(outcome.accepted, 1);
    let result = &outcome.results[0];
    assert_eq!(result.upsert_status, UpsertStatus::Upserted);
    assert_eq!(result.resolved.as_ref().unwrap().business_day_id, Some(day.id));

    let detail = store
        .db
        .tickets()
        .get(store.tenant, result.ticket_id.unwrap())
        .await
        .unwrap();
    let total: Amount = "2400.00".parse().unwrap();
    assert_eq!(detail.ticket.gross_amount, total);
    assert_eq!(detail.ticket.net_amount, total);
    assert_eq!(detail.ticket.business_day_id, Some(day.id));
    assert_eq!(detail.line_items.len(), 1);
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.payments[0].tender_type, "CARD");
    assert_eq!(detail.payments[0].amount, total);
    assert_eq!(detail.payments[0].amount.to_string(), "2400.00");
    assert!(detail.discounts.is_empty());
    assert!(detail.voids.is_empty());
    assert!(detail.refunds.is_empty());

    // Another tenant cannot read it.
    let err = store
        .db
        .tickets()
        .get(store.tenant + 1, result.ticket_id.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, opsledger_db::DbError::NotFound { .. }));
}

#[tokio::test]
async fn ledger_and_dedup_map_are_separate_keyspaces() {
    let store = karachi_store().await;
    let sales = LedgerRoute::erp("sales");
    let events = vec![json!({
        "source_event_id": "TICKET-20001",
        "event_time": "2026-01-15T13:00:00+05:00",
        "closed_at": "2026-01-15T12:40:00+05:00"
    })];

    let appended = store
        .db
        .ledger()
        .append(&LedgerAppend {
            tenant_id: store.tenant,
            location_id: Some(store.location),
            route: &sales,
            source_system_id: store.source,
            business_day_id: None,
            events: &events,
        })
        .await
        .unwrap();
    assert_eq!(appended.inserted, 1);

    let rows = store
        .db
        .ledger()
        .list(&LedgerFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(rows.items[0].occurred_at, utc("2026-01-15T08:00:00Z"));
    assert_eq!(rows.items[0].feed_type, "ERP_SALES_LEDGER");

    // The same source_event_id is still new to the structured path.
    let batch: IngestBatch<TicketInput> = serde_json::from_value(json!({
        "tenant_id": store.tenant,
        "location_id": store.location,
        "source_system_id": store.source,
        "tickets": [{
            "source_event_id": "TICKET-20001",
            "opened_at": "2026-01-15T12:10:00+05:00",
            "gross_amount": "10.00",
            "net_amount": "10.00"
        }]
    }))
    .unwrap();
    let outcome = store.db.ingest().bulk_upsert_tickets(&batch).await.unwrap();
    assert_eq!(outcome.accepted, 1);
}

#[tokio::test]
async fn batch_for_foreign_location_fails_whole_call() {
    let store = karachi_store().await;
    let other = store
        .db
        .tenants()
        .create(&NewTenant {
            name: "Lahore Bites".to_string(),
            status: "ACTIVE".to_string(),
        })
        .await
        .unwrap();

    let batch: IngestBatch<TicketInput> = serde_json::from_value(json!({
        "tenant_id": other.id,
        "location_id": store.location,
        "source_system_id": store.source,
        "tickets": []
    }))
    .unwrap();

    let err = store.db.ingest().bulk_upsert_tickets(&batch).await.unwrap_err();
    assert!(matches!(err, opsledger_db::DbError::NotFound { .. }));
}
