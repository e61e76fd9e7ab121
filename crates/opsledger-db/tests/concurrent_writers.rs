//! Racing writers against a file-backed database with a real pool.
//!
//! Each pair of calls targets the same dedup or business-day key at the same
//! time. The loser must observe the winner's row instead of failing.

use chrono::{Duration, NaiveDate};
use serde_json::json;
use tempfile::TempDir;

use opsledger_core::ingest::{IngestBatch, TicketInput, UpsertStatus};
use opsledger_core::reference::{NewLocation, NewSourceSystem, NewTenant};
use opsledger_db::{Database, DbConfig};

struct Shared {
    _dir: TempDir,
    db: Database,
    tenant: i64,
    location: i64,
    source: i64,
}

async fn shared_store() -> Shared {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("opsledger.db")).max_connections(4))
        .await
        .unwrap();
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
            currency_code: "PKR".to_string(),
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

    Shared {
        _dir: dir,
        db,
        tenant,
        location,
        source,
    }
}

fn busy_ticket(s: &Shared, id: &str) -> IngestBatch<TicketInput> {
    let lines: Vec<_> = (1..=30)
        .map(|n| {
            json!({
                "source_event_id": format!("{id}-L{n}"),
                "external_item_key": format!("SKU-{n}"),
                "qty": 1,
                "gross_amount": "100.00",
                "net_amount": "100.00"
            })
        })
        .collect();

    serde_json::from_value(json!({
        "tenant_id": s.tenant,
        "location_id": s.location,
        "source_system_id": s.source,
        "tickets": [{
            "source_event_id": id,
            "opened_at": "2026-01-15T12:10:00+05:00",
            "gross_amount": "3000.00",
            "net_amount": "3000.00",
            "line_items": lines,
            "payments": [{
                "source_event_id": format!("{id}-P1"),
                "tender_type": "CASH",
                "amount": "3000.00",
                "paid_at": "2026-01-15T12:41:00+05:00"
            }]
        }]
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_ticket_upserts_report_one_winner() {
    let s = shared_store().await;

    for round in 0..10 {
        let batch = busy_ticket(&s, &format!("RACE-{round}"));
        let (ingest_a, ingest_b) = (s.db.ingest(), s.db.ingest());
        let (left, right) = tokio::join!(
            ingest_a.bulk_upsert_tickets(&batch),
            ingest_b.bulk_upsert_tickets(&batch),
        );
        let left = left.unwrap();
        let right = right.unwrap();

        let statuses = [left.results[0].upsert_status, right.results[0].upsert_status];
        let count = |wanted: UpsertStatus| statuses.iter().filter(|status| **status == wanted).count();
        assert_eq!(count(UpsertStatus::Upserted), 1, "round {round}");
        assert_eq!(count(UpsertStatus::Updated), 1, "round {round}");
        assert_eq!(left.results[0].ticket_id, right.results[0].ticket_id);
    }

    let page = s
        .db
        .tickets()
        .list(&Default::default(), &Default::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_business_day_creation_yields_one_row() {
    let s = shared_store().await;
    let first = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

    for offset in 0..14 {
        let date = first + Duration::days(offset);
        let (days_a, days_b) = (s.db.business_days(), s.db.business_days());
        let (left, right) = tokio::join!(
            days_a.ensure(s.tenant, s.location, date),
            days_b.ensure(s.tenant, s.location, date),
        );
        let left = left.unwrap();
        let right = right.unwrap();
        assert_eq!(left.id, right.id);
        assert_eq!(left.starts_at, right.starts_at);
    }
}
