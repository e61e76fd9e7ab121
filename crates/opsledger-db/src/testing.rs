//! Seed helpers shared by the unit tests.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::Database;
use opsledger_core::reference::{NewLocation, NewSourceSystem, NewTenant};

static SEQ: AtomicU32 = AtomicU32::new(1);

fn next_name(prefix: &str) -> String {
    format!("{prefix} {}", SEQ.fetch_add(1, Ordering::Relaxed))
}

pub(crate) async fn seed_tenant(db: &Database) -> i64 {
    db.tenants()
        .create(&NewTenant {
            name: next_name("Tenant"),
            status: "ACTIVE".to_string(),
        })
        .await
        .unwrap()
        .id
}

pub(crate) async fn seed_location(db: &Database, tenant_id: i64, timezone: &str) -> i64 {
    db.locations()
        .create(&NewLocation {
            tenant_id,
            name: next_name("Location"),
            timezone: timezone.to_string(),
            currency_code: "PKR".to_string(),
            is_active: true,
        })
        .await
        .unwrap()
        .id
}

pub(crate) async fn seed_source_system(db: &Database, tenant_id: i64) -> i64 {
    db.source_systems()
        .create(&NewSourceSystem {
            tenant_id,
            system_type: "POS".to_string(),
            provider: Some("pos_square".to_string()),
            name: next_name("Register"),
            is_active: true,
        })
        .await
        .unwrap()
        .id
}
