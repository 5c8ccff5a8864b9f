// End-to-end sync against a real PostgreSQL, enabled by SIGPAT_TEST_DATABASE_URL.
// Each test gets its own schema; without the variable the tests pass trivially.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use sigpat_core::MoneyScale;
use sigpat_source::{FileAssetSource, PayloadArchive};
use sigpat_storage::PgInventoryStore;
use sigpat_sync::{SyncError, SyncService};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use uuid::Uuid;

struct TestDb {
    admin: PgPool,
    schema: String,
    store: PgInventoryStore,
}

impl TestDb {
    async fn cleanup(self) {
        self.store.pool().close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .expect("drop test schema");
    }
}

async fn test_db() -> Option<TestDb> {
    let url = std::env::var("SIGPAT_TEST_DATABASE_URL").ok()?;
    let schema = format!("sigpat_sync_test_{}", Uuid::new_v4().simple());
    let admin = PgPool::connect(&url).await.expect("connect admin pool");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("create test schema");

    let options = PgConnectOptions::from_str(&url)
        .expect("parse database url")
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("connect test pool");
    let store = PgInventoryStore::from_pool(pool);
    store.ensure_schema().await.expect("ensure schema");

    Some(TestDb {
        admin,
        schema,
        store,
    })
}

fn write_listing(dir: &std::path::Path, listing: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("listing.json");
    std::fs::write(&path, serde_json::to_vec(&listing).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn sync_imports_listing_scales_money_and_skips_unkeyed() {
    let Some(db) = test_db().await else { return };
    let dir = tempfile::tempdir().unwrap();
    let listing = write_listing(
        dir.path(),
        json!([
            {"numeroPatrimonio": "0001", "descricao": "CADEIRA", "valorUnitario": 150000,
             "situacaoFisica": "BOM", "dataAquisicao": "2020-01-31"},
            {"descricao": "sem numero", "valorUnitario": 100},
            {"numeroPatrimonio": "0002", "descricaoMaterial": "MESA", "marca": "TRAMONTINA"}
        ]),
    );
    let archive_root = dir.path().join("archive");

    let service = SyncService::new(
        Arc::new(FileAssetSource::new(&listing)),
        db.store.clone(),
        MoneyScale::Cents,
    )
    .with_archive(PayloadArchive::new(&archive_root));

    let summary = service.run_once().await.unwrap();
    assert_eq!(summary.received, 3);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);
    assert!(summary.source.starts_with("file://"));
    assert!(summary.finished_at >= summary.started_at);

    assert_eq!(db.store.count().await.unwrap(), 2);
    let chair = db.store.get("0001").await.unwrap().unwrap();
    assert_eq!(chair.valor_unitario.unwrap().to_string(), "1500.00");
    assert_eq!(chair.descricao.as_deref(), Some("CADEIRA"));
    assert_eq!(chair.data_aquisicao, chrono::NaiveDate::from_ymd_opt(2020, 1, 31));
    let table = db.store.get("0002").await.unwrap().unwrap();
    assert_eq!(table.descricao.as_deref(), Some("MESA"));
    assert_eq!(table.marca.as_deref(), Some("TRAMONTINA"));

    let hash = PayloadArchive::sha256_hex(&std::fs::read(&listing).unwrap());
    let archived: Vec<_> = std::fs::read_dir(&archive_root)
        .unwrap()
        .map(|stamp| stamp.unwrap().path().join(format!("{hash}.json")))
        .filter(|path| path.exists())
        .collect();
    assert_eq!(archived.len(), 1);

    let again = service.run_once().await.unwrap();
    assert_eq!(again.imported, 2);
    assert_eq!(db.store.count().await.unwrap(), 2);

    db.cleanup().await;
}

#[tokio::test]
async fn failed_batch_leaves_previous_sync_intact() {
    let Some(db) = test_db().await else { return };
    let dir = tempfile::tempdir().unwrap();
    let listing = write_listing(
        dir.path(),
        json!([{"numeroPatrimonio": "0001", "descricao": "ORIGINAL"}]),
    );
    let service = SyncService::new(
        Arc::new(FileAssetSource::new(&listing)),
        db.store.clone(),
        MoneyScale::Cents,
    );
    service.run_once().await.unwrap();

    write_listing(
        dir.path(),
        json!([
            {"numeroPatrimonio": "0001", "descricao": "ALTERADO"},
            {"numeroPatrimonio": "X".repeat(80), "descricao": "CHAVE LONGA"}
        ]),
    );
    let err = service.run_once().await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));

    assert_eq!(db.store.count().await.unwrap(), 1);
    let kept = db.store.get("0001").await.unwrap().unwrap();
    assert_eq!(kept.descricao.as_deref(), Some("ORIGINAL"));

    db.cleanup().await;
}
