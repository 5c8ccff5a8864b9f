//! PostgreSQL persistence for inventory assets: additive schema management,
//! transactional upsert, filtered listing and filter suggestions.

use std::time::Duration;

use sigpat_core::{
    Asset, AssetFilters, AssetPage, FilterField, FilterOptions, PageRequest, Pagination, Vehicle,
};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "sigpat-storage";

pub const TABLE: &str = "inventario";

/// PostgreSQL SQLSTATE for "column already exists".
const DUPLICATE_COLUMN: &str = "42701";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS inventario (
        id BIGSERIAL PRIMARY KEY,
        id_bem_perm BIGINT,
        numero_patrimonio VARCHAR(50) NOT NULL,
        descricao TEXT,
        nome_local VARCHAR(255),
        situacao_fisica VARCHAR(100),
        data_aquisicao DATE,
        valor_unitario NUMERIC(15, 2),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT unique_patrimonio UNIQUE (numero_patrimonio)
    )
"#;

/// One additive schema step, applied with `ALTER TABLE ... ADD COLUMN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMigration {
    pub column: &'static str,
    pub sql_type: &'static str,
}

const fn column(column: &'static str, sql_type: &'static str) -> ColumnMigration {
    ColumnMigration { column, sql_type }
}

/// Columns added after the base table, in the order they were introduced.
/// Append only.
pub const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    column("marca", "VARCHAR(100)"),
    column("status", "VARCHAR(100)"),
    column("nome_fornecedor", "VARCHAR(255)"),
    column("nome_ua", "VARCHAR(255)"),
    column("numero_patrimonio_antigo", "VARCHAR(50)"),
    column("descricao_material", "TEXT"),
    column("descricao_completa", "TEXT"),
    column("codigo_grupo", "TEXT"),
    column("descricao_grupo", "TEXT"),
    column("codigo_subgrupo", "TEXT"),
    column("descricao_subgrupo", "TEXT"),
    column("conta", "TEXT"),
    column("codigo_local", "TEXT"),
    column("codigo_ua", "TEXT"),
    column("nome_ug", "TEXT"),
    column("descricao_ug", "TEXT"),
    column("unidade_responsavel", "TEXT"),
    column("nome_responsavel", "TEXT"),
    column("centro_custo", "TEXT"),
    column("orgao", "TEXT"),
    column("codigo_ul", "TEXT"),
    column("valor_corrigido", "NUMERIC(15, 2)"),
    column("valor_ufir", "NUMERIC(18, 4)"),
    column("codigo_situacao", "TEXT"),
    column("data_inclusao", "DATE"),
    column("data_contabil", "DATE"),
    column("data_baixa", "DATE"),
    column("data_inicio_garantia", "DATE"),
    column("data_fim_garantia", "DATE"),
    column("ano_fabricacao", "INTEGER"),
    column("ano_modelo", "INTEGER"),
    column("chassi", "TEXT"),
    column("placa", "TEXT"),
    column("renavam", "TEXT"),
    column("tipo_veiculo", "TEXT"),
];

/// Asset columns in bind order. `numero_patrimonio` is the conflict key; every
/// other column is overwritten on conflict.
pub const ASSET_COLUMNS: &[&str] = &[
    "id_bem_perm",
    "numero_patrimonio",
    "numero_patrimonio_antigo",
    "descricao",
    "descricao_material",
    "descricao_completa",
    "marca",
    "codigo_grupo",
    "descricao_grupo",
    "codigo_subgrupo",
    "descricao_subgrupo",
    "conta",
    "nome_local",
    "codigo_local",
    "nome_ua",
    "codigo_ua",
    "nome_ug",
    "descricao_ug",
    "unidade_responsavel",
    "nome_responsavel",
    "centro_custo",
    "orgao",
    "codigo_ul",
    "nome_fornecedor",
    "valor_unitario",
    "valor_corrigido",
    "valor_ufir",
    "situacao_fisica",
    "status",
    "codigo_situacao",
    "data_aquisicao",
    "data_inclusao",
    "data_contabil",
    "data_baixa",
    "data_inicio_garantia",
    "data_fim_garantia",
    "ano_fabricacao",
    "ano_modelo",
    "chassi",
    "placa",
    "renavam",
    "tipo_veiculo",
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("upserting record #{index} ({numero_patrimonio}): {source}")]
    Upsert {
        index: usize,
        numero_patrimonio: String,
        source: sqlx::Error,
    },
}

/// Outcome of [`PgInventoryStore::ensure_schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub added: Vec<&'static str>,
    pub existing: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Builds the pool without touching the database; connections open on first use.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the base table if needed, then applies every column migration.
    /// An already existing column counts as applied; any other per-column
    /// failure is logged and reported, never fatal.
    pub async fn ensure_schema(&self) -> Result<SchemaReport, StorageError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;

        let mut report = SchemaReport::default();
        for migration in COLUMN_MIGRATIONS {
            let sql = format!(
                "ALTER TABLE {TABLE} ADD COLUMN {} {}",
                migration.column, migration.sql_type
            );
            match sqlx::query(&sql).execute(&self.pool).await {
                Ok(_) => {
                    info!(column = migration.column, "added inventory column");
                    report.added.push(migration.column);
                }
                Err(err) if is_duplicate_column(&err) => {
                    report.existing.push(migration.column);
                }
                Err(err) => {
                    warn!(column = migration.column, error = %err, "column migration failed; continuing");
                    report.failed.push((migration.column, err.to_string()));
                }
            }
        }

        info!(
            added = report.added.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "inventory schema ensured"
        );
        Ok(report)
    }

    /// Inserts or overwrites every asset by patrimony number inside a single
    /// transaction. Any failing row rolls the whole batch back.
    pub async fn upsert_all(&self, assets: &[Asset]) -> Result<u64, StorageError> {
        let sql = upsert_sql();
        let mut tx = self.pool.begin().await?;

        for (index, asset) in assets.iter().enumerate() {
            if let Err(source) = bind_asset(sqlx::query(&sql), asset).execute(&mut *tx).await {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed upsert also failed");
                }
                return Err(StorageError::Upsert {
                    index,
                    numero_patrimonio: asset.numero_patrimonio.clone(),
                    source,
                });
            }
        }

        tx.commit().await?;
        debug!(rows = assets.len(), "committed inventory upsert");
        Ok(assets.len() as u64)
    }

    /// One page of assets matching every active filter, newest ingested first.
    pub async fn list(
        &self,
        page: PageRequest,
        filters: &AssetFilters,
    ) -> Result<AssetPage, StorageError> {
        let mut conn = self.pool.acquire().await?;

        let mut count = count_query(filters);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = list_query(filters, page);
        let rows = select.build().fetch_all(&mut *conn).await?;
        let data = rows
            .iter()
            .map(asset_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssetPage {
            data,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn get(&self, numero_patrimonio: &str) -> Result<Option<Asset>, StorageError> {
        let sql = format!(
            "SELECT {} FROM {TABLE} WHERE numero_patrimonio = $1",
            ASSET_COLUMNS.join(", ")
        );
        let row = sqlx::query(&sql)
            .bind(numero_patrimonio)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let mut options = FilterOptions::default();

        for field in FilterField::ALL {
            if field.options_key().is_none() {
                continue;
            }
            let col = field.column();
            let sql = format!(
                "SELECT DISTINCT {col} FROM {TABLE} \
                 WHERE {col} IS NOT NULL AND TRIM({col}) <> '' \
                 ORDER BY {col} ASC"
            );
            let values: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
            options.insert(field, values);
        }

        Ok(options)
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {TABLE}");
        Ok(sqlx::query_scalar(&sql).fetch_one(&self.pool).await?)
    }
}

fn is_duplicate_column(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == DUPLICATE_COLUMN)
}

pub fn upsert_sql() -> String {
    let placeholders = (1..=ASSET_COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = ASSET_COLUMNS
        .iter()
        .filter(|col| **col != "numero_patrimonio")
        .map(|col| format!("{col} = EXCLUDED.{col}"))
        .chain(std::iter::once("updated_at = NOW()".to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({placeholders}) \
         ON CONFLICT (numero_patrimonio) DO UPDATE SET {updates}",
        ASSET_COLUMNS.join(", ")
    )
}

/// Binds in [`ASSET_COLUMNS`] order.
fn bind_asset<'q>(
    query: Query<'q, Postgres, PgArguments>,
    asset: &'q Asset,
) -> Query<'q, Postgres, PgArguments> {
    let vehicle = asset.veiculo.as_ref();
    query
        .bind(asset.id_bem_perm)
        .bind(&asset.numero_patrimonio)
        .bind(&asset.numero_patrimonio_antigo)
        .bind(&asset.descricao)
        .bind(&asset.descricao_material)
        .bind(&asset.descricao_completa)
        .bind(&asset.marca)
        .bind(&asset.codigo_grupo)
        .bind(&asset.descricao_grupo)
        .bind(&asset.codigo_subgrupo)
        .bind(&asset.descricao_subgrupo)
        .bind(&asset.conta)
        .bind(&asset.nome_local)
        .bind(&asset.codigo_local)
        .bind(&asset.nome_ua)
        .bind(&asset.codigo_ua)
        .bind(&asset.nome_ug)
        .bind(&asset.descricao_ug)
        .bind(&asset.unidade_responsavel)
        .bind(&asset.nome_responsavel)
        .bind(&asset.centro_custo)
        .bind(&asset.orgao)
        .bind(&asset.codigo_ul)
        .bind(&asset.nome_fornecedor)
        .bind(asset.valor_unitario)
        .bind(asset.valor_corrigido)
        .bind(asset.valor_ufir)
        .bind(&asset.situacao_fisica)
        .bind(&asset.status)
        .bind(&asset.codigo_situacao)
        .bind(asset.data_aquisicao)
        .bind(asset.data_inclusao)
        .bind(asset.data_contabil)
        .bind(asset.data_baixa)
        .bind(asset.data_inicio_garantia)
        .bind(asset.data_fim_garantia)
        .bind(vehicle.and_then(|v| v.ano_fabricacao))
        .bind(vehicle.and_then(|v| v.ano_modelo))
        .bind(vehicle.and_then(|v| v.chassi.as_deref()))
        .bind(vehicle.and_then(|v| v.placa.as_deref()))
        .bind(vehicle.and_then(|v| v.renavam.as_deref()))
        .bind(vehicle.and_then(|v| v.tipo_veiculo.as_deref()))
}

fn asset_from_row(row: &PgRow) -> Result<Asset, sqlx::Error> {
    let vehicle = Vehicle {
        ano_fabricacao: row.try_get("ano_fabricacao")?,
        ano_modelo: row.try_get("ano_modelo")?,
        chassi: row.try_get("chassi")?,
        placa: row.try_get("placa")?,
        renavam: row.try_get("renavam")?,
        tipo_veiculo: row.try_get("tipo_veiculo")?,
    };

    Ok(Asset {
        id_bem_perm: row.try_get("id_bem_perm")?,
        numero_patrimonio: row.try_get("numero_patrimonio")?,
        numero_patrimonio_antigo: row.try_get("numero_patrimonio_antigo")?,
        descricao: row.try_get("descricao")?,
        descricao_material: row.try_get("descricao_material")?,
        descricao_completa: row.try_get("descricao_completa")?,
        marca: row.try_get("marca")?,
        codigo_grupo: row.try_get("codigo_grupo")?,
        descricao_grupo: row.try_get("descricao_grupo")?,
        codigo_subgrupo: row.try_get("codigo_subgrupo")?,
        descricao_subgrupo: row.try_get("descricao_subgrupo")?,
        conta: row.try_get("conta")?,
        nome_local: row.try_get("nome_local")?,
        codigo_local: row.try_get("codigo_local")?,
        nome_ua: row.try_get("nome_ua")?,
        codigo_ua: row.try_get("codigo_ua")?,
        nome_ug: row.try_get("nome_ug")?,
        descricao_ug: row.try_get("descricao_ug")?,
        unidade_responsavel: row.try_get("unidade_responsavel")?,
        nome_responsavel: row.try_get("nome_responsavel")?,
        centro_custo: row.try_get("centro_custo")?,
        orgao: row.try_get("orgao")?,
        codigo_ul: row.try_get("codigo_ul")?,
        nome_fornecedor: row.try_get("nome_fornecedor")?,
        valor_unitario: row.try_get("valor_unitario")?,
        valor_corrigido: row.try_get("valor_corrigido")?,
        valor_ufir: row.try_get("valor_ufir")?,
        situacao_fisica: row.try_get("situacao_fisica")?,
        status: row.try_get("status")?,
        codigo_situacao: row.try_get("codigo_situacao")?,
        data_aquisicao: row.try_get("data_aquisicao")?,
        data_inclusao: row.try_get("data_inclusao")?,
        data_contabil: row.try_get("data_contabil")?,
        data_baixa: row.try_get("data_baixa")?,
        data_inicio_garantia: row.try_get("data_inicio_garantia")?,
        data_fim_garantia: row.try_get("data_fim_garantia")?,
        veiculo: vehicle.into_present(),
    })
}

/// Escapes LIKE metacharacters so user text matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &AssetFilters) {
    for (idx, (field, value)) in filters.active().into_iter().enumerate() {
        builder.push(if idx == 0 { " WHERE " } else { " AND " });
        builder.push(field.column());
        builder.push(" ILIKE ");
        builder.push_bind(format!("%{}%", escape_like(value)));
    }
}

pub fn count_query(filters: &AssetFilters) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {TABLE}"));
    push_filters(&mut builder, filters);
    builder
}

pub fn list_query(filters: &AssetFilters, page: PageRequest) -> QueryBuilder<'static, Postgres> {
    let mut builder =
        QueryBuilder::new(format!("SELECT {} FROM {TABLE}", ASSET_COLUMNS.join(", ")));
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(i64::from(page.limit));
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
    builder
}
