//! External inventory source: HTTP client, payload decoding and raw payload archive.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::ACCEPT;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use sigpat_core::{Asset, MoneyScale, Vehicle};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "sigpat-source";

pub const DEFAULT_SOURCE_URL: &str =
    "https://servicos.seplag.mt.gov.br/apisigpatseaf/inventario/listarTodosCustomizado";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ACCEPT_JSON: &str = "application/json, text/plain, */*";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("source unavailable: http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("invalid source payload: {0}")]
    InvalidPayload(String),
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    /// Path segment granting access to the listing; injected from configuration.
    pub access_token: Option<String>,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_URL.to_string(),
            access_token: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_invalid_certs: false,
            timeout: None,
        }
    }
}

impl SourceConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint_with(self.access_token.as_deref())
    }

    /// Endpoint safe to log: the access token is masked.
    pub fn redacted_endpoint(&self) -> String {
        self.endpoint_with(self.access_token.as_ref().map(|_| "***"))
    }

    fn endpoint_with(&self, token: Option<&str>) -> String {
        let base = self.base_url.trim_end_matches('/');
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => format!("{base}/{token}"),
            None => base.to_string(),
        }
    }
}

/// A full snapshot of the source as one in-memory array.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub fetched_at: DateTime<Utc>,
    pub body: Vec<u8>,
    pub records: Vec<SourceRecord>,
}

#[async_trait]
pub trait AssetSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch_all(&self) -> Result<FetchedPayload, SourceError>;
}

#[derive(Debug)]
pub struct HttpAssetSource {
    client: reqwest::Client,
    config: SourceConfig,
}

impl HttpAssetSource {
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.accept_invalid_certs {
            warn!(
                source = %config.redacted_endpoint(),
                "TLS certificate verification is disabled for the inventory source"
            );
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    fn describe(&self) -> String {
        self.config.redacted_endpoint()
    }

    async fn fetch_all(&self) -> Result<FetchedPayload, SourceError> {
        let redacted = self.config.redacted_endpoint();
        let span = info_span!("source_fetch", source = %redacted);

        async move {
            let resp = self
                .client
                .get(self.config.endpoint())
                .header(ACCEPT, ACCEPT_JSON)
                .send()
                .await
                .map_err(|err| SourceError::Unavailable(err.without_url()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(SourceError::HttpStatus {
                    status: status.as_u16(),
                    url: redacted,
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|err| SourceError::Unavailable(err.without_url()))?
                .to_vec();
            let records = parse_payload(&body)?;
            info!(records = records.len(), bytes = body.len(), "fetched source payload");

            Ok(FetchedPayload {
                fetched_at: Utc::now(),
                body,
                records,
            })
        }
        .instrument(span)
        .await
    }
}

/// Reads a previously saved payload (same array shape as the remote listing).
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    path: PathBuf,
}

impl FileAssetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AssetSource for FileAssetSource {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn fetch_all(&self) -> Result<FetchedPayload, SourceError> {
        let body = fs::read(&self.path).await.map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let records = parse_payload(&body)?;
        Ok(FetchedPayload {
            fetched_at: Utc::now(),
            body,
            records,
        })
    }
}

/// The listing must be a JSON array of objects.
pub fn parse_payload(body: &[u8]) -> Result<Vec<SourceRecord>, SourceError> {
    let value: JsonValue = serde_json::from_slice(body)
        .map_err(|err| SourceError::InvalidPayload(format!("body is not JSON: {err}")))?;
    let JsonValue::Array(items) = value else {
        return Err(SourceError::InvalidPayload(format!(
            "expected an array, got {}",
            json_kind(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            JsonValue::Object(map) => Ok(SourceRecord(map)),
            other => Err(SourceError::InvalidPayload(format!(
                "element {idx} is {}, expected an object",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// One loosely-typed record from the source listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord(pub Map<String, JsonValue>);

impl SourceRecord {
    /// First listed key holding a non-null value.
    fn first(&self, keys: &[&str]) -> Option<&JsonValue> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    pub fn text(&self, keys: &[&str]) -> Option<String> {
        match self.first(keys)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Like [`SourceRecord::text`] but skips blank strings, so a later key can
    /// fill in for an empty earlier one.
    pub fn non_blank_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.text(&[*key]))
            .find(|s| !s.trim().is_empty())
    }

    pub fn integer(&self, keys: &[&str]) -> Option<i64> {
        match self.first(keys)? {
            JsonValue::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn decimal(&self, keys: &[&str]) -> Option<Decimal> {
        let text = match self.first(keys)? {
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => s.trim().to_string(),
            _ => return None,
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }

    pub fn date(&self, keys: &[&str]) -> Option<NaiveDate> {
        match self.first(keys)? {
            JsonValue::String(s) => parse_date_text(s.trim()),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.date_naive()),
            _ => None,
        }
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

/// Maps a source record onto the storage model. Returns `None` when the
/// record has no patrimony number to key on.
pub fn decode_asset(record: &SourceRecord, money: MoneyScale) -> Option<Asset> {
    let numero_patrimonio = record
        .text(&["numeroPatrimonio"])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let vehicle = Vehicle {
        ano_fabricacao: record
            .integer(&["anoFabricacao"])
            .and_then(|y| i32::try_from(y).ok()),
        ano_modelo: record
            .integer(&["anoModelo"])
            .and_then(|y| i32::try_from(y).ok()),
        chassi: record.text(&["chassi"]),
        placa: record.text(&["placa"]),
        renavam: record.text(&["renavam"]),
        tipo_veiculo: record.text(&["tipoVeiculo"]),
    };

    Some(Asset {
        id_bem_perm: record.integer(&["idSQBemPerm"]),
        numero_patrimonio,
        numero_patrimonio_antigo: record.text(&["numeroPatrimonioAntigo"]),

        descricao: record.non_blank_text(&["descricao", "descricaoMaterial"]),
        descricao_material: record.text(&["descricaoMaterial"]),
        descricao_completa: record.text(&["descricaoCompleta"]),
        marca: record.text(&["marca"]),
        codigo_grupo: record.text(&["codigoGrupo"]),
        descricao_grupo: record.text(&["descricaoGrupo"]),
        codigo_subgrupo: record.text(&["codigoSubGrupo", "codigoSubgrupo"]),
        descricao_subgrupo: record.text(&["descricaoSubGrupo", "descricaoSubgrupo"]),
        conta: record.text(&["descricaoConta", "conta", "contaContabil"]),

        nome_local: record.text(&["nomeLocal"]),
        codigo_local: record.text(&["codigoLocal"]),
        nome_ua: record.text(&["nomeUA"]),
        codigo_ua: record.text(&["codigoUA"]),
        nome_ug: record.text(&["nomeUG"]),
        descricao_ug: record.text(&["descricaoUG"]),
        unidade_responsavel: record.text(&["unidadeResponsavel", "nomeUnidadeResponsavel"]),
        nome_responsavel: record.text(&["nomeResponsavel", "responsavel"]),
        centro_custo: record.text(&["centroCusto", "nomeCentroCusto"]),
        orgao: record.text(&["orgao", "nomeOrgao"]),
        codigo_ul: record.text(&["codigoUL"]),
        nome_fornecedor: record.text(&["nomeFornecedor"]),

        valor_unitario: record.decimal(&["valorUnitario"]).map(|v| money.apply(v)),
        valor_corrigido: record.decimal(&["valorCorrigido"]).map(|v| money.apply(v)),
        valor_ufir: record.decimal(&["valorUfir", "valorUFIR"]),

        situacao_fisica: record.text(&["situacaoFisica"]),
        status: record.text(&["status"]),
        codigo_situacao: record.text(&["codigoSituacao", "codigoStatus"]),

        data_aquisicao: record.date(&["dataAquisicao"]),
        data_inclusao: record.date(&["dataInclusao"]),
        data_contabil: record.date(&["dataContabil"]),
        data_baixa: record.date(&["dataBaixa"]),
        data_inicio_garantia: record.date(&["dataInicioGarantia"]),
        data_fim_garantia: record.date(&["dataFimGarantia"]),

        veiculo: vehicle.into_present(),
    })
}

#[derive(Debug, Clone)]
pub struct ArchivedPayload {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

/// Hash-addressed, write-once archive of raw source payloads.
#[derive(Debug, Clone)]
pub struct PayloadArchive {
    root: PathBuf,
}

impl PayloadArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub fn relative_path(&self, fetched_at: DateTime<Utc>, content_hash: &str) -> PathBuf {
        let stamp = fetched_at.format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(stamp).join(format!("{content_hash}.json"))
    }

    /// Writes through a temp file and an atomic rename.
    pub async fn store(
        &self,
        fetched_at: DateTime<Utc>,
        bytes: &[u8],
    ) -> anyhow::Result<ArchivedPayload> {
        let content_hash = Self::sha256_hex(bytes);
        let relative_path = self.relative_path(fetched_at, &content_hash);
        let absolute_path = self.root.join(&relative_path);
        let archived = |deduplicated| ArchivedPayload {
            content_hash: content_hash.clone(),
            relative_path: relative_path.clone(),
            absolute_path: absolute_path.clone(),
            byte_size: bytes.len(),
            deduplicated,
        };

        let parent = absolute_path
            .parent()
            .context("archive path has no parent directory")?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking archive path {}", absolute_path.display()))?
        {
            return Ok(archived(true));
        }

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp archive file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp archive file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp archive file {}", temp_path.display()))?;
        drop(file);

        match fs::rename(&temp_path, &absolute_path).await {
            Ok(()) => Ok(archived(false)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(&temp_path).await;
                Ok(archived(true))
            }
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(err).with_context(|| {
                    format!(
                        "renaming temp archive {} -> {}",
                        temp_path.display(),
                        absolute_path.display()
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path as AxumPath,
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    fn record(value: JsonValue) -> SourceRecord {
        match value {
            JsonValue::Object(map) => SourceRecord(map),
            _ => panic!("test record must be an object"),
        }
    }

    async fn spawn_source_server() -> String {
        async fn listing(AxumPath(token): AxumPath<String>, headers: HeaderMap) -> (StatusCode, Json<JsonValue>) {
            let ua = headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if token != "secret-token" || !ua.starts_with("Mozilla/5.0") {
                return (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})));
            }
            (
                StatusCode::OK,
                Json(json!([
                    {"numeroPatrimonio": "0001", "descricao": "CADEIRA", "valorUnitario": 150000},
                    {"numeroPatrimonio": "0002", "descricaoMaterial": "MESA"}
                ])),
            )
        }

        let app = Router::new()
            .route("/inventario/{token}", get(listing))
            .route("/object/{token}", get(|| async { Json(json!({"items": []})) }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config_for(base_url: String, token: &str) -> SourceConfig {
        SourceConfig {
            base_url,
            access_token: Some(token.to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        }
    }

    #[test]
    fn endpoint_appends_token_and_redacts_it() {
        let config = SourceConfig {
            base_url: "https://example.test/listar/".into(),
            access_token: Some("abc123".into()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://example.test/listar/abc123");
        assert_eq!(config.redacted_endpoint(), "https://example.test/listar/***");
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn payload_must_be_an_array_of_objects() {
        assert_eq!(parse_payload(b"[]").unwrap().len(), 0);
        assert!(matches!(
            parse_payload(br#"{"data": []}"#),
            Err(SourceError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_payload(b"<html>maintenance</html>"),
            Err(SourceError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_payload(br#"[{"numeroPatrimonio": "1"}, 3]"#),
            Err(SourceError::InvalidPayload(msg)) if msg.contains("element 1")
        ));
    }

    #[test]
    fn decode_scales_money_and_coerces_types() {
        let rec = record(json!({
            "idSQBemPerm": "812",
            "numeroPatrimonio": 4521,
            "descricao": "",
            "descricaoMaterial": "NOTEBOOK",
            "valorUnitario": 150000,
            "valorCorrigido": "9990",
            "valorUfir": 12.5,
            "dataAquisicao": "2019-03-07T00:00:00.000-0400",
            "dataInclusao": "07/03/2019",
            "dataBaixa": 1552003200000i64,
            "situacaoFisica": "BOM",
            "anoFabricacao": 2018,
            "placa": ""
        }));
        let asset = decode_asset(&rec, MoneyScale::Cents).unwrap();
        assert_eq!(asset.id_bem_perm, Some(812));
        assert_eq!(asset.numero_patrimonio, "4521");
        assert_eq!(asset.descricao.as_deref(), Some("NOTEBOOK"));
        assert_eq!(asset.valor_unitario.unwrap().to_string(), "1500.00");
        assert_eq!(asset.valor_corrigido.unwrap().to_string(), "99.90");
        assert_eq!(asset.valor_ufir.unwrap().to_string(), "12.5");
        let expected = NaiveDate::from_ymd_opt(2019, 3, 7).unwrap();
        assert_eq!(asset.data_aquisicao, Some(expected));
        assert_eq!(asset.data_inclusao, Some(expected));
        assert_eq!(asset.data_baixa, Some(NaiveDate::from_ymd_opt(2019, 3, 8).unwrap()));
        assert!(asset.veiculo.is_none());
    }

    #[test]
    fn decode_keeps_vehicle_when_identified() {
        let rec = record(json!({
            "numeroPatrimonio": "V-1",
            "placa": "QBA1234",
            "renavam": 123456789,
            "anoModelo": "2020",
            "tipoVeiculo": "PICKUP"
        }));
        let vehicle = decode_asset(&rec, MoneyScale::Units).unwrap().veiculo.unwrap();
        assert_eq!(vehicle.placa.as_deref(), Some("QBA1234"));
        assert_eq!(vehicle.renavam.as_deref(), Some("123456789"));
        assert_eq!(vehicle.ano_modelo, Some(2020));
    }

    #[test]
    fn decode_rejects_records_without_patrimony_number() {
        assert!(decode_asset(&record(json!({"descricao": "X"})), MoneyScale::Cents).is_none());
        assert!(decode_asset(&record(json!({"numeroPatrimonio": "  "})), MoneyScale::Cents).is_none());
        assert!(decode_asset(&record(json!({"numeroPatrimonio": null})), MoneyScale::Cents).is_none());
    }

    #[test]
    fn unparseable_values_become_null() {
        let rec = record(json!({
            "numeroPatrimonio": "9",
            "valorUnitario": "n/d",
            "dataAquisicao": "ontem",
            "idSQBemPerm": {"nested": true}
        }));
        let asset = decode_asset(&rec, MoneyScale::Cents).unwrap();
        assert!(asset.valor_unitario.is_none());
        assert!(asset.data_aquisicao.is_none());
        assert!(asset.id_bem_perm.is_none());
    }

    #[tokio::test]
    async fn http_source_fetches_listing_with_browser_headers() {
        let base = spawn_source_server().await;
        let source = HttpAssetSource::new(config_for(format!("{base}/inventario"), "secret-token")).unwrap();
        let payload = source.fetch_all().await.unwrap();
        assert_eq!(payload.records.len(), 2);
        assert!(!payload.body.is_empty());
        assert!(source.describe().ends_with("/inventario/***"));
    }

    #[tokio::test]
    async fn http_source_reports_status_and_shape_failures() {
        let base = spawn_source_server().await;

        let forbidden = HttpAssetSource::new(config_for(format!("{base}/inventario"), "wrong")).unwrap();
        let err = forbidden.fetch_all().await.unwrap_err();
        assert!(matches!(err, SourceError::HttpStatus { status: 403, .. }));
        assert!(!err.to_string().contains("wrong"));

        let object = HttpAssetSource::new(config_for(format!("{base}/object"), "any")).unwrap();
        let err = object.fetch_all().await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn unreachable_source_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpAssetSource::new(config_for(format!("http://{addr}/inventario"), "t")).unwrap();
        assert!(matches!(
            source.fetch_all().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn file_source_reads_saved_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, br#"[{"numeroPatrimonio": "1"}]"#).unwrap();
        let payload = FileAssetSource::new(&path).fetch_all().await.unwrap();
        assert_eq!(payload.records.len(), 1);

        let missing = FileAssetSource::new(dir.path().join("missing.json"));
        assert!(matches!(missing.fetch_all().await, Err(SourceError::Io { .. })));
    }

    #[test]
    fn archive_hashing_is_stable() {
        assert_eq!(
            PayloadArchive::sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn archive_writes_once_per_hash() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PayloadArchive::new(dir.path());
        let fetched_at = DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let first = archive.store(fetched_at, b"[]").await.unwrap();
        let second = archive.store(fetched_at, b"[]").await.unwrap();

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.relative_path.starts_with("20260224_120000"));
        assert!(first.absolute_path.exists());
    }
}
