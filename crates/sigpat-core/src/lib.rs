//! Core domain model for the SIGPAT inventory browser.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "sigpat-core";

/// One physical inventory item, keyed by its patrimony number.
///
/// Serialized field names are the public contract of the HTTP API and do not
/// follow the storage column names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(rename = "idSQBemPerm")]
    pub id_bem_perm: Option<i64>,
    pub numero_patrimonio: String,
    pub numero_patrimonio_antigo: Option<String>,

    pub descricao: Option<String>,
    pub descricao_material: Option<String>,
    pub descricao_completa: Option<String>,
    pub marca: Option<String>,
    pub codigo_grupo: Option<String>,
    pub descricao_grupo: Option<String>,
    pub codigo_subgrupo: Option<String>,
    pub descricao_subgrupo: Option<String>,
    pub conta: Option<String>,

    pub nome_local: Option<String>,
    pub codigo_local: Option<String>,
    #[serde(rename = "nomeUA")]
    pub nome_ua: Option<String>,
    #[serde(rename = "codigoUA")]
    pub codigo_ua: Option<String>,
    #[serde(rename = "nomeUG")]
    pub nome_ug: Option<String>,
    #[serde(rename = "descricaoUG")]
    pub descricao_ug: Option<String>,
    pub unidade_responsavel: Option<String>,
    pub nome_responsavel: Option<String>,
    pub centro_custo: Option<String>,
    pub orgao: Option<String>,
    #[serde(rename = "codigoUL")]
    pub codigo_ul: Option<String>,
    pub nome_fornecedor: Option<String>,

    pub valor_unitario: Option<Decimal>,
    pub valor_corrigido: Option<Decimal>,
    pub valor_ufir: Option<Decimal>,

    pub situacao_fisica: Option<String>,
    pub status: Option<String>,
    pub codigo_situacao: Option<String>,

    pub data_aquisicao: Option<NaiveDate>,
    pub data_inclusao: Option<NaiveDate>,
    pub data_contabil: Option<NaiveDate>,
    pub data_baixa: Option<NaiveDate>,
    pub data_inicio_garantia: Option<NaiveDate>,
    pub data_fim_garantia: Option<NaiveDate>,

    pub veiculo: Option<Vehicle>,
}

/// Vehicle attributes; only meaningful when the item has a plate, renavam or chassis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub ano_fabricacao: Option<i32>,
    pub ano_modelo: Option<i32>,
    pub chassi: Option<String>,
    pub placa: Option<String>,
    pub renavam: Option<String>,
    pub tipo_veiculo: Option<String>,
}

impl Vehicle {
    pub fn is_present(&self) -> bool {
        [&self.placa, &self.renavam, &self.chassi]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Keeps the sub-record only when it identifies an actual vehicle.
    pub fn into_present(self) -> Option<Self> {
        self.is_present().then_some(self)
    }
}

/// Allow-listed filter fields. Anything not listed here is never turned into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Patrimonio,
    Descricao,
    Local,
    Marca,
    Fornecedor,
    Ua,
    Situacao,
    Responsavel,
    Conta,
}

impl FilterField {
    pub const ALL: [FilterField; 9] = [
        FilterField::Patrimonio,
        FilterField::Descricao,
        FilterField::Local,
        FilterField::Marca,
        FilterField::Fornecedor,
        FilterField::Ua,
        FilterField::Situacao,
        FilterField::Responsavel,
        FilterField::Conta,
    ];

    pub fn query_key(self) -> &'static str {
        match self {
            FilterField::Patrimonio => "patrimonio",
            FilterField::Descricao => "descricao",
            FilterField::Local => "local",
            FilterField::Marca => "marca",
            FilterField::Fornecedor => "fornecedor",
            FilterField::Ua => "ua",
            FilterField::Situacao => "situacao",
            FilterField::Responsavel => "responsavel",
            FilterField::Conta => "conta",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            FilterField::Patrimonio => "numero_patrimonio",
            FilterField::Descricao => "descricao",
            FilterField::Local => "nome_local",
            FilterField::Marca => "marca",
            FilterField::Fornecedor => "nome_fornecedor",
            FilterField::Ua => "nome_ua",
            FilterField::Situacao => "situacao_fisica",
            FilterField::Responsavel => "nome_responsavel",
            FilterField::Conta => "conta",
        }
    }

    /// Key under which distinct values are published for input suggestions.
    /// Free-text identity fields have no suggestion list.
    pub fn options_key(self) -> Option<&'static str> {
        match self {
            FilterField::Patrimonio | FilterField::Descricao => None,
            FilterField::Local => Some("locais"),
            FilterField::Marca => Some("marcas"),
            FilterField::Fornecedor => Some("fornecedores"),
            FilterField::Ua => Some("uas"),
            FilterField::Situacao => Some("situacoes"),
            FilterField::Responsavel => Some("responsaveis"),
            FilterField::Conta => Some("contas"),
        }
    }
}

/// Optional substring filters as received from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilters {
    pub patrimonio: Option<String>,
    pub descricao: Option<String>,
    pub local: Option<String>,
    pub marca: Option<String>,
    pub fornecedor: Option<String>,
    pub ua: Option<String>,
    pub situacao: Option<String>,
    pub responsavel: Option<String>,
    pub conta: Option<String>,
}

impl AssetFilters {
    pub fn get(&self, field: FilterField) -> Option<&str> {
        let value = match field {
            FilterField::Patrimonio => &self.patrimonio,
            FilterField::Descricao => &self.descricao,
            FilterField::Local => &self.local,
            FilterField::Marca => &self.marca,
            FilterField::Fornecedor => &self.fornecedor,
            FilterField::Ua => &self.ua,
            FilterField::Situacao => &self.situacao,
            FilterField::Responsavel => &self.responsavel,
            FilterField::Conta => &self.conta,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let slot = match field {
            FilterField::Patrimonio => &mut self.patrimonio,
            FilterField::Descricao => &mut self.descricao,
            FilterField::Local => &mut self.local,
            FilterField::Marca => &mut self.marca,
            FilterField::Fornecedor => &mut self.fornecedor,
            FilterField::Ua => &mut self.ua,
            FilterField::Situacao => &mut self.situacao,
            FilterField::Responsavel => &mut self.responsavel,
            FilterField::Conta => &mut self.conta,
        };
        *slot = Some(value.into());
    }

    /// Filters that constrain the result, in allow-list order, trimmed.
    pub fn active(&self) -> Vec<(FilterField, &str)> {
        FilterField::ALL
            .iter()
            .filter_map(|field| {
                let value = self.get(*field)?.trim();
                (!value.is_empty()).then_some((*field, value))
            })
            .collect()
    }
}

/// Normalized page/limit pair. Construction never fails; bad input falls back
/// to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn from_raw(page: Option<&str>, limit: Option<&str>, default_limit: u32) -> Self {
        Self {
            page: positive_or(page, Self::DEFAULT_PAGE),
            limit: positive_or(limit, default_limit.max(1)),
        }
    }

    /// Rows to skip; saturates so absurd pages read past the end instead of failing.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1)
            .checked_mul(i64::from(self.limit))
            .unwrap_or(i64::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

fn positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(leading_integer)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Parses the leading integer of `raw` the way browsers' `parseInt` does:
/// `"12abc"` is 12, `"abc"` is nothing.
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let digits_len = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..digits_start + digits_len].parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let limit = i64::from(request.limit.max(1));
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: (total.max(0) + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPage {
    pub data: Vec<Asset>,
    pub pagination: Pagination,
}

/// Distinct values per suggestion-bearing filter, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub locais: Vec<String>,
    pub marcas: Vec<String>,
    pub fornecedores: Vec<String>,
    pub uas: Vec<String>,
    pub situacoes: Vec<String>,
    pub responsaveis: Vec<String>,
    pub contas: Vec<String>,
}

impl FilterOptions {
    /// Stores `values` under the field's options key; fields without
    /// suggestions are ignored.
    pub fn insert(&mut self, field: FilterField, values: Vec<String>) {
        let slot = match field {
            FilterField::Local => &mut self.locais,
            FilterField::Marca => &mut self.marcas,
            FilterField::Fornecedor => &mut self.fornecedores,
            FilterField::Ua => &mut self.uas,
            FilterField::Situacao => &mut self.situacoes,
            FilterField::Responsavel => &mut self.responsaveis,
            FilterField::Conta => &mut self.contas,
            FilterField::Patrimonio | FilterField::Descricao => return,
        };
        *slot = values;
    }
}

/// How the source encodes the unit and corrected values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoneyScale {
    /// Integer cents; divided by 100 before storage.
    #[default]
    Cents,
    Units,
}

impl MoneyScale {
    pub fn apply(self, raw: Decimal) -> Decimal {
        let mut value = match self {
            MoneyScale::Cents => raw / Decimal::ONE_HUNDRED,
            MoneyScale::Units => raw,
        };
        value.rescale(2);
        value
    }
}

/// Badge class shown next to an item's physical condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionBadge {
    Success,
    Warning,
    Danger,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConditionRule {
    pub badge: ConditionBadge,
    pub contains_any: Vec<String>,
}

/// Ordered, first-match-wins substring rules over the upper-cased condition.
/// Non-blank values matching no rule are `Warning`; blank values are `Muted`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConditionRules {
    #[serde(default)]
    pub rules: Vec<ConditionRule>,
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing condition rules: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl Default for ConditionRules {
    fn default() -> Self {
        Self {
            rules: vec![
                ConditionRule {
                    badge: ConditionBadge::Success,
                    contains_any: vec!["BOM".into()],
                },
                ConditionRule {
                    badge: ConditionBadge::Danger,
                    contains_any: vec!["IRRECUP".into(), "INSERV".into(), "INUTIL".into()],
                },
            ],
        }
    }
}

impl ConditionRules {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RulesError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn classify(&self, condition: Option<&str>) -> ConditionBadge {
        let Some(condition) = condition.map(str::trim).filter(|c| !c.is_empty()) else {
            return ConditionBadge::Muted;
        };
        let upper = condition.to_uppercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.contains_any
                    .iter()
                    .any(|needle| upper.contains(&needle.to_uppercase()))
            })
            .map(|rule| rule.badge)
            .unwrap_or(ConditionBadge::Warning)
    }
}
