//! KPI metadata catalog and the KPI-name to storage-column rules.
//!
//! The catalog is read once at cold start and shared read-only by every
//! invocation the process serves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::KpiSummary;
use crate::{Error, Result};

/// Prefix stripped from `page_name` to obtain the chain.
const PAGE_NAME_PREFIX: &str = "Draft ";

/// One entry of the KPI metadata file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KpiDescriptor {
    pub kpi_id: i64,
    pub kpi_name: String,
    #[serde(default)]
    pub page_name: String,
    #[serde(default = "unknown_unit")]
    pub unit: String,
    #[serde(default)]
    pub short_definition: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
}

fn unknown_unit() -> String {
    "unknown".to_string()
}

impl KpiDescriptor {
    /// Chain (tenant) label derived from the page name.
    pub fn chain(&self) -> &str {
        chain_from_page_name(&self.page_name)
    }
}

/// `"Draft Customer A"` -> `"Customer A"`; other names pass through.
pub fn chain_from_page_name(page_name: &str) -> &str {
    page_name.strip_prefix(PAGE_NAME_PREFIX).unwrap_or(page_name)
}

/// Storage columns of the pre-aggregated metrics table a KPI can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KpiColumn {
    SssRevenue,
    Revenue,
    SssVolume,
    Volume,
    StoreCount,
    OosPercent,
}

impl KpiColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            KpiColumn::SssRevenue => "cy_sss_revenue",
            KpiColumn::Revenue => "cy_revenue",
            KpiColumn::SssVolume => "cy_sss_volume",
            KpiColumn::Volume => "cy_volume",
            KpiColumn::StoreCount => "store_count",
            KpiColumn::OosPercent => "cy_oos_percent",
        }
    }

    /// Sibling columns selected alongside this one for context.
    pub fn context_columns(self) -> &'static [&'static str] {
        match self {
            KpiColumn::SssRevenue | KpiColumn::Revenue => {
                &["py_revenue", "revenue_variance", "revenue_variance_percent"]
            }
            KpiColumn::SssVolume | KpiColumn::Volume => {
                &["py_volume", "volume_variance", "percent_volume_change"]
            }
            KpiColumn::OosPercent => &["py_oos_percent"],
            KpiColumn::StoreCount => &[],
        }
    }
}

impl Serialize for KpiColumn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A KPI name maps to `column` if it contains any of `any_of` and none of `none_of`.
struct ColumnRule {
    column: KpiColumn,
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
}

/// Ordered, first match wins. Specific rules sit above their generic fallbacks.
const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule {
        column: KpiColumn::SssRevenue,
        any_of: &["sss revenue"],
        none_of: &[],
    },
    ColumnRule {
        column: KpiColumn::Revenue,
        any_of: &["revenue"],
        none_of: &[],
    },
    ColumnRule {
        column: KpiColumn::SssVolume,
        any_of: &["sss volume"],
        none_of: &[],
    },
    ColumnRule {
        column: KpiColumn::Volume,
        any_of: &["volume"],
        none_of: &["7lb"],
    },
    ColumnRule {
        column: KpiColumn::StoreCount,
        any_of: &["store count"],
        none_of: &[],
    },
    ColumnRule {
        column: KpiColumn::OosPercent,
        any_of: &["oos", "out-of-stock", "out of stock"],
        none_of: &[],
    },
];

/// Map a KPI name to its storage column.
///
/// `None` means the KPI is not in the pre-aggregated table and has to be
/// answered through the free-form path.
pub fn map_kpi_name_to_column(kpi_name: &str) -> Option<KpiColumn> {
    let name = kpi_name.to_lowercase();
    COLUMN_RULES
        .iter()
        .find(|rule| {
            rule.any_of.iter().any(|needle| name.contains(needle))
                && !rule.none_of.iter().any(|needle| name.contains(needle))
        })
        .map(|rule| rule.column)
}

/// Where a mapped KPI lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiMapping {
    pub column: KpiColumn,
    pub name: String,
    pub unit: String,
    pub chain: String,
}

/// A requested KPI id that resolved to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedKpi {
    pub kpi_id: i64,
    pub column: KpiColumn,
    pub name: String,
    pub unit: String,
    pub chain: String,
}

/// The loaded catalog plus its id -> column mapping.
#[derive(Debug, Clone, Default)]
pub struct KpiCatalog {
    descriptors: Vec<KpiDescriptor>,
    mappings: HashMap<i64, KpiMapping>,
}

impl KpiCatalog {
    /// Build the mapping from descriptors. Unmapped KPIs are skipped.
    pub fn from_descriptors(descriptors: Vec<KpiDescriptor>) -> Self {
        let mut mappings = HashMap::new();
        let mut unmapped = 0usize;

        for kpi in &descriptors {
            match map_kpi_name_to_column(&kpi.kpi_name) {
                Some(column) => {
                    mappings.insert(
                        kpi.kpi_id,
                        KpiMapping {
                            column,
                            name: kpi.kpi_name.clone(),
                            unit: kpi.unit.clone(),
                            chain: kpi.chain().to_string(),
                        },
                    );
                }
                None => unmapped += 1,
            }
        }

        info!(
            "Loaded {} KPI mappings from metadata, skipped {} KPIs that don't map to database columns",
            mappings.len(),
            unmapped
        );

        Self {
            descriptors,
            mappings,
        }
    }

    /// Parse the catalog from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let descriptors: Vec<KpiDescriptor> = serde_json::from_str(text)
            .map_err(|e| Error::Catalog(format!("Invalid KPI metadata: {}", e)))?;
        Ok(Self::from_descriptors(descriptors))
    }

    /// Load from the first candidate path that exists.
    pub fn load(candidates: &[PathBuf]) -> Result<Self> {
        let path = candidates
            .iter()
            .find(|path| path.exists())
            .ok_or_else(|| {
                Error::Catalog(format!(
                    "Could not find kpi_meta_data.json in any of: {:?}",
                    candidates
                ))
            })?;
        Self::load_file(path)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;
        info!("Reading KPI metadata from {}", path.display());
        Self::from_json(&text)
    }

    /// Load, or fall back to an empty catalog so every KPI resolves to nothing.
    pub fn load_or_empty(candidates: &[PathBuf]) -> Self {
        Self::load(candidates).unwrap_or_else(|e| {
            warn!("Could not load KPI metadata: {}. Falling back to empty mapping", e);
            Self::default()
        })
    }

    pub fn descriptors(&self) -> &[KpiDescriptor] {
        &self.descriptors
    }

    pub fn mapping(&self, kpi_id: i64) -> Option<&KpiMapping> {
        self.mappings.get(&kpi_id)
    }

    pub fn mapped_count(&self) -> usize {
        self.mappings.len()
    }

    /// Resolve requested ids in request order. Unknown or unmapped ids are dropped.
    pub fn resolve(&self, kpi_ids: &[i64]) -> Vec<ResolvedKpi> {
        kpi_ids
            .iter()
            .filter_map(|id| {
                self.mapping(*id).map(|m| ResolvedKpi {
                    kpi_id: *id,
                    column: m.column,
                    name: m.name.clone(),
                    unit: m.unit.clone(),
                    chain: m.chain.clone(),
                })
            })
            .collect()
    }

    /// Catalog entries for a customer, or all of them for `"all"`.
    ///
    /// Matching is a case-insensitive substring test against the chain.
    pub fn available_for(&self, customer: &str) -> Vec<KpiSummary> {
        let customer = customer.to_lowercase();
        self.descriptors
            .iter()
            .filter(|kpi| customer == "all" || kpi.chain().to_lowercase().contains(&customer))
            .map(|kpi| KpiSummary {
                kpi_id: kpi.kpi_id,
                kpi_name: kpi.kpi_name.clone(),
                definition: kpi.short_definition.clone().unwrap_or_default(),
                unit: kpi.unit.clone(),
                group: kpi
                    .group_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect()
    }
}
