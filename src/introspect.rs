// Dataset introspection: column type inference and manifest caching

use crate::data::{Dataset, DatasetId};
use crate::error::{Result, VizError};
use crate::notification::{Notifications, ProgressField, ProgressRecord, ProgressState};
use crate::schema::ColumnType;
use crate::transform::parse_finite;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Tuning knobs for type inference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntrospectConfig {
    /// Maximum number of rows sampled per column.
    pub sample_limit: usize,
    /// Rows scanned between progress updates.
    pub chunk_size: usize,
    /// Unique ratio at or above which a text column is an identifier.
    pub identifier_unique_ratio: f64,
    /// Minimum non-empty samples before the unique ratio is trusted.
    pub identifier_min_rows: usize,
}

impl Default for IntrospectConfig {
    fn default() -> Self {
        Self {
            sample_limit: 1000,
            chunk_size: 256,
            identifier_unique_ratio: 1.0,
            identifier_min_rows: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnManifestEntry {
    pub name: String,
    pub inferred_type: ColumnType,
    /// Distinct non-empty values among the sampled rows.
    pub cardinality: usize,
}

/// Columns of one dataset with inferred types. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnManifest {
    pub dataset: String,
    pub row_count: usize,
    pub columns: Vec<ColumnManifestEntry>,
}

impl ColumnManifest {
    pub fn get(&self, name: &str) -> Option<&ColumnManifestEntry> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names sorted case-insensitively, ties broken by byte order.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_by(|a, b| compare_labels(a, b));
        names
    }
}

/// Ordering used for every dropdown populated from columns.
pub fn compare_labels(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Running statistics for one column while scanning.
#[derive(Default)]
struct ColumnStats {
    non_empty: usize,
    numeric: usize,
    distinct: HashSet<String>,
}

impl ColumnStats {
    fn observe(&mut self, cell: &str) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return;
        }
        self.non_empty += 1;
        if parse_finite(trimmed).is_some() {
            self.numeric += 1;
        }
        if !self.distinct.contains(trimmed) {
            self.distinct.insert(trimmed.to_string());
        }
    }
}

/// Builds and caches column manifests per dataset identity.
#[derive(Debug, Default)]
pub struct Introspector {
    config: IntrospectConfig,
    cache: HashMap<DatasetId, Arc<ColumnManifest>>,
}

impl Introspector {
    pub fn new(config: IntrospectConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    /// Introspect a dataset, reusing the cached manifest for a known identity.
    pub fn introspect(
        &mut self,
        dataset: &Dataset,
        notifications: &mut Notifications,
    ) -> Result<Arc<ColumnManifest>> {
        if let Some(cached) = self.cache.get(&dataset.id) {
            tracing::debug!(dataset = %dataset.id, "manifest cache hit");
            return Ok(Arc::clone(cached));
        }

        let progress = notifications.start_progress(ProgressRecord::new(
            format!("Introspecting {}", dataset.id),
            dataset.rows.len().min(self.config.sample_limit) as f64,
        ));

        match introspect_with(dataset, &self.config, |scanned| {
            notifications.update_progress(progress, vec![ProgressField::Current(scanned as f64)]);
        }) {
            Ok(manifest) => {
                notifications.update_progress(
                    progress,
                    vec![
                        ProgressField::State(ProgressState::Success),
                        ProgressField::Message(format!("{} columns", manifest.columns.len())),
                    ],
                );
                let manifest = Arc::new(manifest);
                self.cache.insert(dataset.id.clone(), Arc::clone(&manifest));
                Ok(manifest)
            }
            Err(err) => {
                notifications.update_progress(
                    progress,
                    vec![
                        ProgressField::State(ProgressState::Error),
                        ProgressField::Message(err.to_string()),
                    ],
                );
                Err(err)
            }
        }
    }

    pub fn is_cached(&self, id: &DatasetId) -> bool {
        self.cache.contains_key(id)
    }
}

/// Side-effect-free introspection. `on_chunk` receives the number of rows
/// scanned so far after every chunk.
pub fn introspect_with<F>(
    dataset: &Dataset,
    config: &IntrospectConfig,
    mut on_chunk: F,
) -> Result<ColumnManifest>
where
    F: FnMut(usize),
{
    let fail = |reason: String| VizError::Introspection {
        dataset: dataset.id.to_string(),
        reason,
    };

    if dataset.headers.is_empty() {
        return Err(fail("dataset has no columns".to_string()));
    }
    if dataset.rows.is_empty() {
        return Err(fail("dataset requires at least one data row".to_string()));
    }

    let mut seen = HashSet::new();
    for header in &dataset.headers {
        if header.trim().is_empty() {
            return Err(fail("dataset has an empty column name".to_string()));
        }
        if !seen.insert(header.as_str()) {
            return Err(fail(format!("duplicate column name '{}'", header)));
        }
    }

    let mut stats: Vec<ColumnStats> = dataset.headers.iter().map(|_| ColumnStats::default()).collect();
    let sampled = &dataset.rows[..dataset.rows.len().min(config.sample_limit)];
    let chunk_size = config.chunk_size.max(1);

    let mut scanned = 0;
    for chunk in sampled.chunks(chunk_size) {
        for row in chunk {
            for (col_stats, idx) in stats.iter_mut().zip(0..) {
                col_stats.observe(row.get(idx).map(String::as_str).unwrap_or(""));
            }
        }
        scanned += chunk.len();
        on_chunk(scanned);
    }

    let columns = dataset
        .headers
        .iter()
        .zip(stats)
        .map(|(name, col_stats)| {
            let inferred_type = infer_type(name, &col_stats, config);
            tracing::debug!(column = %name, ?inferred_type, cardinality = col_stats.distinct.len(), "column inferred");
            ColumnManifestEntry {
                name: name.clone(),
                inferred_type,
                cardinality: col_stats.distinct.len(),
            }
        })
        .collect();

    Ok(ColumnManifest {
        dataset: dataset.id.to_string(),
        row_count: dataset.rows.len(),
        columns,
    })
}

/// Numeric if every non-empty value parses; otherwise identifier by name or
/// uniqueness; otherwise categorical. All-empty columns are unknown.
fn infer_type(name: &str, stats: &ColumnStats, config: &IntrospectConfig) -> ColumnType {
    if stats.non_empty == 0 {
        return ColumnType::Unknown;
    }
    if stats.numeric == stats.non_empty {
        return ColumnType::Numeric;
    }
    if looks_like_identifier_name(name) {
        return ColumnType::Identifier;
    }
    let unique_ratio = stats.distinct.len() as f64 / stats.non_empty as f64;
    if stats.non_empty >= config.identifier_min_rows && unique_ratio >= config.identifier_unique_ratio {
        return ColumnType::Identifier;
    }
    ColumnType::Categorical
}

fn looks_like_identifier_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower == "id" || lower.ends_with("_id") || lower.ends_with(" id") || name.ends_with("Id")
}
