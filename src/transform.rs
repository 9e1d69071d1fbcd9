// Column extraction and aggregation used by the render entry points

use crate::data::Dataset;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

fn require_column(data: &Dataset, name: &str) -> Result<usize> {
    data.column_index(name)
        .ok_or_else(|| anyhow!("Column '{}' not found", name))
}

/// Parse a finite number. `NaN` and `inf` spellings count as text.
pub fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_cell(cell: &str, column: &str, row_idx: usize) -> Result<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = parse_finite(trimmed).with_context(|| {
        format!(
            "Failed to parse '{}' as number in column '{}' at row {}",
            trimmed,
            column,
            row_idx + 1
        )
    })?;
    Ok(Some(value))
}

/// Non-empty numeric values of one column.
pub fn numeric_column(data: &Dataset, name: &str) -> Result<Vec<f64>> {
    let idx = require_column(data, name)?;
    let mut values = Vec::with_capacity(data.rows.len());
    for (row_idx, cell) in data.column(idx).enumerate() {
        if let Some(v) = parse_cell(cell, name, row_idx)? {
            values.push(v);
        }
    }
    Ok(values)
}

/// Numeric (x, y) pairs for the given rows; rows with an empty cell are skipped.
pub fn numeric_pairs(data: &Dataset, rows: &[usize], x: &str, y: &str) -> Result<Vec<(f64, f64)>> {
    let x_idx = require_column(data, x)?;
    let y_idx = require_column(data, y)?;
    let mut points = Vec::with_capacity(rows.len());
    for &row_idx in rows {
        let row = &data.rows[row_idx];
        let x_val = parse_cell(row.get(x_idx).map(String::as_str).unwrap_or(""), x, row_idx)?;
        let y_val = parse_cell(row.get(y_idx).map(String::as_str).unwrap_or(""), y, row_idx)?;
        if let (Some(xv), Some(yv)) = (x_val, y_val) {
            points.push((xv, yv));
        }
    }
    Ok(points)
}

/// Categories of `x` in first-appearance order with `y` summed per category.
/// Without `y`, rows are counted.
pub fn aggregate_by_category(
    data: &Dataset,
    rows: &[usize],
    x: &str,
    y: Option<&str>,
) -> Result<(Vec<String>, Vec<f64>)> {
    let x_idx = require_column(data, x)?;
    let y_idx = y.map(|name| require_column(data, name)).transpose()?;

    let mut category_values: HashMap<String, f64> = HashMap::new();
    let mut categories_order: Vec<String> = Vec::new();

    for &row_idx in rows {
        let row = &data.rows[row_idx];
        let category = row.get(x_idx).cloned().unwrap_or_default();
        let amount = match (y_idx, y) {
            (Some(idx), Some(name)) => {
                match parse_cell(row.get(idx).map(String::as_str).unwrap_or(""), name, row_idx)? {
                    Some(v) => v,
                    None => continue,
                }
            }
            _ => 1.0,
        };

        // Track category order (first appearance)
        if !category_values.contains_key(&category) {
            categories_order.push(category.clone());
        }

        *category_values.entry(category).or_insert(0.0) += amount;
    }

    let values = categories_order
        .iter()
        .map(|cat| category_values.get(cat).copied().unwrap_or(0.0))
        .collect();

    Ok((categories_order, values))
}

/// Row indices grouped by the value of `column`, groups sorted by key.
/// Without a column, all rows form one unnamed group.
pub fn group_rows(data: &Dataset, column: Option<&str>) -> Result<Vec<(String, Vec<usize>)>> {
    let Some(name) = column else {
        return Ok(vec![(String::new(), (0..data.rows.len()).collect())]);
    };
    let idx = require_column(data, name)?;

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (row_idx, cell) in data.column(idx).enumerate() {
        groups.entry(cell.to_string()).or_default().push(row_idx);
    }

    let mut keyed: Vec<(String, Vec<usize>)> = groups.into_iter().collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed)
}

/// Equal-width histogram bins as (start, end, count).
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let bins = bins.max(1);
    let Some((min, max)) = crate::scale::min_max(values.iter().copied()) else {
        return Vec::new();
    };
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
    let mut counts = vec![0usize; bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let slot = (((v - min) / width) as usize).min(bins - 1);
        counts[slot] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect()
}

/// Five-number summary with 1.5 IQR whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let inside: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lower_fence && *v <= upper_fence)
        .collect();
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < lower_fence || *v > upper_fence)
        .collect();

    Some(BoxStats {
        min: inside.first().copied().unwrap_or(q1),
        q1,
        median,
        q3,
        max: inside.last().copied().unwrap_or(q3),
        outliers,
    })
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetId;

    /// Helper to create test data
    fn make_data(headers: Vec<&str>, rows: Vec<Vec<&str>>) -> Dataset {
        Dataset::new(
            DatasetId::new("t"),
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn all_rows(data: &Dataset) -> Vec<usize> {
        (0..data.rows.len()).collect()
    }

    #[test]
    fn test_parse_finite() {
        assert_eq!(parse_finite(" 2.5 "), Some(2.5));
        assert_eq!(parse_finite("NaN"), None);
        assert_eq!(parse_finite("-inf"), None);
        let data = make_data(vec!["v"], vec![vec!["1"], vec!["nan"]]);
        assert!(numeric_column(&data, "v").is_err());
    }

    #[test]
    fn test_aggregate_by_category_basic() {
        let data = make_data(
            vec!["category", "value"],
            vec![vec!["A", "10"], vec!["B", "20"], vec!["C", "30"]],
        );
        let (categories, values) =
            aggregate_by_category(&data, &all_rows(&data), "category", Some("value")).unwrap();
        assert_eq!(categories, vec!["A", "B", "C"]);
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_aggregate_by_category_sums_and_counts() {
        let data = make_data(
            vec!["category", "value"],
            vec![vec!["A", "10"], vec!["B", "20"], vec!["A", "15"]],
        );
        let rows = all_rows(&data);
        let (categories, values) = aggregate_by_category(&data, &rows, "category", Some("value")).unwrap();
        assert_eq!(categories, vec!["A", "B"]);
        assert_eq!(values, vec![25.0, 20.0]);

        let (_, counts) = aggregate_by_category(&data, &rows, "category", None).unwrap();
        assert_eq!(counts, vec![2.0, 1.0]);
    }

    #[test]
    fn test_aggregate_column_not_found() {
        let data = make_data(vec!["a", "b"], vec![vec!["1", "2"]]);
        let result = aggregate_by_category(&data, &[0], "nonexistent", Some("b"));
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_aggregate_non_numeric_y() {
        let data = make_data(vec!["category", "value"], vec![vec!["A", "not_a_number"]]);
        let result = aggregate_by_category(&data, &[0], "category", Some("value"));
        assert!(result.unwrap_err().to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_numeric_pairs_skip_empty() {
        let data = make_data(vec!["x", "y"], vec![vec!["1", "2"], vec!["", "3"], vec!["4", "5"]]);
        let points = numeric_pairs(&data, &all_rows(&data), "x", "y").unwrap();
        assert_eq!(points, vec![(1.0, 2.0), (4.0, 5.0)]);
    }

    #[test]
    fn test_group_rows_sorted() {
        let data = make_data(vec!["g"], vec![vec!["b"], vec!["a"], vec!["b"]]);
        let groups = group_rows(&data, Some("g")).unwrap();
        assert_eq!(groups, vec![("a".to_string(), vec![1]), ("b".to_string(), vec![0, 2])]);
        let single = group_rows(&data, None).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].1, vec![0, 1, 2]);
    }

    #[test]
    fn test_histogram() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0], (0.0, 2.0, 2));
        assert_eq!(bins[1], (2.0, 4.0, 3));
        assert!(histogram(&[], 4).is_empty());
    }

    #[test]
    fn test_box_stats() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.max, 4.0);
        assert!(box_stats(&[]).is_none());
    }
}
