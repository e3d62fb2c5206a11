//! Rendering seam between the pipeline and its presentation.
//!
//! The dashboard only talks to a [`Renderer`]; the bundled
//! [`TextRenderer`] prints plain text and answers every selection widget
//! with its default (nothing deselected, ranges wide open), so a run
//! shows the first-paint state of the dashboard. Tests drive the
//! pipeline with a scripted renderer instead.

use std::fmt::Write as _;

use crate::config::Theme;
use crate::table::column::secs_to_datetime;

/// Presentation surface for one dashboard cycle. Widget methods return
/// the user's selection; render methods emit output.
pub trait Renderer {
    /// Accent palette for backends that draw in color. The text backend
    /// ignores it.
    fn apply_theme(&mut self, _theme: &Theme) {}

    fn heading(&mut self, title: &str);

    fn metric(&mut self, label: &str, value: &str);

    /// A bounded table preview. `rows` is already truncated; `total` is
    /// the size of the view it came from.
    fn render_table(&mut self, headers: &[String], rows: &[Vec<String>], total: usize);

    fn render_bar(&mut self, categories: &[String], values: &[f64], title: &str);

    /// Line chart over pre-ordered x labels.
    fn render_line(&mut self, x: &[String], y: &[f64], title: &str);

    fn render_histogram(&mut self, values: &[f64], bins: usize, title: &str);

    /// Point cloud with an optional per-point group label (empty slice
    /// when the data has no grouping column).
    fn render_scatter(&mut self, x: &[f64], y: &[f64], groups: &[String], title: &str);

    fn render_heatmap(
        &mut self,
        matrix: &[Vec<f64>],
        row_labels: &[String],
        col_labels: &[String],
        title: &str,
    );

    /// Categorical picker; the default is every option selected.
    fn multiselect(&mut self, label: &str, options: &[String], default: &[String]) -> Vec<String>;

    /// Inclusive date window picker over epoch seconds.
    fn date_range(&mut self, label: &str, min: i64, max: i64) -> (i64, i64);

    /// Inclusive numeric window picker.
    fn numeric_range(&mut self, label: &str, min: f64, max: f64) -> (f64, f64);
}

/// Equal-width histogram buckets: `(lo, hi, count)` per bucket, inclusive
/// of the upper edge in the last bucket.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min == max {
        return vec![(min, max, values.len())];
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let mut bucket = ((v - min) / width) as usize;
        if bucket >= bins {
            bucket = bins - 1;
        }
        counts[bucket] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + width * i as f64, min + width * (i + 1) as f64, count))
        .collect()
}

/// Plain-text renderer for terminal runs.
#[derive(Debug, Default)]
pub struct TextRenderer {
    bar_width: usize,
}

impl TextRenderer {
    pub fn new() -> Self {
        TextRenderer { bar_width: 40 }
    }

    fn bar(&self, value: f64, max: f64) -> String {
        if max <= 0.0 || value <= 0.0 {
            return String::new();
        }
        let len = ((value / max) * self.bar_width as f64).round() as usize;
        "#".repeat(len.min(self.bar_width))
    }
}

impl Renderer for TextRenderer {
    fn heading(&mut self, title: &str) {
        println!("\n== {} ==", title);
    }

    fn metric(&mut self, label: &str, value: &str) {
        println!("{}: {}", label, value);
    }

    fn render_table(&mut self, headers: &[String], rows: &[Vec<String>], total: usize) {
        println!("{}", headers.join(" | "));
        for row in rows {
            println!("{}", row.join(" | "));
        }
        if rows.len() < total {
            println!("... {} of {} rows shown", rows.len(), total);
        }
    }

    fn render_bar(&mut self, categories: &[String], values: &[f64], title: &str) {
        println!("\n{}", title);
        let max = values.iter().cloned().fold(0.0_f64, f64::max);
        for (category, &value) in categories.iter().zip(values) {
            println!("  {:<20} {:>12.2} {}", category, value, self.bar(value, max));
        }
    }

    fn render_line(&mut self, x: &[String], y: &[f64], title: &str) {
        println!("\n{}", title);
        let max = y.iter().cloned().fold(0.0_f64, f64::max);
        for (label, &value) in x.iter().zip(y) {
            println!("  {:<10} {:>12.2} {}", label, value, self.bar(value, max));
        }
    }

    fn render_histogram(&mut self, values: &[f64], bins: usize, title: &str) {
        println!("\n{}", title);
        let buckets = histogram_bins(values, bins);
        if buckets.is_empty() {
            println!("  (no data)");
            return;
        }
        let max = buckets.iter().map(|&(_, _, c)| c).max().unwrap_or(0);
        for (lo, hi, count) in buckets {
            println!(
                "  {:>10.2} .. {:>10.2} {:>8} {}",
                lo,
                hi,
                count,
                self.bar(count as f64, max as f64)
            );
        }
    }

    fn render_scatter(&mut self, x: &[f64], y: &[f64], groups: &[String], title: &str) {
        println!("\n{}", title);
        let points = x.len().min(y.len());
        if groups.is_empty() {
            println!("  {} points", points);
        } else {
            let distinct: std::collections::HashSet<&String> = groups.iter().collect();
            println!("  {} points in {} groups", points, distinct.len());
        }
    }

    fn render_heatmap(
        &mut self,
        matrix: &[Vec<f64>],
        row_labels: &[String],
        col_labels: &[String],
        title: &str,
    ) {
        println!("\n{}", title);
        let mut header = String::from("            ");
        for label in col_labels {
            let _ = write!(header, " {:>10.10}", label);
        }
        println!("{}", header);
        for (label, row) in row_labels.iter().zip(matrix) {
            let mut line = String::new();
            let _ = write!(line, "  {:<10.10}", label);
            for &cell in row {
                let _ = write!(line, " {:>10.2}", cell);
            }
            println!("{}", line);
        }
    }

    fn multiselect(&mut self, _label: &str, _options: &[String], default: &[String]) -> Vec<String> {
        default.to_vec()
    }

    fn date_range(&mut self, _label: &str, min: i64, max: i64) -> (i64, i64) {
        (min, max)
    }

    fn numeric_range(&mut self, _label: &str, min: f64, max: f64) -> (f64, f64) {
        (min, max)
    }
}

/// `YYYY-MM-DD` for an epoch-seconds timestamp, or a dash for the null
/// sentinel.
pub fn format_date(secs: i64) -> String {
    match secs_to_datetime(secs) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_cover_the_range_and_count_everything() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 5.0];
        let buckets = histogram_bins(&values, 4);
        assert_eq!(buckets.len(), 4);
        let total: usize = buckets.iter().map(|&(_, _, c)| c).sum();
        assert_eq!(total, values.len());
        assert_eq!(buckets[0].0, 1.0);
        assert_eq!(buckets[3].1, 5.0);
        // Upper edge lands in the last bucket.
        assert_eq!(buckets[3].2, 3);
    }

    #[test]
    fn degenerate_inputs_produce_sane_bins() {
        assert!(histogram_bins(&[], 10).is_empty());
        assert!(histogram_bins(&[1.0, 2.0], 0).is_empty());
        let flat = histogram_bins(&[7.0, 7.0, 7.0], 5);
        assert_eq!(flat, vec![(7.0, 7.0, 3)]);
    }

    #[test]
    fn text_renderer_echoes_defaults() {
        let mut renderer = TextRenderer::new();
        let options = vec!["Nike".to_string(), "Zara".to_string()];
        assert_eq!(
            renderer.multiselect("Brand", &options, &options),
            options
        );
        assert_eq!(renderer.date_range("Dates", 10, 99), (10, 99));
        assert_eq!(renderer.numeric_range("Sales", 1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn null_dates_format_as_dash() {
        assert_eq!(format_date(crate::table::column::NULL_I64), "-");
        assert_eq!(format_date(0), "1970-01-01");
    }
}
