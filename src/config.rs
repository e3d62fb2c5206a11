//! Dashboard configuration.
//!
//! Loaded from an optional `dashboard.toml` plus `RETAIL_INSIGHTS_*`
//! environment overrides. Every field has a default, so the dashboard
//! runs with no configuration at all.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::table::PipelineError;

/// Where the dashboard's table comes from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Generated product catalog, cached as parquet.
    Synthetic {
        #[serde(default = "default_rows")]
        rows: usize,
        #[serde(default)]
        include_name: bool,
        #[serde(default = "default_cache_path")]
        cache_path: PathBuf,
    },
    /// Delimited sales export.
    Csv {
        #[serde(default = "default_csv_path")]
        path: PathBuf,
    },
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Synthetic {
            rows: default_rows(),
            include_name: false,
            cache_path: default_cache_path(),
        }
    }
}

/// Accent colors forwarded to the renderer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Theme {
    pub price_accent: String,
    pub rating_accent: String,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            price_accent: "#2E86AB".to_string(),
            rating_accent: "#F4A261".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: DataSource,
    pub theme: Theme,
    /// Rows shown in the raw-data preview.
    pub preview_limit: usize,
    /// Sample size for the distribution histograms.
    pub histogram_sample: usize,
    /// Seed for the histogram sample, so repeated cycles draw the same
    /// rows.
    pub histogram_seed: u64,
    pub top_categories: usize,
    pub top_brands: usize,
    pub top_products: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            source: DataSource::default(),
            theme: Theme::default(),
            preview_limit: 1_000,
            histogram_sample: 5_000,
            histogram_seed: 42,
            top_categories: 15,
            top_brands: 10,
            top_products: 10,
        }
    }
}

impl DashboardConfig {
    /// Loads configuration from `path` when given, otherwise from an
    /// optional `dashboard.toml` in the working directory, with
    /// `RETAIL_INSIGHTS_*` environment variables layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("dashboard").required(false)),
        };
        let cfg = builder
            .add_source(config::Environment::with_prefix("RETAIL_INSIGHTS").separator("__"))
            .build()
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        cfg.try_deserialize()
            .map_err(|err| PipelineError::Config(err.to_string()))
    }
}

fn default_rows() -> usize {
    100_000
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("ecommerce_data.parquet")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_cover_every_field() {
        let config = DashboardConfig::default();
        assert_eq!(
            config.source,
            DataSource::Synthetic {
                rows: 100_000,
                include_name: false,
                cache_path: PathBuf::from("ecommerce_data.parquet"),
            }
        );
        assert_eq!(config.preview_limit, 1_000);
        assert_eq!(config.histogram_sample, 5_000);
        assert_eq!(config.histogram_seed, 42);
        assert_eq!(config.top_categories, 15);
        assert_eq!(config.top_brands, 10);
        assert_eq!(config.top_products, 10);
        assert_eq!(config.theme.price_accent, "#2E86AB");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut tmp = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            tmp,
            "preview_limit = 25\n\n[source]\nkind = \"csv\"\npath = \"exports/sales.csv\"\n"
        )
        .unwrap();

        let config = DashboardConfig::load(Some(tmp.path())).unwrap();
        assert_eq!(config.preview_limit, 25);
        assert_eq!(
            config.source,
            DataSource::Csv {
                path: PathBuf::from("exports/sales.csv"),
            }
        );
        // Untouched fields keep their defaults.
        assert_eq!(config.histogram_sample, 5_000);
    }

    #[test]
    fn synthetic_source_fills_missing_fields() {
        let mut tmp = NamedTempFile::with_suffix(".toml").unwrap();
        write!(tmp, "[source]\nkind = \"synthetic\"\nrows = 500\n").unwrap();

        let config = DashboardConfig::load(Some(tmp.path())).unwrap();
        assert_eq!(
            config.source,
            DataSource::Synthetic {
                rows: 500,
                include_name: false,
                cache_path: PathBuf::from("ecommerce_data.parquet"),
            }
        );
    }
}
