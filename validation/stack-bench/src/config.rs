//! Benchmark scenario loading.

use std::path::Path;

use raster_common::FillValue;
use raster_stack::{ChunkSpec, NodataPolicy, StackConfig};
use serde::{Deserialize, Serialize};

/// One benchmark scenario, loaded from YAML or assembled from CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub items: usize,
    pub assets: usize,
    pub rows: usize,
    pub cols: usize,
    #[serde(default = "default_chunksize")]
    pub chunksize: ChunkSpec,
    /// Fraction of asset-table cells that carry a URL.
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "FillValue::nan")]
    pub fill_value: FillValue,
    #[serde(default)]
    pub errors_as_nodata: NodataPolicy,
    /// Worker threads for compute; 0 lets rayon decide.
    #[serde(default)]
    pub threads: usize,
    /// Compute only this many chunks, spread evenly over the output.
    #[serde(default)]
    pub sample: Option<usize>,
}

fn default_chunksize() -> ChunkSpec {
    ChunkSpec::uniform(raster_stack::DEFAULT_CHUNKSIZE)
}

fn default_density() -> f64 {
    1.0
}

impl BenchConfig {
    /// Load a scenario from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BenchConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the scenario.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rows == 0 || self.cols == 0 {
            anyhow::bail!("rows and cols must be > 0");
        }
        if !(0.0..=1.0).contains(&self.density) {
            anyhow::bail!("density must be between 0 and 1, got {}", self.density);
        }
        if self.sample == Some(0) {
            anyhow::bail!("sample must be > 0 when set");
        }
        self.chunksize.validate()?;
        Ok(())
    }

    /// The stack configuration this scenario builds with.
    pub fn stack_config(&self) -> StackConfig {
        StackConfig::default()
            .with_chunksize(self.chunksize.clone())
            .with_fill_value(self.fill_value)
            .with_errors_as_nodata(self.errors_as_nodata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_with_defaults() {
        let yaml = r#"
name: wide
items: 50
assets: 20
rows: 10000
cols: 10000
chunksize: 2000
"#;
        let config: BenchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.chunksize, ChunkSpec::uniform(2000));
        assert_eq!(config.density, 1.0);
        assert!(config.fill_value.as_f64().is_nan());
        assert_eq!(config.threads, 0);
        assert!(config.sample.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: small\nitems: 2\nassets: 3\nrows: 64\ncols: 64\nchunksize: [16, -1]\ndensity: 0.5\nsample: 4"
        )
        .unwrap();

        let config = BenchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "small");
        assert_eq!(config.sample, Some(4));
        assert_eq!(config.stack_config().chunksize, config.chunksize);
    }

    #[test]
    fn test_validation() {
        let mut config: BenchConfig =
            serde_yaml::from_str("name: x\nitems: 1\nassets: 1\nrows: 8\ncols: 8").unwrap();
        assert!(config.validate().is_ok());

        config.density = 1.5;
        assert!(config.validate().is_err());
        config.density = 0.5;

        config.sample = Some(0);
        assert!(config.validate().is_err());
        config.sample = None;

        config.chunksize = ChunkSpec::uniform(0);
        assert!(config.validate().is_err());
    }
}
