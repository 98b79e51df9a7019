use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use drp_object::ObjectConfig;

use crate::cli::SimulateArgs;

/// Parameters of a `drp simulate` run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub peers: usize,
    /// Operations issued by each peer.
    pub ops: usize,
    pub seed: u64,
    /// Values are drawn from `0..value_range`.
    pub value_range: u64,
    /// Probability that an operation is a remove.
    pub remove_ratio: f64,
    pub finality: bool,
    pub object: ObjectConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            peers: 3,
            ops: 20,
            seed: 0,
            value_range: 16,
            remove_ratio: 0.3,
            finality: false,
            object: ObjectConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Config file (or defaults) with command-line overrides applied.
    pub fn from_args(args: &SimulateArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(peers) = args.peers {
            config.peers = peers;
        }
        if let Some(ops) = args.ops {
            config.ops = ops;
        }
        if let Some(seed) = args.seed {
            config.seed = seed;
        }
        config.finality |= args.finality;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.peers >= 1, "at least one peer is required");
        anyhow::ensure!(self.value_range >= 1, "value_range must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.remove_ratio),
            "remove_ratio must be within [0, 1]"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(config: Option<&Path>) -> SimulateArgs {
        SimulateArgs {
            config: config.map(Path::to_path_buf),
            peers: None,
            ops: None,
            seed: None,
            finality: false,
        }
    }

    #[test]
    fn defaults_without_file() {
        let config = SimulationConfig::from_args(&args(None)).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "peers = 5\nops = 7\nremove_ratio = 0.5\n\n[object]\nrequire_signatures = true\n\n[object.finality]\nfinality_threshold = 0.67"
        )
        .unwrap();

        let mut a = args(Some(file.path()));
        a.ops = Some(2);
        a.finality = true;
        let config = SimulationConfig::from_args(&a).unwrap();
        assert_eq!(config.peers, 5);
        assert_eq!(config.ops, 2);
        assert_eq!(config.remove_ratio, 0.5);
        assert!(config.finality);
        assert!(config.object.require_signatures);
        assert_eq!(config.object.finality.finality_threshold, 0.67);
        assert_eq!(config.value_range, 16);
    }

    #[test]
    fn rejects_bad_ratio() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "remove_ratio = 1.5").unwrap();
        assert!(SimulationConfig::from_args(&args(Some(file.path()))).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(SimulationConfig::from_args(&args(Some(&missing))).is_err());
    }
}
