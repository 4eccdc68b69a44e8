pub mod init;
pub mod plan;
pub mod report;
pub mod run;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use quire_core::{OutputFormat, RunConfig};

/// `--param key=value`, parsed from CLI strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamArg {
    pub name: String,
    pub value: String,
}

impl FromStr for ParamArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected KEY=VALUE, got '{s}'")),
        }
    }
}

impl fmt::Display for ParamArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Config file plus the flags that override its values.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the run configuration (YAML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output root; replaces `output_root` from the file.
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Output format; repeat for several. Replaces `formats` from the file.
    #[arg(long = "format", short = 'f', value_name = "FORMAT")]
    pub formats: Vec<OutputFormat>,

    /// Maximum number of renders running at once.
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-job time limit in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Extra fixed parameter passed to every render; repeatable.
    #[arg(long = "param", short = 'P', value_name = "KEY=VALUE")]
    pub params: Vec<ParamArg>,
}

impl ConfigArgs {
    /// Load the file and apply overrides, then re-validate.
    pub fn load(&self) -> Result<RunConfig> {
        let mut config = RunConfig::load(&self.config)
            .with_context(|| format!("failed to load run config '{}'", self.config.display()))?;

        if let Some(root) = &self.output_root {
            config.output_root = root.clone();
        }
        if !self.formats.is_empty() {
            config.set_formats(self.formats.iter().copied());
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if !self.params.is_empty() {
            config.space.extend_fixed(
                self.params
                    .iter()
                    .map(|p| (p.name.clone(), p.value.clone())),
            );
        }

        config
            .validate()
            .with_context(|| format!("invalid run config '{}'", self.config.display()))?;
        Ok(config)
    }
}
