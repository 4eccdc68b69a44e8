//! `quire init [<dir>] [--force]`

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

pub const CONFIG_FILE: &str = "quire.yaml";

const STARTER_CONFIG: &str = r#"# Quire run configuration.
#
# One report is rendered per combination of dimension values, per format.
template: report.qmd

dimensions:
  unit: [Sales, Operations]
  period: [2023, 2024]

# Uncomment to render only these combinations instead of the full product.
# bindings:
#   - { unit: Sales, period: 2024 }

# Passed to every render alongside the dimension values.
params:
  currency: EUR

formats: [pdf]
output_root: output
concurrency: 2
timeout_secs: 600

engine:
  program: quarto
  args: ["render", "{{ template }}", "--to", "{{ format }}",
         "--output", "{{ output_name }}", "--output-dir", "{{ output_dir }}"]
  param_args: ["-P", "{{ name }}:{{ value }}"]
"#;

/// Write a starter quire.yaml.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to create the config in.
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing quire.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create directory '{}'", self.dir.display()))?;
        let path = self.dir.join(CONFIG_FILE);
        if path.exists() && !self.force {
            bail!(
                "'{}' already exists; pass --force to overwrite",
                path.display()
            );
        }
        fs::write(&path, STARTER_CONFIG)
            .with_context(|| format!("failed to write '{}'", path.display()))?;

        println!("✓ Wrote {}", path.display());
        println!("  Next: quire plan {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quire_core::RunConfig;

    use super::*;

    #[test]
    fn starter_config_is_valid() {
        let config = RunConfig::from_yaml_str(STARTER_CONFIG, std::path::Path::new("/proj"))
            .expect("starter config parses");
        assert_eq!(config.space.enumerate().unwrap().len(), 4);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.output_root, PathBuf::from("/proj/output"));
    }
}
