use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Name of the configuration file looked up in an input directory.
pub const CONFIG_FILE: &str = "textdir.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// Accept `{#id .class}` after headings. The id becomes the title anchor.
    pub heading_attributes: bool,
    /// Accept GitHub-style tables.
    pub tables: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        MarkdownOptions {
            heading_attributes: true,
            tables: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RstOptions {
    /// Prefix of the links produced by the `:pep:` role.
    pub pep_base_url: String,
    /// Cell delimiter of `csv-table` directives without a `:delim:` option.
    pub csv_delimiter: String,
}

impl Default for RstOptions {
    fn default() -> Self {
        RstOptions {
            pep_base_url: "https://www.python.org/dev/peps/".to_string(),
            csv_delimiter: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markdown: MarkdownOptions,
    pub rst: RstOptions,
    /// Regular expressions. Files whose name matches one of them are skipped.
    pub exclude: Vec<String>,
    /// Include documents marked with `draft: true`.
    pub drafts: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let input = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Could not read {}", path.as_ref().display()))?;
        let config = input
            .parse()
            .with_context(|| format!("Error loading configuration {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Loads `textdir.yml` from `dir`, or the defaults if there is none.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Config::load(path)
        } else {
            Ok(Config::default())
        }
    }
}

impl FromStr for Config {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(s)
    }
}
