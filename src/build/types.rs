use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Target architecture of a generated build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    X86_64,
    Aarch64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "aarch64" | "arm64" => Ok(Architecture::Aarch64),
            other => Err(format!(
                "unsupported architecture '{}' (expected x86_64 or aarch64)",
                other
            )),
        }
    }
}

/// Knobs passed to the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub architecture: Architecture,
    /// Generate even when the recipe does not list `architecture`.
    pub ignore_architecture: bool,
    pub max_parallel_jobs: Option<u32>,
    /// Passed through to the generator verbatim.
    pub options: BTreeMap<String, String>,
}

/// Artifacts of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    pub name: String,
    pub version: String,
    pub tag: String,
    pub build_directory: String,
    pub dockerfile: String,
    pub readme: Option<String>,
    pub deploy_bins: Vec<String>,
    pub deploy_path: Vec<String>,
}

/// Outcome of `generate`.
///
/// A rejected recipe is a normal answer from the generator, not a fault of
/// the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Built(BuildResult),
    Rejected { detail: String },
}

#[cfg(test)]
impl Generation {
    pub fn into_artifact(self) -> Option<BuildResult> {
        match self {
            Generation::Built(result) => Some(result),
            Generation::Rejected { .. } => None,
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, Generation::Built(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Provisioning,
    Ready,
    Generating,
    /// Provisioning failed; the sandbox is unusable for the process lifetime.
    Failed(String),
}

/// Generator's own report, as returned by the sandbox.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum GeneratorOutcome {
    Built(GeneratorReport),
    Rejected(String),
}

#[derive(Debug, Deserialize)]
pub(super) struct GeneratorReport {
    pub name: String,
    pub version: String,
    pub tag: String,
    pub build_directory: String,
    #[serde(default)]
    pub deploy_bins: Vec<String>,
    #[serde(default)]
    pub deploy_path: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_parse() {
        assert_eq!("x86_64".parse::<Architecture>().unwrap(), Architecture::X86_64);
        assert_eq!("ARM64".parse::<Architecture>().unwrap(), Architecture::Aarch64);
        assert!("riscv64".parse::<Architecture>().is_err());
        assert_eq!(Architecture::default().to_string(), "x86_64");
    }

    #[test]
    fn test_generator_outcome_shapes() {
        let built: GeneratorOutcome = serde_json::from_value(serde_json::json!({
            "built": {
                "name": "tool",
                "version": "1.0",
                "tag": "tool:1.0",
                "build_directory": "/tmp/out/tool"
            }
        }))
        .unwrap();
        match built {
            GeneratorOutcome::Built(report) => {
                assert_eq!(report.tag, "tool:1.0");
                assert!(report.deploy_bins.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let rejected: GeneratorOutcome =
            serde_json::from_value(serde_json::json!({ "rejected": "no base image" })).unwrap();
        assert!(matches!(rejected, GeneratorOutcome::Rejected(d) if d == "no base image"));
    }

    #[test]
    fn test_into_artifact() {
        let rejected = Generation::Rejected {
            detail: "missing".into(),
        };
        assert!(!rejected.is_built());
        assert!(rejected.into_artifact().is_none());
    }
}
