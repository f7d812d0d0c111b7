//! Scripted signal scenarios.
//!
//! A scenario describes one progress-and-final run: what the activity
//! returns when started and which signals an external actor delivers, in
//! order and with delays. Scenarios are defined in YAML and drive the `demo`
//! command.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A complete scenario definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Workflow id to run under (generated when absent)
    #[serde(default)]
    pub workflow_id: Option<String>,

    /// Value the start activity resolves to
    pub start_result: String,

    /// How long the start activity takes
    #[serde(default)]
    pub start_delay_ms: u64,

    /// Name of the progress signal
    #[serde(default = "default_progress_signal")]
    pub progress_signal: String,

    /// Name of the completion signal
    #[serde(default = "default_completion_signal")]
    pub completion_signal: String,

    /// Ordered deliveries made by the external actor
    pub deliveries: Vec<Delivery>,
}

fn default_progress_signal() -> String {
    "progress".to_string()
}

fn default_completion_signal() -> String {
    "completion".to_string()
}

/// One scripted signal delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    /// Signal name
    pub signal: String,

    /// JSON payload
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Delay before this delivery, relative to the previous one
    #[serde(default)]
    pub delay_ms: u64,
}

impl Delivery {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Scenario {
    /// Load a scenario from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a scenario from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse scenario YAML")
    }

    /// The rental-search run: a started job, two progress reports, one summary
    pub fn default_rental_search() -> Self {
        Self {
            name: "rental_search".to_string(),
            description: "Search job reporting listings found, then a final summary".to_string(),
            workflow_id: None,
            start_result: "job-42".to_string(),
            start_delay_ms: 50,
            progress_signal: default_progress_signal(),
            completion_signal: default_completion_signal(),
            deliveries: vec![
                Delivery {
                    signal: default_progress_signal(),
                    payload: serde_json::json!({"message": "found 3 listings"}),
                    delay_ms: 100,
                },
                Delivery {
                    signal: default_progress_signal(),
                    payload: serde_json::json!({"message": "found 7 listings"}),
                    delay_ms: 100,
                },
                Delivery {
                    signal: default_completion_signal(),
                    payload: serde_json::json!({"summary": "done, 7 listings"}),
                    delay_ms: 100,
                },
            ],
        }
    }

    /// Validate the scenario definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Scenario name cannot be empty");
        }

        if self.progress_signal == self.completion_signal {
            anyhow::bail!(
                "Progress and completion signals must differ (both are '{}')",
                self.progress_signal
            );
        }

        for (i, delivery) in self.deliveries.iter().enumerate() {
            if delivery.signal != self.progress_signal && delivery.signal != self.completion_signal {
                anyhow::bail!(
                    "Delivery {} uses unknown signal '{}' (expected '{}' or '{}')",
                    i,
                    delivery.signal,
                    self.progress_signal,
                    self.completion_signal
                );
            }
        }

        if !self
            .deliveries
            .iter()
            .any(|d| d.signal == self.completion_signal)
        {
            anyhow::bail!(
                "Scenario '{}' never delivers '{}'; the run could never finish",
                self.name,
                self.completion_signal
            );
        }

        Ok(())
    }

    /// Number of progress deliveries made before the first completion
    pub fn progress_before_completion(&self) -> usize {
        self.deliveries
            .iter()
            .take_while(|d| d.signal != self.completion_signal)
            .filter(|d| d.signal == self.progress_signal)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_is_valid() {
        let scenario = Scenario::default_rental_search();
        scenario.validate().unwrap();
        assert_eq!(scenario.start_result, "job-42");
        assert_eq!(scenario.progress_before_completion(), 2);
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let yaml = r#"
name: bad
start_result: job-1
deliveries:
  - signal: progres
    payload: { message: "typo" }
  - signal: completion
    payload: { summary: "done" }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("unknown signal 'progres'"));
    }

    #[test]
    fn test_missing_completion_rejected() {
        let yaml = r#"
name: endless
start_result: job-1
deliveries:
  - signal: progress
    payload: { message: "still going" }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("never delivers 'completion'"));
    }
}
