use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use chrono::Duration as ClockDuration;
use journal_core::{HammerConfig, SessionConfig};
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: SessionConfig,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: SessionConfig::default(),
            steps: Vec::new(),
        }
    }

    /// Let sessions reconcile in the background every `interval_ms`
    pub fn polling_every(mut self, interval_ms: u64) -> Self {
        self.config.poll_interval_ms = Some(interval_ms);
        self
    }

    // ===== Session actions =====

    /// Session adds an entry, timestamped one clock tick after the previous one
    pub fn session_adds(mut self, label: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::SessionAdd {
            label: label.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Session deletes an entry
    pub fn session_deletes(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::SessionDelete {
            label: label.to_string(),
        });
        self
    }

    /// Session stages new content for an entry
    pub fn session_edits(mut self, label: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::SessionStage {
            label: label.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Session saves staged edits
    pub fn session_saves(mut self) -> Self {
        self.steps.push(ScenarioStep::SessionSave);
        self
    }

    /// Session reconciles with storage
    pub fn session_refreshes(mut self) -> Self {
        self.steps.push(ScenarioStep::SessionRefresh);
        self
    }

    /// Session adds `count` entries labelled `churn-<i>`, deleting every odd one
    pub fn session_churns(mut self, count: usize) -> Self {
        self.steps.push(ScenarioStep::SessionChurn { count });
        self
    }

    // ===== Outside actions =====

    /// Another process writes a complete entry file
    pub fn external_writes(mut self, label: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::ExternalWrite {
            label: label.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Another process has written only the first line of an entry file
    pub fn external_starts_writing(mut self, label: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::ExternalPartialWrite {
            label: label.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// The interrupted writer finishes the file
    pub fn external_finishes_writing(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::ExternalFinishWrite {
            label: label.to_string(),
        });
        self
    }

    /// Another process rewrites an entry with a shifted timestamp
    pub fn external_retimes(mut self, label: &str, offset: ClockDuration) -> Self {
        self.steps.push(ScenarioStep::ExternalRetime {
            label: label.to_string(),
            offset,
        });
        self
    }

    /// Another process deletes an entry file
    pub fn external_deletes(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::ExternalDelete {
            label: label.to_string(),
        });
        self
    }

    /// Another process drops a file that is not an entry
    pub fn external_stray_file(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::ExternalStrayFile {
            name: name.to_string(),
        });
        self
    }

    // ===== Mutator =====

    /// Start the concurrent mutator
    pub fn hammer_starts(mut self, config: HammerConfig) -> Self {
        self.steps.push(ScenarioStep::HammerStart { config });
        self
    }

    /// Wait for the mutator to finish
    pub fn hammer_finishes(mut self) -> Self {
        self.steps.push(ScenarioStep::HammerJoin);
        self
    }

    /// Run the empty operation and wait for it
    pub fn empty(mut self) -> Self {
        self.steps.push(ScenarioStep::Empty);
        self
    }

    // ===== Time control =====

    /// Wait for a duration
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    /// Move the entry clock forward
    pub fn advance_clock(mut self, duration: ClockDuration) -> Self {
        self.steps.push(ScenarioStep::AdvanceClock { duration });
        self
    }

    // ===== Lifecycle =====

    /// Close the session and open a new one over the same directory
    pub fn reopen(mut self) -> Self {
        self.steps.push(ScenarioStep::Reopen);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert the session holds exactly these entries, in this order
    pub fn assert_order(self, labels: &[&str]) -> Self {
        self.assert(Assertion::Order(labels.iter().map(|l| l.to_string()).collect()))
    }

    /// Assert the number of entries in the session
    pub fn assert_count(self, count: usize) -> Self {
        self.assert(Assertion::RecordCount(count))
    }

    /// Assert storage holds exactly what the session holds
    pub fn assert_store_matches(self) -> Self {
        self.assert(Assertion::StoreMatchesSession)
    }

    /// Assert the notifications seen since the last check
    pub fn assert_notified(self, events: &[&str]) -> Self {
        self.assert(Assertion::Notifications(
            events.iter().map(|e| e.to_string()).collect(),
        ))
    }

    /// Assert nothing was notified since the last check
    pub fn assert_not_notified(self) -> Self {
        self.assert(Assertion::NoNotifications)
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::with_config(self.config.clone()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
