use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use journal_core::{
    ChangeEvent, ChangeLog, DirectoryStore, FetchRequest, Hammer, HammerConfig, HammerReport,
    HammerRun, Record, RecordId, RowChange, SectionChange, SessionConfig, SessionContext,
    StorageError,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Executes scenarios against a real session over a temp directory
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    config: SessionConfig,
    session: Option<SessionContext>,
    log: ChangeLog,
    clock: MockClock,
    entries: HashMap<String, Record>,
    hammer: Option<HammerRun>,
    hammer_report: HammerReport,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner with an empty storage directory
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Create a runner whose sessions use `config`
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let workspace = TestWorkspace::empty()?;
        let (session, log) = open_session(&workspace, &config)?;

        Ok(Self {
            workspace,
            config,
            session: Some(session),
            log,
            clock: MockClock::new(),
            entries: HashMap::new(),
            hammer: None,
            hammer_report: HammerReport::default(),
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::SessionAdd { label, content } => self.handle_session_add(label, content),
            ScenarioStep::SessionDelete { label } => self.handle_session_delete(label),
            ScenarioStep::SessionStage { label, content } => {
                self.handle_session_stage(label, content)
            }
            ScenarioStep::SessionSave => Ok(self.session()?.save()?),
            ScenarioStep::SessionRefresh => {
                self.session()?.refresh()?;
                Ok(())
            }
            ScenarioStep::SessionChurn { count } => self.handle_session_churn(*count),

            ScenarioStep::ExternalWrite { label, content } => {
                let record = Record::new(content.as_str(), self.clock.tick());
                self.workspace.write_record(&record)?;
                self.entries.insert(label.clone(), record);
                Ok(())
            }
            ScenarioStep::ExternalPartialWrite { label, content } => {
                let record = Record::new(content.as_str(), self.clock.tick());
                self.workspace.write_partial_record(&record)?;
                self.entries.insert(label.clone(), record);
                Ok(())
            }
            ScenarioStep::ExternalFinishWrite { label } => {
                let record = self.entry(label)?.clone();
                self.workspace.write_record(&record)
            }
            ScenarioStep::ExternalRetime { label, offset } => {
                let old = self.entry(label)?;
                let record = Record::with_id(old.id().clone(), old.content(), old.timestamp() + *offset);
                self.workspace.write_record(&record)?;
                self.entries.insert(label.clone(), record);
                Ok(())
            }
            ScenarioStep::ExternalDelete { label } => {
                let id = self.entry(label)?.id().clone();
                self.workspace.remove_record(&id)
            }
            ScenarioStep::ExternalStrayFile { name } => {
                self.workspace.write_file(name, b"not a journal entry")
            }

            ScenarioStep::HammerStart { config } => {
                ensure!(self.hammer.is_none(), "hammer already running");
                let run = Hammer::new(self.workspace.data_dir(), config.clone()).hammer()?;
                self.hammer = Some(run);
                Ok(())
            }
            ScenarioStep::HammerJoin => {
                let run = self.hammer.take().ok_or_else(|| anyhow!("hammer not running"))?;
                self.hammer_report = run.join();
                Ok(())
            }
            ScenarioStep::Empty => {
                let config = HammerConfig {
                    empty_delay_ms: 0,
                    ..HammerConfig::default()
                };
                Hammer::new(self.workspace.data_dir(), config).empty()?.join();
                Ok(())
            }

            ScenarioStep::Wait { duration } => {
                std::thread::sleep(*duration);
                Ok(())
            }
            ScenarioStep::AdvanceClock { duration } => {
                self.clock.advance(*duration);
                Ok(())
            }

            ScenarioStep::Reopen => self.handle_reopen(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn session(&self) -> Result<&SessionContext> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("Session not available"))
    }

    fn entry(&self, label: &str) -> Result<&Record> {
        self.entries
            .get(label)
            .ok_or_else(|| anyhow!("Unknown entry label: {}", label))
    }

    fn label_of(&self, id: &RecordId) -> String {
        self.entries
            .iter()
            .find(|(_, record)| record.id() == id)
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    // ===== Session action handlers =====

    fn handle_session_add(&mut self, label: &str, content: &str) -> Result<()> {
        let timestamp = self.clock.tick();
        let record = self.session()?.insert_new(content, timestamp)?;
        self.entries.insert(label.to_string(), record);
        Ok(())
    }

    fn handle_session_delete(&mut self, label: &str) -> Result<()> {
        let record = self.entry(label)?.clone();
        self.session()?.delete(&record)?;
        Ok(())
    }

    fn handle_session_stage(&mut self, label: &str, content: &str) -> Result<()> {
        let id = self.entry(label)?.id().clone();
        self.session()?.stage_content(&id, content)?;
        Ok(())
    }

    fn handle_session_churn(&mut self, count: usize) -> Result<()> {
        for i in 0..count {
            self.handle_session_add(&format!("churn-{}", i), &format!("churn entry {}", i))?;
            self.session()?.refresh()?;
        }
        for i in (1..count).step_by(2) {
            self.handle_session_delete(&format!("churn-{}", i))?;
            self.session()?.refresh()?;
        }
        Ok(())
    }

    // ===== Lifecycle handlers =====

    fn handle_reopen(&mut self) -> Result<()> {
        // Drop the old session first so its directory lock is released.
        self.session = None;
        let (session, log) = open_session(&self.workspace, &self.config)?;
        self.session = Some(session);
        self.log = log;
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::RecordCount(expected) => {
                let actual = self.session()?.len()?;
                ensure!(actual == *expected, "Expected {} entries, found {}", expected, actual);
                Ok(())
            }
            Assertion::Order(labels) => {
                let actual: Vec<String> = self
                    .session()?
                    .records()?
                    .iter()
                    .map(|record| self.label_of(record.id()))
                    .collect();
                ensure!(&actual == labels, "Expected order {:?}, found {:?}", labels, actual);
                Ok(())
            }
            Assertion::Contains(label) => {
                let id = self.entry(label)?.id().clone();
                ensure!(self.session()?.get(&id)?.is_some(), "Entry {} not in session", label);
                Ok(())
            }
            Assertion::Absent(label) => {
                let id = self.entry(label)?.id().clone();
                ensure!(self.session()?.get(&id)?.is_none(), "Entry {} still in session", label);
                Ok(())
            }
            Assertion::ContentIs { label, content } => {
                let id = self.entry(label)?.id().clone();
                let record = self
                    .session()?
                    .get(&id)?
                    .ok_or_else(|| anyhow!("Entry {} not in session", label))?;
                ensure!(
                    record.content() == content,
                    "Entry {} has content {:?}, expected {:?}",
                    label,
                    record.content(),
                    content
                );
                Ok(())
            }
            Assertion::HasChanges(expected) => {
                let actual = self.session()?.has_changes()?;
                ensure!(actual == *expected, "Expected has_changes = {}", expected);
                Ok(())
            }
            Assertion::StoreMatchesSession => {
                let session = self.session()?;
                let stored = session.store().fetch_all(FetchRequest::default())?;
                let held = session.records()?;
                ensure!(
                    stored == held,
                    "Storage holds {} entries, session holds {}",
                    stored.len(),
                    held.len()
                );
                Ok(())
            }
            Assertion::StoreWellFormed => self.check_well_formed(),
            Assertion::RecordFileCount(expected) => {
                let actual = self.workspace.record_files().len();
                ensure!(actual == *expected, "Expected {} entry files, found {}", expected, actual);
                Ok(())
            }
            Assertion::FileExists(name) => {
                ensure!(self.workspace.file_exists(name), "File not found: {}", name);
                Ok(())
            }
            Assertion::DirectoryLocked => {
                match DirectoryStore::open_exclusive(self.workspace.data_dir()) {
                    Err(StorageError::Locked(_)) => Ok(()),
                    Err(e) => bail!("Expected Locked, got {}", e),
                    Ok(_) => bail!("Second exclusive open succeeded"),
                }
            }
            Assertion::Notifications(expected) => {
                let actual = self.take_notifications()?;
                ensure!(&actual == expected, "Expected notifications {:?}, got {:?}", expected, actual);
                Ok(())
            }
            Assertion::NoNotifications => {
                let actual = self.take_notifications()?;
                ensure!(actual.is_empty(), "Unexpected notifications: {:?}", actual);
                Ok(())
            }
            Assertion::HammerCreated(expected) => {
                ensure!(
                    self.hammer_report.created == *expected,
                    "Hammer created {} files, expected {}",
                    self.hammer_report.created,
                    expected
                );
                Ok(())
            }
            Assertion::Custom(check) => check(self.session()?),
        }
    }

    fn check_well_formed(&self) -> Result<()> {
        let stored = self.session()?.store().fetch_all(FetchRequest::default())?;
        for record in &stored {
            ensure!(
                RecordId::parse(record.id().as_str()).is_some(),
                "Malformed entry id: {:?}",
                record.id()
            );
            if let Some(rest) = record.content().strip_prefix("File ") {
                ensure!(
                    rest == record.id().as_str(),
                    "Hammer entry {} has mismatched label {:?}",
                    record.id(),
                    record.content()
                );
            } else {
                ensure!(
                    self.entries.values().any(|known| known.id() == record.id()),
                    "Unexpected entry in storage: {:?}",
                    record
                );
            }
        }
        Ok(())
    }

    /// Drains the change log into readable descriptions, checking that every
    /// notification arrived inside a balanced batch.
    fn take_notifications(&self) -> Result<Vec<String>> {
        let mut in_batch = false;
        let mut described = Vec::new();

        for event in self.log.take() {
            match event {
                ChangeEvent::BeginBatch => {
                    ensure!(!in_batch, "Nested begin_batch");
                    in_batch = true;
                }
                ChangeEvent::EndBatch => {
                    ensure!(in_batch, "end_batch without begin_batch");
                    in_batch = false;
                }
                ChangeEvent::Section(change, index) => {
                    ensure!(in_batch, "Section change outside a batch");
                    ensure!(index == 0, "Unexpected section index {}", index);
                    described.push(match change {
                        SectionChange::Inserted => "section inserted".to_string(),
                        SectionChange::Deleted => "section deleted".to_string(),
                    });
                }
                ChangeEvent::Row(change, record) => {
                    ensure!(in_batch, "Row change outside a batch");
                    let label = self.label_of(record.id());
                    described.push(match change {
                        RowChange::Inserted { at } => format!("inserted {} @{}", label, at.row),
                        RowChange::Deleted { at } => format!("deleted {} @{}", label, at.row),
                        RowChange::Updated { at } => format!("updated {} @{}", label, at.row),
                        RowChange::Moved { from, to } => {
                            format!("moved {} @{}->{}", label, from.row, to.row)
                        }
                    });
                }
            }
        }

        ensure!(!in_batch, "Batch left open");
        Ok(described)
    }
}

fn open_session(
    workspace: &TestWorkspace,
    config: &SessionConfig,
) -> Result<(SessionContext, ChangeLog)> {
    let store = Arc::new(workspace.open_store()?);
    let session = SessionContext::with_config(store, config).context("Failed to open session")?;
    let log = ChangeLog::new();
    session.add_observer(log.clone())?;
    Ok((session, log))
}
