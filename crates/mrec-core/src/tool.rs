//! Processing-cycle driver around [`CandidateWriter`].

use std::collections::BTreeMap;

use mrec_error::{RecoError, Result};
use mrec_recon::{MuonReconstructor, ReconStrategies};
use mrec_store::{ChannelMasking, EventCursor, OutputStore};
use mrec_types::{Candidate, EventCategory};
use tracing::{debug, error, info};

use crate::config::WriteOutConfig;
use crate::report::{CycleReport, WriteOutReport};
use crate::writeout::CandidateWriter;

/// Named event-store readers and output stores available to tools.
pub struct StoreRegistry<S> {
    readers: BTreeMap<String, S>,
    writers: BTreeMap<String, Box<dyn OutputStore>>,
}

impl<S> Default for StoreRegistry<S> {
    fn default() -> Self {
        Self {
            readers: BTreeMap::new(),
            writers: BTreeMap::new(),
        }
    }
}

impl<S> std::fmt::Debug for StoreRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> StoreRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reader` under `name`.
    ///
    /// # Errors
    ///
    /// Fails if a reader of that name is already registered.
    pub fn register_reader(&mut self, name: impl Into<String>, reader: S) -> Result<()> {
        let name = name.into();
        if self.readers.contains_key(&name) {
            return Err(RecoError::Config(format!(
                "reader '{name}' is already registered"
            )));
        }
        self.readers.insert(name, reader);
        Ok(())
    }

    /// Register `store` under its own name.
    ///
    /// # Errors
    ///
    /// Fails if a writer of that name is already registered.
    pub fn register_writer(&mut self, store: Box<dyn OutputStore>) -> Result<()> {
        let name = store.name().to_owned();
        if self.writers.contains_key(&name) {
            return Err(RecoError::Config(format!(
                "writer '{name}' is already registered"
            )));
        }
        self.writers.insert(name, store);
        Ok(())
    }

    pub fn reader(&self, name: &str) -> Result<&S> {
        self.readers.get(name).ok_or_else(|| unknown(name))
    }

    pub fn reader_mut(&mut self, name: &str) -> Result<&mut S> {
        self.readers.get_mut(name).ok_or_else(|| unknown(name))
    }

    pub fn writer_mut(&mut self, name: &str) -> Result<&mut dyn OutputStore> {
        match self.writers.get_mut(name) {
            Some(store) => Ok(store.as_mut()),
            None => Err(unknown(name)),
        }
    }

    /// Rows written so far by the named writer.
    pub fn rows_written(&mut self, name: &str) -> Result<u64> {
        Ok(self.writer_mut(name)?.rows_written())
    }

    /// The named reader and writer, borrowed together.
    fn bind(&mut self, reader: &str, writer: &str) -> Result<(&mut S, &mut dyn OutputStore)> {
        let reader = self.readers.get_mut(reader).ok_or_else(|| unknown(reader))?;
        let writer = self.writers.get_mut(writer).ok_or_else(|| unknown(writer))?;
        Ok((reader, writer.as_mut()))
    }

    fn require_writer(&self, name: &str) -> Result<()> {
        if self.writers.contains_key(name) {
            Ok(())
        } else {
            Err(unknown(name))
        }
    }
}

fn unknown(name: &str) -> RecoError {
    RecoError::UnknownStore {
        name: name.to_owned(),
    }
}

/// The two candidate queues filled by upstream selection.
#[derive(Debug, Clone, Default)]
pub struct CandidateQueues {
    pub relics: Vec<Candidate>,
    pub muons: Vec<Candidate>,
}

impl CandidateQueues {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relics.is_empty() && self.muons.is_empty()
    }
}

/// Per-record values set by upstream tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedVars {
    /// Whether the precision fit may run for the current record.
    pub try_precision_fit: bool,
}

/// Writes matched candidates to their output stores once per cycle.
#[derive(Debug)]
pub struct MatchedWriteOutTool<S> {
    config: WriteOutConfig,
    writer: CandidateWriter,
    registry: StoreRegistry<S>,
}

impl<S> MatchedWriteOutTool<S>
where
    S: EventCursor + ChannelMasking,
{
    /// Validate `config` and bind to the reader and writers it names.
    ///
    /// # Errors
    ///
    /// Returns [`RecoError::Config`] for an invalid configuration and
    /// [`RecoError::UnknownStore`] when a named store is not registered.
    pub fn initialise(
        config: WriteOutConfig,
        registry: StoreRegistry<S>,
        strategies: ReconStrategies,
    ) -> Result<Self> {
        config.validate()?;
        registry.reader(&config.reader_name)?;
        registry.require_writer(&config.relic_writer_name)?;
        registry.require_writer(&config.muon_writer_name)?;

        let reconstructor = MuonReconstructor::new(strategies, config.policy);
        let writer = CandidateWriter::new(
            reconstructor,
            config.hit_overflow,
            config.precision_fit_enabled(),
        );
        info!(
            reader = %config.reader_name,
            relic_writer = %config.relic_writer_name,
            muon_writer = %config.muon_writer_name,
            precision_fit = config.precision_fit_enabled(),
            "matched write-out initialised"
        );
        Ok(Self {
            config,
            writer,
            registry,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &WriteOutConfig {
        &self.config
    }

    /// The event store the tool reads from.
    pub fn reader(&self) -> Result<&S> {
        self.registry.reader(&self.config.reader_name)
    }

    /// Mutable access to the bound event store, e.g. to advance the stream
    /// between cycles.
    pub fn reader_mut(&mut self) -> Result<&mut S> {
        self.registry.reader_mut(&self.config.reader_name)
    }

    pub fn registry_mut(&mut self) -> &mut StoreRegistry<S> {
        &mut self.registry
    }

    /// Hand the registry back, e.g. to reach the output stores after a run.
    #[must_use]
    pub fn into_registry(self) -> StoreRegistry<S> {
        self.registry
    }

    /// Write out whatever is queued: low-energy candidates first, then muons.
    ///
    /// Both categories are attempted even if the first one fails.
    ///
    /// # Errors
    ///
    /// Returns the first write-out error once both categories were tried.
    /// Every attempted queue is left empty.
    pub fn execute(
        &mut self,
        queues: &mut CandidateQueues,
        vars: &SharedVars,
    ) -> Result<CycleReport> {
        let mut cycle = CycleReport::default();
        let mut first_error = None;
        if !queues.relics.is_empty() {
            match self.write_category(&mut queues.relics, EventCategory::LowEnergy, vars) {
                Ok(report) => cycle.lowe = Some(report),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if !queues.muons.is_empty() {
            match self.write_category(&mut queues.muons, EventCategory::Muon, vars) {
                Ok(report) => cycle.muon = Some(report),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(cycle),
        }
    }

    /// Flush anything still queued, then flush both writers.
    ///
    /// The writers are flushed even when the write-out fails.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`], otherwise the first writer flush failure.
    pub fn finalise(
        &mut self,
        queues: &mut CandidateQueues,
        vars: &SharedVars,
    ) -> Result<CycleReport> {
        let outcome = self.execute(queues, vars);
        let flushed = self.flush_writers();
        let cycle = outcome?;
        flushed?;
        info!(rows = cycle.rows_appended(), "matched write-out finalised");
        Ok(cycle)
    }

    fn flush_writers(&mut self) -> Result<()> {
        let mut first_error = None;
        for name in [&self.config.relic_writer_name, &self.config.muon_writer_name] {
            let flushed = self.registry.writer_mut(name).and_then(|output| {
                debug!(writer = %name, rows = output.rows_written(), "flushing writer");
                output.flush()
            });
            if let Err(err) = flushed {
                error!(writer = %name, error = %err, "writer flush failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn write_category(
        &mut self,
        queue: &mut Vec<Candidate>,
        category: EventCategory,
        vars: &SharedVars,
    ) -> Result<WriteOutReport> {
        let name = match category {
            EventCategory::LowEnergy => &self.config.relic_writer_name,
            EventCategory::Muon => &self.config.muon_writer_name,
        };
        let outcome = self
            .registry
            .bind(&self.config.reader_name, name)
            .and_then(|(store, output)| {
                self.writer
                    .write_out(store, queue, output, category, vars.try_precision_fit)
            });
        if let Err(err) = &outcome {
            queue.clear();
            error!(
                category = category.as_str(),
                error = %err,
                "write-out failed"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use mrec_recon::ScriptedStrategies;
    use mrec_store::{MemoryEventStore, MemoryOutputStore, OutputRow};
    use mrec_types::{EventRecord, LowEPayload};

    /// Memory store that counts its flushes.
    struct FlushCounter {
        inner: MemoryOutputStore,
        flushes: Rc<Cell<u32>>,
    }

    impl OutputStore for FlushCounter {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn append_row(&mut self, row: OutputRow) -> Result<()> {
            self.inner.append_row(row)
        }

        fn rows_written(&self) -> u64 {
            self.inner.rows_written()
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes.set(self.flushes.get() + 1);
            Ok(())
        }
    }

    fn registry(store: MemoryEventStore) -> StoreRegistry<MemoryEventStore> {
        let mut registry = StoreRegistry::new();
        registry.register_reader("reader", store).unwrap();
        registry
            .register_writer(Box::new(MemoryOutputStore::new("mu_writer")))
            .unwrap();
        registry
            .register_writer(Box::new(MemoryOutputStore::new("relic_writer")))
            .unwrap();
        registry
    }

    fn tool_over(store: MemoryEventStore) -> MatchedWriteOutTool<MemoryEventStore> {
        MatchedWriteOutTool::initialise(
            WriteOutConfig::default(),
            registry(store),
            ScriptedStrategies::new().build(),
        )
        .unwrap()
    }

    fn tool() -> MatchedWriteOutTool<MemoryEventStore> {
        tool_over(MemoryEventStore::new(vec![EventRecord::default(); 3]))
    }

    #[test]
    fn missing_writer_fails_initialise() {
        let config = WriteOutConfig {
            muon_writer_name: "elsewhere".to_owned(),
            ..WriteOutConfig::default()
        };
        let err = MatchedWriteOutTool::initialise(
            config,
            registry(MemoryEventStore::default()),
            ScriptedStrategies::new().build(),
        )
        .unwrap_err();
        assert!(matches!(err, RecoError::UnknownStore { name } if name == "elsewhere"));
    }

    #[test]
    fn missing_reader_fails_initialise() {
        let mut registry: StoreRegistry<MemoryEventStore> = StoreRegistry::new();
        registry
            .register_writer(Box::new(MemoryOutputStore::new("mu_writer")))
            .unwrap();
        let err = MatchedWriteOutTool::initialise(
            WriteOutConfig::default(),
            registry,
            ScriptedStrategies::new().build(),
        )
        .unwrap_err();
        assert!(matches!(err, RecoError::UnknownStore { name } if name == "reader"));
    }

    #[test]
    fn duplicate_stores_rejected() {
        let mut registry = registry(MemoryEventStore::default());
        let err = registry
            .register_writer(Box::new(MemoryOutputStore::new("mu_writer")))
            .unwrap_err();
        assert!(matches!(err, RecoError::Config(_)));
        let err = registry
            .register_reader("reader", MemoryEventStore::default())
            .unwrap_err();
        assert!(matches!(err, RecoError::Config(_)));
    }

    #[test]
    fn execute_reads_from_the_configured_reader() {
        let mut bound = MemoryEventStore::new(vec![EventRecord::default(); 4]);
        bound.seek(3).unwrap();
        let mut registry = registry(bound);
        registry
            .register_reader("other", MemoryEventStore::new(Vec::new()))
            .unwrap();
        let mut tool = MatchedWriteOutTool::initialise(
            WriteOutConfig::default(),
            registry,
            ScriptedStrategies::new().build(),
        )
        .unwrap();
        tool.reader_mut().unwrap().clear_loads();

        let mut queues = CandidateQueues {
            relics: vec![Candidate::low_energy(1, LowEPayload::default())],
            muons: Vec::new(),
        };
        tool.execute(&mut queues, &SharedVars::default()).unwrap();

        let reader = tool.reader().unwrap();
        let entries: Vec<u64> = reader.loads().iter().map(|load| load.entry).collect();
        assert_eq!(entries, vec![1, 3]);
        assert_eq!(reader.position(), 3);
        let mut registry = tool.into_registry();
        assert!(registry.reader("other").unwrap().loads().is_empty());
        assert_eq!(registry.rows_written("relic_writer").unwrap(), 1);
    }

    #[test]
    fn execute_writes_only_non_empty_queues() {
        let mut tool = tool();
        let mut queues = CandidateQueues {
            relics: vec![Candidate::low_energy(1, LowEPayload::default())],
            muons: Vec::new(),
        };
        let cycle = tool.execute(&mut queues, &SharedVars::default()).unwrap();
        assert!(cycle.muon.is_none());
        assert_eq!(cycle.lowe.as_ref().map(|r| r.rows_appended), Some(1));
        assert!(queues.is_empty());
        assert_eq!(tool.registry_mut().rows_written("relic_writer").unwrap(), 1);
        assert_eq!(tool.registry_mut().rows_written("mu_writer").unwrap(), 0);
    }

    #[test]
    fn failed_relic_write_out_still_writes_muons() {
        let mut store = MemoryEventStore::new(vec![EventRecord::default(); 3]);
        store.fail_entry(1);
        let mut tool = tool_over(store);
        let mut queues = CandidateQueues {
            relics: vec![Candidate::low_energy(1, LowEPayload::default())],
            muons: vec![Candidate::muon(2)],
        };
        let err = tool
            .execute(&mut queues, &SharedVars::default())
            .unwrap_err();
        assert!(matches!(err, RecoError::Read { entry: 1, .. }));
        assert!(queues.is_empty());
        assert_eq!(tool.registry_mut().rows_written("mu_writer").unwrap(), 1);
        assert_eq!(tool.registry_mut().rows_written("relic_writer").unwrap(), 0);
    }

    #[test]
    fn finalise_flushes_leftover_queue() {
        let mut tool = tool();
        let mut queues = CandidateQueues {
            relics: Vec::new(),
            muons: vec![Candidate::muon(2)],
        };
        let cycle = tool.finalise(&mut queues, &SharedVars::default()).unwrap();
        assert_eq!(cycle.rows_appended(), 1);
        let mut registry = tool.into_registry();
        assert_eq!(registry.rows_written("mu_writer").unwrap(), 1);
    }

    #[test]
    fn finalise_writes_muons_and_flushes_after_relic_failure() {
        let mut store = MemoryEventStore::new(vec![EventRecord::default(); 3]);
        store.fail_entry(1);
        let flushes = Rc::new(Cell::new(0));
        let mut registry = StoreRegistry::new();
        registry.register_reader("reader", store).unwrap();
        for name in ["mu_writer", "relic_writer"] {
            registry
                .register_writer(Box::new(FlushCounter {
                    inner: MemoryOutputStore::new(name),
                    flushes: Rc::clone(&flushes),
                }))
                .unwrap();
        }
        let mut tool = MatchedWriteOutTool::initialise(
            WriteOutConfig::default(),
            registry,
            ScriptedStrategies::new().build(),
        )
        .unwrap();
        let mut queues = CandidateQueues {
            relics: vec![Candidate::low_energy(1, LowEPayload::default())],
            muons: vec![Candidate::muon(2)],
        };

        let err = tool
            .finalise(&mut queues, &SharedVars::default())
            .unwrap_err();
        assert!(matches!(err, RecoError::Read { entry: 1, .. }));
        assert!(queues.is_empty());
        assert_eq!(flushes.get(), 2);
        let mut registry = tool.into_registry();
        assert_eq!(registry.rows_written("mu_writer").unwrap(), 1);
        assert_eq!(registry.rows_written("relic_writer").unwrap(), 0);
    }
}
