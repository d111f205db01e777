//! Copying tables, views included, into a datasource.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, info_span};

use vtab_model::{
    Datasource, ModelError, ValueSet, ValueTable, ValueTableWriter, Variable, VariableValueSource,
};

use crate::error::Result;

/// Outcome of one copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub source: String,
    pub destination: String,
    pub variables: usize,
    pub value_sets: usize,
}

/// Copies a value table through a destination's writer.
///
/// Variables are written first, then value sets, split across a pool of
/// scoped worker threads. Each value set gets its own writer. The first
/// failure stops the remaining workers and is returned; value sets already
/// closed stay written.
#[derive(Debug, Clone, Copy)]
pub struct TableCopier {
    workers: NonZeroUsize,
}

impl Default for TableCopier {
    fn default() -> Self {
        Self {
            workers: NonZeroUsize::MIN,
        }
    }
}

type Column = (Variable, Arc<dyn VariableValueSource>);

impl TableCopier {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Copy `source` into `destination` under `table`, or under the
    /// source's own name.
    pub fn copy(
        &self,
        source: &dyn ValueTable,
        destination: &dyn Datasource,
        table: Option<&str>,
    ) -> Result<CopyReport> {
        let target = table.unwrap_or(source.name()).to_string();
        let span = info_span!(
            "copy",
            source = %source.name(),
            destination = %destination.name(),
            table = %target
        );
        let _guard = span.enter();

        let variables = source.variables()?;
        let writer = destination.create_writer(&target, source.entity_type())?;
        let mut variable_writer = writer.write_variables()?;
        for variable in &variables {
            variable_writer.write_variable(variable)?;
        }
        variable_writer.close()?;

        let columns = variables
            .into_iter()
            .map(|variable| {
                let value_source = source.variable_value_source(variable.name())?;
                Ok((variable, value_source))
            })
            .collect::<vtab_model::Result<Vec<Column>>>()?;
        let value_sets = source.value_sets()?;
        let count = value_sets.len();
        self.copy_value_sets(source, writer.as_ref(), &columns, &value_sets)?;
        writer.close()?;

        let report = CopyReport {
            source: source.name().to_string(),
            destination: destination.name().to_string(),
            variables: columns.len(),
            value_sets: count,
        };
        info!(variables = report.variables, value_sets = report.value_sets, "copied table");
        Ok(report)
    }

    fn copy_value_sets(
        &self,
        source: &dyn ValueTable,
        writer: &dyn ValueTableWriter,
        columns: &[Column],
        value_sets: &[ValueSet],
    ) -> vtab_model::Result<()> {
        if value_sets.is_empty() {
            return Ok(());
        }
        let workers = self.workers.get().min(value_sets.len());
        let chunk = value_sets.len().div_ceil(workers);
        let stop = AtomicBool::new(false);
        debug!(workers, chunk, "copying value sets");

        std::thread::scope(|scope| {
            let handles: Vec<_> = value_sets
                .chunks(chunk)
                .map(|batch| {
                    let stop = &stop;
                    scope.spawn(move || {
                        for value_set in batch {
                            if stop.load(Ordering::Relaxed) {
                                return Ok(());
                            }
                            if let Err(err) = copy_value_set(source, writer, columns, value_set) {
                                stop.store(true, Ordering::Relaxed);
                                return Err(err);
                            }
                        }
                        Ok(())
                    })
                })
                .collect();

            let mut first_error = None;
            for handle in handles {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|_| Err(ModelError::Evaluation("copy worker panicked".to_string())));
                if let Err(err) = outcome {
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

fn copy_value_set(
    source: &dyn ValueTable,
    writer: &dyn ValueTableWriter,
    columns: &[Column],
    value_set: &ValueSet,
) -> vtab_model::Result<()> {
    let mut value_set_writer = writer.write_value_set(value_set.entity())?;
    for (variable, value_source) in columns {
        let value = value_source.value(value_set, source)?;
        value_set_writer.write_value(variable, value)?;
    }
    value_set_writer.close()
}
