//! Command implementations shared by the binary and the tests.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info_span;

use vtab_model::{Datasource, MemoryDatasource, ValueTable, Variable};
use vtab_view::{CopyReport, Runtime, RuntimeConfig, TableCopier, ViewAwareDatasource, ViewDefinition};

use crate::csv_source::{CsvOptions, load_directory};
use crate::export::{Row, render_rows, write_csv_file};

/// Runtime settings after applying command-line overrides.
pub fn load_config(path: Option<&Path>, delimiter: Option<char>) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("load config: {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(delimiter) = delimiter {
        config.csv_delimiter = delimiter;
    }
    Ok(config)
}

/// A running runtime with one CSV folder registered.
pub struct Session {
    runtime: Runtime,
    datasource: Arc<ViewAwareDatasource>,
}

impl Session {
    /// Load `dir` and decorate it with its persisted views.
    pub fn open(dir: &Path, config: RuntimeConfig) -> Result<Self> {
        let Some(delimiter) = config.csv_delimiter_byte() else {
            bail!("delimiter '{}' is not a single ASCII character", config.csv_delimiter);
        };
        let options = CsvOptions {
            delimiter,
            entity_type: config.default_entity_type.clone(),
        };
        let datasource = load_directory(dir, &options)?;
        let runtime = Runtime::from_config(config);
        runtime.init().context("start runtime")?;
        let datasource = runtime
            .add_datasource(Arc::new(datasource))
            .context("register datasource")?;
        Ok(Self {
            runtime,
            datasource,
        })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn datasource(&self) -> &Arc<ViewAwareDatasource> {
        &self.datasource
    }

    /// Resolve `table`, or an ad hoc view over it read from `view_file`.
    ///
    /// The ad hoc view's `source` is replaced by `table`; it is built but not
    /// registered.
    pub fn resolve(&self, table: &str, view_file: Option<&Path>) -> Result<Arc<dyn ValueTable>> {
        let Some(path) = view_file else {
            return self
                .datasource
                .value_table(table)
                .with_context(|| format!("open table {table}"));
        };
        let mut definition = read_view_definition(path)?;
        definition.source = table.to_string();
        let view = definition
            .build(self.datasource.as_ref())
            .with_context(|| format!("build view {} over {table}", definition.name))?;
        Ok(Arc::new(view))
    }

    pub fn shutdown(self) -> Result<()> {
        self.runtime.shutdown().context("stop runtime")
    }
}

/// Read a JSON view definition.
pub fn read_view_definition(path: &Path) -> Result<ViewDefinition> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read view: {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse view: {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct TableSummary {
    pub name: String,
    pub is_view: bool,
    pub entity_type: String,
    pub variables: usize,
    pub entities: usize,
}

/// Summaries of every table and view, tables first.
pub fn run_tables(session: &Session) -> Result<Vec<TableSummary>> {
    let datasource = session.datasource();
    let mut summaries = Vec::new();
    for name in datasource.table_names()? {
        let table = datasource.value_table(&name)?;
        summaries.push(TableSummary {
            variables: table.variables().with_context(|| format!("variables of {name}"))?.len(),
            entities: table
                .variable_entities()
                .with_context(|| format!("entities of {name}"))?
                .len(),
            is_view: table.is_view(),
            entity_type: table.entity_type().to_string(),
            name,
        });
    }
    Ok(summaries)
}

#[derive(Debug, Clone)]
pub struct ShowResult {
    pub table: String,
    pub variables: Vec<Variable>,
    pub rows: Vec<Row>,
    pub total: usize,
}

pub fn run_show(session: &Session, table: &str, view: Option<&Path>, limit: usize) -> Result<ShowResult> {
    let span = info_span!("show", table);
    let _guard = span.enter();
    let resolved = session.resolve(table, view)?;
    let total = resolved.variable_entities()?.len();
    let (variables, rows) = render_rows(resolved.as_ref(), Some(limit))?;
    Ok(ShowResult {
        table: resolved.name().to_string(),
        variables,
        rows,
        total,
    })
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub path: PathBuf,
    pub rows: usize,
    pub report: CopyReport,
}

/// Materialise `table` through the copier, then write it as CSV.
pub fn run_export(
    session: &Session,
    table: &str,
    view: Option<&Path>,
    out: Option<&Path>,
    workers: Option<NonZeroUsize>,
) -> Result<ExportResult> {
    let span = info_span!("export", table);
    let _guard = span.enter();
    let config = session.runtime().config();
    let resolved = session.resolve(table, view)?;
    let copier = TableCopier::new(workers.unwrap_or(config.copy_workers));
    let target = MemoryDatasource::new("export");
    let report = copier
        .copy(resolved.as_ref(), &target, None)
        .with_context(|| format!("copy {}", resolved.name()))?;
    let copied = target.value_table(resolved.name())?;

    let path = out.map_or_else(
        || PathBuf::from(format!("{}.csv", resolved.name())),
        Path::to_path_buf,
    );
    let delimiter = config.csv_delimiter_byte().unwrap_or(b',');
    let rows = write_csv_file(copied.as_ref(), &path, delimiter)?;
    Ok(ExportResult { path, rows, report })
}
