//! Pipeline orchestration
//!
//! A run moves through a fixed sequence of stages:
//!
//! ```text
//! Extract → Transform → Persist → Reload → Validate → Visualize → Load → Done
//! ```
//!
//! The first error moves the pipeline to [`Stage::Failed`] and is returned
//! as a [`PipelineError`]. Nothing is retried or rolled back; charts written
//! before a failed load stay on disk.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use tracing::Instrument;
use uuid::Uuid;

use salespipe_charts::SalesVisualizer;
use salespipe_core::transform::{self, ConversionWarning};
use salespipe_core::{ChartSink, PipelineConfig, Table, TableStore, ValidationReport, read_csv};

use crate::checkpoint::Checkpoint;
use crate::error::PipelineError;
use crate::postgres::PostgresStore;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Read the raw file
    Extract,
    /// Clean names, dedup, handle nulls, coerce types
    Transform,
    /// Write the cleaned table to disk
    Persist,
    /// Read the cleaned table back
    Reload,
    /// Check schema and null ratios
    Validate,
    /// Render charts
    Visualize,
    /// Write to the database
    Load,
    /// Finished successfully
    Done,
    /// Stopped by an error
    Failed,
}

impl Stage {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Persist => "persist",
            Self::Reload => "reload",
            Self::Validate => "validate",
            Self::Visualize => "visualize",
            Self::Load => "load",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and tracing scope of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    span: tracing::Span,
}

impl RunContext {
    /// New context with a random run id
    pub fn new() -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        Self { run_id, span }
    }

    /// Run id
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Span covering one stage of this run
    pub fn stage_span(&self, stage: Stage) -> tracing::Span {
        tracing::info_span!(parent: &self.span, "stage", name = stage.as_str())
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What a run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run id
    pub run_id: Uuid,
    /// Rows in the raw file
    pub rows_read: usize,
    /// Duplicate rows removed
    pub duplicates_removed: usize,
    /// Null cells dropped or filled
    pub nulls_handled: usize,
    /// Rows after cleaning
    pub rows_cleaned: usize,
    /// Rows inserted into the database
    pub rows_loaded: u64,
    /// Columns left unconverted
    pub conversion_warnings: Vec<ConversionWarning>,
    /// Validation outcome
    pub validation: Option<ValidationReport>,
    /// Persisted intermediate file
    pub checkpoint: Option<Checkpoint>,
    /// Chart files written
    pub charts: Vec<PathBuf>,
    /// Last stage reached
    pub final_stage: Stage,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            rows_read: 0,
            duplicates_removed: 0,
            nulls_handled: 0,
            rows_cleaned: 0,
            rows_loaded: 0,
            conversion_warnings: Vec::new(),
            validation: None,
            checkpoint: None,
            charts: Vec::new(),
            final_stage: Stage::Extract,
        }
    }
}

// Stage bookkeeping, kept apart from the config so stage closures can
// borrow the config while the tracker is updated.
#[derive(Debug)]
struct Tracker {
    ctx: RunContext,
    stage: Stage,
}

impl Tracker {
    fn fail(&mut self, stage: Stage, source: salespipe_core::Error) -> PipelineError {
        self.stage = Stage::Failed;
        tracing::error!(parent: &self.ctx.span, stage = %stage, "ETL pipeline failed: {}", source);
        PipelineError::new(stage, source)
    }

    fn step<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> salespipe_core::Result<T>,
    ) -> Result<T, PipelineError> {
        self.stage = stage;
        let span = self.ctx.stage_span(stage);
        span.in_scope(|| {
            tracing::debug!("Stage started");
            f()
        })
        .map_err(|source| self.fail(stage, source))
    }

    async fn step_async<T, Fut>(&mut self, stage: Stage, fut: Fut) -> Result<T, PipelineError>
    where
        Fut: Future<Output = salespipe_core::Result<T>>,
    {
        self.stage = stage;
        let span = self.ctx.stage_span(stage);
        fut.instrument(span)
            .await
            .map_err(|source| self.fail(stage, source))
    }
}

/// The sales ETL pipeline
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    tracker: Tracker,
}

impl Pipeline {
    /// Create a pipeline for one run
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            tracker: Tracker {
                ctx: RunContext::new(),
                stage: Stage::Extract,
            },
        }
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.tracker.stage
    }

    /// Run context
    pub fn context(&self) -> &RunContext {
        &self.tracker.ctx
    }

    /// Configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage with SVG charts and a PostgreSQL store.
    ///
    /// The database connection is opened when the load stage starts.
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let plot_path = self.config.plot_path.clone();
        let db_url = self.config.db_url.clone();
        self.run_with(
            move || Ok(SalesVisualizer::new(plot_path)?),
            move || async move {
                let url = db_url.ok_or_else(|| salespipe_core::Error::ConfigInvalid {
                    message: "DB_URL is not set".to_string(),
                })?;
                PostgresStore::connect(&url).await
            },
        )
        .await
    }

    /// Run every stage with the given sinks.
    ///
    /// `charts` is called at the start of the visualize stage and `connect`
    /// at the start of the load stage.
    pub async fn run_with<C, MakeCharts, S, Connect, Fut>(
        &mut self,
        charts: MakeCharts,
        connect: Connect,
    ) -> Result<RunSummary, PipelineError>
    where
        C: ChartSink,
        MakeCharts: FnOnce() -> salespipe_core::Result<C>,
        S: TableStore,
        Connect: FnOnce() -> Fut,
        Fut: Future<Output = salespipe_core::Result<S>>,
    {
        let span = self.tracker.ctx.span.clone();
        async move {
            tracing::info!("Starting ETL pipeline");

            let (table, mut summary) = self.prepare(false)?;
            let settings = &self.config.settings;

            summary.charts = self.tracker.step(Stage::Visualize, || {
                let sink = charts()?;
                Ok(vec![
                    sink.plot_sales_over_time(&table, &settings.date_col, &settings.sales_col)?,
                    sink.plot_sales_distribution(&table, &settings.sales_col)?,
                    sink.plot_top_products(
                        &table,
                        &settings.product_col,
                        &settings.sales_col,
                        settings.top_n,
                    )?,
                ])
            })?;

            summary.rows_loaded = self
                .tracker
                .step_async(Stage::Load, async {
                    let store = connect().await?;
                    let written = store
                        .write_table(&table, &settings.table_name, settings.if_exists)
                        .await;
                    store.close().await;
                    written
                })
                .await?;

            self.tracker.stage = Stage::Done;
            summary.final_stage = Stage::Done;
            tracing::info!(
                rows_loaded = summary.rows_loaded,
                "ETL pipeline completed successfully."
            );
            Ok::<_, PipelineError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Run extract through validate only, treating missing columns as an
    /// error. Touches neither the database nor the plot directory.
    pub fn run_checks(&mut self) -> Result<RunSummary, PipelineError> {
        let span = self.tracker.ctx.span.clone();
        span.in_scope(|| {
            tracing::info!("Starting pipeline checks");
            self.prepare(true).map(|(_, summary)| summary)
        })
    }

    fn prepare(&mut self, strict: bool) -> Result<(Table, RunSummary), PipelineError> {
        let config = &self.config;
        let settings = &config.settings;
        let mut summary = RunSummary::new(self.tracker.ctx.run_id);

        let raw = self.tracker.step(Stage::Extract, || {
            read_csv(&config.raw_csv_path, &settings.csv)
        })?;
        summary.rows_read = raw.height();

        let cleaned = self.tracker.step(Stage::Transform, || {
            let strategy = settings.null_strategy()?;
            let table = transform::clean_names(raw)?;
            let (table, removed) = transform::dedup(table)?;
            summary.duplicates_removed = removed;
            summary.nulls_handled = table.null_count();
            let table = transform::handle_nulls(table, &strategy)?;
            let (table, warnings) = transform::coerce_types(table, &settings.expected_schema);
            summary.conversion_warnings = warnings;
            Ok(table)
        })?;
        summary.rows_cleaned = cleaned.height();

        let checkpoint = self.tracker.step(Stage::Persist, || {
            Checkpoint::write(&cleaned, &config.processed_csv_path, &settings.csv)
        })?;
        drop(cleaned);

        let table = self
            .tracker
            .step(Stage::Reload, || {
                checkpoint.reload(&settings.csv, &settings.expected_schema)
            })?;
        summary.checkpoint = Some(checkpoint);

        let report = self.tracker.step(Stage::Validate, || {
            let validator = settings.validator()?;
            if strict || settings.strict_schema {
                validator.validate_strict(&table)
            } else {
                Ok(validator.validate(&table))
            }
        })?;
        summary.validation = Some(report);
        summary.final_stage = Stage::Validate;

        Ok((table, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use salespipe_core::{ConfigSources, DataType, Error, IfExists, PipelineSettings, Schema};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    const RAW: &str = "\
 Date ,Datetime,Cash_Type,Card,Money,Coffee Name
2024-03-01,2024-03-01 10:15:50.520,card,ANON-0000-0000-0001,38.7,Latte
2024-03-01,2024-03-01 10:15:50.520,card,ANON-0000-0000-0001,38.7,Latte
2024-03-01,2024-03-01 12:19:22.539,card,ANON-0000-0000-0002,38.7,Hot Chocolate
2024-03-02,2024-03-02 10:22:11.000,cash,,40,Americano
2024-03-02,2024-03-02 13:46:33.006,card,ANON-0000-0000-0003,28.9,Americano
";

    #[derive(Default, Clone)]
    struct MemoryStore {
        tables: Arc<Mutex<HashMap<String, Table>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl TableStore for MemoryStore {
        async fn write_table(
            &self,
            table: &Table,
            name: &str,
            if_exists: IfExists,
        ) -> salespipe_core::Result<u64> {
            let mut tables = self.tables.lock().unwrap();
            if tables.contains_key(name) && if_exists == IfExists::Fail {
                return Err(Error::TableExists {
                    table: name.to_string(),
                });
            }
            tables.insert(name.to_string(), table.clone());
            Ok(table.height() as u64)
        }

        async fn read_query(&self, sql: &str) -> salespipe_core::Result<Table> {
            self.tables
                .lock()
                .unwrap()
                .get(sql)
                .cloned()
                .ok_or_else(|| Error::Database {
                    message: format!("no table {sql}"),
                })
        }

        async fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[derive(Default)]
    struct RecordingCharts {
        calls: Mutex<Vec<&'static str>>,
    }

    impl ChartSink for &RecordingCharts {
        fn plot_sales_over_time(
            &self,
            table: &Table,
            date_col: &str,
            _sales_col: &str,
        ) -> salespipe_core::Result<PathBuf> {
            assert!(table.has_column(date_col));
            self.calls.lock().unwrap().push("sales_over_time");
            Ok(PathBuf::from("sales_over_time.svg"))
        }

        fn plot_sales_distribution(
            &self,
            _table: &Table,
            _sales_col: &str,
        ) -> salespipe_core::Result<PathBuf> {
            self.calls.lock().unwrap().push("sales_distribution");
            Ok(PathBuf::from("sales_distribution.svg"))
        }

        fn plot_top_products(
            &self,
            _table: &Table,
            _product_col: &str,
            _sales_col: &str,
            top_n: usize,
        ) -> salespipe_core::Result<PathBuf> {
            assert_eq!(top_n, 10);
            self.calls.lock().unwrap().push("top_products");
            Ok(PathBuf::from("top_products.svg"))
        }
    }

    fn connect_to(
        store: &MemoryStore,
    ) -> impl FnOnce() -> std::future::Ready<salespipe_core::Result<MemoryStore>> {
        let store = store.clone();
        move || std::future::ready(Ok(store))
    }

    fn config(dir: &Path, raw: &str, settings: PipelineSettings) -> PipelineConfig {
        let raw_path = dir.join("raw.csv");
        std::fs::write(&raw_path, raw).unwrap();
        ConfigSources {
            raw_csv_path: Some(raw_path),
            processed_csv_path: Some(dir.join("processed/sales.csv")),
            db_url: None,
            plot_path: Some(dir.join("plots")),
        }
        .resolve(settings)
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_run_loads_cleaned_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, PipelineSettings::default()));

        let summary = pipeline
            .run_with(|| Ok(&charts), connect_to(&store))
            .await
            .unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(summary.final_stage, Stage::Done);
        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.nulls_handled, 1);
        assert_eq!(summary.rows_cleaned, 3);
        assert_eq!(summary.rows_loaded, 3);
        assert!(summary.conversion_warnings.is_empty());
        assert_eq!(summary.charts.len(), 3);
        assert_eq!(
            *charts.calls.lock().unwrap(),
            vec!["sales_over_time", "sales_distribution", "top_products"]
        );
        assert!(*store.closed.lock().unwrap());

        let loaded = store.read_query("sales_data").await.unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.column("money").unwrap().dtype(), DataType::Float64);
        assert!(dir.path().join("processed/sales.csv").exists());

        let report = summary.validation.unwrap();
        assert!(report.schema_ok());
    }

    #[tokio::test]
    async fn test_missing_column_is_swallowed_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "date,money\n2024-03-01,1.5\n2024-03-02,2.5\n";
        let store = MemoryStore::default();
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), raw, PipelineSettings::default()));

        let summary = pipeline
            .run_with(|| Ok(&charts), connect_to(&store))
            .await
            .unwrap();

        let report = summary.validation.unwrap();
        assert!(!report.schema_ok());
        assert!(report.missing_columns.contains(&"coffee_name".to_string()));
        assert_eq!(summary.rows_loaded, 2);
    }

    #[tokio::test]
    async fn test_strict_schema_stops_at_validate() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "date,money\n2024-03-01,1.5\n";
        let settings = PipelineSettings {
            strict_schema: true,
            ..Default::default()
        };
        let store = MemoryStore::default();
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), raw, settings));

        let err = pipeline
            .run_with(|| Ok(&charts), connect_to(&store))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Validate);
        assert!(matches!(err.source, Error::Schema { .. }));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(charts.calls.lock().unwrap().is_empty());
        assert!(store.tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_fails_extract() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), RAW, PipelineSettings::default());
        config.raw_csv_path = dir.path().join("absent.csv");
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config);

        let err = pipeline
            .run_with(|| Ok(&charts), connect_to(&MemoryStore::default()))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Extract);
        assert!(matches!(err.source, Error::Io(_)));
        assert!(!dir.path().join("processed/sales.csv").exists());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_charts() {
        let dir = tempfile::tempdir().unwrap();
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, PipelineSettings::default()));

        let err = pipeline
            .run_with(|| Ok(&charts), || async {
                Err::<MemoryStore, _>(Error::Connection {
                    message: "refused".to_string(),
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(err.source, Error::Connection { .. }));
        assert_eq!(charts.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_existing_table_with_fail_policy() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            if_exists: IfExists::Fail,
            ..Default::default()
        };
        let store = MemoryStore::default();
        store
            .tables
            .lock()
            .unwrap()
            .insert("sales_data".to_string(), Table::empty());
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, settings));

        let err = pipeline
            .run_with(|| Ok(&charts), connect_to(&store))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(err.source, Error::TableExists { .. }));
        assert!(*store.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_run_without_db_url_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, PipelineSettings::default()));

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(err.source, Error::ConfigInvalid { .. }));
        assert!(dir.path().join("plots/top_products.svg").exists());
    }

    #[test]
    fn test_run_checks_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new(config(
            dir.path(),
            "date,money\n2024-03-01,1.5\n",
            PipelineSettings::default(),
        ));
        let err = pipeline.run_checks().unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert!(!dir.path().join("plots").exists());
    }

    #[test]
    fn test_run_checks_reports_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, PipelineSettings::default()));
        let summary = pipeline.run_checks().unwrap();

        assert_eq!(summary.final_stage, Stage::Validate);
        let report = summary.validation.unwrap();
        // datetime is text again after the reload
        assert_eq!(report.type_mismatches.len(), 1);
        assert_eq!(report.type_mismatches[0].column, "datetime");
    }

    #[test]
    fn test_bad_values_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            expected_schema: Schema::new([("money", DataType::Float64)]),
            ..Default::default()
        };
        let raw = "money\n1.5\n2.0\nbad\n";
        let mut pipeline = Pipeline::new(config(dir.path(), raw, settings));
        let summary = pipeline.run_checks().unwrap();

        assert_eq!(summary.conversion_warnings.len(), 1);
        let report = summary.validation.unwrap();
        assert_eq!(report.type_mismatches[0].actual, DataType::Str);
        assert_eq!(summary.rows_cleaned, 3);
    }

    #[tokio::test]
    async fn test_unreadable_sales_cells_are_skipped_when_charting() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "\
date,datetime,cash_type,card,money,coffee_name
2024-03-01,2024-03-01 10:15:50.520,card,ANON-1,38.7,Latte
2024-03-01,2024-03-01 12:19:22.539,card,ANON-2,bad,Americano
";
        let plots = dir.path().join("plots");
        let store = MemoryStore::default();
        let mut pipeline = Pipeline::new(config(dir.path(), raw, PipelineSettings::default()));

        let summary = pipeline
            .run_with(|| Ok(SalesVisualizer::new(&plots)?), connect_to(&store))
            .await
            .unwrap();

        assert_eq!(summary.final_stage, Stage::Done);
        assert_eq!(summary.conversion_warnings.len(), 1);
        assert_eq!(summary.conversion_warnings[0].value, "bad");
        assert_eq!(summary.rows_loaded, 2);
        assert_eq!(summary.charts.len(), 3);
        for chart in &summary.charts {
            assert!(chart.exists(), "{} missing", chart.display());
        }
        let top = std::fs::read_to_string(plots.join("top_products.svg")).unwrap();
        assert!(top.contains("Latte: 38.70"));
        assert!(!top.contains("Americano"));
    }

    #[tokio::test]
    async fn test_dropping_every_row_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "\
date,datetime,cash_type,card,money,coffee_name
2024-03-01,2024-03-01 10:15:50.520,cash,,38.7,Latte
2024-03-02,2024-03-02 13:46:33.006,cash,,28.9,Americano
";
        let plots = dir.path().join("plots");
        let store = MemoryStore::default();
        let mut pipeline = Pipeline::new(config(dir.path(), raw, PipelineSettings::default()));

        let summary = pipeline
            .run_with(|| Ok(SalesVisualizer::new(&plots)?), connect_to(&store))
            .await
            .unwrap();

        assert_eq!(summary.final_stage, Stage::Done);
        assert_eq!(summary.rows_cleaned, 0);
        assert_eq!(summary.rows_loaded, 0);
        assert!(summary.validation.unwrap().is_clean());
        for chart in ["sales_over_time.svg", "sales_distribution.svg", "top_products.svg"] {
            assert!(plots.join(chart).exists(), "{chart} missing");
        }
        let loaded = store.read_query("sales_data").await.unwrap();
        assert_eq!(loaded.column("money").unwrap().dtype(), DataType::Float64);
    }

    #[tokio::test]
    async fn test_null_ratio_above_threshold_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // "NA" is written for the missing card and read back as null
        let settings = PipelineSettings {
            null_strategy: "fill".to_string(),
            fill_value: Some("NA".to_string()),
            ..Default::default()
        };
        let store = MemoryStore::default();
        let charts = RecordingCharts::default();
        let mut pipeline = Pipeline::new(config(dir.path(), RAW, settings));

        let summary = pipeline
            .run_with(|| Ok(&charts), connect_to(&store))
            .await
            .unwrap();

        assert_eq!(summary.final_stage, Stage::Done);
        assert_eq!(summary.rows_cleaned, 4);
        let report = summary.validation.unwrap();
        assert_eq!(report.null_violations.len(), 1);
        assert_eq!(report.null_violations[0].column, "card");
        assert!((report.null_violations[0].fraction - 0.25).abs() < 1e-12);
        assert_eq!(summary.rows_loaded, 4);
    }

    #[test]
    fn test_summary_json_includes_warnings_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            expected_schema: Schema::new([("money", DataType::Float64)]),
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(config(dir.path(), "money\n1.5\nbad\n", settings));
        let summary = pipeline.run_checks().unwrap();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["final_stage"], "validate");
        assert_eq!(json["conversion_warnings"][0]["column"], "money");
        assert_eq!(json["conversion_warnings"][0]["target"], "float64");
        assert_eq!(json["conversion_warnings"][0]["value"], "bad");
        assert_eq!(json["validation"]["type_mismatches"][0]["actual"], "string");
        assert_eq!(json["validation"]["schema_error"], serde_json::Value::Null);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Visualize.to_string(), "visualize");
        assert_eq!(Stage::Failed.as_str(), "failed");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunContext::new().run_id(), RunContext::new().run_id());
    }
}
