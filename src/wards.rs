use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use ward_scoring::present::{leaderboard, shade, DisplayFilter, Palette, DEFAULT_BOUNDARY_CODE_PROPERTY};
use ward_scoring::*;

use crate::args::Args;
use crate::wards::config_reader::*;

pub mod config_reader;
pub mod io_csv;
pub mod io_geojson;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum WardsError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error encoding JSON"))]
    EncodingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Missing worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Invalid statistics table"))]
    InvalidTable { source: ScoringError },
    #[snafu(display("The ranking could not be computed"))]
    Computation { source: PipelineError },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No statistics table provided (use --data or dataFile)"))]
    MissingDataFile {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type WardsResult<T> = Result<T, WardsError>;

// How long the background worker may take for one ranking.
const COMPUTATION_TIMEOUT: Duration = Duration::from_secs(120);

/// The settings of one run, after merging the configuration file and the command line.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub data_file: String,
    pub boundaries_file: Option<String>,
    pub weights_file: Option<String>,
    pub save_weights: Option<String>,
    pub code_field: String,
    pub name_field: String,
    pub boundary_code_property: String,
    pub excluded_fields: Vec<String>,
    pub excel_worksheet_name: Option<String>,
    pub filter: DisplayFilter,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub use_worker: bool,
}

pub fn settings_from_args(args: &Args) -> WardsResult<RunSettings> {
    let config = match &args.config {
        Some(path) => read_run_config(path)?,
        None => RunConfig::default(),
    };
    merge_settings(args, config)
}

fn merge_settings(args: &Args, config: RunConfig) -> WardsResult<RunSettings> {
    let data_file = args
        .data
        .clone()
        .or(config.data_file)
        .context(MissingDataFileSnafu {})?;
    let excluded_fields = config
        .excluded_fields
        .unwrap_or_else(|| DEFAULT_EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect());
    Ok(RunSettings {
        data_file,
        boundaries_file: args.boundaries.clone().or(config.boundaries_file),
        weights_file: args.weights.clone().or(config.weights_file),
        save_weights: args.save_weights.clone(),
        code_field: config
            .code_field
            .unwrap_or_else(|| DEFAULT_CODE_FIELD.to_string()),
        name_field: DEFAULT_NAME_FIELD.to_string(),
        boundary_code_property: config
            .boundary_code_property
            .unwrap_or_else(|| DEFAULT_BOUNDARY_CODE_PROPERTY.to_string()),
        excluded_fields,
        excel_worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or(config.excel_worksheet_name),
        filter: DisplayFilter {
            show_top: args.top.or(config.output_settings.top),
            show_above: args.above.or(config.output_settings.above),
        },
        out: args.out.clone().or(config.output_settings.out),
        reference: args.reference.clone(),
        use_worker: args.worker,
    })
}

fn read_dataset(settings: &RunSettings) -> WardsResult<Dataset> {
    let path = settings.data_file.as_str();
    let is_excel = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false);
    if is_excel {
        io_xlsx::read_excel_dataset(
            path,
            settings.excel_worksheet_name.as_deref(),
            &settings.code_field,
        )
    } else {
        io_csv::read_csv_dataset(path, &settings.code_field)
    }
}

fn compute<E: Executor>(
    executor: E,
    settings: &RunSettings,
    dataset: &Arc<Dataset>,
    boundaries: &Arc<Boundaries>,
    weightings: &Weightings,
) -> WardsResult<Arc<Derived>> {
    let mut scheduler = Scheduler::new(executor, &settings.excluded_fields);
    match scheduler
        .request(dataset, boundaries, weightings)
        .context(ComputationSnafu {})?
    {
        Ticket::Ready(derived) => Ok(derived),
        Ticket::Pending(id) => {
            debug!("compute: waiting for request {}", id);
            scheduler
                .wait(COMPUTATION_TIMEOUT)
                .context(ComputationSnafu {})
        }
    }
}

/// The JSON summary of a ranking.
pub fn build_summary_js(derived: &Derived, name_field: &str, filter: &DisplayFilter) -> JSValue {
    let table = &derived.table;
    let palette = Palette::default();
    let rows: Vec<JSValue> = leaderboard(table, &derived.dataset, name_field, None)
        .into_iter()
        .map(|row| {
            let entry = table.get(&row.code);
            let fill = shade(&entry, &table.score_range, filter, &palette).fill;
            json!({
                "rank": row.rank,
                "code": row.code,
                "name": row.name,
                "score": row.score,
                "fill": fill.map(|c| c.to_hex()),
            })
        })
        .collect();
    let visible = table
        .rankings
        .values()
        .filter(|e| filter.is_visible(e))
        .count();
    json!({
        "scoreRange": table.score_range,
        "rankings": rows,
        "visible": visible,
    })
}

pub fn run_ranking(settings: &RunSettings) -> WardsResult<()> {
    info!("settings: {:?}", settings);
    let dataset = Arc::new(read_dataset(settings)?);
    let boundaries = Arc::new(match &settings.boundaries_file {
        Some(path) => io_geojson::read_boundaries(path, &settings.boundary_code_property)?,
        None => Boundaries::new(),
    });

    let fields = classify(dataset.sample(), &settings.excluded_fields);
    let mut weightings = match &settings.weights_file {
        Some(path) => read_weightings(path)?,
        None => Weightings::for_fields(&fields),
    };
    if weightings.reconcile(&fields) {
        info!("run_ranking: weights aligned with the {} statistics", fields.len());
    }
    if weightings.is_neutral() {
        warn!("run_ranking: all the weights are 0, every ward has the same score");
    }

    let derived = if settings.use_worker {
        let worker = WorkerExecutor::spawn().context(ComputationSnafu {})?;
        compute(worker, settings, &dataset, &boundaries, &weightings)?
    } else {
        compute(InlineExecutor::new(), settings, &dataset, &boundaries, &weightings)?
    };

    let result_js = build_summary_js(&derived, &settings.name_field, &settings.filter);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(EncodingJsonSnafu {})?;
    match settings.out.as_deref() {
        None | Some("stdout") | Some("") => println!("{}", pretty_js_stats),
        Some(path) => {
            fs::write(path, &pretty_js_stats).context(OpeningFileSnafu { path })?;
            info!("run_ranking: summary written to {:?}", path);
        }
    }

    if let Some(path) = &settings.save_weights {
        write_weightings(path, &weightings)?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &settings.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(EncodingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
