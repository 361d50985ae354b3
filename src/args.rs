use clap::Parser;

/// This is a ward ranking program: it scores every ward of a statistics table with
/// user-defined weights and ranks them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A run configuration in JSON format. All the other options
    /// take precedence over its content. See the manual for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The statistics table, one ward per row (.csv or .xlsx).
    /// Setting this option overrides the `dataFile` entry of the configuration.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (file path, optional) The ward boundaries, as a GeoJSON feature collection.
    #[clap(short, long, value_parser)]
    pub boundaries: Option<String>,

    /// (file path, optional) The weights of the statistics, in JSON format. If not provided,
    /// all the weights are 0.
    #[clap(short, long, value_parser)]
    pub weights: Option<String>,

    /// (file path, optional) If specified, the weights actually used (after adding the
    /// missing statistics) are written to this location.
    #[clap(long, value_parser)]
    pub save_weights: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the ranking will be written
    /// in JSON format to the given location. Setting this option overrides the path that may
    /// be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of a ranking in JSON format. If
    /// provided, wardrank will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (number, optional) Only show the wards with at most this rank. 0 shows them all.
    #[clap(long, value_parser)]
    pub top: Option<u32>,

    /// (number between 0 and 1, optional) Only show the wards with at least this score.
    #[clap(long, value_parser)]
    pub above: Option<f64>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// If passed as an argument, the ranking is computed on a background worker thread.
    #[clap(long, takes_value = false)]
    pub worker: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
