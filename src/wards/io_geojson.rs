use std::fs;

use log::info;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use ward_scoring::present::index_boundaries;
use ward_scoring::Boundaries;

use crate::wards::*;

pub fn read_boundaries(path: &str, code_property: &str) -> WardsResult<Boundaries> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let boundaries = parse_boundaries(&contents, code_property).context(ParsingJsonSnafu { path })?;
    info!(
        "read_boundaries: {} boundaries in {:?}",
        boundaries.len(),
        path
    );
    Ok(boundaries)
}

fn parse_boundaries(text: &str, code_property: &str) -> Result<Boundaries, serde_json::Error> {
    let collection: JSValue = serde_json::from_str(text)?;
    Ok(index_boundaries(&collection, code_property))
}
