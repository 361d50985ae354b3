use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use ward_scoring::Weightings;

use crate::wards::*;

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    pub top: Option<u32>,
    pub above: Option<f64>,
    pub out: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "dataFile")]
    pub data_file: Option<String>,
    #[serde(rename = "boundariesFile")]
    pub boundaries_file: Option<String>,
    #[serde(rename = "weightsFile")]
    pub weights_file: Option<String>,
    #[serde(rename = "codeField")]
    pub code_field: Option<String>,
    #[serde(rename = "boundaryCodeProperty")]
    pub boundary_code_property: Option<String>,
    #[serde(rename = "excludedFields")]
    pub excluded_fields: Option<Vec<String>>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
}

impl RunConfig {
    /// The paths of the configuration are relative to the directory of the configuration
    /// file.
    pub fn resolve_paths(mut self, root: &Path) -> RunConfig {
        let resolve = |p: Option<String>| p.map(|s| resolve_path(root, &s));
        self.data_file = resolve(self.data_file);
        self.boundaries_file = resolve(self.boundaries_file);
        self.weights_file = resolve(self.weights_file);
        self.output_settings.out = match self.output_settings.out {
            Some(s) if s == "stdout" || s.is_empty() => Some(s),
            x => resolve(x),
        };
        self
    }
}

pub fn resolve_path(root: &Path, file: &str) -> String {
    let p: PathBuf = [root, Path::new(file)].iter().collect();
    p.as_path().display().to_string()
}

pub fn parse_run_config(text: &str) -> WardsResult<RunConfig> {
    serde_json::from_str(text).context(ParsingJsonSnafu {
        path: "<config>".to_string(),
    })
}

pub fn read_run_config(path: &str) -> WardsResult<RunConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: RunConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_run_config: {:?}", config);
    let root = Path::new(path).parent().context(MissingParentDirSnafu {})?;
    Ok(config.resolve_paths(root))
}

pub fn read_summary(path: &str) -> WardsResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    debug!("read_summary: {} bytes", contents.len());
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn read_weightings(path: &str) -> WardsResult<Weightings> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let weightings: Weightings = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    info!("read_weightings: {} weights from {:?}", weightings.len(), path);
    Ok(weightings)
}

pub fn write_weightings(path: &str, weightings: &Weightings) -> WardsResult<()> {
    let js = serde_json::to_string_pretty(weightings).context(EncodingJsonSnafu {})?;
    fs::write(path, js).context(OpeningFileSnafu { path })?;
    info!("write_weightings: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let text = r#"{
            "dataFile": "wards.csv",
            "boundariesFile": "wards.geojson",
            "weightsFile": "weights.json",
            "codeField": "Code",
            "boundaryCodeProperty": "WD11CD",
            "excludedFields": ["Code", "Name"],
            "outputSettings": {"top": 10, "above": 0.25, "out": "stdout"}
        }"#;
        let config = parse_run_config(text).unwrap().resolve_paths(Path::new("/data"));
        assert_eq!(config.data_file.as_deref(), Some("/data/wards.csv"));
        assert_eq!(config.boundaries_file.as_deref(), Some("/data/wards.geojson"));
        assert_eq!(config.code_field.as_deref(), Some("Code"));
        assert_eq!(config.excluded_fields.map(|v| v.len()), Some(2));
        assert_eq!(config.output_settings.top, Some(10));
        assert_eq!(config.output_settings.above, Some(0.25));
        assert_eq!(config.output_settings.out.as_deref(), Some("stdout"));
    }

    #[test]
    fn everything_is_optional() {
        let config = parse_run_config("{}").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn absolute_paths_are_kept() {
        let config = RunConfig {
            data_file: Some("/abs/wards.csv".to_string()),
            ..RunConfig::default()
        };
        let config = config.resolve_paths(Path::new("/data"));
        assert_eq!(config.data_file.as_deref(), Some("/abs/wards.csv"));
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(parse_run_config(r#"{"outputSettings": {"top": "ten"}}"#).is_err());
    }
}
