use polars::error::PolarsError;
use std::error::Error;
use std::fmt::Display;

#[derive(Debug)]
pub enum AnalysisError {
    File(std::io::Error),
    DataFrame(PolarsError),
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    MissingColumn(String),
    Shape(String),
    UnknownDataset(String),
    UnknownSystematic(String),
    Selection(String),
    Histogram(String),
    Calibration(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> AnalysisError {
        AnalysisError::File(err)
    }
}

impl From<PolarsError> for AnalysisError {
    fn from(err: PolarsError) -> AnalysisError {
        AnalysisError::DataFrame(err)
    }
}

impl From<serde_yaml::Error> for AnalysisError {
    fn from(err: serde_yaml::Error) -> AnalysisError {
        AnalysisError::Yaml(err)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> AnalysisError {
        AnalysisError::Json(err)
    }
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::File(x) => write!(f, "Chunk had a file I/O error: {x}"),
            AnalysisError::DataFrame(x) => write!(f, "Chunk had an error using polars: {x}"),
            AnalysisError::Yaml(x) => write!(f, "Could not parse YAML configuration: {x}"),
            AnalysisError::Json(x) => write!(f, "Could not parse JSON: {x}"),
            AnalysisError::MissingColumn(x) => {
                write!(f, "Chunk is missing required column '{x}'")
            }
            AnalysisError::Shape(x) => write!(f, "Chunk has inconsistent shapes: {x}"),
            AnalysisError::UnknownDataset(x) => {
                write!(f, "No calibration entry for dataset '{x}'")
            }
            AnalysisError::UnknownSystematic(x) => write!(f, "Unknown systematic '{x}'"),
            AnalysisError::Selection(x) => write!(f, "Selection registry error: {x}"),
            AnalysisError::Histogram(x) => write!(f, "Histogram error: {x}"),
            AnalysisError::Calibration(x) => write!(f, "Calibration lookup error: {x}"),
        }
    }
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalysisError::File(x) => Some(x),
            AnalysisError::DataFrame(x) => Some(x),
            AnalysisError::Yaml(x) => Some(x),
            AnalysisError::Json(x) => Some(x),
            _ => None,
        }
    }
}
