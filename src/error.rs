//! Error types for the function engine

use thiserror::Error;

/// Main error type returned by functions and the evaluator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A required series argument resolved to nothing
    #[error("missing time series argument: {0}")]
    MissingTimeSeries(String),

    /// A named leaf had no binding at all in the fetched values
    #[error("series does not exist: {0}")]
    SeriesDoesNotExist(String),

    /// A function expecting exactly one series received several
    #[error("wildcard not allowed in argument {index} of {function}: got {count} series")]
    WildcardNotAllowed {
        /// Function name
        function: String,
        /// Zero-based argument position
        index: usize,
        /// Number of series the argument resolved to
        count: usize,
    },

    /// Argument exists but has the wrong type
    #[error("bad argument type for {function} argument {argument}: expected {expected}")]
    BadArgumentType {
        /// Function name
        function: String,
        /// Positional index or parameter name
        argument: String,
        /// Expected argument type
        expected: String,
    },

    /// Required argument was not supplied
    #[error("missing argument {argument} for {function}")]
    MissingArgument {
        /// Function name
        function: String,
        /// Positional index or parameter name
        argument: String,
    },

    /// Structural function needs more input series
    #[error("bad data: need at least 2 {dataset} data sets to process, got {got}")]
    TooFewDatasets {
        /// Name of the dataset (e.g. "marks", "metrics")
        dataset: String,
        /// Number of series received
        got: usize,
    },

    /// Fewer than two distinct major versions were found among the marks
    #[error("bad data: could not find 2 marks, only {0} found")]
    TooFewVersionMarks(usize),

    /// Series in one call disagree on sample count
    #[error("bad data: length of series {name} is {got}, expected {expected}")]
    MismatchedSeriesLength {
        /// Offending series
        name: String,
        /// Its sample count
        got: usize,
        /// Sample count of the first series
        expected: usize,
    },

    /// Series in one call disagree on step
    #[error("bad data: step of series {name} is {got}, expected {expected}")]
    MismatchedStep {
        /// Offending series
        name: String,
        /// Its step
        got: i64,
        /// Step of the first series
        expected: i64,
    },

    /// A series has no samples
    #[error("bad data: empty series {0}")]
    EmptySeries(String),

    /// Series that must share their timeline do not
    #[error("{field} differs: {left} != {right}")]
    SeriesShapeMismatch {
        /// Field that differs (StartTime, StopTime, StepTime, length of Values)
        field: &'static str,
        /// Value on the first series
        left: i64,
        /// Value on the compared series
        right: i64,
    },

    /// No function registered under this name
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Function compiled without the backend it needs
    #[error("{0}: unsupported in this build")]
    UnsupportedBuild(String),

    /// Operation exceeded its deadline
    #[error("timeout: {0}")]
    Timeout(String),

    /// Caller cancelled the evaluation
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// External backend (Redis) failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Invalid argument value (parsable but semantically wrong)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialized series could not be decoded
    #[error("malformed {format} input: {message}")]
    Decode {
        /// Wire format name
        format: &'static str,
        /// What was wrong
        message: String,
    },
}

impl Error {
    /// Build a `BadArgumentType` error
    pub fn bad_argument(
        function: impl Into<String>,
        argument: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Error::BadArgumentType {
            function: function.into(),
            argument: argument.to_string(),
            expected: expected.into(),
        }
    }

    /// Build a `MissingArgument` error
    pub fn missing_argument(function: impl Into<String>, argument: impl ToString) -> Self {
        Error::MissingArgument {
            function: function.into(),
            argument: argument.to_string(),
        }
    }

    /// True for the two "nothing matched" kinds that aggregates tolerate
    pub fn is_missing_series(&self) -> bool {
        matches!(
            self,
            Error::MissingTimeSeries(_) | Error::SeriesDoesNotExist(_)
        )
    }
}

/// Reason a function module did not register
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Function is switched off or its config section is absent
    #[error("disabled: {0}")]
    Disabled(String),

    /// Config file could not be read
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path of the config file
        path: String,
        /// Underlying IO error
        message: String,
    },

    /// Config file could not be parsed
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the config file
        path: String,
        /// Underlying parse error
        message: String,
    },

    /// Config parsed but holds invalid values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Configuration(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
