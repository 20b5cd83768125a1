//! Wire formats for result series
//!
//! Series are written from their consolidated view, so the output honours
//! whatever `maxDataPoints` the caller requested through
//! [`MetricData::consolidate`]. Reading a format back yields unconsolidated
//! series on the written timeline.
//!
//! | Format | Layout                                   | Precision            |
//! |--------|------------------------------------------|----------------------|
//! | json   | `[{"target","datapoints":[[v,ts]],"tags"}]` | exact              |
//! | raw    | `name,start,stop,step\|v,None,...`       | exact                |
//! | csv    | `name,YYYY-MM-DD HH:MM:SS,value`         | values exact, 1s     |

pub mod csv;
pub mod json;
pub mod raw;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::MetricData;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Graphite JSON points array
    Json,
    /// One line per series, comma separated values
    Raw,
    /// One line per point
    Csv,
}

impl Format {
    /// Format name as used in `format=` query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Raw => "raw",
            Format::Csv => "csv",
        }
    }

    /// MIME type of the output
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Raw => "text/plain",
            Format::Csv => "text/csv",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "raw" => Ok(Format::Raw),
            "csv" => Ok(Format::Csv),
            other => Err(Error::InvalidArgument(format!(
                "unsupported render format: {}",
                other
            ))),
        }
    }
}

/// Serialize `series` in `format`
pub fn marshal(format: Format, series: &mut [MetricData]) -> Result<Vec<u8>> {
    match format {
        Format::Json => json::marshal(series),
        Format::Raw => Ok(raw::marshal(series).into_bytes()),
        Format::Csv => Ok(csv::marshal(series).into_bytes()),
    }
}

/// Parse series written by [`marshal`]
pub fn unmarshal(format: Format, input: &[u8]) -> Result<Vec<MetricData>> {
    match format {
        Format::Json => json::unmarshal(input),
        Format::Raw => raw::unmarshal(utf8(format, input)?),
        Format::Csv => csv::unmarshal(utf8(format, input)?),
    }
}

fn utf8(format: Format, input: &[u8]) -> Result<&str> {
    std::str::from_utf8(input).map_err(|e| Error::Decode {
        format: format.as_str(),
        message: e.to_string(),
    })
}

/// Rebuild a series from `(timestamp, value)` points
///
/// The step is the distance between the first two points; a single point
/// gets `default_step`.
pub(crate) fn from_points(
    format: &'static str,
    name: &str,
    points: &[(i64, Option<f64>)],
    default_step: i64,
) -> Result<MetricData> {
    let start = points.first().map(|p| p.0).unwrap_or(0);
    let step = match points {
        [a, b, ..] => b.0 - a.0,
        _ => default_step,
    };
    if step <= 0 {
        return Err(Error::Decode {
            format,
            message: format!("{}: timestamps not increasing", name),
        });
    }
    for (i, (ts, _)) in points.iter().enumerate() {
        if *ts != start + i as i64 * step {
            return Err(Error::Decode {
                format,
                message: format!("{}: irregular timestamp {} at index {}", name, ts, i),
            });
        }
    }

    let values = points.iter().map(|p| p.1.unwrap_or(f64::NAN)).collect();
    let absent = points.iter().map(|p| p.1.is_none()).collect();
    Ok(MetricData::with_absent(name, values, absent, step, start))
}
