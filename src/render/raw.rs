//! Graphite raw text: one line per series, `name,start,stop,step|v1,v2,None`

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::types::MetricData;

use super::from_points;

/// Serialize consolidated series to raw text
pub fn marshal(series: &mut [MetricData]) -> String {
    let mut out = String::new();
    for s in series.iter_mut() {
        let step = s.aggregated_time_step();
        let points = s.aggregated_points();
        let start = points.first().map(|p| p.0).unwrap_or(s.start_time);
        let stop = start + points.len() as i64 * step;

        let _ = write!(out, "{},{},{},{}|", s.name, start, stop, step);
        for (i, (_, v)) in points.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match v {
                Some(v) => {
                    let _ = write!(out, "{}", v);
                },
                None => out.push_str("None"),
            }
        }
        out.push('\n');
    }
    out
}

fn malformed(line: usize, message: impl Into<String>) -> Error {
    Error::Decode {
        format: "raw",
        message: format!("line {}: {}", line + 1, message.into()),
    }
}

/// Parse raw text
///
/// Names may contain commas; the header is split from the right.
pub fn unmarshal(input: &str) -> Result<Vec<MetricData>> {
    let mut out = Vec::new();
    for (lineno, line) in input.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (header, body) = line
            .rsplit_once('|')
            .ok_or_else(|| malformed(lineno, "missing '|'"))?;

        let mut fields = header.rsplitn(4, ',');
        let mut int = |what: &str| -> Result<i64> {
            fields
                .next()
                .ok_or_else(|| malformed(lineno, format!("missing {}", what)))?
                .parse::<i64>()
                .map_err(|e| malformed(lineno, format!("{}: {}", what, e)))
        };
        let step = int("step")?;
        let stop = int("stop")?;
        let start = int("start")?;
        let name = fields
            .next()
            .ok_or_else(|| malformed(lineno, "missing name"))?;

        let points = if body.is_empty() {
            Vec::new()
        } else {
            body.split(',')
                .enumerate()
                .map(|(i, v)| {
                    let ts = start + i as i64 * step;
                    match v {
                        "None" => Ok((ts, None)),
                        v => v
                            .parse::<f64>()
                            .map(|v| (ts, Some(v)))
                            .map_err(|e| malformed(lineno, format!("value {:?}: {}", v, e))),
                    }
                })
                .collect::<Result<Vec<_>>>()?
        };

        if stop != start + points.len() as i64 * step {
            return Err(malformed(
                lineno,
                format!("{} points do not span {}..{} at step {}", points.len(), start, stop, step),
            ));
        }
        let mut s = from_points("raw", name, &points, step)?;
        if points.is_empty() {
            s.start_time = start;
            s.stop_time = stop;
            s.step_time = step;
        }
        out.push(s);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_line() {
        let mut series = vec![MetricData::new("a.b", vec![1.0, f64::NAN, 0.25], 10, 100)];
        assert_eq!(marshal(&mut series), "a.b,100,130,10|1,None,0.25\n");
    }

    #[test]
    fn test_name_with_commas() {
        let series = unmarshal("sum(a,b),0,20,10|1,2\n").unwrap();
        assert_eq!(series[0].name, "sum(a,b)");
        assert_eq!(series[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_exact_values() {
        let v = 0.1 + 0.2;
        let mut series = vec![MetricData::new("x", vec![v, 1e-300], 1, 0)];
        let back = unmarshal(&marshal(&mut series)).unwrap();
        assert_eq!(back[0].values, vec![v, 1e-300]);
    }

    #[test]
    fn test_bad_input() {
        assert!(unmarshal("no header here").is_err());
        assert!(unmarshal("a,0,10,x|1").is_err());
        assert!(unmarshal("a,0,30,10|1,2").is_err());
        assert!(unmarshal("a,0,20,10|1,oops").is_err());
    }
}
