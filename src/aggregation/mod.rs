//! Alignment and cross-series aggregation
//!
//! - `align`: reconcile start/stop/step of several series
//! - `series`: reduce many aligned series to one

pub mod align;
pub mod series;

pub use align::{align_series, extrapolate, scale_to_common_step};
pub use series::{aggregate_aligned, aggregate_series, common_tags, AggregateFunc};
