//! The aggregation, ranking and statistics core.
//!
//! Includes:
//! - `aggregate`: readings to observations, plus the opt-in co-located merge.
//! - `ranking`: best/worst/all orderings and the data-quality tag.
//! - `stats`: network statistics and country/city roll-ups.
//! - `query`: validated ranking requests.
//! - `pipeline`: sources through aggregation and ranking, fronted by the cache.

mod aggregate;
mod pipeline;
mod query;
mod ranking;
mod stats;

pub use aggregate::*;
pub use pipeline::*;
pub use query::*;
pub use ranking::*;
pub use stats::*;
