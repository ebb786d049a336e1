//! Provides reading sources and the concurrent fetch that feeds the aggregator.
//!
//! Includes:
//! - `source`: the `ReadingSource` trait and `fetch_all_readings`.
//! - `openaq`: OpenAQ v3 adapter.
//! - `mock`: randomised Balkan station generator.

mod mock;
mod openaq;
mod source;

pub use mock::*;
pub use openaq::*;
pub use source::*;
