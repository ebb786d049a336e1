//! Defines the data structures and models used throughout the application.
//!
//! This includes the normalised readings and station observations the core works on,
//! the ranking and statistics output records, the archive row shapes, and the OpenAQ
//! v3 wire structures consumed by the OpenAQ source adapter.

mod archive;
mod openaq;
mod reading;
mod report;

pub use archive::*;
pub use openaq::*;
pub use reading::*;
pub use report::*;
