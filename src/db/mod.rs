//! Optional persistence for observations.
//!
//! Only the PostgreSQL archive in `postgres` exists; nothing in the core depends on it.

mod postgres;

pub use postgres::*;
