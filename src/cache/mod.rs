//! Time-bounded memoization in front of the ranking engine.
//!
//! The cache is an explicitly constructed object with an injected `Clock`, handed to
//! whoever needs it rather than living in a global.

mod clock;
mod ttl;

pub use clock::*;
pub use ttl::*;
