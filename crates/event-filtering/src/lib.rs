//! # Numeric event filtering
//!
//! This crate contains the range/equality filters backing the
//! integer-valued fields of captured kernel events: process ids, user
//! ids, namespace ids, syscall return values.
//!
//! Each filter is configured from a textual expression, an operator
//! token followed by one or more comma separated values (`>=1000`,
//! `!=42,43`, `<100,200`), and is then queried once per captured event.
//!
//! # General design
//!
//! - Values are stored widened to [`i64`] no matter which width the
//!   filter serves; the declared width only selects the bounds check
//!   applied when a value is inserted.
//! - Relational clauses of the same direction are OR'd together: the
//!   filter keeps the most permissive threshold, not the most
//!   restrictive one.
//! - A freshly built filter is disabled and accepts every value; it
//!   becomes enabled when an expression is successfully parsed into it.
//! - Parsing takes `&mut self`, evaluation `&self`. Once a filter is
//!   shared with the workers draining the event stream it can no longer
//!   be reconfigured.
//! - Evaluation never blocks or allocates: two hash set lookups and two
//!   comparisons per value.
//!
//! The thresholds and equality values accumulated by a filter are also
//! exposed through accessors, so that an eBPF loader can program the
//! same bounds into kernel side maps and drop events before they ever
//! reach userspace.

mod error;
mod numeric;
mod operators;

pub use error::FilterError;
pub use numeric::{FilterableInt, Int32Filter, Int64Filter, NumericFilter};
pub use operators::Operator;
