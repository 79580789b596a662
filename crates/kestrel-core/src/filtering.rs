//! # Per-field event filtering
//!
//! This module decides, per captured event, whether the event is
//! interesting for the rest of the system or should be discarded.
//!
//! Users configure one or more filter expressions per field (`pid` →
//! `>=1000`, `retval` → `<0`). Every expression constrains a single
//! integer-valued field and they combine as follows:
//!
//! - expressions on the same field are OR'd together by the filter
//!   itself (see [`event_filtering::NumericFilter`])
//! - different fields are AND'd: an event must pass every configured
//!   field to be kept
//! - fields with no configured filter never veto an event
//!
//! Header fields (`pid`, `ppid`, `uid`, `gid`) are read straight from
//! the event header and are 32 bit. The remaining fields (`retval`,
//! `mntns`, `pidns`) live in the argument list and are 64 bit; an event
//! that lacks the argument, or carries it with an unexpected type, does
//! not pass that filter. Filtering must never fail event processing, so
//! those cases degrade to "no match" instead of erroring.
//!
//! The accumulated thresholds of every field are exported through
//! [`FieldFilters::bounds`] so a loader can program equivalent checks
//! into kernel side maps and drop uninteresting events at the source.

use std::collections::HashMap;

use event_filtering::{FilterError, Int32Filter, Int64Filter};
use thiserror::Error;

use crate::event::{Event, Header};

/// Width and sourcing of one filterable field.
#[derive(Debug, Clone, Copy)]
enum FieldSource {
    /// 32 bit value read from the event header.
    Header(fn(&Header) -> i32),
    /// 64 bit value looked up in the event arguments by field name.
    Argument,
}

const KNOWN_FIELDS: &[(&str, FieldSource)] = &[
    ("pid", FieldSource::Header(|header| header.pid)),
    ("ppid", FieldSource::Header(|header| header.ppid)),
    ("uid", FieldSource::Header(|header| header.uid)),
    ("gid", FieldSource::Header(|header| header.gid)),
    ("retval", FieldSource::Argument),
    ("mntns", FieldSource::Argument),
    ("pidns", FieldSource::Argument),
];

fn lookup_field(name: &str) -> Option<FieldSource> {
    KNOWN_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, source)| *source)
}

/// User supplied filter table: field name → expression, in insertion
/// order. A field may appear multiple times; its expressions accumulate
/// into a single filter.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    entries: Vec<(String, String)>,
    strict_exclusion: bool,
}

impl FilterConfig {
    /// Appends one filter expression for a field.
    pub fn insert(&mut self, field: impl Into<String>, expression: impl Into<String>) -> &mut Self {
        self.entries.push((field.into(), expression.into()));
        self
    }

    /// Makes `!=` expressions actually reject the listed values instead
    /// of only recording them.
    pub fn set_strict_exclusion(&mut self, strict: bool) -> &mut Self {
        self.strict_exclusion = strict;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown filter field {field}")]
    UnknownField { field: String },
    #[error("invalid filter for field {field}: {source}")]
    BadExpression { field: String, source: FilterError },
}

#[derive(Debug, Clone)]
enum FieldFilter {
    Header {
        get: fn(&Header) -> i32,
        filter: Int32Filter,
    },
    Argument {
        filter: Int64Filter,
    },
}

/// Thresholds and equalities accumulated for one field, in the shape an
/// in-kernel filtering loader consumes. `min`/`max` hold their
/// sentinels ([`i64::MAX`]/[`i64::MIN`]) when the direction was never
/// constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBounds {
    pub min: i64,
    pub max: i64,
    pub equalities: Vec<i64>,
}

/// The compiled per-field filters applied to every captured event.
///
/// Built once from a [`FilterConfig`] during startup, then shared
/// read-only with the workers draining the event stream.
#[derive(Debug, Clone, Default)]
pub struct FieldFilters {
    filters: HashMap<String, FieldFilter>,
}

impl TryFrom<&FilterConfig> for FieldFilters {
    type Error = ConfigError;

    fn try_from(config: &FilterConfig) -> Result<Self, Self::Error> {
        let mut filters: HashMap<String, FieldFilter> = HashMap::new();

        for (field, expression) in &config.entries {
            let source = lookup_field(field).ok_or_else(|| ConfigError::UnknownField {
                field: field.clone(),
            })?;
            let entry = filters
                .entry(field.clone())
                .or_insert_with(|| match source {
                    FieldSource::Header(get) => {
                        let mut filter = Int32Filter::new();
                        filter.set_strict_exclusion(config.strict_exclusion);
                        FieldFilter::Header { get, filter }
                    }
                    FieldSource::Argument => {
                        let mut filter = Int64Filter::new();
                        filter.set_strict_exclusion(config.strict_exclusion);
                        FieldFilter::Argument { filter }
                    }
                });
            match entry {
                FieldFilter::Header { filter, .. } => filter.parse(expression),
                FieldFilter::Argument { filter } => filter.parse(expression),
            }
            .map_err(|source| ConfigError::BadExpression {
                field: field.clone(),
                source,
            })?;
            log::debug!("installed filter on field {field}: {expression}");
        }

        Ok(FieldFilters { filters })
    }
}

impl FieldFilters {
    /// Whether the event passes every configured field filter.
    pub fn matches(&self, event: &Event) -> bool {
        self.filters.iter().all(|(field, filter)| match filter {
            FieldFilter::Header { get, filter } => filter.matches(get(event.header())),
            FieldFilter::Argument { filter } => match event.arg_val::<i64>(field) {
                Ok(value) => filter.matches(value),
                Err(_) => false,
            },
        })
    }

    /// Names of the fields carrying a configured filter.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Loader-facing export of one field's accumulated bounds, `None`
    /// when the field carries no filter. Equalities are sorted for
    /// deterministic map programming.
    pub fn bounds(&self, field: &str) -> Option<FilterBounds> {
        self.filters.get(field).map(|filter| {
            let (min, max, mut equalities) = match filter {
                FieldFilter::Header { filter, .. } => (
                    filter.minimum(),
                    filter.maximum(),
                    filter.equalities().collect::<Vec<_>>(),
                ),
                FieldFilter::Argument { filter } => (
                    filter.minimum(),
                    filter.maximum(),
                    filter.equalities().collect::<Vec<_>>(),
                ),
            };
            equalities.sort_unstable();
            FilterBounds {
                min,
                max,
                equalities,
            }
        })
    }
}
