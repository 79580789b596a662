//! This module contains the generic numeric filter and its expression
//! parser.

use std::collections::HashSet;
use std::marker::PhantomData;

use crate::{FilterError, Operator};

const MIN_NOT_SET: i64 = i64::MAX;
const MAX_NOT_SET: i64 = i64::MIN;

mod private {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// Signed integer widths a [`NumericFilter`] can serve.
///
/// Storage is always [`i64`]; the width only selects the range check
/// applied when a value is inserted into the filter.
pub trait FilterableInt: private::Sealed + Copy + Into<i64> {
    /// Whether `value` is representable at this width.
    fn fits(value: i64) -> bool;
}

impl FilterableInt for i64 {
    fn fits(_value: i64) -> bool {
        true
    }
}

impl FilterableInt for i32 {
    fn fits(value: i64) -> bool {
        (i32::MIN as i64..=i32::MAX as i64).contains(&value)
    }
}

/// Filter for fields holding an [`i64`] value (return values, 64 bit
/// namespace ids).
pub type Int64Filter = NumericFilter<i64>;

/// Filter for fields holding an [`i32`] value (process ids, user ids).
pub type Int32Filter = NumericFilter<i32>;

/// Range/equality filter for one integer-valued event field.
///
/// A filter accumulates state from one or more parsed expressions during
/// configuration and is then queried with [`NumericFilter::matches`] for
/// every captured event. Parsing is cumulative: later expressions add to
/// the accumulated state, they never reset it. There is no reset
/// operation.
///
/// In the default mode `!=` values are recorded but never veto a value
/// on their own. [`NumericFilter::set_strict_exclusion`] opts into the
/// semantics where exclusions actually reject.
#[derive(Debug, Clone)]
pub struct NumericFilter<T: FilterableInt> {
    equal: HashSet<i64>,
    not_equal: HashSet<i64>,
    min: i64,
    max: i64,
    enabled: bool,
    strict_exclusion: bool,
    _width: PhantomData<T>,
}

impl<T: FilterableInt> Default for NumericFilter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FilterableInt> NumericFilter<T> {
    /// Creates a disabled filter: both sets empty, both thresholds at
    /// their "not configured" sentinels.
    pub fn new() -> Self {
        Self {
            equal: HashSet::new(),
            not_equal: HashSet::new(),
            min: MIN_NOT_SET,
            max: MAX_NOT_SET,
            enabled: false,
            strict_exclusion: false,
            _width: PhantomData,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Opts into strict `!=` semantics, where excluded values are
    /// rejected instead of only being recorded.
    pub fn set_strict_exclusion(&mut self, strict: bool) {
        self.strict_exclusion = strict;
    }

    /// Lowest `>` threshold supplied so far, [`i64::MAX`] when none was.
    ///
    /// Exposed together with [`NumericFilter::maximum`] and
    /// [`NumericFilter::equalities`] so an eBPF loader can program the
    /// same bounds into kernel side maps.
    pub fn minimum(&self) -> i64 {
        self.min
    }

    /// Highest `<` threshold supplied so far, [`i64::MIN`] when none was.
    pub fn maximum(&self) -> i64 {
        self.max
    }

    /// The accumulated equality values, in no particular order.
    pub fn equalities(&self) -> impl Iterator<Item = i64> + '_ {
        self.equal.iter().copied()
    }

    /// Parses one expression and folds its values into the filter.
    ///
    /// The expression is an operator token directly followed by one or
    /// more comma separated base-10 values: `=0`, `!=42,43`, `>=1000`.
    /// Values are applied one at a time, so values preceding a bad
    /// literal stay inserted; the filter is only enabled when the whole
    /// expression went through.
    pub fn parse(&mut self, expression: &str) -> Result<(), FilterError> {
        let bytes = expression.as_bytes();
        if bytes.len() < 2 {
            return Err(FilterError::InvalidExpression(expression.to_string()));
        }

        let token_len = match bytes[0] {
            b'!' => 2,
            b'<' | b'>' if bytes[1] == b'=' => 2,
            _ => 1,
        };
        if token_len == 2 && bytes.len() < 3 {
            return Err(FilterError::InvalidExpression(expression.to_string()));
        }

        let operator = expression
            .get(..token_len)
            .and_then(Operator::from_token)
            .ok_or_else(|| FilterError::InvalidExpression(expression.to_string()))?;

        for literal in expression[token_len..].split(',') {
            let value: i64 = literal
                .parse()
                .map_err(|_| FilterError::InvalidValue(literal.to_string()))?;
            self.add(value, operator)?;
        }

        self.enable();

        Ok(())
    }

    fn add(&mut self, value: i64, operator: Operator) -> Result<(), FilterError> {
        if !T::fits(value) {
            return Err(FilterError::InvalidValue(value.to_string()));
        }
        match operator {
            Operator::Equal => {
                self.equal.insert(value);
            }
            Operator::NotEqual => {
                self.not_equal.insert(value);
            }
            Operator::Lower => self.add_lower_than(value),
            Operator::Greater => self.add_greater_than(value),
            Operator::LowerEqual => {
                self.equal.insert(value);
                self.add_lower_than(value);
            }
            Operator::GreaterEqual => {
                self.equal.insert(value);
                self.add_greater_than(value);
            }
        }
        Ok(())
    }

    fn add_lower_than(&mut self, value: i64) {
        // keep the highest `<` threshold supplied
        if value > self.max {
            self.max = value;
        }
    }

    fn add_greater_than(&mut self, value: i64) {
        // keep the lowest `>` threshold supplied
        if value < self.min {
            self.min = value;
        }
    }

    /// Whether `value` passes the filter.
    ///
    /// Priority goes by (from most significant): equality, greater,
    /// lesser, non equality. A disabled filter passes everything.
    pub fn matches(&self, value: T) -> bool {
        let comp_val: i64 = value.into();
        let passed = !self.enabled
            || self.equal.contains(&comp_val)
            || comp_val > self.min
            || comp_val < self.max;
        if self.strict_exclusion {
            return self.matches_strict(comp_val, passed);
        }
        if !passed && self.not_equal.contains(&comp_val) {
            return false;
        }
        passed
    }

    fn matches_strict(&self, comp_val: i64, passed: bool) -> bool {
        if !self.enabled || self.equal.contains(&comp_val) {
            return passed;
        }
        if self.not_equal.contains(&comp_val) {
            return false;
        }
        // An enabled filter holding nothing but exclusions passes by
        // default, so that `!=5` keeps every event except pid 5 instead
        // of dropping them all.
        passed || (self.exclusion_only() && !self.not_equal.is_empty())
    }

    fn exclusion_only(&self) -> bool {
        self.equal.is_empty() && self.min == MIN_NOT_SET && self.max == MAX_NOT_SET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_filter_accepts_everything() {
        let filter = Int64Filter::new();
        assert!(!filter.enabled());
        assert!(filter.matches(0));
        assert!(filter.matches(i64::MAX));
        assert!(filter.matches(i64::MIN));
    }

    #[test]
    fn fresh_filter_reports_sentinels() {
        let filter = Int64Filter::new();
        assert_eq!(filter.minimum(), i64::MAX);
        assert_eq!(filter.maximum(), i64::MIN);
        assert_eq!(filter.equalities().count(), 0);
    }

    #[test]
    fn equality_values_pass() {
        let mut filter = Int64Filter::new();
        filter.parse("=1,2,3").unwrap();
        assert!(filter.matches(2));
        assert!(!filter.matches(4));

        let mut equalities: Vec<i64> = filter.equalities().collect();
        equalities.sort_unstable();
        assert_eq!(equalities, vec![1, 2, 3]);
    }

    #[test]
    fn equality_passes_regardless_of_bounds() {
        let mut filter = Int64Filter::new();
        filter.parse("<0").unwrap();
        filter.parse("=5").unwrap();
        assert!(filter.matches(5));
        assert!(!filter.matches(4));
    }

    #[test]
    fn greater_than_threshold_is_strict() {
        let mut filter = Int64Filter::new();
        filter.parse(">10").unwrap();
        assert!(filter.matches(11));
        assert!(!filter.matches(10));
        assert!(!filter.matches(9));
    }

    #[test]
    fn lower_than_threshold_is_strict() {
        let mut filter = Int64Filter::new();
        filter.parse("<10").unwrap();
        assert!(filter.matches(9));
        assert!(!filter.matches(10));
    }

    #[test]
    fn greater_equal_includes_the_boundary() {
        let mut filter = Int64Filter::new();
        filter.parse(">=1000").unwrap();
        assert!(filter.matches(1000));
        assert!(filter.matches(1001));
        assert!(!filter.matches(999));
        assert_eq!(filter.minimum(), 1000);
    }

    #[test]
    fn lower_equal_includes_the_boundary() {
        let mut filter = Int64Filter::new();
        filter.parse("<=10").unwrap();
        assert!(filter.matches(10));
        assert!(filter.matches(9));
        assert!(!filter.matches(11));
        assert_eq!(filter.maximum(), 10);
    }

    #[test]
    fn same_direction_bounds_keep_the_permissive_one() {
        let mut filter = Int64Filter::new();
        filter.parse(">100").unwrap();
        filter.parse(">10").unwrap();
        assert!(filter.matches(50));
        assert_eq!(filter.minimum(), 10);
    }

    #[test]
    fn multi_value_bounds_keep_the_permissive_one() {
        let mut filter = Int64Filter::new();
        filter.parse(">100,10,50").unwrap();
        assert_eq!(filter.minimum(), 10);
        filter.parse("<3,7").unwrap();
        assert_eq!(filter.maximum(), 7);
    }

    #[test]
    fn exclusions_never_veto_a_passing_value() {
        let mut filter = Int64Filter::new();
        filter.parse(">10").unwrap();
        filter.parse("!=15").unwrap();
        assert!(filter.matches(15));
    }

    #[test]
    fn exclusion_only_filter_rejects_everything() {
        // `!=` values are recorded but grant nothing, so a filter built
        // from exclusions alone has no way to pass a value.
        let mut filter = Int64Filter::new();
        filter.parse("!=5").unwrap();
        assert!(!filter.matches(5));
        assert!(!filter.matches(6));
    }

    #[test]
    fn strict_exclusion_vetoes() {
        let mut filter = Int64Filter::new();
        filter.set_strict_exclusion(true);
        filter.parse("!=5").unwrap();
        assert!(filter.matches(6));
        assert!(!filter.matches(5));

        let mut filter = Int64Filter::new();
        filter.set_strict_exclusion(true);
        filter.parse(">10").unwrap();
        filter.parse("!=15").unwrap();
        assert!(!filter.matches(15));
        assert!(filter.matches(16));
        assert!(!filter.matches(9));
    }

    #[test]
    fn strict_exclusion_equality_wins() {
        let mut filter = Int64Filter::new();
        filter.set_strict_exclusion(true);
        filter.parse("=5").unwrap();
        filter.parse("!=5").unwrap();
        assert!(filter.matches(5));
        assert!(!filter.matches(6));
    }

    #[test]
    fn short_expressions_are_rejected() {
        let mut filter = Int64Filter::new();
        for expression in ["", "=", "5", "!=", ">="] {
            assert_eq!(
                filter.parse(expression),
                Err(FilterError::InvalidExpression(expression.to_string())),
                "expression {expression:?}"
            );
        }
        assert!(!filter.enabled());
    }

    #[test]
    fn bang_without_equal_is_rejected() {
        let mut filter = Int64Filter::new();
        assert_eq!(
            filter.parse("!5"),
            Err(FilterError::InvalidExpression("!5".to_string()))
        );
        assert_eq!(
            filter.parse("!55"),
            Err(FilterError::InvalidExpression("!55".to_string()))
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let mut filter = Int64Filter::new();
        assert_eq!(
            filter.parse("~5"),
            Err(FilterError::InvalidExpression("~5".to_string()))
        );
    }

    #[test]
    fn bad_literals_are_rejected() {
        let mut filter = Int64Filter::new();
        assert_eq!(
            filter.parse("=abc"),
            Err(FilterError::InvalidValue("abc".to_string()))
        );
        assert_eq!(
            filter.parse("=1,,2"),
            Err(FilterError::InvalidValue("".to_string()))
        );
        assert_eq!(
            filter.parse("=9223372036854775808"),
            Err(FilterError::InvalidValue("9223372036854775808".to_string()))
        );
    }

    #[test]
    fn i32_width_is_enforced() {
        let mut filter = Int32Filter::new();
        filter.parse("=2147483647").unwrap();
        filter.parse("=-2147483648").unwrap();
        assert_eq!(
            filter.parse("=2147483648"),
            Err(FilterError::InvalidValue("2147483648".to_string()))
        );
        assert_eq!(
            filter.parse("=-2147483649"),
            Err(FilterError::InvalidValue("-2147483649".to_string()))
        );
        assert_eq!(
            filter.parse("=4294967296"),
            Err(FilterError::InvalidValue("4294967296".to_string()))
        );
    }

    #[test]
    fn insertion_is_per_value_not_per_expression() {
        let mut filter = Int64Filter::new();
        assert!(filter.parse("=1,abc").is_err());
        // the failed expression did not enable the filter...
        assert!(!filter.enabled());
        assert!(filter.matches(7));
        // ...but the value parsed before the bad literal stuck
        filter.parse("=2").unwrap();
        assert!(filter.matches(1));
        assert!(filter.matches(2));
        assert!(!filter.matches(7));
    }

    #[test]
    fn parse_calls_are_cumulative() {
        let mut filter = Int32Filter::new();
        filter.parse("=1").unwrap();
        filter.parse(">100").unwrap();
        assert!(filter.matches(1));
        assert!(filter.matches(101));
        assert!(!filter.matches(50));
    }

    #[test]
    fn disable_bypasses_accumulated_state() {
        let mut filter = Int64Filter::new();
        filter.parse("=1").unwrap();
        assert!(!filter.matches(7));
        filter.disable();
        assert!(filter.matches(7));
        assert_eq!(filter.minimum(), i64::MAX);
        assert_eq!(filter.maximum(), i64::MIN);
    }

    #[test]
    fn negative_values_parse() {
        let mut filter = Int64Filter::new();
        filter.parse("<0").unwrap();
        assert!(filter.matches(-1));
        assert!(!filter.matches(0));
        filter.parse("=-42").unwrap();
        assert!(filter.matches(-42));
    }
}
