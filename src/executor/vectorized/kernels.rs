//! Elementwise primitive operators.
//!
//! Each operator family is a small trait implemented by one zero-sized type
//! per operator. The operand pair is matched once per call; the row loop
//! inside [`try_map2`] is monomorphized for the concrete element and
//! scalar/vector combination.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use super::operand::{map1, try_map2, ByteMask, Operand, Side, Typed, Vector};
use crate::error::{Result, TabulaError};
use crate::expression::{PredicateFromValueOperator, PredicateOperator, ValueOperator};

/// Expands to one `try_map2` call per scalar/vector combination.
macro_rules! zip_sides {
    ($lhs:expr, $rhs:expr, $len:expr, $f:expr) => {
        match ($lhs, $rhs) {
            (Side::Scalar(l), Side::Scalar(r)) => try_map2(&l, &r, $len, $f),
            (Side::Scalar(l), Side::Vector(r)) => try_map2(&l, &r, $len, $f),
            (Side::Vector(l), Side::Scalar(r)) => try_map2(&l, &r, $len, $f),
            (Side::Vector(l), Side::Vector(r)) => try_map2(&l, &r, $len, $f),
        }
    };
}

// ==================== Arithmetic ====================

trait Arithmetic {
    fn ints(a: i64, b: i64) -> Result<i64>;
    fn floats(a: f64, b: f64) -> f64;
}

struct Add;
struct Subtract;
struct Multiply;
struct Divide;

impl Arithmetic for Add {
    fn ints(a: i64, b: i64) -> Result<i64> {
        Ok(a.wrapping_add(b))
    }
    fn floats(a: f64, b: f64) -> f64 {
        a + b
    }
}

impl Arithmetic for Subtract {
    fn ints(a: i64, b: i64) -> Result<i64> {
        Ok(a.wrapping_sub(b))
    }
    fn floats(a: f64, b: f64) -> f64 {
        a - b
    }
}

impl Arithmetic for Multiply {
    fn ints(a: i64, b: i64) -> Result<i64> {
        Ok(a.wrapping_mul(b))
    }
    fn floats(a: f64, b: f64) -> f64 {
        a * b
    }
}

impl Arithmetic for Divide {
    fn ints(a: i64, b: i64) -> Result<i64> {
        if b == 0 {
            return Err(TabulaError::DivisionByZero);
        }
        Ok(a.wrapping_div(b))
    }
    fn floats(a: f64, b: f64) -> f64 {
        a / b
    }
}

/// Applies a binary value operator.
///
/// Two numeric scalars fold to a scalar; every other combination yields a
/// vector of `len` rows.
///
/// # Errors
///
/// Returns `TypeMismatch` unless both operands are numeric,
/// `DivisionByZero` for integer division by zero on a present row and
/// `NotImplemented` for unary operators.
pub fn arithmetic(
    op: ValueOperator,
    lhs: &Operand<'_>,
    rhs: &Operand<'_>,
    len: usize,
) -> Result<Operand<'static>> {
    match op {
        ValueOperator::Add => arithmetic_with::<Add>(op, lhs, rhs, len),
        ValueOperator::Subtract => arithmetic_with::<Subtract>(op, lhs, rhs, len),
        ValueOperator::Multiply => arithmetic_with::<Multiply>(op, lhs, rhs, len),
        ValueOperator::Divide => arithmetic_with::<Divide>(op, lhs, rhs, len),
        ValueOperator::Negate => Err(TabulaError::NotImplemented(format!(
            "binary value operator {}",
            op.id()
        ))),
    }
}

fn arithmetic_with<K: Arithmetic>(
    op: ValueOperator,
    lhs: &Operand<'_>,
    rhs: &Operand<'_>,
    len: usize,
) -> Result<Operand<'static>> {
    match (lhs.typed(), rhs.typed()) {
        (Typed::Int64(Side::Scalar(a)), Typed::Int64(Side::Scalar(b))) => {
            Ok(Operand::Int64(K::ints(a, b)?))
        }
        (Typed::Int64(Side::Scalar(a)), Typed::Float64(Side::Scalar(b))) => {
            Ok(Operand::Float64(K::floats(a as f64, b)))
        }
        (Typed::Float64(Side::Scalar(a)), Typed::Int64(Side::Scalar(b))) => {
            Ok(Operand::Float64(K::floats(a, b as f64)))
        }
        (Typed::Float64(Side::Scalar(a)), Typed::Float64(Side::Scalar(b))) => {
            Ok(Operand::Float64(K::floats(a, b)))
        }
        (Typed::Int64(l), Typed::Int64(r)) => Ok(Operand::Int64Vector(zip_sides!(
            l,
            r,
            len,
            |a: i64, b: i64| K::ints(a, b)
        )?)),
        (Typed::Int64(l), Typed::Float64(r)) => Ok(Operand::Float64Vector(zip_sides!(
            l.widen(),
            r,
            len,
            |a: f64, b: f64| Ok(K::floats(a, b))
        )?)),
        (Typed::Float64(l), Typed::Int64(r)) => Ok(Operand::Float64Vector(zip_sides!(
            l,
            r.widen(),
            len,
            |a: f64, b: f64| Ok(K::floats(a, b))
        )?)),
        (Typed::Float64(l), Typed::Float64(r)) => Ok(Operand::Float64Vector(zip_sides!(
            l,
            r,
            len,
            |a: f64, b: f64| Ok(K::floats(a, b))
        )?)),
        _ => Err(TabulaError::mismatch(
            op.name(),
            lhs.data_type(),
            rhs.data_type(),
        )),
    }
}

/// Applies a unary value operator.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric operands and `NotImplemented`
/// for binary operators.
pub fn unary_arithmetic(
    op: ValueOperator,
    operand: &Operand<'_>,
    len: usize,
) -> Result<Operand<'static>> {
    match op {
        ValueOperator::Negate => negate(operand, len),
        other => Err(TabulaError::NotImplemented(format!(
            "unary value operator {}",
            other.id()
        ))),
    }
}

/// Negates a numeric operand.
///
/// # Errors
///
/// Returns `UnsupportedType` for non-numeric operands.
pub fn negate(operand: &Operand<'_>, len: usize) -> Result<Operand<'static>> {
    match operand.typed() {
        Typed::Int64(Side::Scalar(v)) => Ok(Operand::Int64(v.wrapping_neg())),
        Typed::Int64(Side::Vector(v)) => Ok(Operand::Int64Vector(map1(&v, len, i64::wrapping_neg))),
        Typed::Float64(Side::Scalar(v)) => Ok(Operand::Float64(-v)),
        Typed::Float64(Side::Vector(v)) => {
            Ok(Operand::Float64Vector(map1(&v, len, |x: f64| -x)))
        }
        Typed::Bool(_) | Typed::String(_) => Err(TabulaError::unsupported(
            ValueOperator::Negate.name(),
            operand.data_type(),
        )),
    }
}

// ==================== Comparisons ====================

trait Comparison {
    /// Whether string/string operands are admitted.
    const STRINGS: bool = false;

    fn ints(a: i64, b: i64) -> bool;
    fn floats(a: f64, b: f64) -> bool;
    fn bools(a: bool, b: bool) -> bool;
    fn strings(_a: &str, _b: &str) -> bool {
        false
    }
}

struct Greater;
struct Lesser;
struct Equal;

impl Comparison for Greater {
    fn ints(a: i64, b: i64) -> bool {
        a > b
    }
    fn floats(a: f64, b: f64) -> bool {
        a > b
    }
    fn bools(a: bool, b: bool) -> bool {
        a & !b
    }
}

impl Comparison for Lesser {
    fn ints(a: i64, b: i64) -> bool {
        a < b
    }
    fn floats(a: f64, b: f64) -> bool {
        a < b
    }
    fn bools(a: bool, b: bool) -> bool {
        !a & b
    }
}

impl Comparison for Equal {
    const STRINGS: bool = true;

    fn ints(a: i64, b: i64) -> bool {
        a == b
    }
    #[allow(clippy::float_cmp)]
    fn floats(a: f64, b: f64) -> bool {
        a == b
    }
    fn bools(a: bool, b: bool) -> bool {
        a == b
    }
    fn strings(a: &str, b: &str) -> bool {
        a == b
    }
}

/// Applies a value-to-predicate operator, producing a byte mask of `len` rows.
///
/// # Errors
///
/// Returns `TypeMismatch` for disallowed operand types and
/// `MalformedPattern` if a `Matches` pattern fails to compile.
pub fn compare(
    op: PredicateFromValueOperator,
    lhs: &Operand<'_>,
    rhs: &Operand<'_>,
    len: usize,
    patterns: &mut PatternCache,
) -> Result<ByteMask> {
    match op {
        PredicateFromValueOperator::Greater => compare_with::<Greater>(op, lhs, rhs, len),
        PredicateFromValueOperator::Lesser => compare_with::<Lesser>(op, lhs, rhs, len),
        PredicateFromValueOperator::Equal => compare_with::<Equal>(op, lhs, rhs, len),
        PredicateFromValueOperator::StartsWith => starts_with(lhs, rhs, len),
        PredicateFromValueOperator::Matches => matches(lhs, rhs, len, patterns),
    }
}

fn compare_with<K: Comparison>(
    op: PredicateFromValueOperator,
    lhs: &Operand<'_>,
    rhs: &Operand<'_>,
    len: usize,
) -> Result<ByteMask> {
    match (lhs.typed(), rhs.typed()) {
        (Typed::Int64(l), Typed::Int64(r)) => {
            zip_sides!(l, r, len, |a: i64, b: i64| Ok(u8::from(K::ints(a, b))))
        }
        (Typed::Int64(l), Typed::Float64(r)) => {
            zip_sides!(l.widen(), r, len, |a: f64, b: f64| Ok(u8::from(K::floats(a, b))))
        }
        (Typed::Float64(l), Typed::Int64(r)) => {
            zip_sides!(l, r.widen(), len, |a: f64, b: f64| Ok(u8::from(K::floats(a, b))))
        }
        (Typed::Float64(l), Typed::Float64(r)) => {
            zip_sides!(l, r, len, |a: f64, b: f64| Ok(u8::from(K::floats(a, b))))
        }
        (Typed::Bool(l), Typed::Bool(r)) => {
            zip_sides!(l, r, len, |a: bool, b: bool| Ok(u8::from(K::bools(a, b))))
        }
        (Typed::String(l), Typed::String(r)) if K::STRINGS => {
            zip_sides!(l, r, len, |a: &str, b: &str| Ok(u8::from(K::strings(a, b))))
        }
        _ => Err(TabulaError::mismatch(
            op.name(),
            lhs.data_type(),
            rhs.data_type(),
        )),
    }
}

fn starts_with(lhs: &Operand<'_>, rhs: &Operand<'_>, len: usize) -> Result<ByteMask> {
    match (lhs.typed(), rhs.typed()) {
        (Typed::String(l), Typed::String(r)) => zip_sides!(l, r, len, |a: &str, b: &str| {
            Ok(u8::from(a.as_bytes().starts_with(b.as_bytes())))
        }),
        _ => Err(TabulaError::mismatch(
            PredicateFromValueOperator::StartsWith.name(),
            lhs.data_type(),
            rhs.data_type(),
        )),
    }
}

fn matches(
    lhs: &Operand<'_>,
    rhs: &Operand<'_>,
    len: usize,
    patterns: &mut PatternCache,
) -> Result<ByteMask> {
    match (lhs.typed(), rhs.typed()) {
        (Typed::String(l), Typed::String(Side::Scalar(pattern))) => {
            let regex = patterns.compile(pattern)?;
            match l {
                Side::Scalar(s) => try_map2(&s, &pattern, len, |a: &str, _: &str| {
                    Ok(u8::from(regex.is_match(a)))
                }),
                Side::Vector(v) => try_map2(&v, &pattern, len, |a: &str, _: &str| {
                    Ok(u8::from(regex.is_match(a)))
                }),
            }
        }
        (Typed::String(l), Typed::String(r)) => zip_sides!(l, r, len, |a: &str, b: &str| {
            Ok(u8::from(patterns.get(b)?.is_match(a)))
        }),
        _ => Err(TabulaError::mismatch(
            PredicateFromValueOperator::Matches.name(),
            lhs.data_type(),
            rhs.data_type(),
        )),
    }
}

/// Compiled `Matches` patterns, anchored to match the whole input.
#[derive(Debug)]
pub struct PatternCache {
    size_limit: usize,
    capacity: usize,
    compiled: HashMap<String, Regex>,
}

impl PatternCache {
    /// Creates a cache holding up to `capacity` per-row patterns.
    #[must_use]
    pub fn new(size_limit: usize, capacity: usize) -> Self {
        PatternCache {
            size_limit,
            capacity,
            compiled: HashMap::new(),
        }
    }

    /// Compiles `pattern` without caching it.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPattern` if the pattern is invalid.
    pub fn compile(&self, pattern: &str) -> Result<Regex> {
        RegexBuilder::new(&format!(r"\A(?:{pattern})\z"))
            .size_limit(self.size_limit)
            .build()
            .map_err(|source| TabulaError::MalformedPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Returns the compiled pattern, compiling and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPattern` if the pattern is invalid.
    pub fn get(&mut self, pattern: &str) -> Result<&Regex> {
        if !self.compiled.contains_key(pattern) {
            let regex = self.compile(pattern)?;
            if self.compiled.len() >= self.capacity {
                self.compiled.clear();
            }
            self.compiled.insert(pattern.to_string(), regex);
        }
        self.compiled.get(pattern).ok_or_else(|| {
            TabulaError::StructuralViolation(format!("pattern `{pattern}` was not cached"))
        })
    }
}

// ==================== Logical ====================

/// Applies a unary predicate connective.
///
/// # Errors
///
/// Returns `NotImplemented` for binary connectives.
pub fn unary_connective(op: PredicateOperator, operand: &ByteMask) -> Result<ByteMask> {
    match op {
        PredicateOperator::Not => Ok(not(operand)),
        other => Err(TabulaError::NotImplemented(format!(
            "unary predicate operator {}",
            other.id()
        ))),
    }
}

/// Applies a binary predicate connective.
///
/// # Errors
///
/// Returns `NotImplemented` for unary connectives.
pub fn binary_connective(op: PredicateOperator, lhs: &ByteMask, rhs: &ByteMask) -> Result<ByteMask> {
    match op {
        PredicateOperator::And => Ok(and(lhs, rhs)),
        PredicateOperator::Or => Ok(or(lhs, rhs)),
        PredicateOperator::Not => Err(TabulaError::NotImplemented(format!(
            "binary predicate operator {}",
            op.id()
        ))),
    }
}

/// Kleene conjunction of two masks.
#[must_use]
pub fn and(lhs: &ByteMask, rhs: &ByteMask) -> ByteMask {
    kleene(lhs, rhs, false)
}

/// Kleene disjunction of two masks.
#[must_use]
pub fn or(lhs: &ByteMask, rhs: &ByteMask) -> ByteMask {
    kleene(lhs, rhs, true)
}

/// Negates a mask; null rows stay null.
#[must_use]
pub fn not(operand: &ByteMask) -> ByteMask {
    let values = operand.values().iter().map(|b| u8::from(*b == 0)).collect();
    Vector::owned(values, operand.nulls().cloned())
}

/// `dominant` is the value that decides the result on its own: false for
/// And, true for Or. A null side only survives when the other side is not
/// dominant.
fn kleene(lhs: &ByteMask, rhs: &ByteMask, dominant: bool) -> ByteMask {
    let (a, b) = (lhs.values(), rhs.values());
    let values: Vec<u8> = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let (x, y) = (*x != 0, *y != 0);
            u8::from(if dominant { x || y } else { x && y })
        })
        .collect();

    let nulls = match (lhs.nulls(), rhs.nulls()) {
        (None, None) => None,
        _ => {
            let validity: Vec<bool> = (0..values.len())
                .map(|i| {
                    let (lv, rv) = (!lhs.is_null(i), !rhs.is_null(i));
                    (lv && rv)
                        || (lv && (a[i] != 0) == dominant)
                        || (rv && (b[i] != 0) == dominant)
                })
                .collect();
            Some(validity.into())
        }
    };
    Vector::owned(values, nulls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::buffer::NullBuffer;

    fn cache() -> PatternCache {
        PatternCache::new(1 << 20, 8)
    }

    fn ints(values: Vec<i64>) -> Operand<'static> {
        Operand::Int64Vector(Vector::owned(values, None))
    }

    #[test]
    fn test_scalar_arithmetic_folds() {
        let out = arithmetic(ValueOperator::Multiply, &Operand::Int64(6), &Operand::Int64(7), 100)
            .unwrap();
        assert!(matches!(out, Operand::Int64(42)));

        let out = arithmetic(ValueOperator::Add, &Operand::Int64(1), &Operand::Float64(0.5), 3)
            .unwrap();
        assert!(matches!(out, Operand::Float64(v) if (v - 1.5).abs() < f64::EPSILON));
    }

    #[test]
    fn test_vector_scalar_broadcast() {
        let out =
            arithmetic(ValueOperator::Subtract, &ints(vec![5, 6, 7]), &Operand::Int64(1), 3)
                .unwrap();
        let Operand::Int64Vector(v) = out else {
            panic!("expected vector");
        };
        assert_eq!(v.values(), &[4, 5, 6]);
    }

    #[test]
    fn test_mixed_numeric_promotes_to_float() {
        let out = arithmetic(ValueOperator::Divide, &ints(vec![1, 3]), &Operand::Float64(2.0), 2)
            .unwrap();
        let Operand::Float64Vector(v) = out else {
            panic!("expected float vector");
        };
        assert_eq!(v.values(), &[0.5, 1.5]);
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = arithmetic(ValueOperator::Divide, &ints(vec![1, 2]), &Operand::Int64(0), 2)
            .unwrap_err();
        assert!(matches!(err, TabulaError::DivisionByZero));
    }

    #[test]
    fn test_division_by_zero_on_null_row_is_skipped() {
        let divisor = Operand::Int64Vector(Vector::owned(
            vec![2, 0],
            Some(NullBuffer::from(vec![true, false])),
        ));
        let out = arithmetic(ValueOperator::Divide, &ints(vec![4, 4]), &divisor, 2).unwrap();
        let Operand::Int64Vector(v) = out else {
            panic!("expected vector");
        };
        assert_eq!(v.values()[0], 2);
        assert!(v.is_null(1));
    }

    #[test]
    fn test_string_arithmetic_is_type_mismatch() {
        let err = arithmetic(ValueOperator::Add, &Operand::String("a"), &Operand::Int64(1), 1)
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, TabulaError::TypeMismatch { .. }));
        assert!(message.contains("Add"));
        assert!(message.contains("STRING"));
        assert!(message.contains("INT64"));
    }

    #[test]
    fn test_negate() {
        let Operand::Int64Vector(v) = negate(&ints(vec![1, -2]), 2).unwrap() else {
            panic!("expected vector");
        };
        assert_eq!(v.values(), &[-1, 2]);
        assert!(matches!(
            negate(&Operand::String("x"), 1),
            Err(TabulaError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_unary_arithmetic_by_arity() {
        let Operand::Int64Vector(v) =
            unary_arithmetic(ValueOperator::Negate, &ints(vec![3]), 1).unwrap()
        else {
            panic!("expected vector");
        };
        assert_eq!(v.values(), &[-3]);
        assert!(matches!(
            unary_arithmetic(ValueOperator::Add, &ints(vec![3]), 1),
            Err(TabulaError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_scalar_comparison_broadcasts_mask() {
        let mask = compare(
            PredicateFromValueOperator::Greater,
            &Operand::Int64(2),
            &Operand::Float64(1.5),
            3,
            &mut cache(),
        )
        .unwrap();
        assert_eq!(mask.values(), &[1, 1, 1]);
    }

    #[test]
    fn test_ordering_rejects_strings() {
        let err = compare(
            PredicateFromValueOperator::Lesser,
            &Operand::String("a"),
            &Operand::String("b"),
            1,
            &mut cache(),
        )
        .unwrap_err();
        assert!(matches!(err, TabulaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_equal_rejects_string_number() {
        let err = compare(
            PredicateFromValueOperator::Equal,
            &Operand::String("1"),
            &Operand::Int64(1),
            1,
            &mut cache(),
        )
        .unwrap_err();
        assert!(matches!(err, TabulaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_starts_with() {
        let mut patterns = cache();
        let yes = compare(
            PredicateFromValueOperator::StartsWith,
            &Operand::String("hello"),
            &Operand::String("he"),
            1,
            &mut patterns,
        )
        .unwrap();
        let no = compare(
            PredicateFromValueOperator::StartsWith,
            &Operand::String("he"),
            &Operand::String("hello"),
            1,
            &mut patterns,
        )
        .unwrap();
        assert_eq!(yes.values(), &[1]);
        assert_eq!(no.values(), &[0]);
    }

    #[test]
    fn test_matches_whole_string_only() {
        let mut patterns = cache();
        let full = compare(
            PredicateFromValueOperator::Matches,
            &Operand::String("abc"),
            &Operand::String("a.c"),
            1,
            &mut patterns,
        )
        .unwrap();
        let partial = compare(
            PredicateFromValueOperator::Matches,
            &Operand::String("xabcx"),
            &Operand::String("abc"),
            1,
            &mut patterns,
        )
        .unwrap();
        assert_eq!(full.values(), &[1]);
        assert_eq!(partial.values(), &[0]);
    }

    #[test]
    fn test_matches_malformed_pattern() {
        let err = compare(
            PredicateFromValueOperator::Matches,
            &Operand::String("abc"),
            &Operand::String("(unclosed"),
            1,
            &mut cache(),
        )
        .unwrap_err();
        assert!(matches!(err, TabulaError::MalformedPattern { .. }));
    }

    #[test]
    fn test_kleene_logic() {
        // lhs: [true, false, null, null], rhs: [null, null, true, false]
        let lhs = Vector::owned(
            vec![1, 0, 0, 0],
            Some(NullBuffer::from(vec![true, true, false, false])),
        );
        let rhs = Vector::owned(
            vec![0, 0, 1, 0],
            Some(NullBuffer::from(vec![false, false, true, true])),
        );

        let conj = and(&lhs, &rhs);
        assert!(conj.is_null(0));
        assert!(!conj.is_null(1));
        assert_eq!(conj.values()[1], 0);
        assert!(conj.is_null(2));
        assert!(!conj.is_null(3));
        assert_eq!(conj.values()[3], 0);

        let disj = or(&lhs, &rhs);
        assert!(!disj.is_null(0));
        assert_eq!(disj.values()[0], 1);
        assert!(disj.is_null(1));
        assert!(!disj.is_null(2));
        assert_eq!(disj.values()[2], 1);
        assert!(disj.is_null(3));
    }

    #[test]
    fn test_not_keeps_nulls() {
        let mask = Vector::owned(vec![1, 0], Some(NullBuffer::from(vec![true, false])));
        let negated = not(&mask);
        assert_eq!(negated.values()[0], 0);
        assert!(negated.is_null(1));
    }

    #[test]
    fn test_connectives_by_arity() {
        let lhs: ByteMask = Vector::owned(vec![1, 0], None);
        let rhs: ByteMask = Vector::owned(vec![1, 1], None);
        let negated = unary_connective(PredicateOperator::Not, &lhs).unwrap();
        assert_eq!(negated.values(), &[0, 1]);
        let conj = binary_connective(PredicateOperator::And, &lhs, &rhs).unwrap();
        assert_eq!(conj.values(), &[1, 0]);
        let disj = binary_connective(PredicateOperator::Or, &lhs, &rhs).unwrap();
        assert_eq!(disj.values(), &[1, 1]);
        assert!(matches!(
            unary_connective(PredicateOperator::And, &lhs),
            Err(TabulaError::NotImplemented(_))
        ));
        assert!(matches!(
            binary_connective(PredicateOperator::Not, &lhs, &rhs),
            Err(TabulaError::NotImplemented(_))
        ));
    }
}
