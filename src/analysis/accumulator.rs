//! Streaming accumulators shared by column statistics and group aggregation.
//!
//! Every accumulator consumes present values through [`Accumulator::update`]
//! and null rows through [`Accumulator::observe_null`]. [`AnyAccumulator`] is
//! the closed set of accumulators selected at runtime by [`AggregateFunction`].

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::types::NumericType;

/// Streaming reduction over values of type `T`.
pub trait Accumulator<T: NumericType>: Default {
    /// Type of the finalized result.
    type Output: NumericType;

    /// Display name, used for output column names.
    const NAME: &'static str;

    /// Whether the result is null when no present value was seen.
    const REQUIRES_SAMPLE: bool;

    /// Consumes one present value.
    fn update(&mut self, value: T);

    /// Observes a null row.
    fn observe_null(&mut self) {}

    /// Produces the result. Only meaningful after at least one `update`
    /// unless `REQUIRES_SAMPLE` is false.
    fn finalize(&mut self) -> Self::Output;
}

/// Smallest value seen.
#[derive(Debug, Clone, Default)]
pub struct Minimum<T> {
    value: Option<T>,
}

impl<T: NumericType> Accumulator<T> for Minimum<T> {
    type Output = T;
    const NAME: &'static str = "min";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        match self.value {
            Some(current) if current.total_cmp(&value).is_le() => {}
            _ => self.value = Some(value),
        }
    }

    fn finalize(&mut self) -> T {
        self.value.unwrap_or_default()
    }
}

/// Largest value seen.
#[derive(Debug, Clone, Default)]
pub struct Maximum<T> {
    value: Option<T>,
}

impl<T: NumericType> Accumulator<T> for Maximum<T> {
    type Output = T;
    const NAME: &'static str = "max";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        match self.value {
            Some(current) if current.total_cmp(&value).is_ge() => {}
            _ => self.value = Some(value),
        }
    }

    fn finalize(&mut self) -> T {
        self.value.unwrap_or_default()
    }
}

/// Arithmetic mean.
#[derive(Debug, Clone, Default)]
pub struct Mean<T> {
    count: u64,
    sum: f64,
    _marker: PhantomData<T>,
}

impl<T: NumericType> Accumulator<T> for Mean<T> {
    type Output = f64;
    const NAME: &'static str = "mean";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        self.sum += value.to_f64();
        self.count += 1;
    }

    fn finalize(&mut self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Middle value, interpolated between the two central values for even counts.
#[derive(Debug, Clone, Default)]
pub struct Median<T> {
    values: Vec<T>,
}

impl<T: NumericType> Accumulator<T> for Median<T> {
    type Output = f64;
    const NAME: &'static str = "median";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        self.values.push(value);
    }

    fn finalize(&mut self) -> f64 {
        quantile_of(&mut self.values, 0.5)
    }
}

/// Population variance via Welford's online update.
#[derive(Debug, Clone, Default)]
pub struct Variance<T> {
    count: u64,
    mean: f64,
    m2: f64,
    _marker: PhantomData<T>,
}

impl<T: NumericType> Accumulator<T> for Variance<T> {
    type Output = f64;
    const NAME: &'static str = "variance";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        let x = value.to_f64();
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn finalize(&mut self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2 / self.count as f64
    }
}

/// Square root of [`Variance`].
#[derive(Debug, Clone, Default)]
pub struct StandardDeviation<T> {
    variance: Variance<T>,
}

impl<T: NumericType> Accumulator<T> for StandardDeviation<T> {
    type Output = f64;
    const NAME: &'static str = "std dev";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        self.variance.update(value);
    }

    fn finalize(&mut self) -> f64 {
        self.variance.finalize().sqrt()
    }
}

/// Sum in the source type; integers wrap.
#[derive(Debug, Clone, Default)]
pub struct Sum<T> {
    total: T,
}

impl<T: NumericType> Accumulator<T> for Sum<T> {
    type Output = T;
    const NAME: &'static str = "sum";
    const REQUIRES_SAMPLE: bool = false;

    fn update(&mut self, value: T) {
        self.total = self.total.accumulate(value);
    }

    fn finalize(&mut self) -> T {
        self.total
    }
}

/// Number of rows, null or not.
#[derive(Debug, Clone, Default)]
pub struct Length<T> {
    rows: i64,
    _marker: PhantomData<T>,
}

impl<T: NumericType> Accumulator<T> for Length<T> {
    type Output = i64;
    const NAME: &'static str = "length";
    const REQUIRES_SAMPLE: bool = false;

    fn update(&mut self, _value: T) {
        self.rows += 1;
    }

    fn observe_null(&mut self) {
        self.rows += 1;
    }

    fn finalize(&mut self) -> i64 {
        self.rows
    }
}

/// First present value in row order.
#[derive(Debug, Clone, Default)]
pub struct First<T> {
    value: Option<T>,
}

impl<T: NumericType> Accumulator<T> for First<T> {
    type Output = T;
    const NAME: &'static str = "first";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        self.value.get_or_insert(value);
    }

    fn finalize(&mut self) -> T {
        self.value.unwrap_or_default()
    }
}

/// Last present value in row order.
#[derive(Debug, Clone, Default)]
pub struct Last<T> {
    value: Option<T>,
}

impl<T: NumericType> Accumulator<T> for Last<T> {
    type Output = T;
    const NAME: &'static str = "last";
    const REQUIRES_SAMPLE: bool = true;

    fn update(&mut self, value: T) {
        self.value = Some(value);
    }

    fn finalize(&mut self) -> T {
        self.value.unwrap_or_default()
    }
}

/// Linear-interpolation quantile of a non-empty buffer, reordering it in place.
///
/// `q <= 0` yields the minimum and `q >= 1` the maximum. Otherwise the rank
/// `n * q - 0.5` is clamped into `[0, n - 1]` and the two neighbouring order
/// statistics are interpolated. Returns NaN for an empty buffer.
pub(crate) fn quantile_of<T: NumericType>(values: &mut [T], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    if q <= 0.0 {
        return values
            .iter()
            .copied()
            .min_by(NumericType::total_cmp)
            .map_or(f64::NAN, NumericType::to_f64);
    }
    if q >= 1.0 {
        return values
            .iter()
            .copied()
            .max_by(NumericType::total_cmp)
            .map_or(f64::NAN, NumericType::to_f64);
    }

    let last = (values.len() - 1) as f64;
    let rank = (values.len() as f64 * q - 0.5).clamp(0.0, last);
    let lo = rank.floor() as usize;
    let weight = rank - lo as f64;

    let (_, lo_value, above) = values.select_nth_unstable_by(lo, NumericType::total_cmp);
    let lo_value = lo_value.to_f64();
    if weight == 0.0 {
        return lo_value;
    }
    // Everything above the lo-th order statistic is unordered; its minimum is the next one.
    let hi_value = above
        .iter()
        .copied()
        .min_by(NumericType::total_cmp)
        .map_or(lo_value, NumericType::to_f64);
    lo_value + (hi_value - lo_value) * weight
}

/// Aggregate functions available to group aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Minimum,
    Maximum,
    Mean,
    Median,
    Length,
    First,
    Last,
    Variance,
    StandardDeviation,
    Sum,
}

impl AggregateFunction {
    /// Every function, in id order.
    pub const ALL: [AggregateFunction; 10] = [
        AggregateFunction::Minimum,
        AggregateFunction::Maximum,
        AggregateFunction::Mean,
        AggregateFunction::Median,
        AggregateFunction::Length,
        AggregateFunction::First,
        AggregateFunction::Last,
        AggregateFunction::Variance,
        AggregateFunction::StandardDeviation,
        AggregateFunction::Sum,
    ];

    /// Resolves a numeric function code.
    ///
    /// # Errors
    ///
    /// Returns `NotImplemented` for unknown codes.
    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL.get(usize::from(id)).copied().ok_or_else(|| {
            TabulaError::NotImplemented(format!("aggregate function {id}"))
        })
    }

    /// Returns the numeric function code.
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! any_accumulator {
    ($($variant:ident),* $(,)?) => {
        /// An accumulator chosen at runtime by [`AggregateFunction`].
        #[derive(Debug, Clone)]
        pub enum AnyAccumulator<T: NumericType> {
            $($variant($variant<T>),)*
        }

        impl<T: NumericType> AnyAccumulator<T> {
            /// Creates an empty accumulator for `function`.
            #[must_use]
            pub fn new(function: AggregateFunction) -> Self {
                match function {
                    $(AggregateFunction::$variant => AnyAccumulator::$variant($variant::default()),)*
                }
            }

            /// Consumes one present value.
            pub fn update(&mut self, value: T) {
                match self {
                    $(AnyAccumulator::$variant(acc) => acc.update(value),)*
                }
            }

            /// Observes a null row.
            pub fn observe_null(&mut self) {
                match self {
                    $(AnyAccumulator::$variant(acc) => acc.observe_null(),)*
                }
            }

            /// Whether the result is null when no present value was seen.
            #[must_use]
            pub fn requires_sample(&self) -> bool {
                match self {
                    $(AnyAccumulator::$variant(_) => <$variant<T> as Accumulator<T>>::REQUIRES_SAMPLE,)*
                }
            }

            /// Finalizes into a double, or None if a sample was required but
            /// `had_value` is false.
            pub fn finalize(&mut self, had_value: bool) -> Option<f64> {
                if !had_value && self.requires_sample() {
                    return None;
                }
                match self {
                    $(AnyAccumulator::$variant(acc) => Some(acc.finalize().to_f64()),)*
                }
            }
        }

        impl AggregateFunction {
            /// Returns the display name used in output column names.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(AggregateFunction::$variant => <$variant<f64> as Accumulator<f64>>::NAME,)*
                }
            }
        }
    };
}

any_accumulator!(
    Minimum,
    Maximum,
    Mean,
    Median,
    Length,
    First,
    Last,
    Variance,
    StandardDeviation,
    Sum,
);
