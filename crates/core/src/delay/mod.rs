//! Retry delay strategies
//!
//! A [`RetryDelay`] turns a zero-based attempt index into a wait duration.
//! Four shapes are supported:
//!
//! | Shape       | Delay for attempt `n`                       |
//! |-------------|---------------------------------------------|
//! | constant    | `base`                                      |
//! | linear      | `(n + 1) * slope_factor * base`             |
//! | exponential | `base * factor^n`                           |
//! | time series | `series[n]`, last element past the end      |
//!
//! Jitter randomises constant, linear and time-series delays by ±25%.
//! Exponential delays with jitter switch to decorrelated jitter, which
//! keeps a per-instance previous value so consecutive delays stay smooth.
//! Every result is clamped to the configured maximum.

mod jitter;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use holdfast_common::impl_kind_conversions;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use jitter::{JitterSource, SeededJitter, ThreadRngJitter};

const DEFAULT_EXPONENTIAL_FACTOR: f64 = 2.0;
const DEFAULT_SLOPE_FACTOR: f64 = 1.0;

/// Spread applied by uniform jitter (±25%)
const UNIFORM_JITTER_SPREAD: f64 = 0.5;

// Decorrelated jitter tuning: steepness of the tanh ramp and the scaling
// that brings the first delay back to roughly `base`.
const DECORRELATED_P_FACTOR: f64 = 4.0;
const DECORRELATED_SCALING: f64 = 1.0 / 1.4;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Delay shape selector, used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayKind {
    Constant,
    Linear,
    Exponential,
    TimeSeries,
}

impl_kind_conversions!(DelayKind {
    Constant => "constant",
    Linear => "linear",
    Exponential => "exponential",
    TimeSeries => "time_series",
});

#[derive(Debug, Clone, PartialEq)]
enum DelayShape {
    Constant,
    Linear { slope_factor: f64 },
    Exponential { factor: f64 },
    TimeSeries(Arc<[Duration]>),
}

/// Computes the wait before the next retry attempt
pub struct RetryDelay {
    shape: DelayShape,
    base: Duration,
    max_delay: Duration,
    jitter: bool,
    jitter_source: Arc<dyn JitterSource>,
    // Previous decorrelated value, reset when a new run starts
    prev: Mutex<f64>,
}

impl RetryDelay {
    fn with_shape(shape: DelayShape, base: Duration) -> Self {
        Self {
            shape,
            base,
            max_delay: Duration::MAX,
            jitter: false,
            jitter_source: Arc::new(ThreadRngJitter),
            prev: Mutex::new(0.0),
        }
    }

    /// The same delay for every attempt
    pub fn constant(base: Duration) -> Self {
        Self::with_shape(DelayShape::Constant, base)
    }

    /// Delay growing linearly with the attempt number
    pub fn linear(base: Duration) -> Self {
        Self::with_shape(DelayShape::Linear { slope_factor: DEFAULT_SLOPE_FACTOR }, base)
    }

    /// Delay growing geometrically with the attempt number
    pub fn exponential(base: Duration) -> Self {
        Self::with_shape(DelayShape::Exponential { factor: DEFAULT_EXPONENTIAL_FACTOR }, base)
    }

    /// Delays taken from an explicit series.
    ///
    /// Attempts past the end of the series reuse its last element; an empty
    /// series behaves like a constant `base` delay.
    pub fn time_series<I>(series: I, base: Duration) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        let series: Vec<Duration> = series.into_iter().collect();
        Self::with_shape(DelayShape::TimeSeries(series.into()), base)
    }

    /// Build a delay of the given kind with default shape parameters
    pub fn of_kind(kind: DelayKind, base: Duration) -> Self {
        match kind {
            DelayKind::Constant => Self::constant(base),
            DelayKind::Linear => Self::linear(base),
            DelayKind::Exponential => Self::exponential(base),
            DelayKind::TimeSeries => Self::time_series(Vec::new(), base),
        }
    }

    /// Set the slope of a linear delay; ignored by other shapes
    pub fn with_slope_factor(mut self, slope_factor: f64) -> Self {
        if let DelayShape::Linear { slope_factor: slope } = &mut self.shape {
            *slope = slope_factor;
        }
        self
    }

    /// Set the growth factor of an exponential delay; ignored by other shapes
    pub fn with_factor(mut self, factor: f64) -> Self {
        if let DelayShape::Exponential { factor: current } = &mut self.shape {
            *current = factor;
        }
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_jitter_source(mut self, source: Arc<dyn JitterSource>) -> Self {
        self.jitter_source = source;
        self
    }

    pub fn kind(&self) -> DelayKind {
        match self.shape {
            DelayShape::Constant => DelayKind::Constant,
            DelayShape::Linear { .. } => DelayKind::Linear,
            DelayShape::Exponential { .. } => DelayKind::Exponential,
            DelayShape::TimeSeries(_) => DelayKind::TimeSeries,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter
    }

    /// Delay before the retry following the zero-based `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        match &self.shape {
            DelayShape::Exponential { .. } if self.jitter => self.decorrelated(attempt),
            DelayShape::Exponential { factor } => {
                let growth = match i32::try_from(attempt) {
                    Ok(exponent) => factor.powi(exponent),
                    Err(_) => factor.powf(f64::from(attempt)),
                };
                self.scale(self.base, growth)
            }
            DelayShape::Constant => self.jittered(self.base, 1.0),
            DelayShape::Linear { slope_factor } => {
                self.jittered(self.base, (f64::from(attempt) + 1.0) * slope_factor)
            }
            DelayShape::TimeSeries(series) => {
                let step = series.get(attempt as usize).or_else(|| series.last());
                self.jittered(step.copied().unwrap_or(self.base), 1.0)
            }
        }
    }

    fn jittered(&self, value: Duration, multiplier: f64) -> Duration {
        let multiplier = if self.jitter {
            let sample = self.jitter_source.next_unit();
            multiplier * (1.0 + (sample - 0.5) * UNIFORM_JITTER_SPREAD)
        } else {
            multiplier
        };
        self.scale(value, multiplier)
    }

    fn decorrelated(&self, attempt: u32) -> Duration {
        let t = f64::from(attempt) + self.jitter_source.next_unit();
        let next = t.exp2() * (DECORRELATED_P_FACTOR * t).sqrt().tanh();

        let mut prev = self.prev.lock();
        // The ramp only grows within one run, so a smaller value means a new run
        if attempt == 0 || next < *prev {
            *prev = 0.0;
        }
        // Past the f64 range the ramp is saturated; `inf - inf` would be NaN
        if !next.is_finite() {
            *prev = f64::INFINITY;
            return if self.base.is_zero() { Duration::ZERO } else { self.max_delay };
        }
        let intrinsic = (next - *prev).max(0.0);
        *prev = next;
        drop(prev);

        self.scale(self.base, intrinsic * DECORRELATED_SCALING)
    }

    /// `value * multiplier`, clamped to `max_delay`.
    ///
    /// A zero `value` stays zero however large the multiplier grows.
    fn scale(&self, value: Duration, multiplier: f64) -> Duration {
        if value.is_zero() {
            return Duration::ZERO;
        }
        let nanos = value.as_nanos() as f64 * multiplier;
        if nanos.is_nan() || nanos <= 0.0 {
            return Duration::ZERO;
        }
        if nanos.is_infinite() {
            return self.max_delay;
        }

        let scaled = if nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            match Duration::try_from_secs_f64(nanos / NANOS_PER_SEC) {
                Ok(duration) => duration,
                Err(_) => return self.max_delay,
            }
        };
        scaled.min(self.max_delay)
    }
}

impl Clone for RetryDelay {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            base: self.base,
            max_delay: self.max_delay,
            jitter: self.jitter,
            jitter_source: Arc::clone(&self.jitter_source),
            prev: Mutex::new(*self.prev.lock()),
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryDelay")
            .field("shape", &self.shape)
            .field("base", &self.base)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}
