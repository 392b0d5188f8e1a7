use serde::{Deserialize, Serialize};

use super::error::PlanError;

/// Smallest accepted step in MHz (the source is programmed with kHz resolution)
pub const MIN_STEP_MHZ: f64 = 0.001;

/// Largest number of points a single sweep may contain
pub const MAX_POINTS: usize = 1_000_000;

/// Tolerance applied to `(stop - start) / step` before truncation, so that
/// ranges like 900..960 step 0.2 are not short by one point
const COUNT_EPSILON: f64 = 1e-9;

/// Interior points are rounded to this resolution (1 Hz)
const HZ_PER_MHZ: f64 = 1e6;

/// Ordered, strictly monotonic list of sweep frequencies in MHz.
///
/// Construct it with [`FrequencyList::from_range`] or
/// [`FrequencyList::from_values`]; both reject empty or non-monotonic input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FrequencyList {
    values: Vec<f64>,
}

impl FrequencyList {
    /// Evenly spaced frequencies from `start` to `stop` inclusive.
    ///
    /// The point count is `floor((stop - start) / step) + 1`. Points are spread
    /// evenly over the full range, so when the step does not divide the range the
    /// effective spacing is slightly larger than `step` and both endpoints are
    /// still included.
    ///
    /// ```
    /// use lo_sweep::plan::FrequencyList;
    ///
    /// let list = FrequencyList::from_range(900.0, 960.0, 0.2)?;
    /// assert_eq!(list.len(), 301);
    /// assert_eq!(list.first(), 900.0);
    /// assert_eq!(list.last(), 960.0);
    /// # Ok::<(), lo_sweep::plan::PlanError>(())
    /// ```
    pub fn from_range(start: f64, stop: f64, step: f64) -> Result<Self, PlanError> {
        check_finite("freq_start", start)?;
        check_finite("freq_stop", stop)?;
        check_finite("freq_step", step)?;

        if start <= 0.0 {
            return Err(PlanError::NonPositiveFrequency(start));
        }
        if stop < start {
            return Err(PlanError::InvalidRange { start, stop });
        }
        if step < MIN_STEP_MHZ {
            return Err(PlanError::InvalidStep {
                step,
                min: MIN_STEP_MHZ,
            });
        }

        let intervals = ((stop - start) / step + COUNT_EPSILON).floor();
        if intervals >= MAX_POINTS as f64 {
            return Err(PlanError::TooManyPoints {
                count: intervals as usize + 1,
                max: MAX_POINTS,
            });
        }
        let count = intervals as usize + 1;

        let values = if count == 1 {
            vec![start]
        } else {
            let last = count - 1;
            let width = stop - start;
            (0..count)
                .map(|i| match i {
                    0 => start,
                    i if i == last => stop,
                    i => round_to_hz(start + width * (i as f64) / (last as f64)),
                })
                .collect()
        };

        Ok(Self { values })
    }

    /// Explicit list of frequencies, strictly increasing or strictly decreasing.
    pub fn from_values(values: Vec<f64>) -> Result<Self, PlanError> {
        if values.is_empty() {
            return Err(PlanError::EmptyFrequencyList);
        }
        for &value in &values {
            check_finite("frequency", value)?;
            if value <= 0.0 {
                return Err(PlanError::NonPositiveFrequency(value));
            }
        }
        if values.len() > MAX_POINTS {
            return Err(PlanError::TooManyPoints {
                count: values.len(),
                max: MAX_POINTS,
            });
        }

        if values.len() > 1 {
            let ascending = values[1] > values[0];
            for (i, pair) in values.windows(2).enumerate() {
                let ordered = if ascending {
                    pair[1] > pair[0]
                } else {
                    pair[1] < pair[0]
                };
                if !ordered {
                    return Err(PlanError::NotMonotonic {
                        index: i + 1,
                        value: pair[1],
                    });
                }
            }
        }

        Ok(Self { values })
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First frequency in sweep order
    pub fn first(&self) -> f64 {
        self.values[0]
    }

    /// Last frequency in sweep order
    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Frequencies in sweep order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over frequencies in sweep order
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.values.iter()
    }
}

impl TryFrom<Vec<f64>> for FrequencyList {
    type Error = PlanError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_values(values)
    }
}

impl From<FrequencyList> for Vec<f64> {
    fn from(list: FrequencyList) -> Self {
        list.values
    }
}

impl<'a> IntoIterator for &'a FrequencyList {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), PlanError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlanError::NotFinite { name, value })
    }
}

fn round_to_hz(mhz: f64) -> f64 {
    (mhz * HZ_PER_MHZ).round() / HZ_PER_MHZ
}
