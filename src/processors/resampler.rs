use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

/// How a mean treats cells that are undefined (NaN) in some of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionStrategy {
    /// Any undefined input makes the output cell undefined.
    PropagateUndefined,
    /// Average over the defined inputs only.
    IgnoreUndefined,
}

/// Running cell-wise mean over a sequence of equally shaped grids.
#[derive(Debug, Clone)]
pub struct MeanAccumulator {
    sum: Array2<f64>,
    count: Array2<u32>,
    undefined: Array2<bool>,
    samples: usize,
}

impl MeanAccumulator {
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            sum: Array2::zeros(shape),
            count: Array2::zeros(shape),
            undefined: Array2::from_elem(shape, false),
            samples: 0,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.sum.dim()
    }

    pub fn add(&mut self, grid: &Array2<f32>) -> Result<()> {
        if grid.dim() != self.shape() {
            return Err(ProcessingError::InvalidFormat(format!(
                "grid shape {:?} does not match accumulator shape {:?}",
                grid.dim(),
                self.shape()
            )));
        }

        Zip::from(&mut self.sum)
            .and(&mut self.count)
            .and(&mut self.undefined)
            .and(grid)
            .for_each(|sum, count, undefined, &value| {
                if value.is_nan() {
                    *undefined = true;
                } else {
                    *sum += value as f64;
                    *count += 1;
                }
            });
        self.samples += 1;
        Ok(())
    }

    /// Count a sample in which every cell is undefined.
    pub fn add_undefined(&mut self) {
        self.undefined.fill(true);
        self.samples += 1;
    }

    pub fn mean(&self, strategy: ReductionStrategy) -> Array2<f32> {
        let mut out = Array2::from_elem(self.shape(), f32::NAN);
        if self.samples == 0 {
            return out;
        }

        Zip::from(&mut out)
            .and(&self.sum)
            .and(&self.count)
            .and(&self.undefined)
            .for_each(|out, &sum, &count, &undefined| {
                let skip = match strategy {
                    ReductionStrategy::PropagateUndefined => undefined || count == 0,
                    ReductionStrategy::IgnoreUndefined => count == 0,
                };
                if !skip {
                    *out = (sum / count as f64) as f32;
                }
            });
        out
    }
}

/// Mean of a set of grids under an explicit strategy.
pub fn reduce_mean(grids: &[Array2<f32>], strategy: ReductionStrategy) -> Result<Array2<f32>> {
    let first = grids
        .first()
        .ok_or_else(|| ProcessingError::MissingData("no grids to reduce".to_string()))?;
    let mut accumulator = MeanAccumulator::new(first.dim());
    for grid in grids {
        accumulator.add(grid)?;
    }
    Ok(accumulator.mean(strategy))
}

#[derive(Debug, Clone)]
pub struct ResampleOutcome {
    pub values: Array2<f32>,
    /// Daily bins between the first and last labelled day, empty ones included.
    pub bins: usize,
    /// Bins with no samples.
    pub empty_bins: usize,
}

/// Streams time-ordered grids into daily bins and folds each closed bin
/// into the composite, so only two accumulators are held at once.
pub struct DailyResampler {
    bin_strategy: ReductionStrategy,
    composite_strategy: ReductionStrategy,
    current: Option<(NaiveDate, MeanAccumulator)>,
    composite: MeanAccumulator,
    last_time: Option<DateTime<Utc>>,
    bins: usize,
    empty_bins: usize,
}

impl DailyResampler {
    pub fn new(
        shape: (usize, usize),
        bin_strategy: ReductionStrategy,
        composite_strategy: ReductionStrategy,
    ) -> Self {
        Self {
            bin_strategy,
            composite_strategy,
            current: None,
            composite: MeanAccumulator::new(shape),
            last_time: None,
            bins: 0,
            empty_bins: 0,
        }
    }

    /// Add the next grid. Times must be non-decreasing.
    pub fn push(&mut self, time: DateTime<Utc>, grid: &Array2<f32>) -> Result<()> {
        if let Some(last) = self.last_time {
            if time < last {
                return Err(ProcessingError::InvalidFormat(format!(
                    "time label {} precedes previous label {}",
                    time, last
                )));
            }
        }
        self.last_time = Some(time);

        let day = time.date_naive();
        match self.current.take() {
            Some((current_day, accumulator)) if current_day == day => {
                self.current = Some((current_day, accumulator));
            }
            Some((current_day, accumulator)) => {
                self.close_bin(&accumulator)?;
                let mut gap = current_day.succ_opt();
                while let Some(missing) = gap.filter(|d| *d < day) {
                    self.composite.add_undefined();
                    self.bins += 1;
                    self.empty_bins += 1;
                    gap = missing.succ_opt();
                }
                self.current = Some((day, MeanAccumulator::new(self.composite.shape())));
            }
            None => {
                self.current = Some((day, MeanAccumulator::new(self.composite.shape())));
            }
        }

        if let Some((_, accumulator)) = self.current.as_mut() {
            accumulator.add(grid)?;
        }
        Ok(())
    }

    fn close_bin(&mut self, accumulator: &MeanAccumulator) -> Result<()> {
        let bin_mean = accumulator.mean(self.bin_strategy);
        self.composite.add(&bin_mean)?;
        self.bins += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<ResampleOutcome> {
        if let Some((_, accumulator)) = self.current.take() {
            self.close_bin(&accumulator)?;
        }
        if self.bins == 0 {
            return Err(ProcessingError::MissingData(
                "no samples were resampled".to_string(),
            ));
        }

        Ok(ResampleOutcome {
            values: self.composite.mean(self.composite_strategy),
            bins: self.bins,
            empty_bins: self.empty_bins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    const NAN: f32 = f32::NAN;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, day, hour, 0, 0).unwrap()
    }

    fn strategies() -> (ReductionStrategy, ReductionStrategy) {
        (
            ReductionStrategy::PropagateUndefined,
            ReductionStrategy::PropagateUndefined,
        )
    }

    #[test]
    fn test_strategies_differ_on_undefined_cells() {
        let grids = [array![[1.0, NAN]], array![[3.0, 4.0]]];

        let propagated = reduce_mean(&grids, ReductionStrategy::PropagateUndefined).unwrap();
        assert_eq!(propagated[[0, 0]], 2.0);
        assert!(propagated[[0, 1]].is_nan());

        let ignored = reduce_mean(&grids, ReductionStrategy::IgnoreUndefined).unwrap();
        assert_eq!(ignored[[0, 0]], 2.0);
        assert_eq!(ignored[[0, 1]], 4.0);
    }

    #[test]
    fn test_reduce_mean_rejects_mismatched_shapes() {
        let grids = [array![[1.0, 2.0]], array![[1.0], [2.0]]];
        assert!(reduce_mean(&grids, ReductionStrategy::IgnoreUndefined).is_err());
        assert!(reduce_mean(&[], ReductionStrategy::IgnoreUndefined).is_err());
    }

    #[test]
    fn test_constant_daily_grids_give_the_constant() {
        let (bin, composite) = strategies();
        let mut resampler = DailyResampler::new((2, 3), bin, composite);
        let constant = Array2::from_elem((2, 3), 0.000125f32);
        for day in 1..=7 {
            resampler.push(at(day, 6), &constant).unwrap();
        }

        let outcome = resampler.finish().unwrap();
        assert_eq!(outcome.bins, 7);
        assert_eq!(outcome.empty_bins, 0);
        for value in outcome.values.iter() {
            assert!((value - 0.000125).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bins_are_averaged_before_the_composite() {
        let (bin, composite) = strategies();
        let mut resampler = DailyResampler::new((1, 1), bin, composite);
        // Day 1 has two passes averaging 2.0; day 2 has one pass of 8.0.
        resampler.push(at(1, 5), &array![[1.0]]).unwrap();
        resampler.push(at(1, 7), &array![[3.0]]).unwrap();
        resampler.push(at(2, 6), &array![[8.0]]).unwrap();

        let outcome = resampler.finish().unwrap();
        assert_eq!(outcome.bins, 2);
        assert_eq!(outcome.values[[0, 0]], 5.0);
    }

    #[test]
    fn test_undefined_cell_in_any_bin_stays_undefined() {
        let (bin, composite) = strategies();
        let mut resampler = DailyResampler::new((1, 2), bin, composite);
        resampler.push(at(1, 6), &array![[1.0, 1.0]]).unwrap();
        resampler.push(at(2, 6), &array![[2.0, NAN]]).unwrap();
        resampler.push(at(3, 6), &array![[3.0, 3.0]]).unwrap();

        let outcome = resampler.finish().unwrap();
        assert_eq!(outcome.values[[0, 0]], 2.0);
        assert!(outcome.values[[0, 1]].is_nan());
    }

    #[test]
    fn test_gap_days_become_empty_bins() {
        let (bin, composite) = strategies();
        let mut resampler = DailyResampler::new((1, 1), bin, composite);
        resampler.push(at(1, 6), &array![[1.0]]).unwrap();
        resampler.push(at(4, 6), &array![[3.0]]).unwrap();

        let outcome = resampler.finish().unwrap();
        assert_eq!(outcome.bins, 4);
        assert_eq!(outcome.empty_bins, 2);
        assert!(outcome.values[[0, 0]].is_nan());

        let mut lenient = DailyResampler::new(
            (1, 1),
            ReductionStrategy::PropagateUndefined,
            ReductionStrategy::IgnoreUndefined,
        );
        lenient.push(at(1, 6), &array![[1.0]]).unwrap();
        lenient.push(at(4, 6), &array![[3.0]]).unwrap();
        assert_eq!(lenient.finish().unwrap().values[[0, 0]], 2.0);
    }

    #[test]
    fn test_out_of_order_push_is_rejected() {
        let (bin, composite) = strategies();
        let mut resampler = DailyResampler::new((1, 1), bin, composite);
        resampler.push(at(2, 6), &array![[1.0]]).unwrap();
        assert!(resampler.push(at(1, 6), &array![[1.0]]).is_err());
    }

    #[test]
    fn test_empty_resampler_fails() {
        let (bin, composite) = strategies();
        let resampler = DailyResampler::new((1, 1), bin, composite);
        assert!(resampler.finish().is_err());
    }
}
