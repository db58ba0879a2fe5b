//! Budget search - drives a reduction strategy until the output fits a byte budget
//!
//! Every trial is serialized with the codec and measured, so the byte budget is
//! checked against ground truth rather than against the size estimate.
//!
//! Search order:
//! 1. The unmodified track. If it fits, it is returned as is.
//! 2. Anchors only (first and last point of every segment). If even that does
//!    not fit, the search is exhausted.
//! 3. Bisection over the strategy parameter: point count for decimation,
//!    tolerance for simplification.

use crate::estimate::{DEFAULT_ESTIMATE_MARGIN, SizeEstimate, estimate_overhead};
use crate::progress::{MonotonicProgress, format_size};
use crate::strategy::{Decimation, Method, ReductionStrategy, Simplification};
use crate::{CompressError, GpxCodec, ProgressSink, Result, Selection, Track, TrackCodec};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default number of bisection steps for the tolerance search
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default fraction of the budget considered close enough to stop early
pub const DEFAULT_GOOD_ENOUGH_RATIO: f64 = 0.95;

/// Ratio between the lower and upper tolerance of an extent-derived bracket
const EXTENT_BRACKET_RATIO: f64 = 1e-6;

/// Tolerance range searched by the simplification strategy, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EpsilonBracket {
    /// Fixed bounds
    Fixed { min: f64, max: f64 },
    /// Upper bound is the diagonal of the track's bounding box (any larger
    /// tolerance collapses every segment to its anchors), lower bound a
    /// millionth of that.
    #[default]
    Extent,
}

impl EpsilonBracket {
    /// The historical fixed bracket, suitable for tracks spanning a few kilometres
    pub const LEGACY: EpsilonBracket = EpsilonBracket::Fixed {
        min: 0.000001,
        max: 0.01,
    };

    /// Resolve to concrete `(min, max)` bounds for `track`
    pub fn resolve(&self, track: &Track) -> Result<(f64, f64)> {
        match *self {
            EpsilonBracket::Fixed { min, max } => {
                if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
                    return Err(CompressError::InvalidParameter(format!(
                        "epsilon bracket must satisfy 0 < min < max, got [{}, {}]",
                        min, max
                    )));
                }
                Ok((min, max))
            }
            EpsilonBracket::Extent => {
                let extent = track.extent();
                if extent > 0.0 && extent.is_finite() {
                    Ok((extent * EXTENT_BRACKET_RATIO, extent))
                } else {
                    // Every point at one location: any tolerance collapses the track
                    EpsilonBracket::LEGACY.resolve(track)
                }
            }
        }
    }
}

/// Configuration for the budget search
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchConfig {
    /// Bisection steps for the tolerance search.
    /// The point-count search is bounded by `ceil(log2(N))` on its own.
    /// Default: 20
    pub max_iterations: usize,
    /// Stop the tolerance search once the best result exceeds this fraction of the budget.
    /// Default: 0.95
    pub good_enough_ratio: f64,
    /// Tolerance bracket for the simplification strategy
    pub epsilon_bracket: EpsilonBracket,
    /// Bytes kept spare when the size estimate picks the first point-count probe.
    /// Default: 1024
    pub estimate_margin: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            good_enough_ratio: DEFAULT_GOOD_ENOUGH_RATIO,
            epsilon_bracket: EpsilonBracket::default(),
            estimate_margin: DEFAULT_ESTIMATE_MARGIN,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CompressError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.good_enough_ratio > 0.0 && self.good_enough_ratio <= 1.0) {
            return Err(CompressError::InvalidParameter(format!(
                "good_enough_ratio must be in (0, 1], got {}",
                self.good_enough_ratio
            )));
        }
        Ok(())
    }
}

/// Parameter value that produced a trial
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrialParameter {
    /// No reduction
    Unreduced,
    /// Decimation target point count
    PointCount(usize),
    /// Simplification tolerance in degrees
    Tolerance(f64),
}

/// A trial that fits the budget
#[derive(Debug, Clone)]
pub struct ReductionResult {
    /// The serialized reduced track
    pub serialized_bytes: Vec<u8>,
    /// Number of points kept
    pub retained_point_count: u64,
    /// The reduced document as parsed. Point extensions the parser does not
    /// model are only present in `serialized_bytes`.
    pub retained_track: gpx::Gpx,
    /// Kept points as indices into the original track
    pub selection: Selection,
    /// Parameter the strategy was applied with
    pub parameter: TrialParameter,
}

impl ReductionResult {
    /// Serialized size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.serialized_bytes.len()
    }
}

/// Terminal phase of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Searching,
    Converged,
    Exhausted,
}

/// Result of a budget search
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// A reduced track fits the budget
    Converged {
        result: ReductionResult,
        /// Serialized trials performed
        trials: usize,
    },
    /// Even the anchors-only track exceeds the budget
    Exhausted {
        /// Serialized trials performed
        trials: usize,
    },
}

impl SearchOutcome {
    /// The accepted result, if any
    pub fn result(&self) -> Option<&ReductionResult> {
        match self {
            SearchOutcome::Converged { result, .. } => Some(result),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    /// Consume the outcome, returning the accepted result, if any
    pub fn into_result(self) -> Option<ReductionResult> {
        match self {
            SearchOutcome::Converged { result, .. } => Some(result),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    /// Number of serialized trials
    pub fn trials(&self) -> usize {
        match self {
            SearchOutcome::Converged { trials, .. } | SearchOutcome::Exhausted { trials } => {
                *trials
            }
        }
    }

    /// Terminal phase reached
    pub fn phase(&self) -> SearchPhase {
        match self {
            SearchOutcome::Converged { .. } => SearchPhase::Converged,
            SearchOutcome::Exhausted { .. } => SearchPhase::Exhausted,
        }
    }
}

/// Transient state of one bisection
struct SearchState<T> {
    low: T,
    high: T,
    best: ReductionResult,
    iteration: usize,
    phase: SearchPhase,
}

impl<T> SearchState<T> {
    fn new(low: T, high: T, best: ReductionResult) -> Self {
        Self {
            low,
            high,
            best,
            iteration: 0,
            phase: SearchPhase::Searching,
        }
    }
}

/// One measured trial
struct Trial {
    result: ReductionResult,
    fits: bool,
}

/// Budget search controller
///
/// Owns no track data; one controller can run any number of searches, one at a time.
pub struct BudgetSearch<C: TrackCodec = GpxCodec> {
    codec: C,
    config: SearchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl BudgetSearch<GpxCodec> {
    /// Controller for GPX documents
    pub fn with_config(config: SearchConfig) -> Self {
        Self::new(GpxCodec, config)
    }
}

impl Default for BudgetSearch<GpxCodec> {
    fn default() -> Self {
        Self::with_config(SearchConfig::default())
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<C: TrackCodec> BudgetSearch<C> {
    /// Create a new controller with the given codec and configuration
    pub fn new(codec: C, config: SearchConfig) -> Self {
        Self {
            codec,
            config,
            cancel: None,
        }
    }

    /// Check `flag` before every trial and abort with [`CompressError::Cancelled`] once set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Get a reference to the codec
    #[inline]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Reduce `track` until its serialization fits in `budget` bytes
    ///
    /// Returns [`SearchOutcome::Exhausted`] when even the anchors-only track is
    /// too large. Errors are reserved for invalid parameters, serialization
    /// failures and cancellation.
    pub fn run(
        &self,
        track: &Track,
        budget: usize,
        method: Method,
        progress: &mut dyn ProgressSink,
    ) -> Result<SearchOutcome> {
        #[cfg(feature = "profiling")]
        profiling::scope!("search::run");

        if budget == 0 {
            return Err(CompressError::InvalidParameter(
                "budget must be at least 1 byte".to_string(),
            ));
        }
        self.config.validate()?;

        let mut progress = MonotonicProgress::new(progress);
        let n = track.total_points();

        progress.report(10, "Analyzing track structure...");
        let full = self.trial(track, Selection::all(track), TrialParameter::Unreduced, budget)?;
        if full.fits {
            tracing::info!(
                "Track already fits: {} points, {} <= {}",
                n,
                format_size(full.result.size()),
                format_size(budget)
            );
            progress.report(100, "Already within budget");
            return Ok(SearchOutcome::Converged {
                result: full.result,
                trials: 1,
            });
        }

        let estimate = estimate_overhead(&self.codec, &full.result.serialized_bytes, n);
        drop(full);

        let anchors_parameter = match method {
            Method::Decimation => TrialParameter::PointCount(1),
            Method::Simplification => TrialParameter::Tolerance(f64::INFINITY),
        };
        let anchors = self.trial(track, Selection::anchors(track), anchors_parameter, budget)?;
        if !anchors.fits {
            tracing::warn!(
                "Budget {} is infeasible: anchors-only track needs {}",
                format_size(budget),
                format_size(anchors.result.size())
            );
            progress.report(100, "Budget too small even for segment endpoints");
            return Ok(SearchOutcome::Exhausted { trials: 2 });
        }

        progress.report(20, "Calculating optimal reduction...");
        let (result, iterations, phase) = match method {
            Method::Decimation => {
                let state =
                    self.search_point_count(track, budget, &estimate, anchors.result, &mut progress)?;
                (state.best, state.iteration, state.phase)
            }
            Method::Simplification => {
                let state = self.search_tolerance(track, budget, anchors.result, &mut progress)?;
                (state.best, state.iteration, state.phase)
            }
        };

        let trials = iterations + 2;
        tracing::info!(
            "Search {:?} after {} trials: kept {} of {} points, {} of {} budget ({:.1}%)",
            phase,
            trials,
            result.retained_point_count,
            n,
            format_size(result.size()),
            format_size(budget),
            result.size() as f64 / budget as f64 * 100.0
        );
        progress.report(100, "Done");

        Ok(SearchOutcome::Converged { result, trials })
    }

    /// Integer bisection over the decimation target point count
    fn search_point_count(
        &self,
        track: &Track,
        budget: usize,
        estimate: &SizeEstimate,
        anchors: ReductionResult,
        progress: &mut MonotonicProgress<'_>,
    ) -> Result<SearchState<usize>> {
        let n = track.total_points();
        // The pre-checks settled k = 1 (fits) and k = N (does not)
        let mut state = SearchState::new(2, n.saturating_sub(1), anchors);
        let bound = (usize::BITS - n.leading_zeros()) as usize + 1;

        let mut probe = (state.low <= state.high).then(|| {
            estimate
                .point_count_for(budget, self.config.estimate_margin)
                .clamp(state.low, state.high)
        });

        while state.low <= state.high {
            let mid = probe
                .take()
                .unwrap_or(state.low + (state.high - state.low) / 2);
            let selection = Decimation.apply(track, mid)?;
            let trial = self.trial(track, selection, TrialParameter::PointCount(mid), budget)?;
            state.iteration += 1;

            let retained = trial.result.retained_point_count as usize;
            tracing::debug!(
                "k = {}: estimated {}, measured {}",
                mid,
                format_size(estimate.predicted_size(retained)),
                format_size(trial.result.size())
            );

            progress.report(
                trial_percent(state.iteration, bound),
                &format!(
                    "Testing {} points ({})...",
                    trial.result.retained_point_count,
                    format_size(trial.result.size())
                ),
            );

            if trial.fits {
                state.best = trial.result;
                state.low = mid + 1;
            } else {
                state.high = mid - 1;
            }
        }

        state.phase = SearchPhase::Converged;
        Ok(state)
    }

    /// Real-valued bisection over the simplification tolerance
    fn search_tolerance(
        &self,
        track: &Track,
        budget: usize,
        anchors: ReductionResult,
        progress: &mut MonotonicProgress<'_>,
    ) -> Result<SearchState<f64>> {
        let (min, max) = self.config.epsilon_bracket.resolve(track)?;
        let mut state = SearchState::new(min, max, anchors);
        let good_enough = budget as f64 * self.config.good_enough_ratio;
        tracing::debug!("Tolerance bracket [{:e}, {:e}]", min, max);

        while state.iteration < self.config.max_iterations {
            let epsilon = (state.low + state.high) / 2.0;
            let selection = Simplification.apply(track, epsilon)?;
            let trial = self.trial(track, selection, TrialParameter::Tolerance(epsilon), budget)?;
            state.iteration += 1;

            progress.report(
                trial_percent(state.iteration, self.config.max_iterations),
                &format!(
                    "Testing epsilon {:.6} ({} points, {})...",
                    epsilon,
                    trial.result.retained_point_count,
                    format_size(trial.result.size())
                ),
            );

            if trial.fits {
                state.best = trial.result;
                state.high = epsilon;
            } else {
                state.low = epsilon;
            }

            if state.best.size() as f64 > good_enough {
                tracing::debug!("Within {} of budget, stopping early", self.config.good_enough_ratio);
                break;
            }
        }

        state.phase = SearchPhase::Converged;
        Ok(state)
    }

    /// Materialize, serialize and measure one selection
    fn trial(
        &self,
        track: &Track,
        selection: Selection,
        parameter: TrialParameter,
        budget: usize,
    ) -> Result<Trial> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(CompressError::Cancelled);
        }

        let serialized_bytes = self.codec.serialize(track, &selection)?;
        let retained_track = track.materialize(&selection);
        let fits = serialized_bytes.len() <= budget;

        tracing::debug!(
            ?parameter,
            points = selection.len(),
            bytes = serialized_bytes.len(),
            fits,
            "Trial"
        );

        Ok(Trial {
            result: ReductionResult {
                serialized_bytes,
                retained_point_count: selection.len() as u64,
                retained_track,
                selection,
                parameter,
            },
            fits,
        })
    }
}

/// Progress for trial `iteration` out of roughly `bound`, mapped onto 20..=90
fn trial_percent(iteration: usize, bound: usize) -> u8 {
    let bound = bound.max(1);
    let fraction = iteration.min(bound) as f64 / bound as f64;
    (20.0 + fraction * 70.0) as u8
}

/// Parse a GPX document and reduce it to at most `budget` bytes
pub fn compress(
    bytes: &[u8],
    budget: usize,
    method: Method,
    progress: &mut dyn ProgressSink,
) -> Result<SearchOutcome> {
    let search: BudgetSearch = BudgetSearch::default();
    let track = search.codec().parse(bytes)?;
    search.run(&track, budget, method, progress)
}
