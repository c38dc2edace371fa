use itertools::{Itertools, MinMaxResult};
use simple_moving_average::{SMA, SumTreeSMA};

use super::{Confidence, LapRecord};

/// Number of recent valid laps an outlier is measured against
pub const OUTLIER_WINDOW: usize = 10;
/// A lap further than this many standard deviations from the mean is an outlier
const OUTLIER_STD_DEVS: f32 = 3.;
/// Smallest accepted deviation as a share of the mean, keeps fuel-saving laps valid
const OUTLIER_MIN_SHARE: f32 = 0.15;
/// Window of the secondary rolling average
const ROLLING_WINDOW: usize = 10;
/// Laps on each side of the trend comparison
const TREND_WINDOW: usize = 3;
/// Historical laps used when the session has none
const HISTORICAL_AVG_LAPS: usize = 5;
/// Live projection is only trusted past this share of the lap
const LIVE_PROJECTION_MIN_DIST: f32 = 0.05;
const LIVE_PROJECTION_MIN: f32 = 0.5;
const LIVE_PROJECTION_MAX: f32 = 20.;
/// Weight growth per lap of the weighted average
const WEIGHT_FACTOR: f32 = 1.2;

/// Outlier test for a freshly completed lap against the recent valid laps.
pub fn is_valid_lap(fuel_used: f32, lap_time: f32, recent_laps: &[LapRecord]) -> bool {
    if fuel_used <= 0. || lap_time <= 0. || !fuel_used.is_finite() {
        return false;
    }
    let window = &recent_laps[..recent_laps.len().min(OUTLIER_WINDOW)];
    if window.len() < 2 {
        return true;
    }

    let count = window.len() as f32;
    let mean = window.iter().map(|l| l.fuel_used).sum::<f32>() / count;
    let variance = window
        .iter()
        .map(|l| (l.fuel_used - mean).powi(2))
        .sum::<f32>()
        / (count - 1.);
    let threshold = (OUTLIER_STD_DEVS * variance.sqrt()).max(mean * OUTLIER_MIN_SHARE);

    (fuel_used - mean).abs() <= threshold
}

pub fn simple_average(laps: &[LapRecord]) -> Option<f32> {
    if laps.is_empty() {
        return None;
    }
    Some(laps.iter().map(|l| l.fuel_used).sum::<f32>() / laps.len() as f32)
}

/// Exponentially weighted average, `laps` ordered most recent first.
pub fn weighted_average(laps: &[LapRecord]) -> Option<f32> {
    if laps.is_empty() {
        return None;
    }
    let (weighted_sum, weight_sum) =
        laps.iter()
            .enumerate()
            .fold((0., 0.), |(sum, weights), (idx, lap)| {
                let weight = WEIGHT_FACTOR.powi((laps.len() - idx - 1) as i32);
                (sum + lap.fuel_used * weight, weights + weight)
            });
    Some(weighted_sum / weight_sum)
}

/// Average of the last `ROLLING_WINDOW` laps, `laps` ordered most recent first.
pub fn rolling_average(laps: &[LapRecord]) -> Option<f32> {
    if laps.is_empty() {
        return None;
    }
    let mut sma = SumTreeSMA::<f32, f32, ROLLING_WINDOW>::new();
    for lap in laps.iter().take(ROLLING_WINDOW).rev() {
        sma.add_sample(lap.fuel_used);
    }
    Some(sma.get_average())
}

pub fn average_lap_time(laps: &[LapRecord]) -> Option<f32> {
    let times: Vec<f32> = laps
        .iter()
        .map(|l| l.lap_time)
        .filter(|t| *t > 0.)
        .collect();
    if times.is_empty() {
        return None;
    }
    Some(times.iter().sum::<f32>() / times.len() as f32)
}

pub fn fuel_min_max(laps: &[LapRecord]) -> Option<(f32, f32)> {
    match laps
        .iter()
        .map(|l| l.fuel_used)
        .minmax_by(|a, b| a.total_cmp(b))
    {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(value) => Some((value, value)),
        MinMaxResult::MinMax(min, max) => Some((min, max)),
    }
}

pub fn green_flag_laps(laps: &[LapRecord]) -> Vec<LapRecord> {
    laps.iter().filter(|l| l.is_green_flag).cloned().collect()
}

/// Change in percent between the latest laps and the ones before them.
///
/// Zero until both windows are full.
pub fn consumption_trend(laps: &[LapRecord]) -> f32 {
    if laps.len() < TREND_WINDOW * 2 {
        return 0.;
    }
    let (Some(recent), Some(older)) = (
        simple_average(&laps[..TREND_WINDOW]),
        simple_average(&laps[TREND_WINDOW..TREND_WINDOW * 2]),
    ) else {
        return 0.;
    };
    if older <= 0. {
        return 0.;
    }
    (recent - older) / older * 100.
}

pub fn confidence(valid_laps: usize) -> Confidence {
    match valid_laps {
        0..=1 => Confidence::VeryLow,
        2..=3 => Confidence::Low,
        4..=7 => Confidence::Medium,
        _ => Confidence::High,
    }
}

/// Live estimate from the lap in progress.
pub fn live_projection(current_lap_usage: f32, lap_dist_pct: f32) -> Option<f32> {
    if current_lap_usage <= 0. || lap_dist_pct <= LIVE_PROJECTION_MIN_DIST {
        return None;
    }
    Some((current_lap_usage / lap_dist_pct).clamp(LIVE_PROJECTION_MIN, LIVE_PROJECTION_MAX))
}

/// Consumption figures for one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumptionSummary {
    pub valid_laps: usize,
    pub last_lap_usage: Option<f32>,
    /// Average the strategy works from, `None` when nothing can be estimated yet
    pub base_consumption: Option<f32>,
    /// Average of the last `avg_laps_count` clean laps, without fallbacks
    pub avg_laps: Option<f32>,
    pub avg10_laps: Option<f32>,
    pub avg_green_laps: Option<f32>,
    pub weighted_avg: Option<f32>,
    pub min_lap_usage: Option<f32>,
    pub max_lap_usage: Option<f32>,
    pub trend_percent: f32,
    pub avg_lap_time: Option<f32>,
    pub confidence: Confidence,
}

/// Inputs of `summarize` besides the lap history itself.
#[derive(Clone, Copy, Debug)]
pub struct SummaryInputs {
    pub avg_laps_count: usize,
    pub qualify_consumption: Option<f32>,
    pub current_lap_usage: f32,
    pub lap_dist_pct: f32,
}

/// Valid laps, restricted to full laps when there are any.
fn clean_laps(laps: &[LapRecord]) -> Vec<LapRecord> {
    let valid: Vec<LapRecord> = laps
        .iter()
        .filter(|l| l.is_valid_for_calc)
        .cloned()
        .collect();
    let full: Vec<LapRecord> = valid.iter().filter(|l| l.is_full_lap()).cloned().collect();
    if full.is_empty() { valid } else { full }
}

/// Compute every consumption statistic from the session and historical laps.
///
/// Both slices are ordered most recent first.
pub fn summarize(
    history: &[LapRecord],
    historical: &[LapRecord],
    inputs: SummaryInputs,
) -> ConsumptionSummary {
    let valid_laps = history.iter().filter(|l| l.is_valid_for_calc).count();
    let session_laps = clean_laps(history);
    let historical_laps = clean_laps(historical);

    let avg_laps = simple_average(
        &session_laps[..session_laps.len().min(inputs.avg_laps_count.max(1))],
    );
    let historical_avg =
        simple_average(&historical_laps[..historical_laps.len().min(HISTORICAL_AVG_LAPS)]);
    let base_consumption = avg_laps
        .filter(|v| *v > 0.)
        .or(inputs.qualify_consumption.filter(|v| *v > 0.))
        .or(historical_avg.filter(|v| *v > 0.))
        .or_else(|| live_projection(inputs.current_lap_usage, inputs.lap_dist_pct));

    let min_max_source = if session_laps.is_empty() {
        &historical_laps
    } else {
        &session_laps
    };
    let min_max = fuel_min_max(min_max_source);

    let avg_lap_time = average_lap_time(&session_laps).or_else(|| {
        average_lap_time(&historical_laps[..historical_laps.len().min(HISTORICAL_AVG_LAPS)])
    });

    ConsumptionSummary {
        valid_laps,
        last_lap_usage: history.first().map(|l| l.fuel_used),
        base_consumption,
        avg_laps,
        avg10_laps: rolling_average(&session_laps),
        avg_green_laps: simple_average(&green_flag_laps(&session_laps)),
        weighted_avg: weighted_average(
            &session_laps[..session_laps.len().min(inputs.avg_laps_count.max(1))],
        ),
        min_lap_usage: min_max.map(|(min, _)| min),
        max_lap_usage: min_max.map(|(_, max)| max),
        trend_percent: consumption_trend(&session_laps),
        avg_lap_time,
        confidence: confidence(valid_laps),
    }
}
