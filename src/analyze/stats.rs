use itertools::Itertools;

pub const REPORT_PERCENTILE: f64 = 75.0;

pub fn median(samples: &[f64]) -> f64 {
    percentile(samples, 50.0)
}

/// Linearly interpolated percentile; zero for no samples.
pub fn percentile(samples: &[f64], rank: f64) -> f64 {
    let sorted = samples.iter().copied().sorted_by(f64::total_cmp).collect::<Vec<_>>();
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let position = rank.clamp(0.0, 100.0) / 100.0 * (len - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
