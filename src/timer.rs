//! Wall-clock timing for shell operations.
//!
//! Every command reports how long its engine call took. [`ElapsedTimer`]
//! captures the start instant, [`timed`] wraps a closure so the duration is
//! available whether or not the closure succeeded, and [`format_secs`] keeps
//! the display precision identical across all report lines.
use std::time::Instant;

/// Captures a start instant and reports elapsed seconds.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTimer {
    start: Instant,
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl ElapsedTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Run `op` and return its output together with the elapsed seconds.
pub fn timed<T, F: FnOnce() -> T>(op: F) -> (T, f64) {
    let timer = ElapsedTimer::start();
    let out = op();
    (out, timer.elapsed_secs())
}

/// Digits kept by [`format_secs`].
pub const SIGNIFICANT_DIGITS: usize = 4;

/// Render seconds with four significant digits, trailing zeros dropped.
/// Magnitudes below `1e-4` or from `1e4` up switch to exponent notation.
pub fn format_secs(secs: f64) -> String {
    if secs == 0.0 || !secs.is_finite() {
        return format!("{}", secs);
    }
    let digits = SIGNIFICANT_DIGITS as i32;
    let exp = secs.abs().log10().floor() as i32;
    if (-4..digits).contains(&exp) {
        let decimals = (digits - 1 - exp) as usize;
        trim_zeros(&format!("{:.*}", decimals, secs))
    } else {
        let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, secs);
        match sci.split_once('e') {
            Some((mantissa, e)) => format!("{}e{}", trim_zeros(mantissa), e),
            None => sci,
        }
    }
}

fn trim_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
