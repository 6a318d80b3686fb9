//! Progress reporting for per-visit batch runs (`progress` feature).
//!
//! [`VisitProgress`] owns the bar and times the visits: the message shows the duration of the
//! last visit and a moving average `avg ← α·dt + (1 − α)·avg`, seeded by the first visit.
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

/// Short human-readable duration: `"253µs"`, `"42ms"`, `"3.14s"`, `"2m05s"`.
pub(crate) fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us @ 0..1_000 => format!("{us}µs"),
        us @ 1_000..1_000_000 => format!("{}ms", us / 1_000),
        _ if d.as_secs() < 60 => format!("{:.2}s", d.as_secs_f64()),
        _ => format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60),
    }
}

pub(crate) struct VisitProgress {
    bar: ProgressBar,
    last: Instant,
    avg: Option<Duration>,
    alpha: f64,
}

impl VisitProgress {
    /// Bar over `total` visits; `alpha` weights the newest visit in the average.
    pub fn new(total: usize, alpha: f64) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} visits ({percent:>3}%) | ETA {eta_precise} | {msg}",
            )
            .expect("indicatif template"),
        );
        bar.enable_steady_tick(Duration::from_millis(200));
        VisitProgress {
            bar,
            last: Instant::now(),
            avg: None,
            alpha,
        }
    }

    /// Mark one visit as done and return its duration.
    pub fn visit_done(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;

        let avg = match self.avg {
            None => dt,
            Some(avg) => avg.mul_f64(1.0 - self.alpha) + dt.mul_f64(self.alpha),
        };
        self.avg = Some(avg);

        self.bar
            .set_message(format!("last: {}, avg: {}", fmt_dur(dt), fmt_dur(avg)));
        self.bar.inc(1);
        dt
    }

    /// Moving average of the visit durations, zero before the first visit.
    pub fn average(&self) -> Duration {
        self.avg.unwrap_or_default()
    }

    pub fn finish(self) {
        debug!(
            "{} visits, {} per visit on average",
            self.bar.position(),
            fmt_dur(self.average())
        );
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod progress_bar_test {
    use super::*;

    #[test]
    fn test_fmt_dur() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
        assert_eq!(fmt_dur(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn test_visit_progress() {
        let mut progress = VisitProgress::new(2, 0.5);
        assert_eq!(progress.average(), Duration::ZERO);
        let first = progress.visit_done();
        assert_eq!(progress.average(), first);
        let second = progress.visit_done();
        assert_eq!(progress.average(), first.mul_f64(0.5) + second.mul_f64(0.5));
        assert_eq!(progress.bar.position(), 2);
        progress.finish();
    }
}
