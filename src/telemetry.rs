use std::fmt::Write as _;
use std::time::Instant;

/// Times one pipeline phase and logs a single structured line when finished.
pub struct PhaseTimer {
    phase: &'static str,
    started: Instant,
}

impl PhaseTimer {
    pub fn start(phase: &'static str) -> Self {
        log::debug!("phase={phase} started");
        Self {
            phase,
            started: Instant::now(),
        }
    }

    pub fn finish(self, counts: &[(&str, usize)]) {
        log::info!("{}", self.line(counts));
    }

    pub fn fail(self, error: &dyn std::fmt::Display) {
        log::warn!("{} error=\"{}\"", self.line(&[]), error);
    }

    fn line(&self, counts: &[(&str, usize)]) -> String {
        let mut line = format!(
            "phase={} elapsed_ms={}",
            self.phase,
            self.started.elapsed().as_millis()
        );
        for (key, value) in counts {
            let _ = write!(line, " {key}={value}");
        }
        line
    }
}
