use std::time::{Duration, Instant};

/// Logs how long a stage took when dropped.
pub struct Timed {
    stage: &'static str,
    start: Instant,
    level: log::Level,
}

impl Timed {
    pub fn info(stage: &'static str) -> Self {
        Self::at(stage, log::Level::Info)
    }

    pub fn debug(stage: &'static str) -> Self {
        Self::at(stage, log::Level::Debug)
    }

    fn at(stage: &'static str, level: log::Level) -> Self {
        log::trace!("{stage}...");
        Self { stage, start: Instant::now(), level }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::log!(self.level, "{}: {:.3?}", self.stage, self.start.elapsed());
    }
}
