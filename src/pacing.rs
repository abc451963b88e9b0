use std::{fmt::Debug, time::Duration};

/// Policy applied after every page navigation and every download
/// so that the remote service is not hammered.
pub trait Pacer: Sync + Debug {
    fn pause(&self);
}

/// Sleep for the same duration every time
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(Duration);

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }
}

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// Never wait
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn fixed_delay_waits_at_least_the_delay() {
        let pacer = FixedDelay::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.pause();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
