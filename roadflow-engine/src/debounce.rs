use std::time::Duration;
use tokio::time::Instant;

/// Collapses bursts of viewport movement into a single trigger.
///
/// Every `poke` pushes the deadline out by the full quiet window; the owner
/// sleeps until the deadline and calls [`Debounce::fire`] when it elapses.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the timer, discarding any earlier deadline.
    pub fn poke(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Disarm after the deadline elapsed.
    pub fn fire(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poke_arms_and_extends() {
        let mut debounce = Debounce::new(Duration::from_millis(1000));
        assert!(!debounce.is_armed());

        debounce.poke();
        assert!(debounce.is_armed());
        let first = debounce.deadline().unwrap();

        debounce.poke();
        let second = debounce.deadline().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn cancel_and_fire_disarm() {
        let mut debounce = Debounce::new(Duration::from_millis(100));
        debounce.poke();
        debounce.cancel();
        assert!(!debounce.is_armed());

        debounce.poke();
        debounce.fire();
        assert!(!debounce.is_armed());
        assert!(debounce.deadline().is_none());
    }
}
