//! Button debouncing.
//!
//! Two-phase: any change in the raw level re-arms the timer, and the new level
//! is only committed once it has been stable for longer than the window.

use crate::hal::{Board, Input};

#[derive(Debug, Clone)]
pub struct Button {
    pub input: Input,
    /// committed level
    pub state: bool,
    last_reading: bool,
    last_transition_ms: u64,
    debounce_ms: u64,
}

impl Button {
    pub fn new(input: Input, debounce_ms: u64) -> Self {
        Self { input, state: false, last_reading: false, last_transition_ms: 0, debounce_ms }
    }

    /// Read the pin and feed it through [`Button::update`].
    pub fn poll(&mut self, board: &Board, now_ms: u64) -> bool {
        let level = board.read(self.input);
        self.update(level, now_ms)
    }

    /// Returns true when the committed state changed on this call.
    pub fn update(&mut self, level: bool, now_ms: u64) -> bool {
        let mut changed = false;

        if level != self.last_reading {
            self.last_transition_ms = now_ms;
        }

        if now_ms.saturating_sub(self.last_transition_ms) > self.debounce_ms && level != self.state {
            self.state = level;
            changed = true;
        }

        self.last_reading = level;
        changed
    }

    /// Committed a transition to high on this poll.
    pub fn pressed(&mut self, board: &Board, now_ms: u64) -> bool {
        self.poll(board, now_ms) && self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stable_press_commits_once() {
        let mut b = Button::new(Input::SendButton, 50);
        let mut commits = 0;
        for t in (0..=300).step_by(10) {
            if b.update(t >= 100, t) {
                commits += 1;
            }
        }
        assert_eq!(commits, 1);
        assert!(b.state);
    }

    #[test]
    fn commit_needs_more_than_the_window() {
        let mut b = Button::new(Input::SendButton, 50);
        assert!(!b.update(true, 1000));
        assert!(!b.update(true, 1050));
        assert!(b.update(true, 1051));
    }

    #[test]
    fn bounce_rearms_the_timer() {
        let mut b = Button::new(Input::StopButton, 50);
        assert!(!b.update(true, 1000));
        assert!(!b.update(false, 1040));
        assert!(!b.update(true, 1080));
        // 120 ms since the first edge, but only 40 ms since the last one
        assert!(!b.update(true, 1120));
        assert!(b.update(true, 1131));
    }

    #[test]
    fn release_is_a_change_too() {
        let mut b = Button::new(Input::SendButton, 50);
        b.update(true, 1000);
        assert!(b.update(true, 1100));
        b.update(false, 1200);
        assert!(b.update(false, 1300));
        assert!(!b.state);
    }

    proptest! {
        #[test]
        fn bursts_shorter_than_the_window_never_commit(
            levels in proptest::collection::vec(any::<bool>(), 1..20),
            start in 1_000u64..100_000,
        ) {
            let mut b = Button::new(Input::SendButton, 50);
            // whole burst fits inside 50 ms
            for (i, level) in levels.iter().enumerate() {
                prop_assert!(!b.update(*level, start + (i as u64) * 2));
            }
            prop_assert!(!b.state);
        }

        #[test]
        fn held_level_reports_exactly_one_change(
            hold in 51u64..1_000,
            step in 1u64..20,
        ) {
            let mut b = Button::new(Input::SendButton, 50);
            let start = 10_000;
            let mut changes = 0;
            let mut t = start;
            while t <= start + hold + step {
                if b.update(true, t) {
                    changes += 1;
                }
                t += step;
            }
            prop_assert_eq!(changes, 1);
        }
    }
}
