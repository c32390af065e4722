//! World tick source.

use tickfx_types::GameCycle;

/// Read-only view of the world's tick counter.
pub trait TickClock {
    fn current_cycle(&self) -> GameCycle;
}

/// Clock driven by hand. The shell and the tests own one of these and bump it
/// once per simulated tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    cycle: GameCycle,
}

impl ManualClock {
    pub fn starting_at(cycle: GameCycle) -> Self {
        Self { cycle }
    }

    /// Move forward by `ticks` and return the new cycle
    pub fn advance(&mut self, ticks: u64) -> GameCycle {
        self.cycle = self.cycle.saturating_add(ticks);
        self.cycle
    }

    /// Jump to `cycle`. Going backwards is ignored; the counter is monotonic.
    pub fn set(&mut self, cycle: GameCycle) {
        self.cycle = self.cycle.max(cycle);
    }
}

impl TickClock for ManualClock {
    fn current_cycle(&self) -> GameCycle {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let mut clock = ManualClock::starting_at(100);
        assert_eq!(clock.advance(10), 110);
        clock.set(50);
        assert_eq!(clock.current_cycle(), 110);
        clock.set(200);
        assert_eq!(clock.current_cycle(), 200);
    }
}
