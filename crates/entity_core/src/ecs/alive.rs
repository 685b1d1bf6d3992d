//! Deferred destruction counter
//!
//! Entities and component slots carry an [`Alive`] counter. Killing an owner
//! does not remove it: the owner is first reported as pending removal and only
//! qualifies for hard removal after a fixed number of frame ticks. Systems use
//! that window to react (death animation, fade out, sound tail) while the data
//! is still there.

/// Ticks an owner survives after [`Alive::kill`] before [`Alive::delete_owner`] holds
pub const REMOVAL_GRACE_TICKS: u8 = 10;

/// Health counter driving deferred removal
///
/// `0` means fully alive. A kill sets the counter to `1`, every frame tick
/// after that increments it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alive {
    health: u8,
}

impl Alive {
    /// Create a fully alive counter
    pub const fn new() -> Self {
        Self { health: 0 }
    }

    /// Request removal; later calls have no effect
    pub fn kill(&mut self) {
        if self.health == 0 {
            self.health = 1;
        }
    }

    /// Advance one frame tick
    pub fn update_for_frame(&mut self) {
        if self.health > 0 {
            self.health = self.health.saturating_add(1);
        }
    }

    /// Owner has been killed and is counting down
    pub const fn is_pending_removal(&self) -> bool {
        self.health > 0
    }

    /// Grace window is over, the owner may be destroyed
    pub const fn delete_owner(&self) -> bool {
        self.health > REMOVAL_GRACE_TICKS
    }

    /// Raw counter value
    pub const fn health(&self) -> u8 {
        self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_by_default() {
        let mut alive = Alive::new();
        assert!(!alive.is_pending_removal());
        assert!(!alive.delete_owner());

        // Ticking a living counter does nothing
        alive.update_for_frame();
        assert_eq!(alive.health(), 0);
    }

    #[test]
    fn test_kill_countdown() {
        let mut alive = Alive::new();
        alive.kill();
        assert_eq!(alive.health(), 1);
        assert!(alive.is_pending_removal());

        for tick in 1..=9u8 {
            alive.update_for_frame();
            assert_eq!(alive.health(), tick + 1);
            assert!(alive.is_pending_removal());
            assert!(!alive.delete_owner(), "deleted too early at tick {tick}");
        }

        alive.update_for_frame();
        assert_eq!(alive.health(), 11);
        assert!(alive.delete_owner());
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut alive = Alive::new();
        alive.kill();
        alive.update_for_frame();
        alive.update_for_frame();
        alive.kill();
        assert_eq!(alive.health(), 3);
    }

    #[test]
    fn test_counter_saturates() {
        let mut alive = Alive::new();
        alive.kill();
        for _ in 0..1000 {
            alive.update_for_frame();
        }
        assert_eq!(alive.health(), u8::MAX);
        assert!(alive.delete_owner());
    }
}
