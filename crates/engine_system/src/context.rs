//! Per-call contexts handed to system lifecycle hooks.

/// Context provided to [`System::tick`](crate::System::tick).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// The current tick counter, starting at 1.
    pub tick_id: u64,
    /// Delta time since the last tick, in seconds.
    pub delta_time: f64,
}

impl TickContext {
    /// Create a new context for a tick.
    #[must_use]
    pub fn new(tick_id: u64, delta_time: f64) -> Self {
        Self {
            tick_id,
            delta_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = TickContext::new(1, 0.016);
        assert_eq!(ctx.tick_id, 1);
        assert!((ctx.delta_time - 0.016).abs() < f64::EPSILON);
    }
}
