//! Bus state: pattern channels, groups, and the master.
//!
//! A pattern channel owns an ordered pattern list with an active and a next
//! index, an optional transition blending active toward next, an effects
//! chain, and clips. Groups collect child channels; the master carries only
//! effects and clips. The engine drives these states each tick; this module
//! holds the data and the transition state machine, which is pure enough to
//! test in isolation.
//!
//! # Transition state machine
//!
//! ```text
//! IDLE (active == next, no transition)
//!   go_pattern(i), transitions on  -> TRANSITIONING { next: i }
//!   go_pattern(i), transitions off -> IDLE { active: i }
//! TRANSITIONING (active != next, elapsed, duration)
//!   elapsed >= duration -> IDLE { active: next }
//!   go_pattern(j)       -> finish current, then as from IDLE
//!   remove active/next  -> forced IDLE at the first remaining pattern
//! ```

use crate::blend::BlendMode;
use crate::registry::ComponentId;

/// Channel parameter paths.
pub mod paths {
    /// Channel level into the mix, `[0, 1]`.
    pub const FADER: &str = "fader";
    /// Whether the channel contributes to the main mix.
    pub const ENABLED: &str = "enabled";
    /// Whether the channel is tapped into the cue mix.
    pub const CUE: &str = "cue";
    /// Crossfade group assignment (`a` / `b` / `bypass`).
    pub const CROSSFADE_GROUP: &str = "crossfade_group";
    /// Whether `go_pattern` starts a timed transition.
    pub const TRANSITION_ENABLED: &str = "transition_enabled";
    /// Transition length in seconds.
    pub const TRANSITION_TIME_SECS: &str = "transition_time_secs";
    /// Blend mode used while transitioning.
    pub const TRANSITION_BLEND_MODE: &str = "transition_blend_mode";
    /// Whether the channel auto-advances after a period of idleness.
    pub const AUTO_CYCLE_ENABLED: &str = "auto_cycle_enabled";
    /// Idle time before an auto-cycle begins, in seconds.
    pub const AUTO_CYCLE_TIME_SECS: &str = "auto_cycle_time_secs";
    /// Auto-cycle selection (`next` / `random`).
    pub const AUTO_CYCLE_MODE: &str = "auto_cycle_mode";
    /// Control-surface focus cursor, persisted for surface re-binding.
    pub const FOCUSED_PATTERN_INDEX: &str = "focused_pattern_index";
    /// Control-surface focus window length.
    pub const FOCUS_WINDOW: &str = "focus_window";
}

/// Crossfade group assignment, matching the `crossfade_group` enum order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossfadeGroup {
    /// Left side of the master crossfader.
    A,
    /// Right side of the master crossfader.
    B,
    /// Mixed straight into the main bus.
    #[default]
    Bypass,
}

impl CrossfadeGroup {
    /// Labels for the `crossfade_group` enum parameter.
    pub const LABELS: [&'static str; 3] = ["a", "b", "bypass"];

    /// Group from the enum parameter index.
    pub fn from_index(index: i64) -> CrossfadeGroup {
        match index {
            0 => CrossfadeGroup::A,
            1 => CrossfadeGroup::B,
            _ => CrossfadeGroup::Bypass,
        }
    }
}

/// An in-flight pattern transition.
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    /// Time since the transition began, in milliseconds.
    pub elapsed_ms: f64,
    /// Total transition length in milliseconds.
    pub duration_ms: f64,
    /// Blend mode applied between the outgoing and incoming frames.
    pub blend: BlendMode,
}

impl Transition {
    /// Completion fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
        }
    }
}

/// State owned by a pattern channel.
#[derive(Debug, Default)]
pub struct ChannelState {
    /// Ordered pattern components. Never empty while the channel exists.
    pub patterns: Vec<ComponentId>,
    /// Ordered effect components.
    pub effects: Vec<ComponentId>,
    /// Ordered clip components.
    pub clips: Vec<ComponentId>,
    /// Index of the active pattern.
    pub active: usize,
    /// Index of the incoming pattern; equals `active` when idle.
    pub next: usize,
    /// The in-flight transition; present only while `active != next`.
    pub transition: Option<Transition>,
    /// Continuous idle time, for auto-cycle.
    pub idle_ms: f64,
}

impl ChannelState {
    /// Whether a transition is in flight.
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// The active pattern's component id.
    pub fn active_pattern(&self) -> Option<ComponentId> {
        self.patterns.get(self.active).copied()
    }

    /// The incoming pattern's component id, while transitioning.
    pub fn next_pattern(&self) -> Option<ComponentId> {
        if self.is_transitioning() {
            self.patterns.get(self.next).copied()
        } else {
            None
        }
    }

    /// Retargets toward pattern `index`.
    ///
    /// Any in-flight transition finishes first (`active := next`). With
    /// `transition` supplied a new transition begins; otherwise the switch
    /// is immediate. Returns `(outgoing, incoming)` pattern ids for hook
    /// dispatch; equal indices are a no-op.
    pub fn go_pattern(
        &mut self,
        index: usize,
        transition: Option<Transition>,
    ) -> Option<(ComponentId, ComponentId)> {
        assert!(index < self.patterns.len(), "pattern index out of range");
        self.finish_transition();
        if index == self.active {
            return None;
        }
        let outgoing = self.patterns[self.active];
        let incoming = self.patterns[index];
        self.idle_ms = 0.0;
        match transition {
            Some(t) => {
                self.next = index;
                self.transition = Some(t);
            }
            None => {
                self.active = index;
                self.next = index;
            }
        }
        Some((outgoing, incoming))
    }

    /// Completes an in-flight transition, promoting `next` to `active`.
    pub fn finish_transition(&mut self) {
        if self.transition.take().is_some() {
            self.active = self.next;
        }
        self.next = self.active;
    }

    /// Advances the transition clock; returns true when it just completed.
    pub fn advance_transition(&mut self, dt_ms: f64) -> bool {
        if let Some(t) = &mut self.transition {
            t.elapsed_ms += dt_ms;
            if t.elapsed_ms >= t.duration_ms {
                self.finish_transition();
                return true;
            }
        }
        false
    }

    /// Records a pattern removal at `index`, forcing the indices back into
    /// range. Removing the active or next pattern aborts any transition and
    /// reselects from the remaining list.
    pub fn pattern_removed(&mut self, index: usize) {
        let hit_endpoint = index == self.active || index == self.next;
        if index < self.active {
            self.active -= 1;
        }
        if index < self.next {
            self.next -= 1;
        }
        if hit_endpoint {
            self.transition = None;
            self.active = self.active.min(self.patterns.len().saturating_sub(1));
            self.next = self.active;
        }
    }
}

/// State owned by a group bus.
#[derive(Debug, Default)]
pub struct GroupState {
    /// Child pattern channels, in mix order.
    pub channels: Vec<ComponentId>,
    /// Ordered effect components.
    pub effects: Vec<ComponentId>,
    /// Ordered clip components.
    pub clips: Vec<ComponentId>,
}

/// State owned by the master bus.
#[derive(Debug, Default)]
pub struct MasterState {
    /// Ordered effect components.
    pub effects: Vec<ComponentId>,
    /// Ordered clip components.
    pub clips: Vec<ComponentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(patterns: usize) -> ChannelState {
        ChannelState {
            patterns: (0..patterns).map(|i| ComponentId(100 + i as u32)).collect(),
            ..ChannelState::default()
        }
    }

    fn transition(duration_ms: f64) -> Transition {
        Transition {
            elapsed_ms: 0.0,
            duration_ms,
            blend: BlendMode::Normal,
        }
    }

    #[test]
    fn go_pattern_without_transition_switches_immediately() {
        let mut ch = channel(3);
        ch.go_pattern(2, None);
        assert_eq!(ch.active, 2);
        assert_eq!(ch.next, 2);
        assert!(!ch.is_transitioning());
    }

    #[test]
    fn go_pattern_with_transition_blends() {
        let mut ch = channel(3);
        ch.go_pattern(1, Some(transition(1000.0)));
        assert_eq!(ch.active, 0);
        assert_eq!(ch.next, 1);
        assert!(ch.is_transitioning());

        assert!(!ch.advance_transition(500.0));
        assert!((ch.transition.unwrap().progress() - 0.5).abs() < 1e-9);

        assert!(ch.advance_transition(500.0));
        assert_eq!(ch.active, 1);
        assert_eq!(ch.next, 1);
        assert!(!ch.is_transitioning());
    }

    #[test]
    fn retarget_mid_transition_finishes_first() {
        let mut ch = channel(3);
        ch.go_pattern(1, Some(transition(1000.0)));
        ch.advance_transition(300.0);
        ch.go_pattern(2, Some(transition(1000.0)));
        // the first transition snapped to completion
        assert_eq!(ch.active, 1);
        assert_eq!(ch.next, 2);
        assert!(ch.is_transitioning());
    }

    #[test]
    fn go_to_active_is_noop() {
        let mut ch = channel(2);
        assert!(ch.go_pattern(0, Some(transition(500.0))).is_none());
        assert!(!ch.is_transitioning());
    }

    #[test]
    fn removing_active_forces_idle() {
        let mut ch = channel(3);
        ch.go_pattern(1, Some(transition(1000.0)));
        ch.patterns.remove(1);
        ch.pattern_removed(1);
        assert!(!ch.is_transitioning());
        assert_eq!(ch.active, ch.next);
        assert!(ch.active < ch.patterns.len());
    }

    #[test]
    fn removing_unrelated_pattern_shifts_indices() {
        let mut ch = channel(3);
        ch.go_pattern(2, None);
        ch.patterns.remove(0);
        ch.pattern_removed(0);
        assert_eq!(ch.active, 1);
        assert_eq!(ch.patterns[ch.active], ComponentId(102));
    }

    #[test]
    fn indices_always_in_bounds_invariant() {
        let mut ch = channel(4);
        ch.go_pattern(3, Some(transition(100.0)));
        for index in [3, 0, 1] {
            ch.patterns.remove(index);
            ch.pattern_removed(index);
            assert!(ch.active < ch.patterns.len());
            assert!(ch.next < ch.patterns.len());
            if ch.active == ch.next {
                assert!(!ch.is_transitioning());
            }
        }
    }
}
