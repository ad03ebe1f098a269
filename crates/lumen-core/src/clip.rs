//! Replayable parameter-change logs.
//!
//! A clip is a bus-owned list of timestamped parameter writes that can be
//! started, stopped and looped. Clips keep running even while their channel
//! is disabled, so a lighting operator can pre-roll automation before
//! bringing a channel up.
//!
//! The event list is an extension point: it is persisted verbatim inside
//! the clip component's `internal` map under a version key.

use crate::param::ParamHandle;
use serde::{Deserialize, Serialize};

/// Version tag written alongside serialized event lists.
pub const CLIP_EVENTS_VERSION: u32 = 1;

/// One recorded parameter write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipEvent {
    /// Offset from clip start, in milliseconds.
    pub time_ms: f64,
    /// Target parameter.
    pub param: ParamHandle,
    /// Value written when the event fires.
    pub value: f64,
}

/// Runtime state of one clip.
#[derive(Debug, Default)]
pub struct ClipState {
    /// Events ordered by `time_ms`.
    events: Vec<ClipEvent>,
    /// Whether the clip is currently playing.
    pub running: bool,
    elapsed_ms: f64,
    cursor: usize,
}

impl ClipState {
    /// A clip over the given events; they are sorted by time.
    pub fn new(mut events: Vec<ClipEvent>) -> ClipState {
        events.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        ClipState {
            events,
            running: false,
            elapsed_ms: 0.0,
            cursor: 0,
        }
    }

    /// The recorded events, in time order.
    pub fn events(&self) -> &[ClipEvent] {
        &self.events
    }

    /// Elapsed playback time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Starts playback from the beginning.
    pub fn start(&mut self) {
        self.running = true;
        self.elapsed_ms = 0.0;
        self.cursor = 0;
    }

    /// Stops playback.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advances playback and collects the events that fired.
    ///
    /// `length_ms` bounds the clip; with `looping` the position wraps and
    /// the cursor rewinds, otherwise the clip stops at the end.
    pub fn advance(&mut self, dt_ms: f64, length_ms: f64, looping: bool) -> Vec<ClipEvent> {
        if !self.running {
            return Vec::new();
        }
        let mut fired = Vec::new();
        let mut dt_left = dt_ms;
        while dt_left > 0.0 {
            let remaining = (length_ms - self.elapsed_ms).max(0.0);
            let step = dt_left.min(remaining);
            self.elapsed_ms += step;
            dt_left -= step;

            while self.cursor < self.events.len()
                && self.events[self.cursor].time_ms <= self.elapsed_ms
            {
                fired.push(self.events[self.cursor].clone());
                self.cursor += 1;
            }

            if self.elapsed_ms >= length_ms {
                if looping && length_ms > 0.0 {
                    self.elapsed_ms = 0.0;
                    self.cursor = 0;
                } else {
                    self.running = false;
                    break;
                }
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentId;

    fn event(time_ms: f64, value: f64) -> ClipEvent {
        ClipEvent {
            time_ms,
            param: ParamHandle::new(ComponentId(9), "fader"),
            value,
        }
    }

    #[test]
    fn events_fire_in_order() {
        let mut clip = ClipState::new(vec![event(300.0, 0.3), event(100.0, 0.1)]);
        clip.start();
        let fired = clip.advance(150.0, 1000.0, false);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].value, 0.1);
        let fired = clip.advance(200.0, 1000.0, false);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].value, 0.3);
    }

    #[test]
    fn non_looping_clip_stops_at_end() {
        let mut clip = ClipState::new(vec![event(50.0, 1.0)]);
        clip.start();
        let fired = clip.advance(500.0, 200.0, false);
        assert_eq!(fired.len(), 1);
        assert!(!clip.running);
    }

    #[test]
    fn looping_clip_replays_events() {
        let mut clip = ClipState::new(vec![event(50.0, 1.0)]);
        clip.start();
        let fired = clip.advance(250.0, 100.0, true);
        // 250ms over a 100ms loop passes the 50ms event three times
        assert_eq!(fired.len(), 3);
        assert!(clip.running);
    }

    #[test]
    fn stopped_clip_fires_nothing() {
        let mut clip = ClipState::new(vec![event(10.0, 1.0)]);
        assert!(clip.advance(100.0, 1000.0, false).is_empty());
    }
}
