//! Beat clock for tempo-synced modulators.
//!
//! The tempo always advances in wall time - the engine speed multiplier
//! scales pattern time, never the clock. Clock-sourced modulators lock their
//! basis to a [`TempoDivision`] of the running beat instead of free-running.

use serde::{Deserialize, Serialize};

/// Musical divisions a modulator can lock to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoDivision {
    /// Four bars (16 beats in 4/4).
    FourBars,
    /// Two bars (8 beats).
    TwoBars,
    /// One bar (4 beats).
    Bar,
    /// Half note (2 beats).
    Half,
    /// Quarter note (1 beat).
    #[default]
    Quarter,
    /// Eighth note (1/2 beat).
    Eighth,
    /// Sixteenth note (1/4 beat).
    Sixteenth,
    /// Dotted quarter (1.5 beats).
    DottedQuarter,
    /// Triplet eighth (1/3 beat).
    TripletEighth,
}

impl TempoDivision {
    /// Number of beats this division spans.
    pub fn beats(self) -> f64 {
        match self {
            TempoDivision::FourBars => 16.0,
            TempoDivision::TwoBars => 8.0,
            TempoDivision::Bar => 4.0,
            TempoDivision::Half => 2.0,
            TempoDivision::Quarter => 1.0,
            TempoDivision::Eighth => 0.5,
            TempoDivision::Sixteenth => 0.25,
            TempoDivision::DottedQuarter => 1.5,
            TempoDivision::TripletEighth => 1.0 / 3.0,
        }
    }

    /// Period of this division in milliseconds at the given tempo.
    pub fn period_ms(self, bpm: f64) -> f64 {
        self.beats() * 60_000.0 / bpm
    }

    /// All divisions, in display order.
    pub const ALL: [TempoDivision; 9] = [
        TempoDivision::FourBars,
        TempoDivision::TwoBars,
        TempoDivision::Bar,
        TempoDivision::Half,
        TempoDivision::Quarter,
        TempoDivision::Eighth,
        TempoDivision::Sixteenth,
        TempoDivision::DottedQuarter,
        TempoDivision::TripletEighth,
    ];
}

/// Immutable view of the clock handed to devices each tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TempoSnapshot {
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Fractional position within the current beat, `[0, 1)`.
    pub basis: f64,
    /// Completed whole beats since reset.
    pub beat_count: u64,
    /// Whether the clock is running.
    pub running: bool,
}

impl TempoSnapshot {
    /// Fractional position within a division of the beat grid, `[0, 1)`.
    pub fn division_basis(&self, division: TempoDivision) -> f64 {
        let beats = self.beat_count as f64 + self.basis;
        (beats / division.beats()).fract()
    }
}

/// The engine's beat generator.
#[derive(Debug, Default)]
pub struct Tempo {
    beat_position: f64,
    snapshot: TempoSnapshot,
}

impl Tempo {
    /// A stopped clock at beat zero.
    pub fn new() -> Tempo {
        Tempo::default()
    }

    /// Advances the clock by `dt_ms` of wall time.
    ///
    /// `bpm` and `running` come from the tempo component's parameters; the
    /// clock itself holds only position.
    pub fn advance(&mut self, dt_ms: f64, bpm: f64, running: bool) {
        if running {
            self.beat_position += dt_ms / 60_000.0 * bpm;
        }
        self.snapshot = TempoSnapshot {
            bpm,
            basis: self.beat_position.fract(),
            beat_count: self.beat_position as u64,
            running,
        };
    }

    /// Resets to beat zero.
    pub fn reset(&mut self) {
        self.beat_position = 0.0;
        self.snapshot.basis = 0.0;
        self.snapshot.beat_count = 0;
    }

    /// The snapshot for the current tick.
    pub fn snapshot(&self) -> TempoSnapshot {
        self.snapshot
    }
}
