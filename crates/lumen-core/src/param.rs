//! Typed engine parameters.
//!
//! Every user-facing value in the engine - a channel fader, an LFO period, a
//! pattern's color - is a [`Param`] owned by a component and addressed by a
//! stable path segment. Parameters carry display metadata (label,
//! description, units, polarity), notify registered listeners synchronously
//! on change, and normalize to `[0, 1]` for modulation and MIDI.
//!
//! # Value kinds
//!
//! - **Bool** - on/off flag
//! - **Trigger** - momentary boolean, cleared after one tick
//! - **Discrete** - integer in `[min, max)`; out-of-range writes fail
//! - **Bounded** - real in `[min, max]` with an optional display exponent
//! - **Compound** - bounded base value plus a summed modulation offset;
//!   exposes both the base and the clamped effective value
//! - **Text** - free string
//! - **Enum** - discrete index over an ordered label list
//! - **Color** - hue/saturation/brightness sub-parameters
//! - **Functional** - read-only, computed from sibling parameters
//! - **Mutable** - plain write-notify cell
//!
//! # Listeners
//!
//! Registration returns a [`ListenerToken`] used to unregister. Notification
//! snapshots the listener list first, so a listener may add or remove
//! listeners without invalidating the iteration. Listeners run synchronously
//! on the engine thread, in registration order, and must not mutate state
//! owned by another channel.

use crate::color::Color;
use crate::error::EngineError;
use crate::registry::ComponentId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Display units for a parameter value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Units {
    /// Unitless.
    #[default]
    None,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Hertz.
    Hertz,
    /// Percentage, stored `0..=100`.
    Percent,
    /// Percentage, stored normalized `0..=1`.
    PercentNormalized,
    /// Degrees, stored `0..360`.
    Degrees,
    /// Integer count.
    Integer,
}

/// Polarity of a normalized value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Polarity {
    /// `[0, 1]`.
    #[default]
    Unipolar,
    /// `[-1, 1]`, represented normalized as `[0, 1]` around a `0.5` center.
    Bipolar,
}

/// Identity-stable reference to a parameter: the owning component's id plus
/// the parameter's path segment. Resolved through the registry on every
/// dereference so it survives destroy/recreate cycles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ParamHandle {
    /// Id of the owning component.
    pub component: ComponentId,
    /// Parameter path segment within the component.
    pub path: String,
}

impl ParamHandle {
    /// Constructs a handle.
    pub fn new(component: ComponentId, path: impl Into<String>) -> ParamHandle {
        ParamHandle {
            component,
            path: path.into(),
        }
    }
}

impl fmt::Display for ParamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}/{}", self.component.0, self.path)
    }
}

/// Token returned by listener registration, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Boxed listener callback. Receives the parameter after the change.
pub type ListenerFn = dyn Fn(&Param) + Send + Sync;

#[derive(Default)]
struct ListenerList {
    entries: Mutex<Vec<(u64, Arc<ListenerFn>)>>,
    next_token: Mutex<u64>,
}

impl ListenerList {
    fn add(&self, listener: Arc<ListenerFn>) -> ListenerToken {
        let mut next = self.next_token.lock();
        let token = *next;
        *next += 1;
        drop(next);
        self.entries.lock().push((token, listener));
        ListenerToken(token)
    }

    fn remove(&self, token: ListenerToken) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(t, _)| *t != token.0);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<ListenerFn>> {
        self.entries.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerList({} entries)", self.entries.lock().len())
    }
}

/// Computation hook for functional parameters.
pub type ComputeFn = fn(&ParamSet) -> f64;

/// The typed value storage of a parameter.
#[derive(Debug)]
pub enum ParamValue {
    /// On/off flag.
    Bool {
        /// Current state.
        value: bool,
    },
    /// Momentary boolean; the engine clears it at the start of the next tick.
    Trigger {
        /// Whether the trigger fired this tick.
        value: bool,
    },
    /// Integer in `[min, max)`.
    Discrete {
        /// Current value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Exclusive upper bound.
        max: i64,
    },
    /// Real in `[min, max]`.
    Bounded {
        /// Current value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Display-mapping exponent; `1.0` is linear.
        exponent: f64,
    },
    /// Bounded base value plus summed modulation contributions.
    Compound {
        /// The base value persistence stores and the UI knob moves.
        base: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Display-mapping exponent; `1.0` is linear.
        exponent: f64,
        /// Sum of modulation contributions, refreshed each tick.
        mod_sum: f64,
        /// Cached `clamp(base + mod_sum, min, max)`.
        effective: f64,
    },
    /// Free string.
    Text {
        /// Current value.
        value: String,
    },
    /// Index over an ordered label list.
    Enum {
        /// Selected index.
        value: usize,
        /// Option labels.
        options: Vec<String>,
    },
    /// Hue/saturation/brightness sub-parameters.
    Color {
        /// Hue in degrees `[0, 360)`.
        hue: f64,
        /// Saturation in `[0, 100]`.
        saturation: f64,
        /// Brightness in `[0, 100]`.
        brightness: f64,
    },
    /// Read-only, computed from sibling parameters.
    Functional {
        /// Last computed value.
        value: f64,
        /// Computation over the owning parameter set.
        compute: ComputeFn,
    },
    /// Plain write-notify cell.
    Mutable {
        /// Current value.
        value: f64,
    },
}

/// A typed engine parameter.
#[derive(Debug)]
pub struct Param {
    path: String,
    label: String,
    description: String,
    units: Units,
    polarity: Polarity,
    value: ParamValue,
    listeners: ListenerList,
}

impl Param {
    fn new(path: impl Into<String>, value: ParamValue) -> Param {
        let path = path.into();
        Param {
            label: path.clone(),
            path,
            description: String::new(),
            units: Units::None,
            polarity: Polarity::Unipolar,
            value,
            listeners: ListenerList::default(),
        }
    }

    /// A boolean parameter.
    pub fn bool(path: impl Into<String>, value: bool) -> Param {
        Param::new(path, ParamValue::Bool { value })
    }

    /// A momentary trigger parameter.
    pub fn trigger(path: impl Into<String>) -> Param {
        Param::new(path, ParamValue::Trigger { value: false })
    }

    /// A discrete parameter over `[min, max)`.
    pub fn discrete(path: impl Into<String>, value: i64, min: i64, max: i64) -> Param {
        assert!(min < max, "discrete range must be non-empty");
        assert!((min..max).contains(&value), "discrete default out of range");
        Param::new(path, ParamValue::Discrete { value, min, max }).with_units(Units::Integer)
    }

    /// A bounded numeric parameter over `[min, max]`.
    pub fn bounded(path: impl Into<String>, value: f64, min: f64, max: f64) -> Param {
        Param::new(
            path,
            ParamValue::Bounded {
                value: value.clamp(min, max),
                min,
                max,
                exponent: 1.0,
            },
        )
    }

    /// A compound parameter: bounded base plus modulation sum.
    pub fn compound(path: impl Into<String>, base: f64, min: f64, max: f64) -> Param {
        let base = base.clamp(min, max);
        Param::new(
            path,
            ParamValue::Compound {
                base,
                min,
                max,
                exponent: 1.0,
                mod_sum: 0.0,
                effective: base,
            },
        )
    }

    /// A string parameter.
    pub fn text(path: impl Into<String>, value: impl Into<String>) -> Param {
        Param::new(path, ParamValue::Text { value: value.into() })
    }

    /// An enum parameter over an ordered label list.
    pub fn enumeration(path: impl Into<String>, value: usize, options: &[&str]) -> Param {
        assert!(value < options.len(), "enum default out of range");
        Param::new(
            path,
            ParamValue::Enum {
                value,
                options: options.iter().map(|s| (*s).to_string()).collect(),
            },
        )
    }

    /// A color parameter with hue/saturation/brightness sub-parameters.
    pub fn color(path: impl Into<String>, hue: f64, saturation: f64, brightness: f64) -> Param {
        Param::new(
            path,
            ParamValue::Color {
                hue: hue.rem_euclid(360.0),
                saturation: saturation.clamp(0.0, 100.0),
                brightness: brightness.clamp(0.0, 100.0),
            },
        )
    }

    /// A read-only functional parameter computed from sibling parameters.
    pub fn functional(path: impl Into<String>, compute: ComputeFn) -> Param {
        Param::new(path, ParamValue::Functional { value: 0.0, compute })
    }

    /// A plain write-notify cell.
    pub fn mutable(path: impl Into<String>, value: f64) -> Param {
        Param::new(path, ParamValue::Mutable { value })
    }

    /// Sets the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Param {
        self.label = label.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Param {
        self.description = description.into();
        self
    }

    /// Sets the display units.
    pub fn with_units(mut self, units: Units) -> Param {
        self.units = units;
        self
    }

    /// Sets the polarity.
    pub fn with_polarity(mut self, polarity: Polarity) -> Param {
        self.polarity = polarity;
        self
    }

    /// Sets the display exponent of a bounded or compound parameter.
    pub fn with_exponent(mut self, exp: f64) -> Param {
        match &mut self.value {
            ParamValue::Bounded { exponent, .. } | ParamValue::Compound { exponent, .. } => {
                *exponent = exp;
            }
            _ => panic!("exponent only applies to bounded parameters"),
        }
        self
    }

    /// Path segment within the owning component.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Display units.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Polarity.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// The typed value storage.
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Current numeric value.
    ///
    /// Compound parameters report their effective value; booleans report
    /// `0.0`/`1.0`; enums and discretes report the index/value as a float.
    pub fn as_f64(&self) -> f64 {
        match &self.value {
            ParamValue::Bool { value } | ParamValue::Trigger { value } => f64::from(u8::from(*value)),
            ParamValue::Discrete { value, .. } => *value as f64,
            ParamValue::Bounded { value, .. } => *value,
            ParamValue::Compound { effective, .. } => *effective,
            ParamValue::Text { .. } => 0.0,
            ParamValue::Enum { value, .. } => *value as f64,
            ParamValue::Color { brightness, .. } => brightness / 100.0,
            ParamValue::Functional { value, .. } => *value,
            ParamValue::Mutable { value } => *value,
        }
    }

    /// Current boolean state; numeric kinds read as `value > 0`.
    pub fn as_bool(&self) -> bool {
        match &self.value {
            ParamValue::Bool { value } | ParamValue::Trigger { value } => *value,
            _ => self.as_f64() > 0.0,
        }
    }

    /// Current discrete value.
    pub fn as_i64(&self) -> i64 {
        match &self.value {
            ParamValue::Discrete { value, .. } => *value,
            ParamValue::Enum { value, .. } => *value as i64,
            _ => self.as_f64() as i64,
        }
    }

    /// The value normalized to `[0, 1]`.
    ///
    /// Bounded and compound parameters map linearly over their range (the
    /// exponent applies only to display); discretes map over `[min, max)`;
    /// booleans map to `0`/`1`.
    pub fn normalized(&self) -> f64 {
        match &self.value {
            ParamValue::Bool { value } | ParamValue::Trigger { value } => f64::from(u8::from(*value)),
            ParamValue::Discrete { value, min, max } => {
                let span = (max - 1 - min) as f64;
                if span <= 0.0 {
                    0.0
                } else {
                    (value - min) as f64 / span
                }
            }
            ParamValue::Bounded { value, min, max, .. } => {
                if max > min {
                    (value - min) / (max - min)
                } else {
                    0.0
                }
            }
            ParamValue::Compound {
                effective, min, max, ..
            } => {
                if max > min {
                    (effective - min) / (max - min)
                } else {
                    0.0
                }
            }
            ParamValue::Enum { value, options } => {
                if options.len() > 1 {
                    *value as f64 / (options.len() - 1) as f64
                } else {
                    0.0
                }
            }
            ParamValue::Color { brightness, .. } => brightness / 100.0,
            ParamValue::Functional { value, .. } | ParamValue::Mutable { value } => {
                value.clamp(0.0, 1.0)
            }
            ParamValue::Text { .. } => 0.0,
        }
    }

    /// Base value of a compound parameter; other kinds report [`Param::as_f64`].
    pub fn base_f64(&self) -> f64 {
        match &self.value {
            ParamValue::Compound { base, .. } => *base,
            _ => self.as_f64(),
        }
    }

    /// Sets a numeric value.
    ///
    /// Bounded and compound (base) values clamp to their range. Discrete
    /// values outside `[min, max)` fail. Trigger and functional parameters
    /// reject numeric writes.
    pub fn set_f64(&mut self, new: f64) -> Result<(), EngineError> {
        match &mut self.value {
            ParamValue::Bool { value } => *value = new > 0.0,
            ParamValue::Trigger { .. } => {
                return Err(EngineError::invalid(format!(
                    "parameter '{}' is a trigger; fire it instead",
                    self.path
                )));
            }
            ParamValue::Discrete { value, min, max } => {
                let v = new as i64;
                if !(*min..*max).contains(&v) {
                    return Err(EngineError::invalid(format!(
                        "value {v} out of range [{min}, {max}) for '{}'",
                        self.path
                    )));
                }
                *value = v;
            }
            ParamValue::Bounded { value, min, max, .. } => *value = new.clamp(*min, *max),
            ParamValue::Compound {
                base,
                min,
                max,
                mod_sum,
                effective,
                ..
            } => {
                *base = new.clamp(*min, *max);
                *effective = (*base + *mod_sum).clamp(*min, *max);
            }
            ParamValue::Enum { value, options } => {
                let v = new as usize;
                if v >= options.len() {
                    return Err(EngineError::invalid(format!(
                        "enum index {v} out of range for '{}'",
                        self.path
                    )));
                }
                *value = v;
            }
            ParamValue::Color { brightness, .. } => *brightness = (new * 100.0).clamp(0.0, 100.0),
            ParamValue::Functional { .. } => {
                return Err(EngineError::invalid(format!(
                    "parameter '{}' is read-only",
                    self.path
                )));
            }
            ParamValue::Mutable { value } => *value = new,
            ParamValue::Text { .. } => {
                return Err(EngineError::invalid(format!(
                    "parameter '{}' is a string",
                    self.path
                )));
            }
        }
        self.notify();
        Ok(())
    }

    /// Sets from a normalized `[0, 1]` value, the inverse of
    /// [`Param::normalized`].
    pub fn set_normalized(&mut self, n: f64) -> Result<(), EngineError> {
        let n = n.clamp(0.0, 1.0);
        if matches!(
            self.value,
            ParamValue::Bool { .. } | ParamValue::Trigger { .. }
        ) {
            return self.set_bool(n >= 0.5);
        }
        let plain = match &self.value {
            ParamValue::Bool { .. } | ParamValue::Trigger { .. } => unreachable!(),
            ParamValue::Discrete { min, max, .. } => {
                (*min as f64 + n * (max - 1 - min) as f64).round()
            }
            ParamValue::Bounded { min, max, .. } | ParamValue::Compound { min, max, .. } => {
                min + n * (max - min)
            }
            ParamValue::Enum { options, .. } => (n * (options.len() - 1) as f64).round(),
            _ => n,
        };
        self.set_f64(plain)
    }

    /// Sets a boolean state. Triggers accept `true` as a fire.
    pub fn set_bool(&mut self, new: bool) -> Result<(), EngineError> {
        match &mut self.value {
            ParamValue::Bool { value } | ParamValue::Trigger { value } => *value = new,
            _ => return self.set_f64(f64::from(u8::from(new))),
        }
        self.notify();
        Ok(())
    }

    /// Toggles a boolean parameter.
    pub fn toggle(&mut self) -> Result<(), EngineError> {
        let current = self.as_bool();
        self.set_bool(!current)
    }

    /// Sets a string value.
    pub fn set_text(&mut self, new: impl Into<String>) -> Result<(), EngineError> {
        match &mut self.value {
            ParamValue::Text { value } => {
                *value = new.into();
                self.notify();
                Ok(())
            }
            _ => Err(EngineError::invalid(format!(
                "parameter '{}' is not a string",
                self.path
            ))),
        }
    }

    /// Current string value, if this is a text parameter.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ParamValue::Text { value } => Some(value),
            _ => None,
        }
    }

    /// The color of a color parameter.
    pub fn as_color(&self) -> Option<Color> {
        match &self.value {
            ParamValue::Color {
                hue,
                saturation,
                brightness,
            } => Some(Color::hsb(*hue, saturation / 100.0, brightness / 100.0)),
            _ => None,
        }
    }

    /// Sets one hue/saturation/brightness sub-parameter of a color.
    pub fn set_color_part(&mut self, part: &str, new: f64) -> Result<(), EngineError> {
        match &mut self.value {
            ParamValue::Color {
                hue,
                saturation,
                brightness,
            } => {
                match part {
                    "hue" => *hue = new.rem_euclid(360.0),
                    "saturation" => *saturation = new.clamp(0.0, 100.0),
                    "brightness" => *brightness = new.clamp(0.0, 100.0),
                    _ => {
                        return Err(EngineError::invalid(format!(
                            "unknown color part '{part}'"
                        )));
                    }
                }
                self.notify();
                Ok(())
            }
            _ => Err(EngineError::invalid(format!(
                "parameter '{}' is not a color",
                self.path
            ))),
        }
    }

    /// Installs the modulation sum on a compound parameter and refreshes the
    /// cached effective value. Called by the modulation engine each tick.
    pub(crate) fn set_mod_sum(&mut self, sum: f64) {
        if let ParamValue::Compound {
            base,
            min,
            max,
            mod_sum,
            effective,
            ..
        } = &mut self.value
        {
            *mod_sum = sum;
            *effective = (*base + sum).clamp(*min, *max);
        }
    }

    /// Clears a fired trigger without notifying. Called at tick start.
    pub(crate) fn clear_trigger(&mut self) {
        if let ParamValue::Trigger { value } = &mut self.value {
            *value = false;
        }
    }

    /// Registers a change listener; returns a token for unregistration.
    pub fn add_listener(&self, listener: Arc<ListenerFn>) -> ListenerToken {
        self.listeners.add(listener)
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.listeners.remove(token)
    }

    fn notify(&self) {
        for listener in self.listeners.snapshot() {
            listener(self);
        }
    }
}

/// Ordered set of parameters owned by one component.
#[derive(Debug, Default)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    /// An empty set.
    pub fn new() -> ParamSet {
        ParamSet::default()
    }

    /// Adds a parameter. Paths must be unique within the set.
    pub fn add(&mut self, param: Param) -> &mut ParamSet {
        assert!(
            self.get(param.path()).is_none(),
            "duplicate parameter path '{}'",
            param.path()
        );
        self.params.push(param);
        self
    }

    /// Looks up a parameter by path.
    pub fn get(&self, path: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.path == path)
    }

    /// Looks up a parameter mutably by path.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Param> {
        self.params.iter_mut().find(|p| p.path == path)
    }

    /// Iterates parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Iterates parameters mutably in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.params.iter_mut()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Numeric value of a declared parameter.
    ///
    /// # Panics
    ///
    /// Panics if no parameter exists at `path`; devices read only parameters
    /// they declared.
    pub fn value(&self, path: &str) -> f64 {
        self.get(path)
            .unwrap_or_else(|| panic!("no parameter '{path}'"))
            .as_f64()
    }

    /// Boolean state of a declared parameter.
    ///
    /// # Panics
    ///
    /// Panics if no parameter exists at `path`.
    pub fn flag(&self, path: &str) -> bool {
        self.get(path)
            .unwrap_or_else(|| panic!("no parameter '{path}'"))
            .as_bool()
    }

    /// Discrete value of a declared parameter.
    ///
    /// # Panics
    ///
    /// Panics if no parameter exists at `path`.
    pub fn index(&self, path: &str) -> i64 {
        self.get(path)
            .unwrap_or_else(|| panic!("no parameter '{path}'"))
            .as_i64()
    }

    /// Color of a declared color parameter.
    ///
    /// # Panics
    ///
    /// Panics if no color parameter exists at `path`.
    pub fn color(&self, path: &str) -> Color {
        self.get(path)
            .and_then(Param::as_color)
            .unwrap_or_else(|| panic!("no color parameter '{path}'"))
    }

    /// Recomputes all functional parameters from their siblings.
    pub fn refresh_functional(&mut self) {
        let computed: Vec<(usize, f64)> = self
            .params
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match &p.value {
                ParamValue::Functional { compute, .. } => Some((i, compute(self))),
                _ => None,
            })
            .collect();
        for (i, v) in computed {
            if let ParamValue::Functional { value, .. } = &mut self.params[i].value {
                *value = v;
            }
        }
    }

    /// Clears all fired triggers. Called at tick start.
    pub(crate) fn clear_triggers(&mut self) {
        for p in &mut self.params {
            p.clear_trigger();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn discrete_rejects_out_of_range() {
        let mut p = Param::discrete("index", 0, 0, 4);
        assert!(p.set_f64(3.0).is_ok());
        assert!(p.set_f64(4.0).is_err());
        assert!(p.set_f64(-1.0).is_err());
        assert_eq!(p.as_i64(), 3);
    }

    #[test]
    fn bounded_clamps() {
        let mut p = Param::bounded("fader", 0.5, 0.0, 1.0);
        p.set_f64(2.0).unwrap();
        assert_eq!(p.as_f64(), 1.0);
        p.set_f64(-1.0).unwrap();
        assert_eq!(p.as_f64(), 0.0);
    }

    #[test]
    fn compound_exposes_base_and_effective() {
        let mut p = Param::compound("level", 0.5, 0.0, 1.0);
        p.set_mod_sum(0.375);
        assert_eq!(p.base_f64(), 0.5);
        assert_eq!(p.as_f64(), 0.875);
        // Effective clamps to the range.
        p.set_mod_sum(2.0);
        assert_eq!(p.as_f64(), 1.0);
        // Base write refreshes effective against the stored sum.
        p.set_mod_sum(0.25);
        p.set_f64(0.25).unwrap();
        assert_eq!(p.as_f64(), 0.5);
    }

    #[test]
    fn normalized_round_trip() {
        let mut p = Param::bounded("freq", 0.0, 10.0, 20.0);
        p.set_normalized(0.5).unwrap();
        assert_eq!(p.as_f64(), 15.0);
        assert_eq!(p.normalized(), 0.5);
    }

    #[test]
    fn discrete_normalized_covers_range() {
        let mut p = Param::discrete("step", 0, 0, 5);
        p.set_normalized(1.0).unwrap();
        assert_eq!(p.as_i64(), 4);
        p.set_normalized(0.0).unwrap();
        assert_eq!(p.as_i64(), 0);
    }

    #[test]
    fn listeners_fire_in_order_and_unregister() {
        let p = Param::bool("enabled", false);
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let token = p.add_listener(Arc::new(move |_: &Param| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&count);
        p.add_listener(Arc::new(move |param: &Param| {
            assert!(param.as_bool());
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        let mut p = p;
        p.set_bool(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(p.remove_listener(token));
        p.set_bool(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn color_parts() {
        let mut p = Param::color("color", 0.0, 100.0, 100.0);
        assert_eq!(p.as_color(), Some(Color::RED));
        p.set_color_part("hue", 240.0).unwrap();
        assert_eq!(p.as_color(), Some(Color::BLUE));
        assert!(p.set_color_part("chroma", 1.0).is_err());
    }

    #[test]
    fn functional_computes_from_siblings() {
        let mut set = ParamSet::new();
        set.add(Param::bounded("bpm", 120.0, 20.0, 300.0));
        set.add(Param::functional("period_ms", |s| 60_000.0 / s.value("bpm")));
        set.refresh_functional();
        assert_eq!(set.value("period_ms"), 500.0);
        assert!(set.get_mut("period_ms").unwrap().set_f64(1.0).is_err());
    }

    #[test]
    fn trigger_fires_and_clears() {
        let mut p = Param::trigger("fire");
        p.set_bool(true).unwrap();
        assert!(p.as_bool());
        p.clear_trigger();
        assert!(!p.as_bool());
    }

    #[test]
    #[should_panic(expected = "duplicate parameter path")]
    fn duplicate_paths_panic() {
        let mut set = ParamSet::new();
        set.add(Param::bool("x", false));
        set.add(Param::bool("x", true));
    }
}
