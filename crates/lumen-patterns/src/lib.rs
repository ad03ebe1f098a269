//! Built-in patterns and frame effects for the lumen engine.
//!
//! Patterns generate a frame of colors per tick; effects transform a frame
//! in place with an enabled weight. Everything here is constructed by class
//! name through `lumen-registry`, and declares its parameters so projects
//! and control surfaces can address them.
//!
//! # Patterns
//!
//! - [`Solid`] - one color everywhere
//! - [`Gradient`] - a hue sweep across the model
//! - [`Chase`] - a moving pulse with adjustable width
//! - [`Noise`] - per-point random flicker
//!
//! # Effects
//!
//! - [`Desaturate`] - pulls colors toward gray
//! - [`Invert`] - inverts the frame
//! - [`Strobe`] - periodic blackout gate
//! - [`Decay`] - temporal trails from frame to frame

mod chase;
mod decay;
mod desaturate;
mod gradient;
mod invert;
mod noise;
mod solid;
mod strobe;

pub use chase::Chase;
pub use decay::Decay;
pub use desaturate::Desaturate;
pub use gradient::Gradient;
pub use invert::Invert;
pub use noise::Noise;
pub use solid::Solid;
pub use strobe::Strobe;
