//! # beacon-decay: marker intensity decay.
//!
//! Every live marker holds full intensity for the first 80% of the fade
//! window, then ramps linearly to zero and is evicted at the window edge:
//! - **Linear fade**: [`LinearFade`] implements the age → intensity curve.
//! - **Tick**: [`DecayEngine::tick`] walks the live set once, rewrites
//!   intensities and evicts expired markers. History is never touched.
//! - **Frame proxies**: [`frame::frame_for`] turns a marker into presentation
//!   opacities, including a stateless pulse.

pub mod curve;
pub mod engine;
pub mod frame;

pub use curve::LinearFade;
pub use engine::DecayEngine;
pub use frame::{MarkerFrame, frame_for, pulse_factor};
