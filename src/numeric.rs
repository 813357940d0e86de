//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision of event kinematics is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as reals;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as reals;

/// Histogram axes and efficiencies are always computed in double precision
pub type Real = f64;
