//! Pure math/data for Freewheel
//!
//! This crate contains the geometry primitives shared by the motion engine
//! and the element bindings. It has no dependencies.

mod geometry;

pub use geometry::*;
