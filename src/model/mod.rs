//! Least-squares model fitting

pub mod linear;

pub use linear::{fit_linear, LinearModel};
