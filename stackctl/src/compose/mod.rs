//! Compose descriptor model and augmentation

pub mod augment;
pub mod descriptor;
pub mod interpolate;
pub mod labels;
