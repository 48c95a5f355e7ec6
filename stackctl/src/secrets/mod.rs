//! Secret values for descriptor interpolation

pub mod store;
