//! Messages submitted by actors.

pub mod bank;
pub mod emissions;
