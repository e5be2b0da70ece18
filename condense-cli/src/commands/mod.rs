//! Command implementations for the condense CLI

pub mod coverage;
pub mod number;
