//! Selective sync: criteria to migration plan.

pub mod resolver;

pub use resolver::SelectiveSyncResolver;
