//! Application layer: tree snapshots, instruction authoring, and build coordination.

pub mod artifact;
pub mod builder;
pub mod coordinator;
pub mod encoder;
pub mod expansion;
pub mod instructions;
pub mod report;
pub mod session;
pub mod tree;
