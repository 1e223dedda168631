//! Launcher library for the Smiffer volumetric field-computation tool.
//!
//! The heart of the crate is the [`supervisor::JobSupervisor`]: it runs one
//! external Smiffer process at a time, streams its output as ordered events,
//! and guarantees a single completion notification per job. Around it sit
//! the invocation grammar ([`model::JobSpec`]), result-file discovery
//! ([`results`]), field-type coloring ([`coloring`]), and the persisted
//! camera-orientation store ([`orientations`]).

pub mod cli;
pub mod coloring;
pub mod model;
pub mod orientations;
pub mod report;
pub mod results;
pub mod supervisor;
