//! Genre - Audio Genre Classification Pipeline
//!
//! Turns archived field recordings into a genre classifier evaluation in
//! four stages, each of which can be run on its own:
//!
//! 1. Transfer - resolve ELAR sources and copy audio into a flat directory
//!    named `{identifier}__{label}.wav`
//! 2. Extract - run openSMILE on every wav to get per-frame descriptors
//! 3. Compile - run openXBOW over all descriptors to get a bag-of-words matrix
//! 4. Classify - evaluate a classifier on the matrix and write a report
//!
//! # Architecture
//!
//! External binaries are reached through the [`tools::ToolRunner`] trait so
//! the stages can be exercised without them. The [`pipeline::Orchestrator`]
//! validates arguments up front and then runs the requested stages in order.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod tools;

pub use error::{GenreError, Result};
