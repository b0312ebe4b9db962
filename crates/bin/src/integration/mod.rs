//! Glue between the command line and the library crates.
//!
//! Loading the panel, resolving configuration and choosing segment keys live
//! in [`data_pipeline`]; turning results into terminal text lives in [`render`].

pub(crate) mod data_pipeline;
pub(crate) mod render;
