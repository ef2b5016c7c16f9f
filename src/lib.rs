//! Tabletalk - natural-language analytics over tabular data.
//!
//! The core is a hybrid query router: each incoming question is answered via
//! direct SQL execution over an in-memory projection of the dataset, via a
//! plotting pipeline, or via free-form contextual reasoning. Any generated
//! SQL passes a structural safety validator before it touches the store.

pub mod config;
pub mod dataset;
pub mod error;
pub mod generate;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod profile;
pub mod route;
pub mod safety;
pub mod store;
