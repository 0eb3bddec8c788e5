//! deplens - Multi-ecosystem dependency graph, update and vulnerability analyzer
//!
//! This crate parses npm, Cargo, PyPI and Gradle manifests and lock files
//! into one dependency graph, enriches every package with registry and
//! advisory data, classifies it as outdated and/or vulnerable, and renders
//! the result as a tree, DOT, JSON, Markdown, CSV or text summary.
//!
//! The stages run in order, each consuming the previous one's output:
//! [`engine::build_graph`] → [`enrich::Enricher::enrich`] → [`export::render`].

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod enrich;
pub mod export;
pub mod graph;
pub mod parser;
pub mod registry;
pub mod version;
