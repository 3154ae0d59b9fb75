//! Ingest, filter and summarise `;`-delimited academic grade exports.
//!
//! [`data`] holds the engine (record store, loader, filter, statistics);
//! [`state`] keeps selectors and the filtered table in step with a loaded
//! store for any front end.

pub mod data;
pub mod state;
