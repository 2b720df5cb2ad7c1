//! Directory engine for Ethereum communities, events and opportunities:
//! listing filters and sorts, calendar grouping, the add-opportunity
//! wizard and the map view model.

pub mod config;
pub mod draft;
pub mod error;
pub mod filter;
pub mod geo;
pub mod group;
pub mod map;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod reward;
pub mod sort;
pub mod store;
pub mod topo;
pub mod tui;
pub mod wizard;

pub use error::{Error, Result};
