//! Reusable handler implementations.

pub mod index_handler;

pub use index_handler::{IndexItemProvider, IndexQueryHandler};
