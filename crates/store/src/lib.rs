//! Page-database backend for knowledge lookups and record persistence.
//!
//! Studios, bios, labelcopys and contacts all live as pages in databases of
//! a Notion-style workspace. This crate speaks that API and flattens page
//! properties into the plain string maps the rest of the system works with.

mod client;
pub mod props;

pub use client::PageStore;
