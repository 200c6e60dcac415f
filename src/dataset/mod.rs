//! Dataset model and layout resolution
//!
//! This module provides:
//! - `Instance` / `Manifest`: labelled recordings keyed by identifier
//! - ELAR and flat-directory resolvers

mod instance;
mod resolver;

pub use instance::{Instance, Manifest, NAME_DELIMITER, WAV_EXTENSION};
pub use resolver::{
    elar_identifier, normalize_label, parse_flat_name, resolve, resolve_all, resolve_elar,
    resolve_flat, LayoutMode,
};

pub(crate) use resolver::{has_extension, sniff_delimiter};
