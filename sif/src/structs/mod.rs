//! Data structures representing SIF format components.
//!
//! Contains the ordered header metadata, version dispatch, subimage and tile
//! descriptors, timestamp handling, user-text parameters and the spool
//! descriptor with its pixel encodings.

pub mod encoding;
pub mod metadata;
pub mod spool_ini;
pub mod subimage;
pub mod tile;
pub mod timestamp;
pub mod user_text;
pub mod version;
