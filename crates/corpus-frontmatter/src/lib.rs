//! C1: front-matter codec. Parse/serialize the structured header block of
//! a paper file, plus repair and migration of that header.

pub mod codec;
pub mod doi;
pub mod header;
pub mod migration;
pub mod repair;

pub use codec::{backup_file, parse, parse_str, render, write};
pub use header::{validate_structure, Header};
pub use migration::{migrate, migrate_if_needed};
pub use repair::{infer_citation_key_from_filename, repair};
