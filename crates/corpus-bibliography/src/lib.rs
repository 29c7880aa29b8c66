//! C2: bibliography codec. Parses the master `references.bib`-style file
//! into keyed and ordered views, validates required fields per entry type,
//! and renders freshly-fetched entries back out to BibTeX.

pub mod bib;
pub mod entry;
pub mod write;

pub use bib::{doi_map, parse_keyed, parse_ordered};
pub use entry::{parse_bibliography, BibEntry};
pub use write::{render as render_bibtex, write as write_bibtex, OutputEntry};
