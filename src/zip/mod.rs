//! ZIP container reading.
//!
//! An `.apkg` package is an ordinary ZIP archive; nothing else in the crate
//! touches raw archive bytes.
//!
//! - [`structures`]: fixed-layout records (EOCD, ZIP64 records, entry metadata)
//! - [`parser`]: locating and parsing the central directory
//! - [`extractor`]: reading, inflating and verifying single entries
//! - [`Container`]: the opened package, with its directory parsed once
//!
//! Packages written by Anki use STORED and DEFLATE entries; ZIP64 directories
//! are accepted. Encrypted entries and multi-disk archives are rejected.

mod container;
mod extractor;
mod parser;
mod structures;

pub use container::Container;
pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
