//! Schema-driven decoding of the configuration blobs stored in modern
//! collections (`notetypes.config`, `fields.config`, `templates.config`)
//! and of the package-level `meta` entry.

use prost::Message;

use super::wire;
use crate::error::{DecodeError, Result};

/// `notetypes.config`
#[derive(Clone, PartialEq, Message)]
pub struct NotetypeConfig {
    #[prost(enumeration = "NotetypeKind", tag = "1")]
    pub kind: i32,
    #[prost(uint32, tag = "2")]
    pub sort_field_idx: u32,
    #[prost(string, tag = "3")]
    pub css: String,
    #[prost(int64, tag = "4")]
    pub target_deck_id_unused: i64,
    #[prost(string, tag = "5")]
    pub latex_pre: String,
    #[prost(string, tag = "6")]
    pub latex_post: String,
    #[prost(bool, tag = "7")]
    pub latex_svg: bool,
    #[prost(message, repeated, tag = "8")]
    pub reqs: Vec<CardRequirement>,
    #[prost(int32, tag = "9")]
    pub original_stock_kind: i32,
    #[prost(int64, optional, tag = "10")]
    pub original_id: Option<i64>,
    #[prost(bytes = "vec", tag = "255")]
    pub other: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum NotetypeKind {
    Normal = 0,
    Cloze = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct CardRequirement {
    #[prost(uint32, tag = "1")]
    pub card_ord: u32,
    #[prost(int32, tag = "2")]
    pub kind: i32,
    #[prost(uint32, repeated, tag = "3")]
    pub field_ords: Vec<u32>,
}

/// `fields.config`
#[derive(Clone, PartialEq, Message)]
pub struct FieldConfig {
    #[prost(bool, tag = "1")]
    pub sticky: bool,
    #[prost(bool, tag = "2")]
    pub rtl: bool,
    #[prost(string, tag = "3")]
    pub font_name: String,
    #[prost(uint32, tag = "4")]
    pub font_size: u32,
    #[prost(string, tag = "5")]
    pub description: String,
    #[prost(bool, tag = "6")]
    pub plain_text: bool,
    #[prost(bool, tag = "7")]
    pub collapsed: bool,
    #[prost(bool, tag = "8")]
    pub exclude_from_search: bool,
    #[prost(int64, optional, tag = "9")]
    pub id: Option<i64>,
    #[prost(uint32, optional, tag = "10")]
    pub tag: Option<u32>,
    #[prost(bool, tag = "11")]
    pub prevent_deletion: bool,
    #[prost(bytes = "vec", tag = "255")]
    pub other: Vec<u8>,
}

/// `templates.config`
#[derive(Clone, PartialEq, Message)]
pub struct TemplateConfig {
    #[prost(string, tag = "1")]
    pub q_format: String,
    #[prost(string, tag = "2")]
    pub a_format: String,
    #[prost(string, tag = "3")]
    pub q_format_browser: String,
    #[prost(string, tag = "4")]
    pub a_format_browser: String,
    #[prost(int64, tag = "5")]
    pub target_deck_id: i64,
    #[prost(string, tag = "6")]
    pub browser_font_name: String,
    #[prost(uint32, tag = "7")]
    pub browser_font_size: u32,
    #[prost(int64, optional, tag = "8")]
    pub id: Option<i64>,
    #[prost(bytes = "vec", tag = "255")]
    pub other: Vec<u8>,
}

/// The `meta` entry of packages written by newer clients.
#[derive(Clone, PartialEq, Message)]
pub struct PackageMetadata {
    #[prost(enumeration = "PackageVersion", tag = "1")]
    pub version: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PackageVersion {
    Unknown = 0,
    Legacy1 = 1,
    Legacy2 = 2,
    Latest = 3,
}

/// A message stored as a config blob, named for error reporting.
pub trait ConfigBlob: Message + Default {
    const KIND: &'static str;
}

impl ConfigBlob for NotetypeConfig {
    const KIND: &'static str = "notetype";
}

impl ConfigBlob for FieldConfig {
    const KIND: &'static str = "field";
}

impl ConfigBlob for TemplateConfig {
    const KIND: &'static str = "template";
}

impl ConfigBlob for PackageMetadata {
    const KIND: &'static str = "package metadata";
}

/// Decode a config blob into its message type.
///
/// Unknown fields are skipped, but only varint and length-delimited ones:
/// a fixed-width or group field anywhere at the top level fails the decode.
pub fn decode_config<M: ConfigBlob>(bytes: &[u8]) -> Result<M> {
    let malformed = |reason: String| DecodeError::MalformedConfigBlob {
        kind: M::KIND,
        reason,
    };
    wire::check_fields(bytes).map_err(|e| malformed(e.to_string()))?;
    M::decode(bytes).map_err(|e| malformed(e.to_string()))
}
