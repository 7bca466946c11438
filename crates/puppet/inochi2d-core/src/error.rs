//! Error types for puppet loading and manipulation.

use crate::ids::NodeId;

/// Everything that can go wrong while loading or editing a puppet.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PuppetError {
    /// Reading the puppet file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input was empty.
    #[error("puppet data is empty")]
    Empty,

    /// The buffer does not start with the INP magic.
    #[error("not an Inochi2D puppet (bad magic)")]
    BadMagic,

    /// A section ended before its declared length.
    #[error("puppet data truncated in {section}")]
    Truncated { section: &'static str },

    /// A section tag other than the expected one was found.
    #[error("expected section {expected}, found {found:?}")]
    BadSection {
        expected: &'static str,
        found: String,
    },

    /// The puppet JSON payload is not valid UTF-8.
    #[error("puppet payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The puppet JSON payload failed to parse.
    #[error("puppet json parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A texture uses an encoding tag this runtime does not know.
    #[error("unknown texture encoding {0}")]
    UnknownTextureEncoding(u8),

    /// A texture uses an encoding this runtime cannot decode.
    #[error("texture encoding {0} is not supported")]
    UnsupportedTextureEncoding(&'static str),

    /// Decoding texture data failed.
    #[error("texture decode error: {0}")]
    TextureDecode(#[from] image::ImageError),

    /// Raw texture dimensions or data are inconsistent.
    #[error("invalid texture: {reason}")]
    InvalidTexture { reason: String },

    /// Two nodes share a uuid.
    #[error("duplicate node uuid {0}")]
    DuplicateNode(NodeId),

    /// A reference names a node that does not exist.
    #[error("unknown node {0} referenced by {1}")]
    UnknownNode(NodeId, String),

    /// A part mesh is malformed.
    #[error("invalid mesh on node '{node}': {reason}")]
    InvalidMesh { node: String, reason: String },

    /// A parameter definition is malformed.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PuppetError>;
