//! Tokens, attributes and signatures

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A (layer, value) pair, the unit of selection and counting
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "trait_type")]
    pub layer: String,
    pub value: String,
}

impl Attribute {
    pub fn new(layer: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.layer, self.value)
    }
}

/// One generated artifact.
///
/// Serializes to the metadata document; the id only names the output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(skip)]
    id: u32,
    pub image: String,
    pub attributes: Vec<Attribute>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl Token {
    pub fn new(id: u32, attributes: Vec<Attribute>) -> Self {
        Self {
            id,
            image: String::new(),
            attributes,
            name: String::new(),
            description: None,
            external_url: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn signature(&self) -> Signature {
        Signature::of(&self.attributes)
    }

    pub fn set_image_path(&mut self, image: impl Into<String>) {
        self.image = image.into();
    }
}

/// Uniqueness key of a token: SHA-256 over its attributes in layer order.
///
/// Each field is length-prefixed so no choice of names can make two
/// different attribute lists encode identically.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl Signature {
    pub fn of(attributes: &[Attribute]) -> Self {
        let mut hasher = Sha256::new();
        for attribute in attributes {
            for field in [&attribute.layer, &attribute.value] {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

/// Replace the first `%d` in `template` with `id`.
pub fn render_template(template: &str, id: u32) -> String {
    template.replacen("%d", &id.to_string(), 1)
}
