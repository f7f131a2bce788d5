use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const HASH_LEN: usize = 20;

// 2021-01-01T00:00:00Z
pub const FARCASTER_EPOCH: i64 = 1_609_459_200;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashError {
    #[error("hash is not valid hex: {0}")]
    InvalidHex(String),
    #[error("hash must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|_| HashError::InvalidHex(raw.to_string()))?;
        let array: [u8; HASH_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastId {
    pub fid: u64,
    pub hash: Hash,
}

impl CastId {
    pub fn new(fid: u64, hash: Hash) -> Self {
        Self { fid, hash }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Embed {
    Cast(CastId),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    Cast(CastId),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cast {
    pub id: CastId,
    pub timestamp: u32,
    pub text: String,
    pub mentions: Vec<u64>,
    // byte offsets into text
    pub mentions_positions: Vec<u32>,
    pub embeds: Vec<Embed>,
    pub parent: Option<Parent>,
}

impl Cast {
    pub fn parent_cast(&self) -> Option<CastId> {
        match &self.parent {
            Some(Parent::Cast(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn referenced_fids(&self) -> Vec<u64> {
        let mut fids = vec![self.id.fid];
        fids.extend(self.mentions.iter().copied());
        for embed in &self.embeds {
            if let Embed::Cast(id) = embed {
                fids.push(id.fid);
            }
        }
        if let Some(parent) = self.parent_cast() {
            fids.push(parent.fid);
        }
        fids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastNode {
    pub cast: Cast,
    pub replies: Vec<Hash>,
}

#[derive(Debug, Clone, Default)]
pub struct CastGroup {
    pub messages: HashMap<Hash, CastNode>,
    pub head: Option<Hash>,
    pub ordered: Vec<Hash>,
    pub fnames: HashMap<u64, String>,
}

impl CastGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cast: Cast) -> Hash {
        let hash = cast.id.hash;
        match self.messages.get_mut(&hash) {
            Some(node) => node.cast = cast,
            None => {
                self.messages.insert(
                    hash,
                    CastNode {
                        cast,
                        replies: Vec::new(),
                    },
                );
            }
        }
        hash
    }

    pub fn link_reply(&mut self, parent: Hash, child: Hash) {
        if let Some(node) = self.messages.get_mut(&parent) {
            if !node.replies.contains(&child) {
                node.replies.push(child);
            }
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<&CastNode> {
        self.messages.get(hash)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn fname(&self, fid: u64) -> String {
        self.fnames
            .get(&fid)
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| fid.to_string())
    }

    pub fn referenced_fids(&self) -> Vec<u64> {
        let mut fids: Vec<u64> = self
            .messages
            .values()
            .flat_map(|node| node.cast.referenced_fids())
            .collect();
        fids.sort_unstable();
        fids.dedup();
        fids
    }
}
