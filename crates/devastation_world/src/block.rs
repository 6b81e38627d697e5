//! # Block Identities
//!
//! Blocks are stored as compact `u16` ids. The [`BlockRegistry`] interns
//! block names (`"soil-grass"`, `"rock-stone"`, ...) so that family-based
//! rules can be written against names while hot loops compare integers.
//!
//! Id `0` is always air.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compact block identity.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Air block (empty).
    pub const AIR: Self = Self(0);

    /// Creates a block id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw `u16` value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns true if this is an air block.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Well-known block names of the default catalog.
pub mod names {
    /// Empty space.
    pub const AIR: &str = "air";
    /// Indestructible floor.
    pub const BEDROCK: &str = "bedrock";
    /// Still water.
    pub const WATER: &str = "water";
    /// Grass-covered soil.
    pub const SOIL_GRASS: &str = "soil-grass";
    /// Plain dirt.
    pub const SOIL_DIRT: &str = "soil-dirt";
    /// Coarse dirt.
    pub const SOIL_COARSE: &str = "soil-coarse";
    /// Plain stone.
    pub const ROCK_STONE: &str = "rock-stone";
    /// Granite.
    pub const ROCK_GRANITE: &str = "rock-granite";
    /// Deep slate.
    pub const ROCK_DEEPSLATE: &str = "rock-deepslate";
    /// Sand.
    pub const SAND_PLAIN: &str = "sand-plain";
    /// Oak log.
    pub const WOOD_OAK: &str = "wood-oak-log";
    /// Oak leaves.
    pub const FOLIAGE_LEAVES: &str = "foliage-oak-leaves";
    /// Tall grass.
    pub const FOLIAGE_TALL_GRASS: &str = "foliage-tall-grass";
    /// Devastated soil.
    pub const SOIL_CORRUPTED: &str = "soil-corrupted-0";
    /// Settled form of devastated soil.
    pub const BARREN_SOIL: &str = "barren-soil";
    /// Devastated rock.
    pub const CORRUPTED_ROCK: &str = "corrupted-rock";
    /// Settled form of devastated rock.
    pub const OBSIDIAN: &str = "obsidian";
    /// Devastated sand.
    pub const CORRUPTED_SAND: &str = "corrupted-sand";
    /// Settled form of devastated sand.
    pub const ASHEN_GLASS: &str = "ashen-glass";
    /// Devastated wood.
    pub const CORRUPTED_WOOD: &str = "corrupted-wood";
    /// Settled form of devastated wood.
    pub const CHARRED_WOOD: &str = "charred-wood";
    /// Ephemeral growth that replaces foliage.
    pub const BLIGHT_GROWTH: &str = "blight-growth";
}

/// Names registered by [`BlockRegistry::with_default_catalog`].
pub const DEFAULT_CATALOG: &[&str] = &[
    names::AIR,
    names::BEDROCK,
    names::WATER,
    names::SOIL_GRASS,
    names::SOIL_DIRT,
    names::SOIL_COARSE,
    "soil-podzol",
    "soil-mud",
    names::ROCK_STONE,
    names::ROCK_GRANITE,
    "rock-andesite",
    names::ROCK_DEEPSLATE,
    names::SAND_PLAIN,
    "sand-red",
    "gravel",
    names::WOOD_OAK,
    "wood-birch-log",
    names::FOLIAGE_LEAVES,
    "foliage-birch-leaves",
    names::FOLIAGE_TALL_GRASS,
    "foliage-fern",
    "foliage-flower",
    names::SOIL_CORRUPTED,
    names::BARREN_SOIL,
    names::CORRUPTED_ROCK,
    names::OBSIDIAN,
    names::CORRUPTED_SAND,
    names::ASHEN_GLASS,
    names::CORRUPTED_WOOD,
    names::CHARRED_WOOD,
    names::BLIGHT_GROWTH,
];

/// Errors raised by the block registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Every `u16` id is already taken.
    #[error("block registry is full ({0} entries)")]
    Full(usize),
}

/// Interns block names to [`BlockId`]s.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    names: Vec<String>,
    ids: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    #[must_use]
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(names::AIR.to_owned(), BlockId::AIR);
        Self {
            names: vec![names::AIR.to_owned()],
            ids,
        }
    }

    /// Creates a registry with every name in [`DEFAULT_CATALOG`].
    #[must_use]
    pub fn with_default_catalog() -> Self {
        let mut registry = Self::new();
        for name in DEFAULT_CATALOG {
            // The default catalog is far below the id limit.
            let _ = registry.register(name);
        }
        registry
    }

    /// Registers a name, returning the existing id if it is already known.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Full`] once all `u16` ids are in use.
    pub fn register(&mut self, name: &str) -> Result<BlockId, RegistryError> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let raw = u16::try_from(self.names.len()).map_err(|_| RegistryError::Full(self.names.len()))?;
        let id = BlockId::new(raw);
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Looks up the id of a name.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<BlockId> {
        self.ids.get(name).copied()
    }

    /// Looks up the name of an id.
    #[must_use]
    pub fn name(&self, id: BlockId) -> Option<&str> {
        self.names.get(usize::from(id.raw())).map(String::as_str)
    }

    /// Number of registered blocks (including air).
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: air is registered on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (BlockId::new(i as u16), name.as_str()))
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::with_default_catalog()
    }
}
