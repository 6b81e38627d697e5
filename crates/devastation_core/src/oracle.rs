//! # Block Oracle
//!
//! Maps every block to what devastation does to it.
//!
//! The rules are data: a list of family rules matched by longest name
//! prefix. They are resolved once against the [`BlockRegistry`] into a dense
//! table indexed by block id, so hot loops classify with an indexed read.
//!
//! | Family       | Devastated form    | Settles into   | Healed form    |
//! |--------------|--------------------|----------------|----------------|
//! | `soil-*`     | `soil-corrupted-0` | `barren-soil`  | `soil-grass`   |
//! | `rock-*`     | `corrupted-rock`   | `obsidian`     | `rock-stone`   |
//! | `sand-*`     | `corrupted-sand`   | `ashen-glass`  | `sand-plain`   |
//! | `wood-*`     | `corrupted-wood`   | `charred-wood` | `wood-oak-log` |
//! | `foliage-*`  | `blight-growth`    | (nothing)      | `air`          |

use devastation_world::{names, BlockId, BlockRegistry};
use serde::{Deserialize, Serialize};

use crate::error::{DevastationError, DevastationResult};

/// One family rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRule {
    /// Name prefix selecting the family (`"soil-"`).
    pub prefix: String,
    /// Block a family member becomes when devastated.
    pub devastated: String,
    /// Block the devastated form settles into, if any.
    #[serde(default)]
    pub regen: Option<String>,
    /// Block a devastated or settled form heals back to.
    pub healed: String,
}

impl FamilyRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(prefix: &str, devastated: &str, regen: Option<&str>, healed: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            devastated: devastated.to_owned(),
            regen: regen.map(str::to_owned),
            healed: healed.to_owned(),
        }
    }
}

/// The built-in rule table.
#[must_use]
pub fn default_rules() -> Vec<FamilyRule> {
    vec![
        FamilyRule::new("soil-", names::SOIL_CORRUPTED, Some(names::BARREN_SOIL), names::SOIL_GRASS),
        FamilyRule::new("rock-", names::CORRUPTED_ROCK, Some(names::OBSIDIAN), names::ROCK_STONE),
        FamilyRule::new("sand-", names::CORRUPTED_SAND, Some(names::ASHEN_GLASS), names::SAND_PLAIN),
        FamilyRule::new("wood-", names::CORRUPTED_WOOD, Some(names::CHARRED_WOOD), names::WOOD_OAK),
        FamilyRule::new("foliage-", names::BLIGHT_GROWTH, None, names::AIR),
    ]
}

/// What devastating a block produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conversion {
    /// The devastated form written to the grid.
    pub devastated: BlockId,
    /// What the devastated form later settles into.
    pub regen_target: Option<BlockId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Class {
    Inert,
    Devastatable(Conversion),
    Devastated { healed: BlockId },
}

/// Dense block classification table.
#[derive(Clone, Debug)]
pub struct BlockOracle {
    table: Vec<Class>,
}

impl BlockOracle {
    /// Resolves `rules` against every block in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DevastationError::UnknownBlock`] if a rule names a form the
    /// registry does not contain.
    pub fn new(registry: &BlockRegistry, rules: &[FamilyRule]) -> DevastationResult<Self> {
        let lookup = |name: &str| {
            registry
                .id(name)
                .ok_or_else(|| DevastationError::UnknownBlock(name.to_owned()))
        };

        let mut resolved = Vec::with_capacity(rules.len());
        for rule in rules {
            let devastated = lookup(&rule.devastated)?;
            let regen_target = match &rule.regen {
                Some(name) => Some(lookup(name)?).filter(|id| !id.is_air()),
                None => None,
            };
            let healed = lookup(&rule.healed)?;
            resolved.push((rule.prefix.as_str(), Conversion { devastated, regen_target }, healed));
        }

        let mut table = vec![Class::Inert; registry.len()];

        // Devastated and settled forms first, so family matching never
        // reclassifies them as devastatable.
        for (_, conversion, healed) in &resolved {
            for id in [Some(conversion.devastated), conversion.regen_target]
                .into_iter()
                .flatten()
            {
                let slot = &mut table[usize::from(id.raw())];
                if *slot == Class::Inert && !id.is_air() {
                    *slot = Class::Devastated { healed: *healed };
                }
            }
        }

        for (id, name) in registry.iter() {
            let slot = &mut table[usize::from(id.raw())];
            if id.is_air() || *slot != Class::Inert {
                continue;
            }
            let best = resolved
                .iter()
                .filter(|(prefix, _, _)| name.starts_with(prefix))
                .max_by_key(|(prefix, _, _)| prefix.len());
            if let Some((_, conversion, _)) = best {
                *slot = Class::Devastatable(*conversion);
            }
        }

        Ok(Self { table })
    }

    /// Resolves the built-in rule table.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lacks one of the built-in forms.
    pub fn with_default_rules(registry: &BlockRegistry) -> DevastationResult<Self> {
        Self::new(registry, &default_rules())
    }

    #[inline]
    fn class(&self, block: BlockId) -> Class {
        self.table
            .get(usize::from(block.raw()))
            .copied()
            .unwrap_or(Class::Inert)
    }

    /// What devastation turns `block` into, or `None` if it is not
    /// devastatable.
    #[inline]
    #[must_use]
    pub fn classify(&self, block: BlockId) -> Option<Conversion> {
        match self.class(block) {
            Class::Devastatable(conversion) => Some(conversion),
            _ => None,
        }
    }

    /// Returns true if `block` can be devastated.
    #[inline]
    #[must_use]
    pub fn is_convertible(&self, block: BlockId) -> bool {
        self.classify(block).is_some()
    }

    /// Returns true for devastated forms and their settled forms.
    #[inline]
    #[must_use]
    pub fn is_devastated(&self, block: BlockId) -> bool {
        matches!(self.class(block), Class::Devastated { .. })
    }

    /// The block a devastated or settled form heals back to.
    #[inline]
    #[must_use]
    pub fn healed_form(&self, block: BlockId) -> Option<BlockId> {
        match self.class(block) {
            Class::Devastated { healed } => Some(healed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (BlockRegistry, BlockOracle) {
        let registry = BlockRegistry::with_default_catalog();
        let oracle = BlockOracle::with_default_rules(&registry).unwrap();
        (registry, oracle)
    }

    #[test]
    fn test_soil_family() {
        let (registry, oracle) = setup();
        let id = |n| registry.id(n).unwrap();

        let conversion = oracle.classify(id("soil-podzol")).unwrap();
        assert_eq!(conversion.devastated, id(names::SOIL_CORRUPTED));
        assert_eq!(conversion.regen_target, Some(id(names::BARREN_SOIL)));

        assert!(oracle.is_devastated(id(names::SOIL_CORRUPTED)));
        assert!(oracle.is_devastated(id(names::BARREN_SOIL)));
        assert_eq!(oracle.healed_form(id(names::BARREN_SOIL)), Some(id(names::SOIL_GRASS)));
    }

    #[test]
    fn test_devastated_form_is_not_devastatable() {
        let (registry, oracle) = setup();
        // "soil-corrupted-0" carries the soil prefix.
        let corrupted = registry.id(names::SOIL_CORRUPTED).unwrap();
        assert!(oracle.classify(corrupted).is_none());
    }

    #[test]
    fn test_foliage_has_no_regen_and_heals_to_air() {
        let (registry, oracle) = setup();
        let conversion = oracle.classify(registry.id(names::FOLIAGE_LEAVES).unwrap()).unwrap();
        assert_eq!(conversion.regen_target, None);
        let blight = registry.id(names::BLIGHT_GROWTH).unwrap();
        assert_eq!(oracle.healed_form(blight), Some(BlockId::AIR));
    }

    #[test]
    fn test_unmatched_and_air_are_inert() {
        let (registry, oracle) = setup();
        for name in [names::AIR, names::WATER, names::BEDROCK, "gravel"] {
            let id = registry.id(name).unwrap();
            assert!(oracle.classify(id).is_none(), "{name}");
            assert!(!oracle.is_devastated(id), "{name}");
            assert!(oracle.healed_form(id).is_none(), "{name}");
        }
        assert!(oracle.classify(BlockId::new(u16::MAX)).is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut registry = BlockRegistry::with_default_catalog();
        registry.register("soil-mud-deep").unwrap();
        let mut rules = default_rules();
        rules.push(FamilyRule::new("soil-mud", names::CORRUPTED_ROCK, None, names::SOIL_DIRT));
        let oracle = BlockOracle::new(&registry, &rules).unwrap();

        let mud = oracle.classify(registry.id("soil-mud-deep").unwrap()).unwrap();
        assert_eq!(mud.devastated, registry.id(names::CORRUPTED_ROCK).unwrap());
        let grass = oracle.classify(registry.id(names::SOIL_GRASS).unwrap()).unwrap();
        assert_eq!(grass.devastated, registry.id(names::SOIL_CORRUPTED).unwrap());
    }

    #[test]
    fn test_unknown_form_is_rejected() {
        let registry = BlockRegistry::with_default_catalog();
        let rules = [FamilyRule::new("soil-", "no-such-block", None, names::SOIL_GRASS)];
        assert!(matches!(
            BlockOracle::new(&registry, &rules),
            Err(DevastationError::UnknownBlock(name)) if name == "no-such-block"
        ));
    }
}
