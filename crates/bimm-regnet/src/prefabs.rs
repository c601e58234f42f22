//! # Named Config Tables
//!
//! A [`StaticPreFabConfig`] pairs a name and a description with a builder
//! for a [`Config`]; a [`StaticPreFabMap`] is an ordered table of them which
//! can be declared as a `static` item, and is searched by name.

use crate::errors::{RegNetError, RegNetResult};
use burn::config::Config;
use std::fmt::Debug;

/// A named, described builder for a [`Config`].
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// The entry name; the lookup key.
    pub name: &'static str,

    /// Human-readable description.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StaticPreFabConfig")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("config", &self.new_config())
            .finish()
    }
}

/// Static, ordered table of [`StaticPreFabConfig`]s.
pub struct StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the table.
    pub name: &'static str,

    /// Description of the table.
    pub description: &'static str,

    /// The entries, in declaration order.
    pub items: &'static [&'static StaticPreFabConfig<C>],
}

impl<C> Debug for StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StaticPreFabMap")
            .field("name", &self.name)
            .field("items", &self.names())
            .finish()
    }
}

impl<C> StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// The entry names, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|item| item.name).collect()
    }

    /// Lookup an entry by name.
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<&'static StaticPreFabConfig<C>> {
        self.items.iter().copied().find(|item| item.name == name)
    }

    /// Lookup an entry by name.
    ///
    /// # Returns
    ///
    /// The entry, or [`RegNetError::UnknownPreset`].
    pub fn try_lookup(
        &self,
        name: &str,
    ) -> RegNetResult<&'static StaticPreFabConfig<C>> {
        self.lookup(name)
            .ok_or_else(|| RegNetError::UnknownPreset(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Config, Debug)]
    struct ToyConfig {
        width: usize,

        #[config(default = 2)]
        depth: usize,
    }

    static TOY_MAP: StaticPreFabMap<ToyConfig> = StaticPreFabMap {
        name: "toy",
        description: "Toy configs",
        items: &[
            &StaticPreFabConfig {
                name: "small",
                description: "width 8",
                builder: || ToyConfig::new(8),
            },
            &StaticPreFabConfig {
                name: "large",
                description: "width 64, depth 4",
                builder: || ToyConfig::new(64).with_depth(4),
            },
        ],
    };

    #[test]
    fn test_lookup() {
        assert_eq!(TOY_MAP.names(), vec!["small", "large"]);
        assert!(TOY_MAP.lookup("medium").is_none());

        let small = TOY_MAP.lookup("small").unwrap();
        assert_eq!(small.description, "width 8");
        assert_eq!(small.new_config().depth, 2);

        let config = TOY_MAP.try_lookup("large").unwrap().new_config();
        assert_eq!(config.width, 64);
        assert_eq!(config.depth, 4);

        assert_eq!(
            TOY_MAP.try_lookup("medium").unwrap_err(),
            RegNetError::UnknownPreset("medium".to_string())
        );
    }

    #[test]
    fn test_debug() {
        let text = format!("{:?}", TOY_MAP.items[1]);
        assert!(text.contains("\"large\""));
        assert!(text.contains("width: 64"));

        let text = format!("{TOY_MAP:?}");
        assert!(text.contains("[\"small\", \"large\"]"));
    }
}
