//! # Layer Naming Context
//!
//! Units built without an explicit name draw one from a [`NamingContext`],
//! which hands out per-key counters starting at ``1``.
//!
//! Two fresh contexts produce identical name sequences.

use std::collections::BTreeMap;

/// Per-key unique id source for layer names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingContext {
    counters: BTreeMap<String, usize>,
}

impl NamingContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next uid for `key`.
    pub fn next_uid(
        &mut self,
        key: &str,
    ) -> usize {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Build ``{key}_{uid}`` from the next uid for `key`.
    pub fn unique_name(
        &mut self,
        key: &str,
    ) -> String {
        let uid = self.next_uid(key);
        format!("{key}_{uid}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names() {
        let mut ctx = NamingContext::new();
        assert_eq!(ctx.unique_name("stage"), "stage_1");
        assert_eq!(ctx.unique_name("stage"), "stage_2");
        assert_eq!(ctx.unique_name("xblock"), "xblock_1");
        assert_eq!(ctx.next_uid("stage"), 3);
        assert_eq!(ctx.unique_name("stage"), "stage_4");
    }

    #[test]
    fn test_independent_contexts_agree() {
        let draw = || {
            let mut ctx = NamingContext::new();
            (0..3)
                .flat_map(|_| [ctx.unique_name("stem"), ctx.unique_name("yblock")])
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }
}
