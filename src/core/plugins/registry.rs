use once_cell::sync::Lazy;

use super::{
    error::PluginError,
    traits::Constructed,
    types::{PluginFields, PluginKind, PluginResult},
};

/// Registry entry for one plugin implementation.
///
/// Submitted to the global inventory by `register_plugin!`; carries the
/// capability family, the implementation id configuration refers to via
/// `filename`, the declared field lists and a constructor.
pub struct PluginMeta {
    pub kind: PluginKind,
    pub id: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub common: &'static [&'static str],
    pub factory: fn(&PluginFields) -> PluginResult<Constructed>,
}

impl std::fmt::Debug for PluginMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMeta")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("common", &self.common)
            .finish_non_exhaustive()
    }
}

inventory::collect!(PluginMeta);

/// Lookup table of every known plugin implementation.
pub struct PluginRegistry {
    entries: Vec<&'static PluginMeta>,
}

impl PluginRegistry {
    /// Builds the registry from everything submitted to the inventory.
    pub fn new() -> Self {
        Self::from_entries(inventory::iter::<PluginMeta>.into_iter().collect())
    }

    /// Builds a registry over an explicit set of entries.
    pub fn from_entries(mut entries: Vec<&'static PluginMeta>) -> Self {
        entries.sort_by(|a, b| (a.kind, a.id).cmp(&(b.kind, b.id)));
        PluginRegistry { entries }
    }

    /// Resolves an implementation id within one capability family.
    ///
    /// Distinguishes an id nobody registered from an id registered only
    /// under other families, and refuses to guess between duplicates.
    pub fn resolve(
        &self,
        kind: PluginKind,
        plugin: &str,
        implementation: &str,
    ) -> PluginResult<&'static PluginMeta> {
        let named: Vec<&'static PluginMeta> = self
            .entries
            .iter()
            .copied()
            .filter(|m| m.id == implementation)
            .collect();

        if named.is_empty() {
            return Err(PluginError::Load {
                kind,
                plugin: plugin.to_string(),
                implementation: implementation.to_string(),
                reason: "no such module is registered".to_string(),
            });
        }

        let mut matching = named.iter().copied().filter(|m| m.kind == kind);
        match (matching.next(), matching.next()) {
            (Some(meta), None) => Ok(meta),
            (None, _) => Err(PluginError::Load {
                kind,
                plugin: plugin.to_string(),
                implementation: implementation.to_string(),
                reason: format!("module does not provide a {} implementation", kind),
            }),
            (Some(_), Some(_)) => Err(PluginError::Ambiguous {
                kind,
                implementation: implementation.to_string(),
                count: named.iter().filter(|m| m.kind == kind).count(),
            }),
        }
    }

    /// Implementation ids registered for one family, sorted.
    pub fn list(&self, kind: PluginKind) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the lazily-built global registry.
    pub fn global() -> &'static PluginRegistry {
        &GLOBAL_REGISTRY
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::new);

/// Registers a `PluginFactory` implementation under an id at compile time.
#[macro_export]
macro_rules! register_plugin {
    ($plugin_type:ty, $id:expr) => {
        inventory::submit! {
            $crate::core::plugins::registry::PluginMeta {
                kind: <$plugin_type as $crate::core::plugins::traits::PluginFactory>::KIND,
                id: $id,
                required: <$plugin_type as $crate::core::plugins::traits::PluginFactory>::REQUIRED_FIELDS,
                optional: <$plugin_type as $crate::core::plugins::traits::PluginFactory>::OPTIONAL_FIELDS,
                common: <$plugin_type as $crate::core::plugins::traits::PluginFactory>::COMMON_FIELDS,
                factory: |fields| {
                    let plugin =
                        <$plugin_type as $crate::core::plugins::traits::PluginFactory>::build(fields)?;
                    Ok($crate::core::plugins::traits::PluginFactory::into_constructed(plugin))
                },
            }
        }
    };
}
