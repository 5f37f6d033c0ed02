//! Plugin registry keyed by raw layer name, plus the protocol alias table.

use std::collections::HashMap;

use crate::plugin::{BuiltinPlugin, ProtocolPlugin};
use crate::plugins::PassThroughPlugin;

/// Groups of protocol names that refer to the same traffic.
///
/// Lookups are case-insensitive.
const ALIAS_GROUPS: &[&[&str]] = &[
    &["smb2", "smb"],
    &["http", "https", "http2"],
    &["tls", "ssl"],
    &["ip", "ipv4"],
    &["dns", "mdns"],
];

/// All names equivalent to `name`, including `name` itself (lower-cased).
pub fn protocol_aliases(name: &str) -> Vec<String> {
    let lower = name.trim().to_ascii_lowercase();
    match ALIAS_GROUPS.iter().find(|group| group.contains(&lower.as_str())) {
        Some(group) => group.iter().map(|s| s.to_string()).collect(),
        None => vec![lower],
    }
}

/// Registry dispatching raw layers to plugins.
///
/// Layers with no registered plugin resolve to the pass-through plugin.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: Vec<BuiltinPlugin>,
    by_layer: HashMap<&'static str, usize>,
    fallback: BuiltinPlugin,
}

impl PluginRegistry {
    /// Create an empty registry. Every layer goes through the pass-through plugin.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            by_layer: HashMap::new(),
            fallback: BuiltinPlugin::PassThrough(PassThroughPlugin),
        }
    }

    /// Create a registry with all built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in BuiltinPlugin::all() {
            registry.register(plugin);
        }
        registry
    }

    /// Register a plugin for each layer name it claims.
    ///
    /// A later registration for the same layer name replaces the earlier one.
    pub fn register(&mut self, plugin: BuiltinPlugin) {
        let slot = self.plugins.len();
        for layer in plugin.layer_names() {
            self.by_layer.insert(*layer, slot);
        }
        self.plugins.push(plugin);
    }

    /// Plugin registered for a raw layer name.
    pub fn get(&self, layer: &str) -> Option<&BuiltinPlugin> {
        self.by_layer.get(layer).map(|&slot| &self.plugins[slot])
    }

    /// The plugin used for layers no registered plugin claims.
    pub fn fallback(&self) -> &BuiltinPlugin {
        &self.fallback
    }

    /// Names of registered plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
