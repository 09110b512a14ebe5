//! Compiler configuration
//!
//! Built in code with the `with_*` builder methods or loaded from a TOML
//! file:
//!
//! ```toml
//! allow_unknown_classes = true
//! resource_dir = "data"
//! max_call_depth = 128
//!
//! [enums.Align]
//! left = 0
//! center = 1
//! right = 2
//! ```

use crate::component::{ComponentRegistry, allocate_object};
use crate::enums::EnumTable;
use crate::error::ConfigError;
use amber_script::{DEFAULT_MAX_DEPTH, Interpreter, ScriptEngine};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Enum type name -> member name -> value
    pub enums: BTreeMap<String, BTreeMap<String, i64>>,

    /// Map frames of unregistered classes onto plain object components
    /// instead of failing the compile.
    pub allow_unknown_classes: bool,

    /// Directory searched by `readData`. Without one `readData` is not
    /// defined.
    pub resource_dir: Option<PathBuf>,

    /// Nesting limit for script function calls
    pub max_call_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            enums: BTreeMap::new(),
            allow_unknown_classes: false,
            resource_dir: None,
            max_call_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Register an enum type (builder pattern)
    pub fn with_enum<'a>(
        mut self,
        name: &str,
        members: impl IntoIterator<Item = (&'a str, i64)>,
    ) -> Self {
        let entry = self.enums.entry(name.to_string()).or_default();
        for (member, value) in members {
            entry.insert(member.to_string(), value);
        }
        self
    }

    pub fn with_unknown_classes(mut self, allow: bool) -> Self {
        self.allow_unknown_classes = allow;
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load a TOML file. A relative `resource_dir` is taken relative to
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        if let (Some(dir), Some(base)) = (&config.resource_dir, path.parent()) {
            if dir.is_relative() {
                config.resource_dir = Some(base.join(dir));
            }
        }
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn enum_table(&self) -> EnumTable {
        EnumTable::from_definitions(&self.enums)
    }

    pub fn component_registry(&self) -> ComponentRegistry {
        let registry = ComponentRegistry::default();
        if self.allow_unknown_classes {
            registry.with_fallback(allocate_object)
        } else {
            registry
        }
    }

    /// Fresh engine with the configured call depth.
    pub fn create_engine(&self) -> Rc<dyn ScriptEngine> {
        Rc::new(Interpreter::new().with_max_depth(self.max_call_depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_builder() {
        let config = CompilerConfig::new()
            .with_enum("Align", [("left", 0), ("right", 2)])
            .with_enum("Align", [("center", 1)])
            .with_unknown_classes(true)
            .with_max_call_depth(16);

        assert_eq!(config.enums["Align"].len(), 3);
        assert_eq!(
            config.enum_table().search("Align").and_then(|t| t.search_by_member("center")),
            Some(1)
        );
        assert!(config.component_registry().allocator("Button").is_ok());
        assert_eq!(config.max_call_depth, 16);
    }

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_toml("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.max_call_depth, DEFAULT_MAX_DEPTH);
        assert!(config.component_registry().allocator("Button").is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml(
            r#"
allow_unknown_classes = true
max_call_depth = 32

[enums.Align]
left = 0
center = 1
"#,
        )
        .unwrap();
        assert!(config.allow_unknown_classes);
        assert_eq!(config.max_call_depth, 32);
        assert_eq!(config.enums["Align"]["center"], 1);
    }

    #[test]
    fn test_invalid_toml() {
        let err = CompilerConfig::from_toml("max_call_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
        assert!(err.to_string().starts_with("Failed to parse config"));
    }

    #[test]
    fn test_load_resolves_resource_dir() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "resource_dir = \"data\"").unwrap();
        let config = CompilerConfig::load(file.path()).unwrap();
        let base = file.path().parent().unwrap();
        assert_eq!(config.resource_dir, Some(base.join("data")));

        let missing = CompilerConfig::load(Path::new("/nonexistent/amber.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
