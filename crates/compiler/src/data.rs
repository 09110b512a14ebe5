//! External data frames
//!
//! A data frame is an Amber source holding only literal properties.
//! [`DataReader`] loads one through a [`ResourceLoader`], parses it with
//! the normal parser and converts it into a plain script object.
//! [`install_library`] exposes the reader to scripts as `readData(name)`.

use crate::ast::{Frame, Value as FrameValue};
use crate::compiler::to_script_value;
use crate::enums::EnumTable;
use crate::error::DataError;
use crate::parser::parse_frame;
use crate::reactive::{CLASS_NAME_PROPERTY, INSTANCE_NAME_PROPERTY};
use amber_script::{ScriptEngine, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

pub trait ResourceLoader {
    /// Raw text of the named resource, or `None` if there is none.
    fn load_data(&self, identifier: &str) -> Option<String>;
}

/// Reads `<dir>/<identifier>.amb`.
pub struct FileResourceLoader {
    dir: PathBuf,
}

impl FileResourceLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileResourceLoader { dir: dir.into() }
    }

    /// Identifiers that would leave the directory have no path.
    pub fn path_of(&self, identifier: &str) -> Option<PathBuf> {
        let valid = !identifier.is_empty()
            && identifier
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.dir.join(format!("{}.amb", identifier)))
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load_data(&self, identifier: &str) -> Option<String> {
        let path = self.path_of(identifier)?;
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("cannot read {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryResourceLoader {
    entries: HashMap<String, String>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, identifier: &str, text: &str) -> Self {
        self.insert(identifier, text);
        self
    }

    pub fn insert(&mut self, identifier: &str, text: &str) {
        self.entries.insert(identifier.to_string(), text.to_string());
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn load_data(&self, identifier: &str) -> Option<String> {
        self.entries.get(identifier).cloned()
    }
}

pub struct DataReader {
    loader: Rc<dyn ResourceLoader>,
    enums: EnumTable,
}

impl DataReader {
    pub fn new(loader: Rc<dyn ResourceLoader>, enums: EnumTable) -> Self {
        DataReader { loader, enums }
    }

    pub fn read(&self, identifier: &str) -> Result<Value, DataError> {
        let text = self
            .loader
            .load_data(identifier)
            .ok_or_else(|| DataError::NotFound(identifier.to_string()))?;
        let frame = parse_frame(&text, &self.enums)?;
        frame_to_value(&frame)
    }
}

/// Literal properties of a frame as a script object. Nested frames
/// become nested objects.
pub fn frame_to_value(frame: &Frame) -> Result<Value, DataError> {
    let mut entries = BTreeMap::new();
    entries.insert(
        INSTANCE_NAME_PROPERTY.to_string(),
        Value::from(frame.instance_name.as_str()),
    );
    entries.insert(
        CLASS_NAME_PROPERTY.to_string(),
        Value::from(frame.class_name.as_str()),
    );
    for member in &frame.members {
        let value = match &member.value {
            FrameValue::Scalar(_) | FrameValue::Array(_) | FrameValue::Dictionary(_) => {
                to_script_value(&member.value)
            }
            FrameValue::Frame(child) => frame_to_value(child)?,
            other => {
                return Err(DataError::Unsupported {
                    property: member.identifier.clone(),
                    kind: other.value_type().keyword(),
                });
            }
        };
        entries.insert(member.identifier.clone(), value);
    }
    Ok(Value::object(entries))
}

/// Define `readData(name)` in the engine. Failures are logged and the
/// call returns `null`.
pub fn install_library(engine: &dyn ScriptEngine, reader: Rc<DataReader>) {
    let read_data = Value::native("readData", move |args: &[Value]| {
        let Some(name) = args.first().and_then(|v| v.as_str()) else {
            tracing::error!("readData [Error] name string is required");
            return Ok(Value::Null);
        };
        match reader.read(name) {
            Ok(value) => {
                tracing::debug!("readData({}) = {}", name, value.describe());
                Ok(value)
            }
            Err(e) => {
                tracing::error!("readData [Error] {}", e);
                Ok(Value::Null)
            }
        }
    });
    engine.set_named_value("readData", read_data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_script::Interpreter;
    use tempfile::TempDir;

    fn reader(loader: impl ResourceLoader + 'static) -> DataReader {
        DataReader::new(Rc::new(loader), EnumTable::new())
    }

    #[test]
    fn test_read_from_memory() {
        let loader = MemoryResourceLoader::new().with_entry(
            "colors",
            "colors: Palette { size: Int 2 names: String [\"red\", \"blue\"] sub: Object { on: Bool true } }",
        );
        let value = reader(loader).read("colors").unwrap();
        assert_eq!(
            value.describe(),
            "{className: \"Palette\", instanceName: \"colors\", names: [\"red\", \"blue\"], size: 2, sub: {className: \"Object\", instanceName: \"sub\", on: true}}"
        );
    }

    #[test]
    fn test_functions_are_rejected() {
        let loader = MemoryResourceLoader::new()
            .with_entry("bad", "bad: Object { f: Func(a) %{ return a ; %} }");
        assert_eq!(
            reader(loader).read("bad"),
            Err(DataError::Unsupported {
                property: "f".to_string(),
                kind: "Func".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_and_malformed() {
        let loader = MemoryResourceLoader::new().with_entry("broken", "broken: Object {");
        let reader = reader(loader);
        assert_eq!(
            reader.read("absent"),
            Err(DataError::NotFound("absent".to_string()))
        );
        assert!(matches!(reader.read("broken"), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_file_loader() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("table.amb"), "table: Object { n: Int 7 }").unwrap();
        let loader = FileResourceLoader::new(dir.path());
        assert!(loader.load_data("table").is_some());
        assert!(loader.load_data("other").is_none());
        assert!(loader.path_of("../table").is_none());

        let value = reader(loader).read("table").unwrap();
        assert!(value.describe().contains("n: 7"));
    }

    #[test]
    fn test_read_data_from_script() {
        let engine = Interpreter::new();
        let loader = MemoryResourceLoader::new().with_entry("cfg", "cfg: Object { n: Int 7 }");
        install_library(&engine, Rc::new(reader(loader)));
        assert_eq!(
            engine.evaluate_script("readData(\"cfg\").n + 1").unwrap(),
            Value::from(8i64)
        );
        assert_eq!(
            engine.evaluate_script("readData(\"nothing\")").unwrap(),
            Value::Null
        );
    }
}
