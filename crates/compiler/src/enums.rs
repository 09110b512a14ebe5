//! Registry of enum types known to the parser.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    /// Members ordered by value
    members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new(name: impl Into<String>) -> Self {
        EnumType {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: impl Into<String>, value: i64) -> Self {
        self.add(member, value);
        self
    }

    pub fn add(&mut self, member: impl Into<String>, value: i64) {
        let member = member.into();
        self.members.retain(|(name, _)| *name != member);
        let at = self.members.partition_point(|(_, v)| *v <= value);
        self.members.insert(at, (member, value));
    }

    pub fn search_by_member(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, v)| *v)
    }

    pub fn member_name(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable {
    types: BTreeMap<String, EnumType>,
}

impl EnumTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, enum_type: EnumType) {
        self.types.insert(enum_type.name.clone(), enum_type);
    }

    pub fn with(mut self, enum_type: EnumType) -> Self {
        self.add(enum_type);
        self
    }

    pub fn search(&self, type_name: &str) -> Option<&EnumType> {
        self.types.get(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build from `type name -> (member -> value)` tables.
    pub fn from_definitions(definitions: &BTreeMap<String, BTreeMap<String, i64>>) -> Self {
        let mut table = EnumTable::new();
        for (name, members) in definitions {
            let mut enum_type = EnumType::new(name.clone());
            for (member, value) in members {
                enum_type.add(member.clone(), *value);
            }
            table.add(enum_type);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_are_ordered_by_value() {
        let align = EnumType::new("Align")
            .with_member("right", 2)
            .with_member("left", 0)
            .with_member("center", 1);
        let names: Vec<&str> = align.members().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["left", "center", "right"]);
        assert_eq!(align.search_by_member("center"), Some(1));
        assert_eq!(align.member_name(2), Some("right"));
        assert_eq!(align.search_by_member("top"), None);
    }

    #[test]
    fn test_from_definitions() {
        let mut defs = BTreeMap::new();
        defs.insert(
            "Axis".to_string(),
            BTreeMap::from([("horizontal".to_string(), 0), ("vertical".to_string(), 1)]),
        );
        let table = EnumTable::from_definitions(&defs);
        assert_eq!(table.search("Axis").and_then(|t| t.search_by_member("vertical")), Some(1));
        assert!(table.search("Align").is_none());
    }
}
