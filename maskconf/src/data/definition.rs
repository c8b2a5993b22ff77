use std::fmt;

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};
use serde_json::{Map, Value};

use crate::data::schema::SchemaError;

/// Raw, untyped parameter definition: group name → parameter name → attributes.
///
/// Entries keep their textual order. Repeated keys are kept as well, so that
/// [`ConfigSchema::parse`](crate::data::schema::ConfigSchema::parse) can report them instead of
/// silently keeping the last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definition {
    /// Groups in declaration order.
    pub groups: Vec<GroupDefinition>,
}

/// One group of a raw definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDefinition {
    /// Group name. An empty name is a group without a caption.
    pub name: String,
    /// Parameters in declaration order, as `(name, attributes)`.
    pub params: Vec<(String, Value)>,
}

impl Definition {
    /// Create an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, creating its group on first use.
    pub fn push(&mut self, group: &str, name: &str, attributes: Value) -> &mut Self {
        let idx = match self.groups.iter().position(|g| g.name == group) {
            Some(idx) => idx,
            None => {
                self.groups.push(GroupDefinition {
                    name: group.to_string(),
                    params: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        self.groups[idx].params.push((name.to_string(), attributes));
        self
    }

    /// Decode JSON text, keeping order and duplicates.
    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(s).map_err(|e| SchemaError::Decode(e.to_string()))
    }

    /// Decode TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, SchemaError> {
        toml::from_str(s).map_err(|e| SchemaError::Decode(e.to_string()))
    }
}

impl TryFrom<&Value> for Definition {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let groups = as_object(value, "")?;
        let mut def = Definition::new();
        for (group, params) in groups {
            let params = as_object(params, group)?;
            def.groups.push(GroupDefinition {
                name: group.clone(),
                params: params
                    .iter()
                    .map(|(name, attrs)| (name.clone(), attrs.clone()))
                    .collect(),
            });
        }
        Ok(def)
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::Malformed {
        path: path.to_string(),
        expected: "a mapping".to_string(),
    })
}

struct DefinitionVisitor;

impl<'de> Visitor<'de> for DefinitionVisitor {
    type Value = Definition;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of group names to parameter mappings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut groups = Vec::new();
        while let Some((name, params)) = map.next_entry::<String, ParamList>()? {
            groups.push(GroupDefinition {
                name,
                params: params.0,
            });
        }
        Ok(Definition { groups })
    }
}

impl<'de> Deserialize<'de> for Definition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DefinitionVisitor)
    }
}

struct ParamList(Vec<(String, Value)>);

struct ParamListVisitor;

impl<'de> Visitor<'de> for ParamListVisitor {
    type Value = ParamList;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of parameter names to attribute mappings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut params = Vec::new();
        while let Some(entry) = map.next_entry::<String, Value>()? {
            params.push(entry);
        }
        Ok(ParamList(params))
    }
}

impl<'de> Deserialize<'de> for ParamList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ParamListVisitor)
    }
}
