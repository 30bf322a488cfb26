//! YAML launch file frontend
//!
//! ```yaml
//! launch:
//!   - arg:
//!       name: model
//!       default: yolo11n.pt
//!   - group:
//!       namespace: perception
//!       children:
//!         - node:
//!             pkg: yolo_ros
//!             exec: yolo_node
//!             remap:
//!               - from: image_raw
//!                 to: /rgb/image
//! ```

use super::{builder::build_description, entity::Entity};
use crate::{
    description::{DescriptionSource, LaunchDescription},
    error::{ParseError, Result},
};
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt;

/// YAML entity: a type name and the mapping (or, for the root, sequence) under it.
#[derive(Debug, Clone)]
pub struct YamlEntity {
    type_name: String,
    value: Value,
}

impl YamlEntity {
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    /// An item of an entity list is a single-key mapping `{ <type>: <body> }`.
    fn from_item(item: &Value, parent: &str) -> Result<Self> {
        match item.as_mapping() {
            Some(map) if map.len() == 1 => {
                let (key, body) = map.iter().next().ok_or_else(|| unexpected(parent, "<empty>"))?;
                let type_name = key.as_str().ok_or_else(|| unexpected(parent, "<non-string key>"))?;
                Ok(Self::new(type_name, body.clone()))
            }
            _ => Err(unexpected(parent, "<non-entity item>")),
        }
    }
}

fn unexpected(parent: &str, child: &str) -> ParseError {
    ParseError::UnexpectedElement {
        parent: parent.to_string(),
        child: child.to_string(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Entity for YamlEntity {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_attr_str(&self, name: &str, optional: bool) -> Result<Option<String>> {
        let value = self.value.as_mapping().and_then(|m| m.get(name));
        match value {
            Some(Value::Null) | None if optional => Ok(None),
            Some(Value::Null) | None => Err(ParseError::MissingAttribute {
                element: self.type_name.clone(),
                attribute: name.to_string(),
            }),
            Some(value) => scalar_to_string(value)
                .map(Some)
                .ok_or_else(|| ParseError::TypeCoercion {
                    attribute: name.to_string(),
                    value: format!("{:?}", value),
                    expected_type: "scalar",
                }),
        }
    }

    fn children(&self) -> Result<Vec<Self>> {
        match &self.value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| Self::from_item(item, &self.type_name))
                .collect(),
            Value::Mapping(map) => {
                let mut children = Vec::new();
                for (key, value) in map {
                    let (Some(key), Value::Sequence(items)) = (key.as_str(), value) else {
                        continue;
                    };
                    if key == "children" {
                        for item in items {
                            children.push(Self::from_item(item, &self.type_name)?);
                        }
                    } else {
                        // `remap:`, `env:`, `arg:` lists on nodes and includes
                        children.extend(items.iter().map(|item| Self::new(key, item.clone())));
                    }
                }
                Ok(children)
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Replays a document against its already-parsed shape, replacing every
/// scalar with the text written in the file. Launch attributes are strings,
/// so `0.50` stays `0.50` and `True` stays `True`.
struct SourceText<'a>(&'a Value);

impl<'de, 'a> DeserializeSeed<'de> for SourceText<'a> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        match self.0 {
            Value::Mapping(shape) => deserializer.deserialize_map(MappingText(shape)),
            Value::Sequence(shape) => deserializer.deserialize_seq(SequenceText(shape)),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                deserializer.deserialize_str(ScalarText)
            }
            Value::Null | Value::Tagged(_) => Value::deserialize(deserializer),
        }
    }
}

struct ScalarText;

impl<'de> Visitor<'de> for ScalarText {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }
}

struct MappingText<'a>(&'a Mapping);

impl<'de, 'a> Visitor<'de> for MappingText<'a> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut out = Mapping::new();
        while let Some(key) = map.next_key::<Value>()? {
            let value = match self.0.get(&key) {
                Some(shape) => map.next_value_seed(SourceText(shape))?,
                None => map.next_value::<Value>()?,
            };
            out.insert(key, value);
        }
        Ok(Value::Mapping(out))
    }
}

struct SequenceText<'a>(&'a [Value]);

impl<'de, 'a> Visitor<'de> for SequenceText<'a> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut out = Vec::with_capacity(self.0.len());
        for shape in self.0 {
            match seq.next_element_seed(SourceText(shape))? {
                Some(item) => out.push(item),
                None => break,
            }
        }
        while let Some(item) = seq.next_element::<Value>()? {
            out.push(item);
        }
        Ok(Value::Sequence(out))
    }
}

/// Parse YAML keeping each scalar as its source text.
fn parse_source_text(content: &str) -> Result<Value> {
    let shape: Value = serde_yaml::from_str(content)?;
    let doc = SourceText(&shape).deserialize(serde_yaml::Deserializer::from_str(content))?;
    Ok(doc)
}

/// Parse a YAML launch document with a top-level `launch:` list.
pub fn parse_yaml_str(content: &str, source: DescriptionSource) -> Result<LaunchDescription> {
    let doc = parse_source_text(content)?;
    let launch = doc
        .get("launch")
        .cloned()
        .ok_or_else(|| unexpected("document", "<missing 'launch' key>"))?;
    let root = YamlEntity::new("launch", launch);
    build_description(&root, source)
}
