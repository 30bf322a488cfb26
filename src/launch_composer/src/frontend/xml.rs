//! XML launch file frontend

use super::{builder::build_description, entity::Entity};
use crate::{
    description::{DescriptionSource, LaunchDescription},
    error::{ParseError, Result},
};

/// XML entity implementation wrapping roxmltree::Node
#[derive(Debug, Clone, Copy)]
pub struct XmlEntity<'a, 'input> {
    node: roxmltree::Node<'a, 'input>,
}

impl<'a, 'input> XmlEntity<'a, 'input> {
    pub fn new(node: roxmltree::Node<'a, 'input>) -> Self {
        Self { node }
    }
}

impl Entity for XmlEntity<'_, '_> {
    fn type_name(&self) -> &str {
        self.node.tag_name().name()
    }

    fn get_attr_str(&self, name: &str, optional: bool) -> Result<Option<String>> {
        match self.node.attribute(name) {
            Some(value) => Ok(Some(value.to_string())),
            None if optional => Ok(None),
            None => Err(ParseError::MissingAttribute {
                element: self.type_name().to_string(),
                attribute: name.to_string(),
            }),
        }
    }

    fn children(&self) -> Result<Vec<Self>> {
        Ok(self
            .node
            .children()
            .filter(|n| n.is_element())
            .map(XmlEntity::new)
            .collect())
    }
}

/// Parse an XML launch document with a `<launch>` root.
pub fn parse_xml_str(content: &str, source: DescriptionSource) -> Result<LaunchDescription> {
    let doc = roxmltree::Document::parse(content)?;
    let root = XmlEntity::new(doc.root_element());
    if root.type_name() != "launch" {
        return Err(ParseError::UnexpectedElement {
            parent: "document".to_string(),
            child: root.type_name().to_string(),
        });
    }
    build_description(&root, source)
}
