//! Launch file frontends
//!
//! Each frontend turns a file into a [`LaunchDescription`] without evaluating
//! anything; values stay as expressions until composition.

pub mod builder;
pub mod entity;
pub mod xml;
pub mod yaml;

pub use entity::{Entity, EntityExt};
pub use xml::{parse_xml_str, XmlEntity};
pub use yaml::{parse_yaml_str, YamlEntity};

use crate::{
    description::{DescriptionSource, LaunchDescription},
    error::{ParseError, Result},
    file_cache::read_file_cached,
};
use std::path::Path;

/// Supported launch file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchFormat {
    Xml,
    Yaml,
}

impl LaunchFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("xml") => Ok(LaunchFormat::Xml),
            Some("yaml") | Some("yml") => Ok(LaunchFormat::Yaml),
            _ => Err(ParseError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load a launch file into a description.
pub fn load_description(path: &Path) -> Result<LaunchDescription> {
    let format = LaunchFormat::from_path(path)?;
    let content = read_file_cached(path)?;
    let source = DescriptionSource::File(path.to_path_buf());

    log::debug!("Loading {:?} launch file: {}", format, path.display());
    match format {
        LaunchFormat::Xml => parse_xml_str(&content, source),
        LaunchFormat::Yaml => parse_yaml_str(&content, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            LaunchFormat::from_path(Path::new("a.launch.xml")).unwrap(),
            LaunchFormat::Xml
        );
        assert_eq!(
            LaunchFormat::from_path(Path::new("a.launch.yml")).unwrap(),
            LaunchFormat::Yaml
        );
        assert!(matches!(
            LaunchFormat::from_path(Path::new("a.launch.py")),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_xml_and_yaml_agree() {
        let mut xml = NamedTempFile::with_suffix(".launch.xml").unwrap();
        xml.write_all(
            br#"<launch>
                <arg name="ns" default="robot"/>
                <group namespace="$(var ns)">
                    <node pkg="demo" exec="talker" name="talker">
                        <remap from="chatter" to="/chat"/>
                    </node>
                </group>
            </launch>"#,
        )
        .unwrap();

        let mut yaml = NamedTempFile::with_suffix(".launch.yaml").unwrap();
        yaml.write_all(
            br#"
launch:
  - arg:
      name: ns
      default: robot
  - group:
      namespace: $(var ns)
      children:
        - node:
            pkg: demo
            exec: talker
            name: talker
            remap:
              - from: chatter
                to: /chat
"#,
        )
        .unwrap();

        let from_xml = load_description(xml.path()).unwrap();
        let from_yaml = load_description(yaml.path()).unwrap();
        assert_eq!(from_xml.actions, from_yaml.actions);
        assert_eq!(from_xml.source, DescriptionSource::File(xml.path().to_path_buf()));
    }
}
