//! Composition record data structures

use crate::substitution::Argument;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Root structure for the composition record (`--dry-run` output).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub directives: Vec<ResolvedDirective>,
    /// Every declared argument, in declaration order across all descriptions.
    pub arguments: Vec<Argument>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directives(&self) -> &[ResolvedDirective] {
        &self.directives
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Find a directive by its namespace-qualified name.
    pub fn directive(&self, name: &str) -> Option<&ResolvedDirective> {
        self.directives.iter().find(|d| d.name == name)
    }

    /// Arguments declared by one description.
    pub fn arguments_in<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a Argument> + 'a {
        self.arguments.iter().filter(move |a| a.scope == scope)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A fully resolved process to start. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDirective {
    /// Namespace-qualified logical name, e.g. `/yolo/yolo_node`.
    pub name: String,
    /// Unqualified node name.
    pub node_name: String,
    pub namespace: String,
    pub package: Option<String>,
    /// Resolved executable path.
    pub executable: String,
    /// Argument tokens after condition filtering.
    pub arguments: Vec<String>,
    /// Full argv, executable first.
    pub cmd: Vec<String>,
    pub remaps: Vec<(String, String)>,
    /// Environment overrides applied on top of the supervisor's environment.
    pub env: Vec<(String, String)>,
    /// Variables removed from the child's environment.
    pub env_remove: Vec<String>,
    pub cwd: Option<String>,
    pub output: OutputMode,
    /// Description that started this process.
    pub source: String,
}

/// Where a process's stdout/stderr go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Forward lines to the logger.
    #[default]
    Screen,
    /// Append to `<log_dir>/<name>.log`.
    Log,
    /// Discard.
    Suppressed,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screen" | "both" => Ok(OutputMode::Screen),
            "log" => Ok(OutputMode::Log),
            "suppressed" | "none" => Ok(OutputMode::Suppressed),
            other => Err(format!("unknown output mode '{}'", other)),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputMode::Screen => "screen",
            OutputMode::Log => "log",
            OutputMode::Suppressed => "suppressed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive() -> ResolvedDirective {
        ResolvedDirective {
            name: "/yolo/yolo_node".to_string(),
            node_name: "yolo_node".to_string(),
            namespace: "/yolo".to_string(),
            package: Some("yolo_ros".to_string()),
            executable: "/opt/ros/humble/lib/yolo_ros/yolo_node".to_string(),
            arguments: vec![],
            cmd: vec![
                "/opt/ros/humble/lib/yolo_ros/yolo_node".to_string(),
                "--ros-args".to_string(),
            ],
            remaps: vec![("image_raw".to_string(), "/rgb/image".to_string())],
            env: vec![],
            env_remove: vec![],
            cwd: None,
            output: OutputMode::Screen,
            source: "yolo.launch.xml".to_string(),
        }
    }

    #[test]
    fn test_serialize_empty() {
        let json = Composition::new().to_json().unwrap();
        assert!(json.contains("\"directives\""));
        assert!(json.contains("\"arguments\""));
    }

    #[test]
    fn test_tuple_serialization() {
        let json = serde_json::to_string(&directive()).unwrap();
        // Tuples should serialize as arrays
        assert!(json.contains("[\"image_raw\",\"/rgb/image\"]"));
        assert!(json.contains("\"output\":\"screen\""));
    }

    #[test]
    fn test_directive_lookup() {
        let composition = Composition {
            directives: vec![directive()],
            arguments: vec![],
        };
        assert!(composition.directive("/yolo/yolo_node").is_some());
        assert!(composition.directive("yolo_node").is_none());
    }

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("screen".parse::<OutputMode>(), Ok(OutputMode::Screen));
        assert_eq!("LOG".parse::<OutputMode>(), Ok(OutputMode::Log));
        assert_eq!("none".parse::<OutputMode>(), Ok(OutputMode::Suppressed));
        assert!("terminal".parse::<OutputMode>().is_err());
    }
}
