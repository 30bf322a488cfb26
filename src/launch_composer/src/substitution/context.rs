//! Launch context for managing configurations
//!
//! A context is threaded explicitly through every resolution call. It is
//! created once per top-level launch and derived once per include boundary
//! with [`LaunchContext::child`].

use crate::locator::{AmentIndex, ResourceLocator};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A declared launch argument as seen by one description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// Resolved default, if the declaration carries one.
    pub default: Option<String>,
    pub description: Option<String>,
    pub choices: Option<Vec<String>>,
    /// Effective value right after declaration (override, earlier binding, or default).
    pub value: Option<String>,
    /// Description that declared the argument.
    pub scope: String,
}

/// Saved scope, restored when a group ends.
#[derive(Debug, Clone)]
pub struct ScopeState {
    configurations: HashMap<String, String>,
    namespace_stack: Vec<String>,
    environment: IndexMap<String, Option<String>>,
    remappings: Vec<(String, String)>,
    declared_count: usize,
}

/// Launch context holding configurations and state
#[derive(Debug, Clone)]
pub struct LaunchContext {
    configurations: HashMap<String, String>,
    declared: IndexMap<String, Argument>,
    namespace_stack: Vec<String>,
    /// `None` marks a variable removed with unset-env.
    environment: IndexMap<String, Option<String>>,
    remappings: Vec<(String, String)>,
    current_file: Option<PathBuf>,
    scope: String,
    locator: Arc<dyn ResourceLocator>,
}

impl LaunchContext {
    pub fn new() -> Self {
        Self::with_locator(Arc::new(AmentIndex::from_env()))
    }

    pub fn with_locator(locator: Arc<dyn ResourceLocator>) -> Self {
        Self {
            configurations: HashMap::new(),
            declared: IndexMap::new(),
            namespace_stack: vec![String::new()],
            environment: IndexMap::new(),
            remappings: Vec::new(),
            current_file: None,
            scope: "<root>".to_string(),
            locator,
        }
    }

    /// Derive the context for an included description.
    ///
    /// The child starts with no argument bindings besides `overrides`; each
    /// included description is its own argument namespace. Namespace,
    /// environment overlay, remappings and locator carry over.
    pub fn child(&self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            configurations: overrides.into_iter().collect(),
            declared: IndexMap::new(),
            namespace_stack: self.namespace_stack.clone(),
            environment: self.environment.clone(),
            remappings: self.remappings.clone(),
            current_file: None,
            scope: self.scope.clone(),
            locator: Arc::clone(&self.locator),
        }
    }

    pub fn locator(&self) -> &dyn ResourceLocator {
        self.locator.as_ref()
    }

    // ========== Scope identity ==========

    /// Name of the description currently being resolved, used in diagnostics.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    pub fn set_current_file(&mut self, path: PathBuf) {
        self.scope = path.display().to_string();
        self.current_file = Some(path);
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn current_dir(&self) -> Option<PathBuf> {
        self.current_file
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn current_filename(&self) -> Option<String> {
        self.current_file
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
    }

    // ========== Launch Configuration Methods ==========

    pub fn set_configuration(&mut self, name: String, value: String) {
        self.configurations.insert(name, value);
    }

    pub fn get_configuration(&self, name: &str) -> Option<String> {
        self.configurations.get(name).cloned()
    }

    pub fn configurations(&self) -> &HashMap<String, String> {
        &self.configurations
    }

    /// Register an argument declaration. The first declaration of a name wins;
    /// returns `false` if the name was already declared in this context.
    pub fn declare_argument(&mut self, argument: Argument) -> bool {
        if self.declared.contains_key(&argument.name) {
            return false;
        }
        self.declared.insert(argument.name.clone(), argument);
        true
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    /// Declared arguments in declaration order.
    pub fn declared_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.declared.values()
    }

    // ========== Namespace Methods ==========

    /// Push a namespace onto the stack
    ///
    /// The namespace is normalized to a leading '/' with no trailing '/', then
    /// concatenated onto the current namespace.
    pub fn push_namespace(&mut self, namespace: String) {
        let trimmed = namespace.trim().trim_end_matches('/');

        if trimmed.is_empty() {
            return;
        }

        let normalized = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };

        self.namespace_stack.push(normalized);
    }

    /// Pop a namespace from the stack
    ///
    /// Returns the popped namespace, or None if we're at the root
    pub fn pop_namespace(&mut self) -> Option<String> {
        if self.namespace_stack.len() > 1 {
            self.namespace_stack.pop()
        } else {
            None
        }
    }

    /// Get the current namespace (concatenation of stack)
    pub fn current_namespace(&self) -> String {
        let result = self.namespace_stack.join("");
        if result.is_empty() {
            "/".to_string()
        } else {
            result
        }
    }

    pub fn namespace_depth(&self) -> usize {
        self.namespace_stack.len()
    }

    // ========== Environment Methods ==========

    /// Get an environment variable, checking the local overlay before the process environment.
    pub fn get_env(&self, name: &str) -> Option<String> {
        match self.environment.get(name) {
            Some(value) => value.clone(),
            None => std::env::var(name).ok(),
        }
    }

    pub fn set_env(&mut self, name: String, value: String) {
        self.environment.insert(name, Some(value));
    }

    pub fn unset_env(&mut self, name: String) {
        self.environment.insert(name, None);
    }

    /// Variables set in this scope, in the order they were first touched.
    pub fn environment_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environment
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    /// Variables removed in this scope.
    pub fn environment_removals(&self) -> impl Iterator<Item = &str> {
        self.environment
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }

    // ========== Remapping Methods ==========

    pub fn add_remapping(&mut self, from: String, to: String) {
        self.remappings.push((from, to));
    }

    pub fn remappings(&self) -> &[(String, String)] {
        &self.remappings
    }

    // ========== Scope save/restore ==========

    pub fn save_scope(&self) -> ScopeState {
        ScopeState {
            configurations: self.configurations.clone(),
            namespace_stack: self.namespace_stack.clone(),
            environment: self.environment.clone(),
            remappings: self.remappings.clone(),
            declared_count: self.declared.len(),
        }
    }

    /// Restore a saved scope. Arguments declared since the save keep their
    /// bindings; everything else set inside the scope is discarded.
    pub fn restore_scope(&mut self, state: ScopeState) {
        let declared_since: Vec<(String, String)> = self
            .declared
            .keys()
            .skip(state.declared_count)
            .filter_map(|name| {
                self.configurations
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        self.configurations = state.configurations;
        self.configurations.extend(declared_since);
        self.namespace_stack = state.namespace_stack;
        self.environment = state.environment;
        self.remappings = state.remappings;
    }
}

impl Default for LaunchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::PackageMap;

    fn context() -> LaunchContext {
        LaunchContext::with_locator(Arc::new(PackageMap::new()))
    }

    fn argument(name: &str, value: &str) -> Argument {
        Argument {
            name: name.to_string(),
            default: Some(value.to_string()),
            description: None,
            choices: None,
            value: Some(value.to_string()),
            scope: "<root>".to_string(),
        }
    }

    #[test]
    fn test_set_and_override_configuration() {
        let mut ctx = context();
        ctx.set_configuration("key".to_string(), "value1".to_string());
        ctx.set_configuration("key".to_string(), "value2".to_string());
        assert_eq!(ctx.get_configuration("key"), Some("value2".to_string()));
        assert!(ctx.get_configuration("other").is_none());
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut ctx = context();
        assert!(ctx.declare_argument(argument("model", "yolo11n.pt")));
        assert!(!ctx.declare_argument(argument("model", "yolo11s.pt")));
        let declared: Vec<_> = ctx.declared_arguments().collect();
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].default.as_deref(), Some("yolo11n.pt"));
    }

    #[test]
    fn test_namespace_stack() {
        let mut ctx = context();
        assert_eq!(ctx.current_namespace(), "/");

        ctx.push_namespace("robot1".to_string());
        ctx.push_namespace("/sensors/".to_string());
        assert_eq!(ctx.current_namespace(), "/robot1/sensors");
        assert_eq!(ctx.namespace_depth(), 3);

        // Empty and "/" are ignored
        ctx.push_namespace("".to_string());
        ctx.push_namespace("/".to_string());
        assert_eq!(ctx.current_namespace(), "/robot1/sensors");

        ctx.pop_namespace();
        assert_eq!(ctx.current_namespace(), "/robot1");
        ctx.pop_namespace();
        assert_eq!(ctx.pop_namespace(), None);
        assert_eq!(ctx.current_namespace(), "/");
    }

    #[test]
    fn test_child_does_not_inherit_bindings() {
        let mut parent = context();
        parent.set_configuration("model".to_string(), "yolo11n.pt".to_string());
        parent.set_configuration("device".to_string(), "cpu".to_string());
        parent.push_namespace("perception".to_string());
        parent.set_env("DISPLAY".to_string(), ":0".to_string());

        let child = parent.child([("model".to_string(), "yolo11n.pt".to_string())]);
        assert_eq!(child.configurations().len(), 1);
        assert_eq!(child.get_configuration("model"), Some("yolo11n.pt".to_string()));
        assert!(child.get_configuration("device").is_none());
        assert_eq!(child.current_namespace(), "/perception");
        assert_eq!(child.get_env("DISPLAY"), Some(":0".to_string()));
    }

    #[test]
    fn test_environment_overlay() {
        let mut ctx = context();
        ctx.set_env("LAUNCH_COMPOSER_A".to_string(), "1".to_string());
        ctx.unset_env("LAUNCH_COMPOSER_B".to_string());
        assert_eq!(ctx.get_env("LAUNCH_COMPOSER_A"), Some("1".to_string()));
        assert_eq!(ctx.get_env("LAUNCH_COMPOSER_B"), None);
        assert_eq!(
            ctx.environment_overrides().collect::<Vec<_>>(),
            vec![("LAUNCH_COMPOSER_A", "1")]
        );
        assert_eq!(
            ctx.environment_removals().collect::<Vec<_>>(),
            vec!["LAUNCH_COMPOSER_B"]
        );
    }

    #[test]
    fn test_scope_restore_keeps_declared_arguments() {
        let mut ctx = context();
        let saved = ctx.save_scope();

        ctx.push_namespace("group".to_string());
        ctx.set_configuration("scoped".to_string(), "x".to_string());
        ctx.declare_argument(argument("declared", "y"));
        ctx.set_configuration("declared".to_string(), "y".to_string());
        ctx.add_remapping("image".to_string(), "/rgb".to_string());

        ctx.restore_scope(saved);
        assert_eq!(ctx.current_namespace(), "/");
        assert!(ctx.get_configuration("scoped").is_none());
        assert_eq!(ctx.get_configuration("declared"), Some("y".to_string()));
        assert!(ctx.remappings().is_empty());
    }

    #[test]
    fn test_current_file_sets_scope() {
        let mut ctx = context();
        assert_eq!(ctx.scope(), "<root>");
        ctx.set_current_file(PathBuf::from("/ws/launch/top.launch.xml"));
        assert_eq!(ctx.scope(), "/ws/launch/top.launch.xml");
        assert_eq!(ctx.current_dir(), Some(PathBuf::from("/ws/launch")));
        assert_eq!(ctx.current_filename(), Some("top.launch.xml".to_string()));
    }
}
