//! Command-line and directive generation

use crate::{
    composer::namespace::{apply_namespace_prefix, qualify_name},
    description::StartProcess,
    error::ComposeError,
    record::types::ResolvedDirective,
    substitution::LaunchContext,
};
use indexmap::IndexMap;
use std::path::Path;

pub struct CommandGenerator;

impl CommandGenerator {
    /// Resolve a process declaration against the current scope.
    pub fn generate_directive(
        process: &StartProcess,
        context: &LaunchContext,
    ) -> Result<ResolvedDirective, ComposeError> {
        let package = process
            .package
            .as_ref()
            .map(|p| p.resolve_scoped(context))
            .transpose()?;
        let executable = process.executable.resolve_scoped(context)?;
        let exec_path = Self::resolve_executable_path(package.as_deref(), &executable, context)?;

        let node_name = match &process.name {
            Some(name) => name.resolve_scoped(context)?,
            None => default_node_name(&executable),
        };

        let namespace = match &process.namespace {
            Some(ns) => {
                let ns = ns.resolve_scoped(context)?;
                apply_namespace_prefix(&context.current_namespace(), &ns)
            }
            None => context.current_namespace(),
        };

        let mut arguments = Vec::with_capacity(process.arguments.len());
        for arg in &process.arguments {
            if let Some(condition) = &arg.condition {
                if !condition.evaluate(context)? {
                    log::debug!("Dropping argument '{}' ({})", arg.value, condition);
                    continue;
                }
            }
            arguments.push(arg.value.resolve_scoped(context)?);
        }

        // Scope remappings apply first so the node's own remaps take precedence.
        let mut remaps: Vec<(String, String)> = context.remappings().to_vec();
        for remap in &process.remaps {
            let from = remap.from.resolve_scoped(context)?;
            let to = remap.to.resolve_scoped(context)?;
            remaps.push((from, to));
        }

        // Merge scope environment with process-specific environment
        // Process-specific environment takes precedence
        let mut env: IndexMap<String, String> = context
            .environment_overrides()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for decl in &process.env {
            let name = decl.name.resolve_scoped(context)?;
            let value = decl.value.resolve_scoped(context)?;
            env.insert(name, value);
        }
        let env_remove: Vec<String> = context
            .environment_removals()
            .filter(|name| !env.contains_key(*name))
            .map(|name| name.to_string())
            .collect();

        let cwd = process
            .cwd
            .as_ref()
            .map(|c| c.resolve_scoped(context))
            .transpose()?;

        let cmd = Self::generate_command(
            &exec_path,
            &arguments,
            package.is_some(),
            &node_name,
            &namespace,
            &remaps,
        );

        Ok(ResolvedDirective {
            name: qualify_name(&namespace, &node_name),
            node_name,
            namespace,
            package,
            executable: exec_path,
            arguments,
            cmd,
            remaps,
            env: env.into_iter().collect(),
            env_remove,
            cwd,
            output: process.output,
            source: context.scope().to_string(),
        })
    }

    /// Build the argv. Nodes get `--ros-args` with name, namespace and
    /// remappings after the user arguments.
    pub fn generate_command(
        exec_path: &str,
        arguments: &[String],
        ros_node: bool,
        node_name: &str,
        namespace: &str,
        remaps: &[(String, String)],
    ) -> Vec<String> {
        let mut cmd = Vec::with_capacity(arguments.len() + 6 + remaps.len() * 2);

        // 1. Executable path
        cmd.push(exec_path.to_string());

        // 2. User arguments
        cmd.extend(arguments.iter().cloned());

        if !ros_node {
            return cmd;
        }

        // 3. ROS args delimiter
        cmd.push("--ros-args".to_string());

        // 4. Node name
        cmd.push("-r".to_string());
        cmd.push(format!("__node:={}", node_name));

        // 5. Namespace
        cmd.push("-r".to_string());
        cmd.push(format!("__ns:={}", namespace));

        // 6. Remappings
        for (from, to) in remaps {
            cmd.push("-r".to_string());
            cmd.push(format!("{}:={}", from, to));
        }

        cmd
    }

    fn resolve_executable_path(
        package: Option<&str>,
        executable: &str,
        context: &LaunchContext,
    ) -> Result<String, ComposeError> {
        let Some(package) = package else {
            return Ok(executable.to_string());
        };

        context
            .locator()
            .find_executable(package, executable)
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| ComposeError::ResourceNotFound {
                resource: format!("package '{}'", package),
                scope: context.scope().to_string(),
            })
    }
}

fn default_node_name(executable: &str) -> String {
    Path::new(executable)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(executable)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        condition::Condition,
        locator::PackageMap,
        substitution::Expr,
    };
    use std::sync::Arc;

    fn context() -> LaunchContext {
        LaunchContext::with_locator(Arc::new(
            PackageMap::new().with_package("demo_nodes_cpp", "/opt/ros/humble"),
        ))
    }

    #[test]
    fn test_generate_node_command() {
        let mut ctx = context();
        ctx.push_namespace("robot".to_string());
        let process = StartProcess::node("demo_nodes_cpp", "talker")
            .with_name("my_talker")
            .arg("--verbose")
            .remap("chatter", "/chat");

        let directive = CommandGenerator::generate_directive(&process, &ctx).unwrap();
        assert_eq!(directive.name, "/robot/my_talker");
        assert_eq!(directive.namespace, "/robot");
        assert_eq!(
            directive.cmd,
            vec![
                "/opt/ros/humble/lib/demo_nodes_cpp/talker",
                "--verbose",
                "--ros-args",
                "-r",
                "__node:=my_talker",
                "-r",
                "__ns:=/robot",
                "-r",
                "chatter:=/chat",
            ]
        );
    }

    #[test]
    fn test_plain_command_has_no_ros_args() {
        let ctx = context();
        let process = StartProcess::command("/bin/echo").arg("hello");
        let directive = CommandGenerator::generate_directive(&process, &ctx).unwrap();
        assert_eq!(directive.cmd, vec!["/bin/echo", "hello"]);
        assert_eq!(directive.node_name, "echo");
        assert_eq!(directive.name, "/echo");
        assert!(directive.package.is_none());
    }

    #[test]
    fn test_conditional_arguments_dropped() {
        let mut ctx = context();
        ctx.set_configuration("use_config".to_string(), "false".to_string());
        let process = StartProcess::command("viewer")
            .arg_when("-d", Condition::If(Expr::var("use_config")))
            .arg("--fullscreen");
        let directive = CommandGenerator::generate_directive(&process, &ctx).unwrap();
        assert_eq!(directive.arguments, vec!["--fullscreen"]);
    }

    #[test]
    fn test_environment_merge() {
        let mut ctx = context();
        ctx.set_env("ROS_DOMAIN_ID".to_string(), "7".to_string());
        ctx.set_env("DISPLAY".to_string(), ":0".to_string());
        ctx.unset_env("HTTP_PROXY".to_string());
        ctx.unset_env("LANG".to_string());
        let process = StartProcess::command("viewer")
            .env("DISPLAY", ":1")
            .env("LANG", "C");
        let directive = CommandGenerator::generate_directive(&process, &ctx).unwrap();
        assert_eq!(
            directive.env,
            vec![
                ("ROS_DOMAIN_ID".to_string(), "7".to_string()),
                ("DISPLAY".to_string(), ":1".to_string()),
                ("LANG".to_string(), "C".to_string()),
            ]
        );
        assert_eq!(directive.env_remove, vec!["HTTP_PROXY".to_string()]);
    }

    #[test]
    fn test_cwd_resolves_in_scope() {
        let mut ctx = context();
        ctx.set_configuration("workspace".to_string(), "/tmp/run".to_string());
        let process = StartProcess::command("recorder").with_cwd(Expr::var("workspace"));
        let directive = CommandGenerator::generate_directive(&process, &ctx).unwrap();
        assert_eq!(directive.cwd.as_deref(), Some("/tmp/run"));

        let directive =
            CommandGenerator::generate_directive(&StartProcess::command("recorder"), &ctx).unwrap();
        assert!(directive.cwd.is_none());
    }

    #[test]
    fn test_missing_package_is_resource_not_found() {
        let ctx = context();
        let process = StartProcess::node("not_installed", "node");
        let err = CommandGenerator::generate_directive(&process, &ctx).unwrap_err();
        assert!(
            matches!(err, ComposeError::ResourceNotFound { ref resource, .. } if resource.contains("not_installed"))
        );
    }
}
