//! Builds `LaunchDescription`s from format-independent entities.

use super::entity::{Entity, EntityExt};
use crate::{
    condition::Condition,
    description::{
        Action, DeclareArgument, DescriptionSource, EnvDecl, Group, Include, IncludeArg,
        LaunchDescription, ProcessArg, RemapDecl, StartProcess,
    },
    error::{ParseError, Result},
    record::OutputMode,
    substitution::{parser::split_operands, Expr},
};

pub fn build_description<E: Entity>(root: &E, source: DescriptionSource) -> Result<LaunchDescription> {
    let mut description = LaunchDescription::new(source);
    description.actions = build_actions(root)?;
    Ok(description)
}

fn build_actions<E: Entity>(parent: &E) -> Result<Vec<Action>> {
    parent
        .children()?
        .iter()
        .map(|child| build_action(parent.type_name(), child))
        .collect()
}

fn build_action<E: Entity>(parent: &str, entity: &E) -> Result<Action> {
    let action = match entity.type_name() {
        "arg" | "declare_argument" => Action::DeclareArgument(build_declare_argument(entity)?),

        "let" => Action::SetVariable {
            name: entity.require_str("name")?,
            value: entity.require_expr("value")?,
        },

        "push-ros-namespace" | "push_ros_namespace" | "set_namespace" => {
            Action::SetNamespace(entity.require_expr("namespace")?)
        }

        "set_env" => Action::SetEnv {
            name: entity.require_expr("name")?,
            value: entity.require_expr("value")?,
        },

        "unset_env" => Action::UnsetEnv {
            name: entity.require_expr("name")?,
        },

        "set_remap" => Action::SetRemap {
            from: entity.require_expr("from")?,
            to: entity.require_expr("to")?,
        },

        "group" => Action::Group(Group {
            namespace: entity.get_expr_any(&["namespace", "ns"])?,
            actions: build_actions(entity)?,
        }),

        "include" => Action::Include(build_include(entity)?),

        "node" => Action::StartProcess(build_node(entity)?),

        "executable" => Action::StartProcess(build_executable(entity)?),

        other => {
            return Err(ParseError::UnexpectedElement {
                parent: parent.to_string(),
                child: other.to_string(),
            })
        }
    };

    wrap_condition(entity, action)
}

/// Wrap an action in its `if`/`unless` conditions, `if` outermost.
fn wrap_condition<E: Entity>(entity: &E, mut action: Action) -> Result<Action> {
    if let Some(unless) = entity.get_expr("unless", true)? {
        action = action.when(Condition::Unless(unless));
    }
    if let Some(cond) = entity.get_expr("if", true)? {
        action = action.when(Condition::If(cond));
    }
    Ok(action)
}

/// A process argument carries at most one condition.
fn extract_condition<E: Entity>(entity: &E) -> Result<Option<Condition>> {
    match (entity.get_expr("if", true)?, entity.get_expr("unless", true)?) {
        (Some(_), Some(_)) => Err(ParseError::ConflictingAttributes {
            element: entity.type_name().to_string(),
            first: "if",
            second: "unless",
        }),
        (Some(cond), None) => Ok(Some(Condition::If(cond))),
        (None, Some(unless)) => Ok(Some(Condition::Unless(unless))),
        (None, None) => Ok(None),
    }
}

fn build_declare_argument<E: Entity>(entity: &E) -> Result<DeclareArgument> {
    let name = entity.require_str("name")?;
    if name.is_empty() {
        return Err(entity.missing("name"));
    }

    // Parse choices if present (comma-separated string)
    let choices = entity.get_attr_str("choices", true)?.map(|choices| {
        choices
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    Ok(DeclareArgument {
        name,
        default: entity.get_expr("default", true)?,
        description: entity.get_attr_str("description", true)?,
        choices,
    })
}

fn build_include<E: Entity>(entity: &E) -> Result<Include> {
    let mut include = Include::file(entity.require_expr("file")?);
    for child in entity.children()? {
        match child.type_name() {
            "arg" => include.launch_arguments.push(IncludeArg {
                name: child.require_str("name")?,
                value: child.require_expr("value")?,
            }),
            other => {
                return Err(ParseError::UnexpectedElement {
                    parent: "include".to_string(),
                    child: other.to_string(),
                })
            }
        }
    }
    Ok(include)
}

fn build_node<E: Entity>(entity: &E) -> Result<StartProcess> {
    let mut process = StartProcess::node(entity.require_expr("pkg")?, entity.require_expr("exec")?);
    process.name = entity.get_expr("name", true)?;
    process.namespace = entity.get_expr_any(&["namespace", "ns"])?;
    apply_common(entity, &mut process)?;
    Ok(process)
}

fn build_executable<E: Entity>(entity: &E) -> Result<StartProcess> {
    let cmd = entity.require_str("cmd")?;
    let mut tokens = split_operands(&cmd)?.into_iter();
    let executable = tokens.next().ok_or_else(|| entity.missing("cmd"))?;

    let mut process = StartProcess::command(Expr::parse(executable)?);
    for token in tokens {
        process.arguments.push(ProcessArg {
            value: Expr::parse(token)?,
            condition: None,
        });
    }
    process.name = entity.get_expr("name", true)?;
    apply_common(entity, &mut process)?;
    Ok(process)
}

/// Attributes and children shared by `<node>` and `<executable>`.
fn apply_common<E: Entity>(entity: &E, process: &mut StartProcess) -> Result<()> {
    if let Some(args) = entity.get_attr_str("args", true)? {
        for token in split_operands(&args)? {
            process.arguments.push(ProcessArg {
                value: Expr::parse(token)?,
                condition: None,
            });
        }
    }

    process.cwd = entity.get_expr("cwd", true)?;
    if let Some(output) = entity.get_attr::<OutputMode>("output", true)? {
        process.output = output;
    }

    for child in entity.children()? {
        match child.type_name() {
            "arg" => process.arguments.push(ProcessArg {
                value: child.require_expr("value")?,
                condition: extract_condition(&child)?,
            }),
            "remap" => process.remaps.push(RemapDecl {
                from: child.require_expr("from")?,
                to: child.require_expr("to")?,
            }),
            "env" => process.env.push(EnvDecl {
                name: child.require_expr("name")?,
                value: child.require_expr("value")?,
            }),
            other => {
                return Err(ParseError::UnexpectedElement {
                    parent: entity.type_name().to_string(),
                    child: other.to_string(),
                })
            }
        }
    }
    Ok(())
}
