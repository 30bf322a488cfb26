//! Launch descriptions
//!
//! An unevaluated representation of a launch tree. Every value that can depend
//! on arguments is kept as an [`Expr`], and includes keep a reference to their
//! target rather than a copy, so a description can be shared and composed many
//! times under different overrides.

use crate::{condition::Condition, record::OutputMode, substitution::Expr};
use std::{fmt, path::PathBuf, sync::Arc};

/// Identity of a description, used for `$(dirname)` and in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescriptionSource {
    File(PathBuf),
    Named(String),
}

impl fmt::Display for DescriptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionSource::File(path) => write!(f, "{}", path.display()),
            DescriptionSource::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A complete launch description (one file's worth of actions).
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchDescription {
    pub source: DescriptionSource,
    pub actions: Vec<Action>,
}

impl LaunchDescription {
    pub fn new(source: DescriptionSource) -> Self {
        Self {
            source,
            actions: Vec::new(),
        }
    }

    /// An in-memory description with a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DescriptionSource::Named(name.into()))
    }

    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn push(&mut self, action: impl Into<Action>) {
        self.actions.push(action.into());
    }

    /// Argument declarations of this description in source order, including
    /// those nested in groups and conditionals. Included descriptions are not
    /// visited.
    pub fn declared_arguments(&self) -> Vec<&DeclareArgument> {
        let mut result = Vec::new();
        collect_arguments(&self.actions, &mut result);
        result
    }
}

fn collect_arguments<'a>(actions: &'a [Action], out: &mut Vec<&'a DeclareArgument>) {
    for action in actions {
        match action {
            Action::DeclareArgument(arg) => {
                if out.iter().all(|a| a.name != arg.name) {
                    out.push(arg);
                }
            }
            Action::Group(group) => collect_arguments(&group.actions, out),
            Action::Conditional { action, .. } => {
                collect_arguments(std::slice::from_ref(action.as_ref()), out)
            }
            _ => {}
        }
    }
}

/// All launch action types.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `<arg>` / `<declare_argument>`
    DeclareArgument(DeclareArgument),

    /// `<let>`: bind a value in the current scope.
    SetVariable { name: String, value: Expr },

    /// `<push-ros-namespace>`: push until the enclosing group or description ends.
    SetNamespace(Expr),

    /// `<set_env>`
    SetEnv { name: Expr, value: Expr },

    /// `<unset_env>`
    UnsetEnv { name: Expr },

    /// `<set_remap>`: applies to every process started later in the scope.
    SetRemap { from: Expr, to: Expr },

    /// `<node>` / `<executable>`
    StartProcess(StartProcess),

    /// `<include>`
    Include(Include),

    /// `<group>`
    Group(Group),

    /// An action that only runs when its condition holds.
    Conditional {
        condition: Condition,
        action: Box<Action>,
    },
}

impl Action {
    /// Wrap this action in a condition.
    pub fn when(self, condition: Condition) -> Action {
        Action::Conditional {
            condition,
            action: Box::new(self),
        }
    }

    pub fn set_variable(name: impl Into<String>, value: impl Into<Expr>) -> Action {
        Action::SetVariable {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn set_env(name: impl Into<Expr>, value: impl Into<Expr>) -> Action {
        Action::SetEnv {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn set_remap(from: impl Into<Expr>, to: impl Into<Expr>) -> Action {
        Action::SetRemap {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Short name used in debug logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::DeclareArgument(_) => "declare_argument",
            Action::SetVariable { .. } => "let",
            Action::SetNamespace(_) => "push_namespace",
            Action::SetEnv { .. } => "set_env",
            Action::UnsetEnv { .. } => "unset_env",
            Action::SetRemap { .. } => "set_remap",
            Action::StartProcess(_) => "process",
            Action::Include(_) => "include",
            Action::Group(_) => "group",
            Action::Conditional { .. } => "conditional",
        }
    }
}

impl From<DeclareArgument> for Action {
    fn from(arg: DeclareArgument) -> Self {
        Action::DeclareArgument(arg)
    }
}

impl From<StartProcess> for Action {
    fn from(process: StartProcess) -> Self {
        Action::StartProcess(process)
    }
}

impl From<Include> for Action {
    fn from(include: Include) -> Self {
        Action::Include(include)
    }
}

impl From<Group> for Action {
    fn from(group: Group) -> Self {
        Action::Group(group)
    }
}

/// A launch argument declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareArgument {
    pub name: String,
    pub default: Option<Expr>,
    pub description: Option<String>,
    pub choices: Option<Vec<String>>,
}

impl DeclareArgument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            description: None,
            choices: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Expr>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }
}

/// A process to start.
///
/// With a package the executable is looked up through the resource locator and
/// the process gets ROS-style `--ros-args`. Without one, `executable` is the
/// command itself.
#[derive(Debug, Clone, PartialEq)]
pub struct StartProcess {
    pub package: Option<Expr>,
    pub executable: Expr,
    pub name: Option<Expr>,
    pub namespace: Option<Expr>,
    pub arguments: Vec<ProcessArg>,
    pub env: Vec<EnvDecl>,
    pub remaps: Vec<RemapDecl>,
    pub cwd: Option<Expr>,
    pub output: OutputMode,
}

impl StartProcess {
    /// A plain command.
    pub fn command(executable: impl Into<Expr>) -> Self {
        Self {
            package: None,
            executable: executable.into(),
            name: None,
            namespace: None,
            arguments: Vec::new(),
            env: Vec::new(),
            remaps: Vec::new(),
            cwd: None,
            output: OutputMode::default(),
        }
    }

    /// A node from an installed package.
    pub fn node(package: impl Into<Expr>, executable: impl Into<Expr>) -> Self {
        Self {
            package: Some(package.into()),
            ..Self::command(executable)
        }
    }

    pub fn with_name(mut self, name: impl Into<Expr>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<Expr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn arg(mut self, value: impl Into<Expr>) -> Self {
        self.arguments.push(ProcessArg {
            value: value.into(),
            condition: None,
        });
        self
    }

    /// An argument token kept only while `condition` holds.
    pub fn arg_when(mut self, value: impl Into<Expr>, condition: Condition) -> Self {
        self.arguments.push(ProcessArg {
            value: value.into(),
            condition: Some(condition),
        });
        self
    }

    pub fn env(mut self, name: impl Into<Expr>, value: impl Into<Expr>) -> Self {
        self.env.push(EnvDecl {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn remap(mut self, from: impl Into<Expr>, to: impl Into<Expr>) -> Self {
        self.remaps.push(RemapDecl {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<Expr>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

/// One command-line token of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessArg {
    pub value: Expr,
    pub condition: Option<Condition>,
}

/// Inclusion of another description.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub source: IncludeSource,
    pub launch_arguments: Vec<IncludeArg>,
}

impl Include {
    /// Include a launch file; the path resolves at composition time.
    pub fn file(path: impl Into<Expr>) -> Self {
        Self {
            source: IncludeSource::Path(path.into()),
            launch_arguments: Vec::new(),
        }
    }

    pub fn description(description: Arc<LaunchDescription>) -> Self {
        Self {
            source: IncludeSource::Description(description),
            launch_arguments: Vec::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.launch_arguments.push(IncludeArg {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncludeSource {
    /// Path to a launch file, loaded through a frontend.
    Path(Expr),
    /// A description built in memory.
    Description(Arc<LaunchDescription>),
}

/// An argument passed to an `<include>`.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeArg {
    pub name: String,
    pub value: Expr,
}

/// A scoped block with an optional namespace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub namespace: Option<Expr>,
    pub actions: Vec<Action>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<Expr>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }
}

/// A topic remapping declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapDecl {
    pub from: Expr,
    pub to: Expr,
}

/// An environment variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvDecl {
    pub name: Expr,
    pub value: Expr,
}
