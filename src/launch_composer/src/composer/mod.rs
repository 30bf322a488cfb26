//! Composer: walks a `LaunchDescription` tree depth-first, resolves every
//! expression against an explicitly threaded context, and flattens the result
//! into an ordered list of directives.

mod include;
pub(crate) mod namespace;

use crate::{
    description::{Action, DeclareArgument, DescriptionSource, Group, LaunchDescription},
    error::ComposeError,
    frontend,
    locator::{AmentIndex, ResourceLocator},
    record::{CommandGenerator, Composition},
    substitution::{Argument, LaunchContext},
};
use std::{path::Path, sync::Arc};

/// Default bound on include nesting.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Flattens launch descriptions into directives.
#[derive(Debug, Clone)]
pub struct Composer {
    locator: Arc<dyn ResourceLocator>,
    max_include_depth: usize,
}

impl Composer {
    pub fn new(locator: Arc<dyn ResourceLocator>) -> Self {
        Self {
            locator,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// A composer over the ament index from the environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(AmentIndex::from_env()))
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn locator(&self) -> &Arc<dyn ResourceLocator> {
        &self.locator
    }

    /// Compose a description with top-level argument overrides.
    ///
    /// Either every directive resolves or an error is returned; there is no
    /// partial result.
    pub fn compose<I, K, V>(
        &self,
        description: &LaunchDescription,
        overrides: I,
    ) -> Result<Composition, ComposeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut context = LaunchContext::with_locator(Arc::clone(&self.locator));
        for (name, value) in overrides {
            context.set_configuration(name.into(), value.into());
        }

        let mut walker = Walker::new(self);
        walker.enter_description(description)?;
        walker.compose_description(description, &mut context)?;
        walker.leave_description();

        log::debug!(
            "Composed {} directive(s), {} argument(s)",
            walker.output.directives.len(),
            walker.output.arguments.len()
        );
        Ok(walker.output)
    }

    /// Load a launch file through its frontend and compose it.
    pub fn compose_file<I, K, V>(
        &self,
        path: &Path,
        overrides: I,
    ) -> Result<Composition, ComposeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !path.is_file() {
            return Err(ComposeError::ResourceNotFound {
                resource: format!("launch file '{}'", path.display()),
                scope: "<command line>".to_string(),
            });
        }
        let description = frontend::load_description(path).map_err(|source| ComposeError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        self.compose(&description, overrides)
    }
}

/// State of one composition run.
struct Walker<'a> {
    composer: &'a Composer,
    /// Descriptions currently being composed, outermost first.
    include_chain: Vec<include::ChainEntry>,
    output: Composition,
}

impl<'a> Walker<'a> {
    fn new(composer: &'a Composer) -> Self {
        Self {
            composer,
            include_chain: Vec::new(),
            output: Composition::new(),
        }
    }

    fn compose_description(
        &mut self,
        description: &LaunchDescription,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        match &description.source {
            DescriptionSource::File(path) => context.set_current_file(path.clone()),
            DescriptionSource::Named(name) => context.set_scope(name.clone()),
        }

        for action in &description.actions {
            self.compose_action(action, context)?;
        }
        Ok(())
    }

    fn compose_action(
        &mut self,
        action: &Action,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        match action {
            Action::DeclareArgument(arg) => self.declare_argument(arg, context)?,

            Action::SetVariable { name, value } => {
                let resolved = value.resolve_scoped(context)?;
                context.set_configuration(name.clone(), resolved);
            }

            Action::SetNamespace(namespace) => {
                let resolved = namespace.resolve_scoped(context)?;
                context.push_namespace(resolved);
            }

            Action::SetEnv { name, value } => {
                let name = name.resolve_scoped(context)?;
                let value = value.resolve_scoped(context)?;
                context.set_env(name, value);
            }

            Action::UnsetEnv { name } => {
                let name = name.resolve_scoped(context)?;
                context.unset_env(name);
            }

            Action::SetRemap { from, to } => {
                let from = from.resolve_scoped(context)?;
                let to = to.resolve_scoped(context)?;
                context.add_remapping(from, to);
            }

            Action::StartProcess(process) => {
                let directive = CommandGenerator::generate_directive(process, context)?;
                log::debug!("Resolved process {}: {:?}", directive.name, directive.cmd);
                self.output.directives.push(directive);
            }

            Action::Include(include) => self.compose_include(include, context)?,

            Action::Group(group) => self.compose_group(group, context)?,

            Action::Conditional { condition, action } => {
                if condition.evaluate(context)? {
                    self.compose_action(action, context)?;
                } else {
                    log::debug!(
                        "Skipping {} in {}: condition {} is false",
                        action.kind(),
                        context.scope(),
                        condition
                    );
                }
            }
        }

        Ok(())
    }

    fn declare_argument(
        &mut self,
        arg: &DeclareArgument,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        if context.is_declared(&arg.name) {
            log::debug!(
                "Argument '{}' already declared in {}, keeping the first declaration",
                arg.name,
                context.scope()
            );
            return Ok(());
        }

        let value = match context.get_configuration(&arg.name) {
            Some(bound) => Some(bound),
            None => match &arg.default {
                Some(default) => {
                    let resolved = default.resolve_scoped(context)?;
                    context.set_configuration(arg.name.clone(), resolved.clone());
                    Some(resolved)
                }
                None => None,
            },
        };

        // Informational once a value is bound; an unresolvable default is not an error here.
        let default = arg.default.as_ref().and_then(|d| d.resolve(context).ok());

        if let (Some(choices), Some(value)) = (&arg.choices, &value) {
            if !choices.iter().any(|c| c == value) {
                return Err(ComposeError::InvalidChoice {
                    name: arg.name.clone(),
                    value: value.clone(),
                    choices: choices.clone(),
                    scope: context.scope().to_string(),
                });
            }
        }

        let argument = Argument {
            name: arg.name.clone(),
            default,
            description: arg.description.clone(),
            choices: arg.choices.clone(),
            value,
            scope: context.scope().to_string(),
        };
        if context.declare_argument(argument.clone()) {
            self.output.arguments.push(argument);
        }
        Ok(())
    }

    fn compose_group(
        &mut self,
        group: &Group,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        let scope = context.save_scope();
        let result = self.compose_group_body(group, context);
        context.restore_scope(scope);
        result
    }

    fn compose_group_body(
        &mut self,
        group: &Group,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        if let Some(ns_expr) = &group.namespace {
            let ns = ns_expr.resolve_scoped(context)?;
            context.push_namespace(ns);
        }
        group
            .actions
            .iter()
            .try_for_each(|a| self.compose_action(a, context))
    }
}
