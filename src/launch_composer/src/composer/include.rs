use super::Walker;
use crate::{
    description::{DescriptionSource, Include, IncludeSource, LaunchDescription},
    error::ComposeError,
    frontend,
    substitution::LaunchContext,
};
use std::path::{Path, PathBuf};

/// Identity of a description on the include chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ChainEntry {
    /// Canonicalized launch file path.
    File(PathBuf),
    /// Address of an in-memory description.
    Memory(usize),
}

impl ChainEntry {
    fn of(description: &LaunchDescription) -> Self {
        match &description.source {
            DescriptionSource::File(path) => ChainEntry::File(canonical(path)),
            DescriptionSource::Named(_) => {
                ChainEntry::Memory(description as *const LaunchDescription as usize)
            }
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

impl Walker<'_> {
    /// Push a description onto the include chain, rejecting cycles and
    /// excessive nesting.
    pub(super) fn enter_description(
        &mut self,
        description: &LaunchDescription,
    ) -> Result<(), ComposeError> {
        let entry = ChainEntry::of(description);

        if self.include_chain.contains(&entry) {
            return Err(ComposeError::IncludeCycle {
                path: match entry {
                    ChainEntry::File(path) => path,
                    ChainEntry::Memory(_) => PathBuf::from(description.source.to_string()),
                },
                scope: self.chain_scope(),
            });
        }

        if self.include_chain.len() > self.composer.max_include_depth {
            return Err(ComposeError::IncludeDepthExceeded {
                limit: self.composer.max_include_depth,
                scope: self.chain_scope(),
            });
        }

        self.include_chain.push(entry);
        Ok(())
    }

    pub(super) fn leave_description(&mut self) {
        self.include_chain.pop();
    }

    fn chain_scope(&self) -> String {
        match self.include_chain.last() {
            Some(ChainEntry::File(path)) => path.display().to_string(),
            _ => "<root>".to_string(),
        }
    }

    pub(super) fn compose_include(
        &mut self,
        include: &Include,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        // Forwarded values resolve in the including scope.
        let mut overrides = Vec::with_capacity(include.launch_arguments.len());
        for arg in &include.launch_arguments {
            let value = arg.value.resolve_scoped(context)?;
            log::trace!("Include arg: {} = {}", arg.name, value);
            overrides.push((arg.name.clone(), value));
        }

        let mut include_context = context.child(overrides);

        match &include.source {
            IncludeSource::Path(path_expr) => {
                let path = self.resolve_include_path(&path_expr.resolve_scoped(context)?, context)?;
                log::info!("Including launch file: {}", path.display());
                let description =
                    frontend::load_description(&path).map_err(|source| ComposeError::Load {
                        path: path.clone(),
                        source,
                    })?;
                self.compose_included(&description, &mut include_context)
            }
            IncludeSource::Description(description) => {
                log::info!("Including launch description: {}", description.source);
                self.compose_included(description, &mut include_context)
            }
        }
    }

    fn compose_included(
        &mut self,
        description: &LaunchDescription,
        context: &mut LaunchContext,
    ) -> Result<(), ComposeError> {
        self.enter_description(description)?;
        let result = self.compose_description(description, context);
        self.leave_description();
        result
    }

    /// Resolve relative paths relative to the including launch file.
    fn resolve_include_path(
        &self,
        path: &str,
        context: &LaunchContext,
    ) -> Result<PathBuf, ComposeError> {
        let file_path = Path::new(path);
        let resolved = if file_path.is_relative() {
            match context.current_dir() {
                Some(dir) => dir.join(file_path),
                None => file_path.to_path_buf(),
            }
        } else {
            file_path.to_path_buf()
        };

        if !resolved.is_file() {
            return Err(ComposeError::ResourceNotFound {
                resource: format!("launch file '{}'", resolved.display()),
                scope: context.scope().to_string(),
            });
        }
        Ok(resolved)
    }
}
