//! launch_composer library
//!
//! Declarative launch composition: launch descriptions declare arguments,
//! substitute values lazily, include each other conditionally, and are
//! flattened by the [`Composer`] into [`ResolvedDirective`]s that the
//! [`Supervisor`] starts and stops.

pub mod composer;
pub mod condition;
pub mod description;
pub mod error;
mod file_cache;
pub mod frontend;
pub mod locator;
pub mod record;
pub mod substitution;
pub mod supervisor;

pub use composer::Composer;
pub use condition::Condition;
pub use description::{
    Action, DeclareArgument, DescriptionSource, Group, Include, IncludeSource, LaunchDescription,
    StartProcess,
};
pub use error::{ComposeError, ParseError, SubstitutionError, SupervisorError};
pub use locator::{AmentIndex, PackageMap, ResourceLocator};
pub use record::{Composition, OutputMode, ResolvedDirective};
pub use substitution::{Argument, Expr, LaunchContext, Substitution};
pub use supervisor::{StartFailurePolicy, StartMode, Supervisor, SupervisorConfig};

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Compose a launch file against the ament index from the environment.
pub fn compose_launch_file(
    path: &Path,
    cli_args: HashMap<String, String>,
) -> Result<Composition, ComposeError> {
    Composer::from_env().compose_file(path, cli_args)
}

/// Locate `<share>/<package>/launch/<file>`, falling back to `<share>/<package>/<file>`.
pub fn find_launch_file(
    locator: &dyn ResourceLocator,
    package: &str,
    file: &str,
) -> Result<PathBuf, ComposeError> {
    let share = locator
        .find_package_share(package)
        .ok_or_else(|| ComposeError::ResourceNotFound {
            resource: format!("package '{}'", package),
            scope: "<command line>".to_string(),
        })?;

    [share.join("launch").join(file), share.join(file)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ComposeError::ResourceNotFound {
            resource: format!("launch file '{}' in package '{}'", file, package),
            scope: "<command line>".to_string(),
        })
}
