//! Package resource lookup
//!
//! Composition never touches the package index directly. It asks a
//! [`ResourceLocator`] carried by the [`LaunchContext`], so embedders and tests
//! can swap in a fixed package map.
//!
//! [`LaunchContext`]: crate::substitution::LaunchContext

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

/// Distributions probed under `/opt/ros` when `ROS_DISTRO` is unset.
const KNOWN_DISTROS: &[&str] = &["jazzy", "iron", "humble", "galactic", "foxy"];

/// Resolves package identifiers to installed locations.
pub trait ResourceLocator: fmt::Debug + Send + Sync {
    /// Install prefix that contains `share/<package>`, or `None` if not installed.
    fn find_package_prefix(&self, package: &str) -> Option<PathBuf>;

    /// `<prefix>/share/<package>`
    fn find_package_share(&self, package: &str) -> Option<PathBuf> {
        self.find_package_prefix(package)
            .map(|prefix| prefix.join("share").join(package))
    }

    /// `<prefix>/lib/<package>/<executable>`. The executable itself is not
    /// checked; a missing binary surfaces when the supervisor spawns it.
    fn find_executable(&self, package: &str, executable: &str) -> Option<PathBuf> {
        self.find_package_prefix(package)
            .map(|prefix| prefix.join("lib").join(package).join(executable))
    }
}

/// Ament-style index over a list of install prefixes.
#[derive(Debug, Clone, Default)]
pub struct AmentIndex {
    prefixes: Vec<PathBuf>,
}

impl AmentIndex {
    pub fn new(prefixes: Vec<PathBuf>) -> Self {
        Self { prefixes }
    }

    /// Prefixes from `AMENT_PREFIX_PATH`, followed by `/opt/ros/$ROS_DISTRO`
    /// (or the known distributions when `ROS_DISTRO` is unset).
    pub fn from_env() -> Self {
        let mut prefixes: Vec<PathBuf> = std::env::var("AMENT_PREFIX_PATH")
            .map(|value| {
                value
                    .split(':')
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        match std::env::var("ROS_DISTRO") {
            Ok(distro) => prefixes.push(PathBuf::from(format!("/opt/ros/{}", distro))),
            Err(_) => prefixes.extend(
                KNOWN_DISTROS
                    .iter()
                    .map(|distro| PathBuf::from(format!("/opt/ros/{}", distro))),
            ),
        }

        log::debug!("Package search prefixes: {:?}", prefixes);
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }
}

impl ResourceLocator for AmentIndex {
    fn find_package_prefix(&self, package: &str) -> Option<PathBuf> {
        self.prefixes
            .iter()
            .find(|prefix| is_package_installed(prefix, package))
            .cloned()
    }
}

fn is_package_installed(prefix: &Path, package: &str) -> bool {
    let marker = prefix
        .join("share/ament_index/resource_index/packages")
        .join(package);
    marker.exists() || prefix.join("share").join(package).is_dir()
}

/// Fixed package → prefix table.
#[derive(Debug, Clone, Default)]
pub struct PackageMap {
    packages: BTreeMap<String, PathBuf>,
}

impl PackageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        self.insert(package, prefix);
        self
    }

    pub fn insert(&mut self, package: impl Into<String>, prefix: impl Into<PathBuf>) {
        self.packages.insert(package.into(), prefix.into());
    }
}

impl ResourceLocator for PackageMap {
    fn find_package_prefix(&self, package: &str) -> Option<PathBuf> {
        self.packages.get(package).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_map_paths() {
        let locator = PackageMap::new().with_package("rviz2", "/opt/ros/humble");
        assert_eq!(
            locator.find_package_share("rviz2"),
            Some(PathBuf::from("/opt/ros/humble/share/rviz2"))
        );
        assert_eq!(
            locator.find_executable("rviz2", "rviz2"),
            Some(PathBuf::from("/opt/ros/humble/lib/rviz2/rviz2"))
        );
        assert!(locator.find_package_share("missing").is_none());
    }

    #[test]
    fn test_ament_index_finds_share_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("share/yolo_ros/rviz")).unwrap();

        let index = AmentIndex::new(vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()]);
        assert_eq!(
            index.find_package_prefix("yolo_ros"),
            Some(dir.path().to_path_buf())
        );
        assert!(index.find_package_prefix("yolo_bringup").is_none());
    }

    #[test]
    fn test_ament_index_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        let markers = dir.path().join("share/ament_index/resource_index/packages");
        std::fs::create_dir_all(&markers).unwrap();
        std::fs::write(markers.join("marker_only"), "").unwrap();

        let index = AmentIndex::new(vec![dir.path().to_path_buf()]);
        assert!(index.find_package_prefix("marker_only").is_some());
    }
}
