//! Namespace joining for process names

/// Apply a namespace prefix to a path (handles both absolute and relative namespaces).
///
/// Namespaces concatenate: an absolute path is still placed under the prefix
/// unless it already lives there.
pub(crate) fn apply_namespace_prefix(prefix: &str, path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() || path == "/" {
        return prefix.to_string();
    }

    if prefix == "/" || prefix.is_empty() {
        return if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
    }

    // Already under the prefix
    if path == prefix || path.starts_with(&format!("{}/", prefix)) {
        return path.to_string();
    }

    let relative = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", prefix.trim_end_matches('/'), relative)
}

/// Fully qualified name of a node in a namespace.
pub(crate) fn qualify_name(namespace: &str, name: &str) -> String {
    if name.starts_with('/') {
        return name.to_string();
    }
    if namespace == "/" || namespace.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", namespace.trim_end_matches('/'), name)
    }
}
