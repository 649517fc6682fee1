//! `#include` resolution for WGSL sources.

use std::collections::{HashMap, HashSet};

use crate::error::GraphicsError;

/// Expands `#include "path"` directives against registered sources.
///
/// Each path is expanded at most once per composition; later includes of the
/// same path are dropped.
#[derive(Debug, Clone, Default)]
pub struct ShaderComposer {
    includes: HashMap<String, String>,
}

impl ShaderComposer {
    /// Create a new empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single include source.
    ///
    /// The path is what appears in `#include "path"` directives.
    pub fn register_include(&mut self, path: &str, source: &str) {
        self.includes.insert(path.to_string(), source.to_string());
    }

    /// Number of registered includes.
    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    /// Resolve every `#include` directive in `source`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ShaderCompilationFailed`] if an included path
    /// is not registered.
    pub fn resolve(&self, source: &str) -> Result<String, GraphicsError> {
        if !source.contains("#include") {
            return Ok(source.to_string());
        }
        let mut included = HashSet::new();
        self.resolve_includes(source, &mut included)
    }

    fn resolve_includes(
        &self,
        source: &str,
        included: &mut HashSet<String>,
    ) -> Result<String, GraphicsError> {
        let mut result = String::with_capacity(source.len());

        for line in source.lines() {
            if let Some(path) = parse_include_directive(line.trim()) {
                if !included.insert(path.to_string()) {
                    continue;
                }
                let include_source = self.includes.get(path).ok_or_else(|| {
                    GraphicsError::ShaderCompilationFailed(format!("Include not found: \"{path}\""))
                })?;
                let resolved = self.resolve_includes(include_source, included)?;
                result.push_str(&resolved);
            } else {
                result.push_str(line);
            }
            result.push('\n');
        }

        Ok(result)
    }
}

/// Parse a `#include "path"` or `#include <path>` directive.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?.trim();
    if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')
    } else {
        None
    }
}
