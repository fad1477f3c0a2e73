//! Virtual module id encoding.
//!
//! Public form: `virtual:shadow-cljs/<build>[/<module>]`. The resolved form
//! prefixes a NUL byte so the host never mistakes it for a file path.

use std::fmt;

use crate::config::is_valid_build_id;

pub const VIRTUAL_PREFIX: &str = "virtual:shadow-cljs/";

/// Marker byte in front of resolved ids.
pub const RESOLVED_MARKER: char = '\0';

/// Whether `id` is a public virtual module id.
pub fn is_virtual_module(id: &str) -> bool {
    id.starts_with(VIRTUAL_PREFIX)
}

/// Whether `id` is the resolved form of a virtual module id.
pub fn is_resolved_virtual_module(id: &str) -> bool {
    id.strip_prefix(RESOLVED_MARKER)
        .is_some_and(is_virtual_module)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualModuleId {
    pub build_id: String,
    /// Sub-module; `None` means the build's primary module
    pub module: Option<String>,
}

impl VirtualModuleId {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            module: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Decode a public id.
    ///
    /// Only the two-segment `<build>/<module>` form names a sub-module;
    /// anything after a second `/` is rejected.
    pub fn parse(id: &str) -> Option<Self> {
        let rest = id.strip_prefix(VIRTUAL_PREFIX)?;
        match rest.split_once('/') {
            None if !rest.is_empty() => Some(Self::new(rest)),
            Some((build, module))
                if !build.is_empty() && !module.is_empty() && !module.contains('/') =>
            {
                Some(Self::new(build).with_module(module))
            }
            _ => None,
        }
    }

    /// Decode a resolved (NUL-prefixed) id.
    pub fn parse_resolved(id: &str) -> Option<Self> {
        Self::parse(id.strip_prefix(RESOLVED_MARKER)?)
    }

    /// Resolved form handed back to the host.
    pub fn resolved(&self) -> String {
        format!("{RESOLVED_MARKER}{self}")
    }

    /// Whether the build id could ever be produced by configuration.
    pub fn has_valid_build_id(&self) -> bool {
        is_valid_build_id(&self.build_id)
    }
}

impl fmt::Display for VirtualModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VIRTUAL_PREFIX}{}", self.build_id)?;
        if let Some(module) = &self.module {
            write!(f, "/{module}")?;
        }
        Ok(())
    }
}
