//! Pass types for graph descriptors.

use std::collections::BTreeSet;
use std::fmt;

use crate::context::CommandContext;
use crate::error::GraphicsError;

use super::{ResourceAccess, ResourceHandle};

/// Callback recording a pass's commands.
///
/// Called once per execution of the compiled graph, with a context bound to
/// the graph's compiled state.
pub type PassCallback =
    Box<dyn FnMut(&mut dyn CommandContext) -> Result<(), GraphicsError> + Send + 'static>;

/// Handle to a pass in a graph builder.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the builder that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle {
    graph: super::GraphId,
    index: u32,
}

impl PassHandle {
    pub(crate) fn new(graph: super::GraphId, index: u32) -> Self {
        Self { graph, index }
    }

    pub(crate) fn graph(self) -> super::GraphId {
        self.graph
    }

    /// Position of the pass in execution order.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// A named unit of work with declared resource accesses.
pub struct Pass {
    name: String,
    callback: PassCallback,
    reads: BTreeSet<ResourceHandle>,
    writes: BTreeSet<ResourceHandle>,
}

impl Pass {
    pub(crate) fn new(name: String, callback: PassCallback) -> Self {
        Self {
            name,
            callback,
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
        }
    }

    /// Get the pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handles the pass reads.
    pub fn reads(&self) -> &BTreeSet<ResourceHandle> {
        &self.reads
    }

    /// Handles the pass writes.
    pub fn writes(&self) -> &BTreeSet<ResourceHandle> {
        &self.writes
    }

    /// Every handle the pass declared, read or written.
    pub fn accessed(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.reads.union(&self.writes)
    }

    /// Whether `handle` was declared with an access covering `access`.
    pub fn allows(&self, handle: ResourceHandle, access: ResourceAccess) -> bool {
        self.access().allows(handle, access)
    }

    pub(crate) fn access(&self) -> PassAccess<'_> {
        PassAccess {
            name: &self.name,
            reads: &self.reads,
            writes: &self.writes,
        }
    }

    pub(crate) fn declare(&mut self, handle: ResourceHandle, access: ResourceAccess) {
        if access.reads() {
            self.reads.insert(handle);
        }
        if access.writes() {
            self.writes.insert(handle);
        }
    }

    /// Borrow the declared accesses and the callback at the same time.
    pub(crate) fn split(&mut self) -> (PassAccess<'_>, &mut PassCallback) {
        let access = PassAccess {
            name: &self.name,
            reads: &self.reads,
            writes: &self.writes,
        };
        (access, &mut self.callback)
    }
}

/// Name and declared accesses of a pass, borrowed while it executes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassAccess<'a> {
    pub(crate) name: &'a str,
    reads: &'a BTreeSet<ResourceHandle>,
    writes: &'a BTreeSet<ResourceHandle>,
}

impl PassAccess<'_> {
    pub(crate) fn allows(&self, handle: ResourceHandle, access: ResourceAccess) -> bool {
        let read_ok =
            !access.reads() || self.reads.contains(&handle) || self.writes.contains(&handle);
        let write_ok = !access.writes() || self.writes.contains(&handle);
        read_ok && write_ok
    }
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}
