//! Chain propagation — resolves which connected block (if any) a firing triggers.
//!
//! Every run carries a [`Lineage`]: the blocks already triggered in the same
//! logical chain. A hop back into the lineage, or past the depth limit,
//! breaks the chain instead of looping forever.

use crate::registry::Registry;

/// Blocks triggered so far in one chain, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    names: Vec<String>,
}

impl Lineage {
    /// Lineage of an operator-initiated run.
    pub fn root(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    pub fn extend(&self, name: &str) -> Self {
        let mut names = self.names.clone();
        names.push(name.to_string());
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Outcome of resolving a block's connected successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    /// No connected block configured.
    Unconnected,
    /// Connected name no longer exists in the registry.
    Dangling(String),
    /// Target already triggered earlier in this chain.
    Cycle(String),
    /// Chain reached the configured depth limit.
    TooDeep(String),
    /// Run the target with the extended lineage (skipped if it is already running).
    Run { target: String, lineage: Lineage },
}

/// Decide the next hop after a firing.
pub fn next_hop(
    connected: Option<&str>,
    lineage: &Lineage,
    max_depth: usize,
    registry: &Registry,
) -> Hop {
    let Some(target) = connected.filter(|c| !c.is_empty()) else {
        return Hop::Unconnected;
    };
    if !registry.contains(target) {
        return Hop::Dangling(target.to_string());
    }
    if lineage.contains(target) {
        return Hop::Cycle(target.to_string());
    }
    if lineage.depth() >= max_depth {
        return Hop::TooDeep(target.to_string());
    }
    Hop::Run {
        target: target.to_string(),
        lineage: lineage.extend(target),
    }
}
