//! Dependency ordering for plan components.
//!
//! Components are placed by repeated greedy passes in declaration order, so the
//! result is fully determined by the input order and the dependency sets.
//! Dependencies that name nothing in the plan are external and never block.

use forge_core::ComponentSpec;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cyclic dependency among components: {}", .unresolved.join(", "))]
    CyclicDependency { unresolved: Vec<String> },
    #[error("duplicate component name '{0}'")]
    DuplicateComponent(String),
}

fn index_names(components: &[ComponentSpec]) -> Result<HashSet<&str>, ResolveError> {
    let mut names = HashSet::with_capacity(components.len());
    for c in components {
        if !names.insert(c.name.as_str()) {
            return Err(ResolveError::DuplicateComponent(c.name.clone()));
        }
    }
    Ok(names)
}

/// Order `components` so that every component follows its internal dependencies.
pub fn resolve(components: &[ComponentSpec]) -> Result<Vec<&ComponentSpec>, ResolveError> {
    let names = index_names(components)?;
    let mut placed: HashSet<&str> = HashSet::with_capacity(components.len());
    let mut order: Vec<&ComponentSpec> = Vec::with_capacity(components.len());
    let mut remaining: Vec<&ComponentSpec> = components.iter().collect();

    let ceiling = 2 * components.len();
    let mut passes = 0;

    while !remaining.is_empty() {
        let before = order.len();
        remaining.retain(|c| {
            let ready = c
                .depends_on
                .iter()
                .all(|d| !names.contains(d.as_str()) || placed.contains(d.as_str()));
            if ready {
                placed.insert(c.name.as_str());
                order.push(*c);
            }
            !ready
        });
        passes += 1;

        if !remaining.is_empty() && (order.len() == before || passes >= ceiling) {
            return Err(ResolveError::CyclicDependency {
                unresolved: remaining.iter().map(|c| c.name.clone()).collect(),
            });
        }
    }

    Ok(order)
}

/// Group the resolved order by dependency depth.
///
/// Layer 0 holds components with no internal dependencies; a component sits one
/// layer above its deepest internal dependency. Within a layer, resolved order
/// is preserved.
pub fn dependency_layers(
    components: &[ComponentSpec],
) -> Result<Vec<Vec<&ComponentSpec>>, ResolveError> {
    let order = resolve(components)?;
    let mut depth: HashMap<&str, usize> = HashMap::with_capacity(order.len());
    let mut layers: Vec<Vec<&ComponentSpec>> = Vec::new();

    for c in order {
        let d = c
            .depends_on
            .iter()
            .filter_map(|dep| depth.get(dep.as_str()))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depth.insert(c.name.as_str(), d);
        if layers.len() <= d {
            layers.resize_with(d + 1, Vec::new);
        }
        layers[d].push(c);
    }

    Ok(layers)
}
