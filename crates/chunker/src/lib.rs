//! Compiled-unit graph: one unit per requested module, addressed by a
//! content-independent hash of its id.

use offmain_core::{CompiledUnit, ModuleId, PlaceholderToken};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unit `{0}` was never requested")]
    UnknownUnit(ModuleId),
    #[error("unit `{0}` cannot depend on itself")]
    SelfDependency(ModuleId),
}

/// Generate a unit hash from its module ids
pub fn generate_chunk_id(modules: &[&ModuleId]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    modules.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// `./<stem>-<hash>.js`
pub fn unit_file_name(id: &ModuleId) -> String {
    let stem = Path::new(id.as_str())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("unit");
    let hash = generate_chunk_id(&[id]);
    format!("./{}-{}.js", stem, &hash[..8])
}

#[derive(Clone, Debug, Default)]
pub struct UnitGraph {
    units: Vec<CompiledUnit>,
    index: HashMap<ModuleId, usize>,
}

impl UnitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` a unit. Requesting the same id again returns the same token;
    /// the flag is `true` only for the first request.
    pub fn request(&mut self, id: &ModuleId) -> (PlaceholderToken, bool) {
        if let Some(&slot) = self.index.get(id) {
            return (token_for(slot), false);
        }
        let slot = self.units.len();
        self.units.push(CompiledUnit::new(id.clone()));
        self.index.insert(id.clone(), slot);
        tracing::debug!("new unit {} ({})", id, token_for(slot));
        (token_for(slot), true)
    }

    pub fn mark_entry(&mut self, id: &ModuleId) -> PlaceholderToken {
        let (token, _) = self.request(id);
        self.units[token.0 as usize].is_entry = true;
        token
    }

    pub fn add_dependency(&mut self, from: &ModuleId, to: &ModuleId) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfDependency(from.clone()));
        }
        if !self.index.contains_key(to) {
            return Err(GraphError::UnknownUnit(to.clone()));
        }
        let unit = self.get_mut(from)?;
        unit.add_dependency(to.clone());
        Ok(())
    }

    pub fn set_body(&mut self, id: &ModuleId, body: String) -> Result<(), GraphError> {
        self.get_mut(id)?.body = body;
        Ok(())
    }

    /// Give every unit its final address. Call once the graph is complete.
    pub fn assign_addresses(&mut self) {
        for unit in &mut self.units {
            if unit.final_address.is_none() {
                unit.final_address = Some(unit_file_name(&unit.id));
            }
        }
    }

    pub fn get(&self, id: &ModuleId) -> Option<&CompiledUnit> {
        self.index.get(id).map(|&slot| &self.units[slot])
    }

    fn get_mut(&mut self, id: &ModuleId) -> Result<&mut CompiledUnit, GraphError> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| GraphError::UnknownUnit(id.clone()))?;
        Ok(&mut self.units[slot])
    }

    pub fn token_of(&self, id: &ModuleId) -> Option<PlaceholderToken> {
        self.index.get(id).map(|&slot| token_for(slot))
    }

    pub fn unit_for_token(&self, token: PlaceholderToken) -> Option<&ModuleId> {
        self.units.get(token.0 as usize).map(|unit| &unit.id)
    }

    pub fn final_address_of(&self, id: &ModuleId) -> Option<String> {
        self.get(id).and_then(|unit| unit.final_address.clone())
    }

    /// Units in request order.
    pub fn units(&self) -> &[CompiledUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn token_for(slot: usize) -> PlaceholderToken {
    PlaceholderToken(slot as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_generation() {
        let a = ModuleId::from("/src/a.js");
        let b = ModuleId::from("/src/b.js");
        let id = generate_chunk_id(&[&a, &b]);
        assert_eq!(id.len(), 16);
        assert_eq!(id, generate_chunk_id(&[&a, &b]));
        assert_ne!(id, generate_chunk_id(&[&b, &a]));
    }

    #[test]
    fn test_unit_file_name() {
        let name = unit_file_name(&ModuleId::from("/src/work.ts"));
        assert!(name.starts_with("./work-"));
        assert!(name.ends_with(".js"));
        assert_eq!(name.len(), "./work-".len() + 8 + ".js".len());
    }

    #[test]
    fn test_same_id_is_one_unit() {
        let mut graph = UnitGraph::new();
        let w = ModuleId::from("/src/w.js");

        let (first, inserted) = graph.request(&w);
        let (second, again) = graph.request(&w);

        assert!(inserted);
        assert!(!again);
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.unit_for_token(first), Some(&w));
    }

    #[test]
    fn test_dependencies_keep_first_seen_order() {
        let mut graph = UnitGraph::new();
        let main = ModuleId::from("/main.js");
        let a = ModuleId::from("/a.js");
        let b = ModuleId::from("/b.js");
        graph.mark_entry(&main);
        graph.request(&a);
        graph.request(&b);

        graph.add_dependency(&main, &b).unwrap();
        graph.add_dependency(&main, &a).unwrap();
        graph.add_dependency(&main, &b).unwrap();

        assert_eq!(graph.get(&main).unwrap().dependency_ids, vec![b.clone(), a.clone()]);
        assert_eq!(graph.add_dependency(&a, &a), Err(GraphError::SelfDependency(a.clone())));
        assert_eq!(
            graph.add_dependency(&a, &ModuleId::from("/nope.js")),
            Err(GraphError::UnknownUnit(ModuleId::from("/nope.js")))
        );
    }

    #[test]
    fn test_addresses_only_after_assignment() {
        let mut graph = UnitGraph::new();
        let main = ModuleId::from("/main.js");
        graph.mark_entry(&main);
        assert_eq!(graph.final_address_of(&main), None);

        graph.assign_addresses();
        let address = graph.final_address_of(&main).unwrap();
        assert!(address.starts_with("./main-"));
        assert!(graph.get(&main).unwrap().is_entry);
    }
}
