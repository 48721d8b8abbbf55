//! Seeding the evaluation environment from a persisted store.

use std::collections::{HashMap, HashSet};

use varstore_expr::Declaration;
use varstore_types::{Param, VariableStore};

/// Initial declarations and context for a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seed {
    pub declarations: Vec<Declaration>,
    pub context: HashMap<String, String>,
}

/// Declare every store binding not shadowed by a requested parameter.
///
/// A binding whose name matches any parameter is masked: it is neither
/// declared nor placed in the context, so the parameter can only see the value
/// it computes itself. When a store repeats a name, the first binding wins.
pub fn build_environment(store: Option<&VariableStore>, params: &[Param]) -> Seed {
    let Some(store) = store else {
        return Seed::default();
    };

    let masked: HashSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let mut seed = Seed::default();

    for binding in &store.spec.vars {
        if masked.contains(binding.name.as_str()) || seed.context.contains_key(&binding.name) {
            continue;
        }
        seed.declarations.push(Declaration::dyn_var(&binding.name));
        seed.context
            .insert(binding.name.clone(), binding.value.clone());
    }

    tracing::debug!(
        store = %store.metadata.key(),
        declared = seed.declarations.len(),
        masked = store.spec.vars.len() - seed.declarations.len(),
        "Environment seeded"
    );
    seed
}
