//! Writing evaluated results back to the referenced store.

use varstore_types::{Binding, RunResult, VariableStore};

use crate::client::VariableStoreClient;

/// Replace the first binding named `result.name` in place, else append.
pub fn upsert(store: &mut VariableStore, result: &RunResult) {
    match store.position(&result.name) {
        Some(index) => store.spec.vars[index].value = result.value.clone(),
        None => store
            .spec
            .vars
            .push(Binding::new(&result.name, &result.value)),
    }
}

/// Upsert every result into a copy of `store` and persist it with one update.
///
/// `store` is left untouched; on failure nothing has been written.
pub async fn commit(
    client: &dyn VariableStoreClient,
    store: &VariableStore,
    results: &[RunResult],
) -> varstore_types::Result<VariableStore> {
    let mut working = store.clone();
    for result in results {
        upsert(&mut working, result);
    }
    let written = client.update(working).await?;
    tracing::info!(
        store = %written.metadata.key(),
        resource_version = written.metadata.resource_version,
        updated = results.len(),
        "VariableStore updated"
    );
    Ok(written)
}
