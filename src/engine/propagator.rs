// src/engine/propagator.rs

use std::collections::HashSet;

use crate::engine::config::AdaptiveConfig;
use crate::models::{level::LevelState, section::SectionKind};
use crate::store::TestStore;

/// Cascades a level change across the parallel dependents of `source`.
///
/// Depth-first over the configured dependency edges. A dependent that has
/// not served a question yet gets its stored level overwritten with
/// `shift_by(source, offset)`; a dependent already in play keeps its own
/// trajectory, but traversal continues from the level it would have
/// received so that sections further downstream still derive from a
/// consistent chain.
///
/// Best-effort by design: a store failure is logged and stops the
/// remaining cascade without failing the answer submission that triggered
/// it. The next level change re-derives the chain.
pub async fn propagate(
    store: &dyn TestStore,
    test_id: i64,
    source: SectionKind,
    source_state: LevelState,
    cfg: &AdaptiveConfig,
) {
    let mut visited: HashSet<SectionKind> = HashSet::from([source]);
    let mut stack: Vec<(SectionKind, LevelState)> = vec![(source, source_state)];

    while let Some((kind, state)) = stack.pop() {
        let Some(edges) = cfg.dependents.get(&kind) else {
            continue;
        };
        for (dependent, offset) in edges {
            if !visited.insert(*dependent) {
                continue;
            }
            let derived = state.shift_by(*offset);

            match store.get_section(test_id, *dependent).await {
                Ok(Some(mut row)) => {
                    if !row.has_started() {
                        row.level = derived;
                        if let Err(e) = store.put_section(&row).await {
                            tracing::warn!(
                                "propagation aborted: failed to update section {}/{}: {}",
                                test_id,
                                dependent,
                                e
                            );
                            return;
                        }
                    }
                }
                // Sections are created lazily; nothing to overwrite yet.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "propagation aborted: failed to read section {}/{}: {}",
                        test_id,
                        dependent,
                        e
                    );
                    return;
                }
            }

            // Continue from the derived state even when the dependent kept
            // its own level, so downstream sections stay in sync with the
            // section that drove the adaptation.
            stack.push((*dependent, derived));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::section::SectionRow;
    use crate::store::memory::MemoryStore;

    async fn seed_sections(store: &MemoryStore, test_id: i64, level: &str) {
        for kind in SectionKind::ALL {
            store
                .insert_section(&SectionRow::seeded(test_id, kind, level.parse().unwrap()))
                .await
                .unwrap();
        }
    }

    fn chain_config() -> AdaptiveConfig {
        // reading -> grammar (0) -> listening (-1) -> dialog (0)
        let mut cfg = AdaptiveConfig::default();
        cfg.dependents.clear();
        cfg.dependents
            .insert(SectionKind::Reading, vec![(SectionKind::Grammar, 0)]);
        cfg.dependents
            .insert(SectionKind::Grammar, vec![(SectionKind::Listening, -1)]);
        cfg.dependents
            .insert(SectionKind::Listening, vec![(SectionKind::Dialog, 0)]);
        cfg
    }

    async fn level_of(store: &MemoryStore, kind: SectionKind) -> String {
        store
            .get_section(1, kind)
            .await
            .unwrap()
            .unwrap()
            .level
            .to_string()
    }

    #[tokio::test]
    async fn cascades_transitively_through_unstarted_sections() {
        let store = MemoryStore::new();
        seed_sections(&store, 1, "2.1").await;
        let cfg = chain_config();

        propagate(&store, 1, SectionKind::Reading, "2.3".parse().unwrap(), &cfg).await;

        assert_eq!(level_of(&store, SectionKind::Grammar).await, "2.3");
        assert_eq!(level_of(&store, SectionKind::Listening).await, "2.2");
        assert_eq!(level_of(&store, SectionKind::Dialog).await, "2.2");
    }

    #[tokio::test]
    async fn never_overwrites_a_started_section() {
        let store = MemoryStore::new();
        seed_sections(&store, 1, "2.1").await;
        let cfg = chain_config();

        let mut grammar = store
            .get_section(1, SectionKind::Grammar)
            .await
            .unwrap()
            .unwrap();
        grammar.questions_served = 4;
        store.put_section(&grammar).await.unwrap();

        propagate(&store, 1, SectionKind::Reading, "3.1".parse().unwrap(), &cfg).await;

        // Grammar keeps its own trajectory...
        assert_eq!(level_of(&store, SectionKind::Grammar).await, "2.1");
        // ...but downstream sections still derive from the virtual chain
        // (3.1 through grammar's +0, then -1 into listening).
        assert_eq!(level_of(&store, SectionKind::Listening).await, "2.3");
        assert_eq!(level_of(&store, SectionKind::Dialog).await, "2.3");
    }

    #[tokio::test]
    async fn store_failure_stops_the_cascade_without_erroring() {
        let store = MemoryStore::new();
        seed_sections(&store, 1, "2.1").await;
        let cfg = chain_config();

        *store.fail_put_section.lock().unwrap() = Some(SectionKind::Listening);

        propagate(&store, 1, SectionKind::Reading, "2.3".parse().unwrap(), &cfg).await;

        // Grammar was written before the failure; the rest kept their seeds.
        assert_eq!(level_of(&store, SectionKind::Grammar).await, "2.3");
        assert_eq!(level_of(&store, SectionKind::Listening).await, "2.1");
        assert_eq!(level_of(&store, SectionKind::Dialog).await, "2.1");
    }

    #[tokio::test]
    async fn cyclic_dependency_configuration_terminates() {
        let store = MemoryStore::new();
        seed_sections(&store, 1, "2.1").await;
        let mut cfg = AdaptiveConfig::default();
        cfg.dependents.clear();
        cfg.dependents
            .insert(SectionKind::Reading, vec![(SectionKind::Grammar, 1)]);
        cfg.dependents
            .insert(SectionKind::Grammar, vec![(SectionKind::Reading, 1)]);

        propagate(&store, 1, SectionKind::Reading, "2.2".parse().unwrap(), &cfg).await;

        assert_eq!(level_of(&store, SectionKind::Grammar).await, "2.3");
        // The cycle back into the source is not followed.
        assert_eq!(level_of(&store, SectionKind::Reading).await, "2.1");
    }

    #[tokio::test]
    async fn missing_dependent_rows_are_skipped() {
        let store = MemoryStore::new();
        // Only the source exists; dependents have not been created yet.
        store
            .insert_section(&SectionRow::seeded(1, SectionKind::Reading, "2.1".parse().unwrap()))
            .await
            .unwrap();
        let cfg = chain_config();

        propagate(&store, 1, SectionKind::Reading, "2.3".parse().unwrap(), &cfg).await;

        assert!(
            store
                .get_section(1, SectionKind::Grammar)
                .await
                .unwrap()
                .is_none()
        );
    }
}
