use mur_patterns::PatternError;
use mur_patterns::SearchOptions;
use mur_patterns::factory::Backend;
use mur_patterns::factory::StoreConfig;
use mur_patterns::factory::open_store;
use mur_patterns::search::search;
use mur_patterns::store::PatternStore;
use mur_patterns::types::InferredTag;
use mur_patterns::types::Pattern;
use pretty_assertions::assert_eq;

fn backends() -> Vec<Backend> {
    #[cfg(feature = "sqlite")]
    {
        vec![Backend::Yaml, Backend::Sqlite]
    }
    #[cfg(not(feature = "sqlite"))]
    {
        vec![Backend::Yaml]
    }
}

fn seed(store: &dyn PatternStore) {
    let mut go = Pattern::new("go-error-handling", "Wrap with %w and return early.");
    go.description = "handle errors idiomatically".into();
    go.tags.confirmed = vec!["go".into(), "error".into()];
    store.add(go).unwrap();

    let mut rust = Pattern::new("rust-result", "Prefer ? over match on every error.");
    rust.description = "propagate failures".into();
    rust.tags.confirmed = vec!["rust".into()];
    rust.tags.inferred = vec![InferredTag::new("error-handling", 0.3)];
    store.add(rust).unwrap();

    let mut loops = Pattern::new("loop-idioms", "Use iterators instead of index loops.");
    loops.tags.inferred = vec![InferredTag::new("go", 0.9)];
    store.add(loops).unwrap();
}

fn names(results: &[mur_patterns::ScoredPattern]) -> Vec<(&str, u32)> {
    results
        .iter()
        .map(|r| (r.pattern.name.as_str(), r.score))
        .collect()
}

#[test]
fn ranks_by_precision_hierarchy() {
    for be in backends() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&StoreConfig {
            backend: Some(be),
            dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        seed(store.as_ref());

        let opts = SearchOptions::from_terms(&["error"]);
        let results = search(store.as_ref(), &opts).unwrap();
        // rust-result: inferred tag (2) + content (1)
        assert_eq!(names(&results), vec![("go-error-handling", 18), ("rust-result", 3)]);
    }
}

#[test]
fn tag_filter_accepts_confident_inferred_tags() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&StoreConfig {
        backend: Some(Backend::Yaml),
        dir: Some(dir.path().to_path_buf()),
    })
    .unwrap();
    seed(store.as_ref());

    let opts = SearchOptions {
        tag: Some("go".into()),
        ..Default::default()
    };
    let results = search(store.as_ref(), &opts).unwrap();
    assert_eq!(names(&results), vec![("go-error-handling", 6), ("loop-idioms", 6)]);

    let opts = SearchOptions {
        domain: Some("go".into()),
        ..Default::default()
    };
    let results = search(store.as_ref(), &opts).unwrap();
    assert_eq!(names(&results), vec![("go-error-handling", 6)]);
}

#[test]
fn repeated_searches_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&StoreConfig {
        backend: Some(Backend::Yaml),
        dir: Some(dir.path().to_path_buf()),
    })
    .unwrap();
    seed(store.as_ref());
    let opts = SearchOptions::from_terms(&["o"]);
    let first = search(store.as_ref(), &opts).unwrap();
    for _ in 0..5 {
        assert_eq!(search(store.as_ref(), &opts).unwrap(), first);
    }
}

#[cfg(unix)]
#[test]
fn unreadable_store_is_unavailable() {
    // A file where the pattern directory should be.
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("patterns");
    std::fs::write(&not_a_dir, "").unwrap();
    let store = open_store(&StoreConfig {
        backend: Some(Backend::Yaml),
        dir: Some(not_a_dir),
    })
    .unwrap();
    let err = search(store.as_ref(), &SearchOptions::from_terms(&["x"])).unwrap_err();
    assert!(matches!(err, PatternError::StoreUnavailable(_)));
}
