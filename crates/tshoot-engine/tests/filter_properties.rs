use proptest::prelude::*;
use std::collections::BTreeSet;
use tshoot_engine::{extension_slug, ExtensionViewFilter};
use tshoot_test_utils::Harness;

fn extension_path() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[a-e]", "[a-z]{1,4}").prop_map(|(slug, file)| format!("{slug}/{file}.php")),
        "[a-e]\\.php",
    ]
}

proptest! {
    #[test]
    fn prop_inactive_session_is_identity(
        full in proptest::collection::vec(extension_path(), 0..12),
        allowed in proptest::collection::btree_set("[a-e]", 0..5),
    ) {
        let harness = Harness::new();
        let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
        harness.start_session(&allowed);

        // A stranger without the cookie
        let request = tshoot_engine::Request::new("http://example.test/").unwrap();
        let ctx = harness.engine.context(request);

        prop_assert_eq!(ExtensionViewFilter.effective_list(&full, &ctx), full);
    }

    #[test]
    fn prop_active_session_keeps_exactly_allowed_entries(
        full in proptest::collection::vec(extension_path(), 0..12),
        allowed in proptest::collection::btree_set("[a-e](\\.php)?", 0..5),
    ) {
        let harness = Harness::new();
        let allowed_refs: Vec<&str> = allowed.iter().map(String::as_str).collect();
        let secret = harness.start_session(&allowed_refs);
        let ctx = harness.engine.context(harness.request("http://example.test/", &secret));

        let expected: Vec<String> = full
            .iter()
            .filter(|path| allowed.contains(extension_slug(path)))
            .cloned()
            .collect();
        let effective = ExtensionViewFilter.effective_list(&full, &ctx);

        prop_assert_eq!(&effective, &expected);

        // Subsequence of the input: nothing added, order kept
        let mut rest = full.iter();
        for entry in &effective {
            prop_assert!(rest.any(|candidate| candidate == entry));
        }
        let slugs: BTreeSet<&str> = effective.iter().map(|p| extension_slug(p)).collect();
        prop_assert!(slugs.iter().all(|slug| allowed.contains(*slug)));
    }
}

#[test]
fn test_scenario_inactive_list_unchanged() {
    let harness = Harness::new();
    let ctx = harness
        .engine
        .context(tshoot_engine::Request::new("http://example.test/").unwrap());
    let full = vec!["a/a.php".to_string(), "b/b.php".to_string()];

    assert_eq!(ExtensionViewFilter.effective_list(&full, &ctx), full);
}

#[test]
fn test_scenario_active_allow_list() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);
    let ctx = harness
        .engine
        .context(harness.request("http://example.test/", &secret));
    let full = vec!["a/a.php".to_string(), "b/b.php".to_string()];

    assert_eq!(
        ExtensionViewFilter.effective_list(&full, &ctx),
        vec!["a/a.php".to_string()]
    );
}

#[test]
fn test_effective_extensions_reads_real_registry() {
    let harness = Harness::new();
    let secret = harness.start_session(&["b", "hello.php"]);
    let ctx = harness
        .engine
        .context(harness.request("http://example.test/", &secret));

    assert_eq!(
        harness.engine.effective_extensions(&ctx),
        vec!["b/b.php".to_string(), "hello.php".to_string()]
    );
}
