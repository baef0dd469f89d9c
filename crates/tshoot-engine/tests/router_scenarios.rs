use pretty_assertions::assert_eq;
use tshoot_engine::{Action, CookieDirective, Request, RouteOutcome};
use tshoot_store::{keys, KeyValueStore, Overrides, Severity};
use tshoot_test_utils::{Harness, BASE_URL};

fn location(outcome: &RouteOutcome) -> &str {
    match outcome {
        RouteOutcome::Redirect { location, .. } => location,
        other => panic!("expected a redirect, got {other:?}"),
    }
}

#[test]
fn test_enable_extension_rolls_back_on_broken_probe() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);
    let before = harness.store().overrides().unwrap();
    harness.probe.then_broken();

    let action = Action::EnableExtension("c".into());
    let url = format!("{}&plugin_status=all", harness.signed_url(&action, false));
    let outcome = harness.engine.route(harness.request(&url, &secret)).unwrap();

    assert_eq!(
        location(&outcome),
        "http://example.test/wp-admin/plugins.php?plugin_status=all"
    );
    assert_eq!(harness.store().overrides().unwrap(), before);
    assert_eq!(harness.probe.calls(), 1);

    let notices = harness.store().notices().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Warning);
    assert!(notices[0].message.contains("When enabling the extension, c,"));

    // The retry link performs the forced variant
    let retry = notices[0].retry_url.clone().unwrap();
    harness.probe.then_broken();
    let outcome = harness.engine.route(harness.request(&retry, &secret)).unwrap();
    assert!(matches!(outcome, RouteOutcome::Redirect { .. }));
    assert!(harness
        .store()
        .allowed_extensions()
        .unwrap()
        .contains("c"));

    let notices = harness.store().notices().unwrap();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[1].severity, Severity::Info);
    assert_eq!(notices[1].message, "The c extension was forcefully enabled.");
}

#[test]
fn test_healthy_change_commits_quietly() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a", "b"]);

    let action = Action::DisableExtension("b".into());
    let outcome = harness
        .engine
        .route(harness.request(&harness.signed_url(&action, false), &secret))
        .unwrap();

    assert_eq!(location(&outcome), BASE_URL);
    assert_eq!(
        harness.store().overrides().unwrap(),
        Overrides::default().allowing("a")
    );
    assert!(harness.store().notices().unwrap().is_empty());
}

#[test]
fn test_tampered_disable_troubleshooting_prompts() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);
    let before = harness.kv.keys();

    let url = format!(
        "{}?health-check-disable-troubleshooting=1&_wpnonce=deadbeef",
        BASE_URL
    );
    let outcome = harness.engine.route(harness.request(&url, &secret)).unwrap();

    let RouteOutcome::Confirm(prompt) = outcome else {
        panic!("expected a confirmation prompt");
    };
    assert_eq!(prompt.action, "disable-troubleshooting");
    assert!(prompt.payload.is_empty());
    assert_eq!(harness.kv.keys(), before);
    assert!(harness.store().disable_hash().unwrap().is_some());

    // Confirming through the prompt's own link performs the action
    let outcome = harness
        .engine
        .route(harness.request(&prompt.confirm_url, &secret))
        .unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::Redirect {
            location: BASE_URL.to_string(),
            cookie: Some(CookieDirective::Clear {
                name: harness.engine.config().cookie_name.clone()
            }),
        }
    );
    assert_eq!(harness.store().disable_hash().unwrap(), None);
}

#[test]
fn test_prompt_fields_carry_fresh_token() {
    let harness = Harness::new();
    let secret = harness.start_session(&[]);
    let action = Action::ChangeActiveTheme("storefront".into());

    let outcome = harness
        .engine
        .route(harness.request(&harness.unsigned_url(&action), &secret))
        .unwrap();
    let RouteOutcome::Confirm(prompt) = outcome else {
        panic!("expected a confirmation prompt");
    };

    assert_eq!(prompt.payload, vec!["storefront".to_string()]);
    assert!(prompt.details.contains("storefront"));
    let token = prompt
        .fields
        .iter()
        .find(|field| field.name == "_wpnonce")
        .map(|field| field.value.clone());
    assert!(harness
        .engine
        .authorizer()
        .verify(action.name(), &action.payload(), token.as_deref()));
}

#[test]
fn test_cleared_hash_ends_session_for_old_cookie() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);
    assert!(harness
        .engine
        .context(harness.request(BASE_URL, &secret))
        .is_troubleshooting());

    harness.engine.lifecycle().end_session().unwrap();

    let ctx = harness.engine.context(harness.request(BASE_URL, &secret));
    assert!(!ctx.is_troubleshooting());
    assert_eq!(
        harness.engine.effective_extensions(&ctx),
        vec!["a/a.php", "b/b.php", "c/c.php", "hello.php"]
    );
}

#[test]
fn test_actions_ignored_outside_session() {
    let harness = Harness::new();
    harness.start_session(&["a"]);

    let action = Action::EnableExtension("c".into());
    let stranger = Request::new(&harness.signed_url(&action, false)).unwrap();

    assert_eq!(harness.engine.route(stranger).unwrap(), RouteOutcome::Continue);
    assert!(!harness.store().allowed_extensions().unwrap().contains("c"));
    assert_eq!(harness.probe.calls(), 0);
}

#[test]
fn test_replayed_link_prompts_instead_of_acting() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);
    let url = harness.signed_url(&Action::EnableExtension("b".into()), false);

    harness.engine.route(harness.request(&url, &secret)).unwrap();
    harness
        .engine
        .route(harness.request(
            &harness.signed_url(&Action::DisableExtension("b".into()), false),
            &secret,
        ))
        .unwrap();

    let outcome = harness.engine.route(harness.request(&url, &secret)).unwrap();
    assert!(matches!(outcome, RouteOutcome::Confirm(_)));
    assert!(!harness.store().allowed_extensions().unwrap().contains("b"));
}

#[test]
fn test_theme_change_and_rollback() {
    let harness = Harness::new();
    let secret = harness.start_session(&[]);

    let switch = Action::ChangeActiveTheme("storefront".into());
    harness
        .engine
        .route(harness.request(&harness.signed_url(&switch, false), &secret))
        .unwrap();
    assert_eq!(
        harness.store().theme_override().unwrap().as_deref(),
        Some("storefront")
    );

    harness.probe.then_unreachable();
    let broken = Action::ChangeActiveTheme("twentytwentyone".into());
    harness
        .engine
        .route(harness.request(&harness.signed_url(&broken, false), &secret))
        .unwrap();

    assert_eq!(
        harness.store().theme_override().unwrap().as_deref(),
        Some("storefront")
    );
    let notices = harness.store().notices().unwrap();
    assert_eq!(notices.len(), 1);
    assert!(notices[0]
        .retry_url
        .as_deref()
        .unwrap()
        .contains("health-check-theme-force-switch=true"));
}

#[test]
fn test_dismiss_requires_admin_and_redirects_to_dashboard() {
    let harness = Harness::new();
    let secret = harness.start_session(&[]);
    harness.probe.then_broken();
    harness
        .engine
        .route(harness.request(
            &harness.signed_url(&Action::EnableExtension("c".into()), false),
            &secret,
        ))
        .unwrap();
    assert_eq!(harness.store().notices().unwrap().len(), 1);

    let dismiss = harness.signed_url(&Action::DismissNotices, false);
    let front_end = harness.request(&dismiss, &secret);
    assert_eq!(harness.engine.route(front_end).unwrap(), RouteOutcome::Continue);
    assert_eq!(harness.store().notices().unwrap().len(), 1);

    let admin = harness.request(&dismiss, &secret).as_admin();
    let outcome = harness.engine.route(admin).unwrap();
    assert_eq!(location(&outcome), harness.engine.config().admin_url);
    assert!(harness.store().notices().unwrap().is_empty());
}

#[test]
fn test_bulk_troubleshoot_starts_session_with_active_selection() {
    let harness = Harness::new();
    let action = Action::TroubleshootExtensions(vec![
        "a/a.php".into(),
        "inactive/inactive.php".into(),
        "hello.php".into(),
    ]);

    let request = Request::new(&harness.signed_url(&action, false)).unwrap();
    let outcome = harness.engine.route(request).unwrap();

    let RouteOutcome::Redirect {
        cookie: Some(CookieDirective::Set { value, .. }),
        ..
    } = outcome
    else {
        panic!("expected a redirect setting the session cookie");
    };

    let ctx = harness.engine.context(harness.request(BASE_URL, &value));
    assert!(ctx.is_troubleshooting());
    assert_eq!(
        harness.engine.effective_extensions(&ctx),
        vec!["a/a.php", "hello.php"]
    );
    assert_eq!(
        harness.store().backup_extension_list().unwrap().unwrap().len(),
        4
    );
}

#[test]
fn test_bulk_troubleshoot_failure_keeps_selection_disabled() {
    let harness = Harness::new();
    harness.probe.then_broken();
    let action = Action::TroubleshootExtensions(vec!["a/a.php".into()]);

    let request = Request::new(&harness.signed_url(&action, false)).unwrap();
    harness.engine.route(request).unwrap();

    assert!(harness.store().disable_hash().unwrap().is_some());
    assert!(harness.store().allowed_extensions().unwrap().is_empty());
    let notices = harness.store().notices().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].retry_url, None);
}

#[test]
fn test_bulk_enable_and_disable() {
    let harness = Harness::new();
    let secret = harness.start_session(&["a"]);

    let enable = Action::BulkEnableExtensions(vec![
        "b/b.php".into(),
        "c/c.php".into(),
        "inactive/inactive.php".into(),
    ]);
    harness
        .engine
        .route(harness.request(&harness.signed_url(&enable, false), &secret))
        .unwrap();
    assert_eq!(
        harness.store().allowed_extensions().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );

    let disable = Action::BulkDisableExtensions(vec!["a/a.php".into(), "c/c.php".into()]);
    harness
        .engine
        .route(harness.request(&harness.signed_url(&disable, false), &secret))
        .unwrap();
    assert_eq!(
        harness.store().allowed_extensions().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["b"]
    );
}

#[test]
fn test_no_action_continues() {
    let harness = Harness::new();
    let secret = harness.start_session(&[]);

    let outcome = harness
        .engine
        .route(harness.request(BASE_URL, &secret))
        .unwrap();

    assert_eq!(outcome, RouteOutcome::Continue);
    assert_eq!(harness.kv.get(keys::NOTICES).unwrap(), None);
}

#[test]
fn test_outcome_serializes_for_the_http_layer() {
    let outcome = RouteOutcome::Redirect {
        location: BASE_URL.to_string(),
        cookie: None,
    };

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({"outcome": "redirect", "location": BASE_URL})
    );
}
