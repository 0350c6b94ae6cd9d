//! End-to-end session flows over file-backed stores.

mod common;

use common::Page;
use factorlock_core::{Factor, SequenceEvent, UserId, ValidationResponse, ViolationKind};

fn validate(page: &Page, factor: Factor, user_id: &str) {
    page.controller
        .set_validated(factor, true, Some(UserId::from(user_id)));
}

#[test]
fn test_two_factors_open_the_doors_and_welcome_once() {
    let root = tempfile::tempdir().unwrap();
    let page = Page::load(root.path(), "tab-1");

    validate(&page, Factor::Face, "42");
    assert_eq!(page.sequencer.pending_len(), 0);
    validate(&page, Factor::Retina, "42");

    assert_eq!(
        page.render_pending(),
        vec![
            SequenceEvent::DoorsOpening,
            SequenceEvent::Welcome { label: None },
            SequenceEvent::Dismissed,
        ]
    );
    assert!(!page.controller.is_animation_visible());

    // Reloading the tab replays the doors, but the welcome already ran.
    let reloaded = Page::load(root.path(), "tab-1");
    assert_eq!(
        reloaded.render_pending(),
        vec![SequenceEvent::DoorsOpening, SequenceEvent::Dismissed]
    );
}

#[test]
fn test_new_session_needs_its_own_pair_of_validations() {
    let root = tempfile::tempdir().unwrap();
    let first = Page::load(root.path(), "tab-1");
    validate(&first, Factor::Face, "7");
    validate(&first, Factor::Voice, "7");
    assert_eq!(first.sequencer.pending_len(), 1);

    let second = Page::load(root.path(), "tab-2");
    assert_eq!(second.sequencer.pending_len(), 0);
    assert_eq!(second.controller.snapshot().valid_count, 2);

    validate(&second, Factor::Proximity, "7");
    assert_eq!(second.sequencer.pending_len(), 0);
    validate(&second, Factor::Face, "7");
    assert_eq!(second.sequencer.pending_len(), 1);
    assert_eq!(second.render_pending().first(), Some(&SequenceEvent::DoorsOpening));
}

#[test]
fn test_mismatch_resets_durable_state_for_every_tab() {
    let root = tempfile::tempdir().unwrap();
    let page = Page::load(root.path(), "tab-1");
    validate(&page, Factor::Face, "1");
    validate(&page, Factor::Voice, "2");

    assert_eq!(page.sequencer.violations().len(), 1);
    assert_eq!(
        page.navigator.redirects(),
        vec![("/?security_violation=true".to_string(), 3000)]
    );

    let other_tab = Page::load(root.path(), "tab-2");
    assert_eq!(other_tab.controller.snapshot().valid_count, 0);
    // The banner marker is session-scoped.
    assert!(other_tab.controller.security_violation().is_none());
    assert_eq!(
        Page::load(root.path(), "tab-1")
            .controller
            .security_violation()
            .map(|violation| violation.kind),
        Some(ViolationKind::UserMismatch)
    );
}

#[test]
fn test_state_changed_between_trigger_and_render() {
    let root = tempfile::tempdir().unwrap();
    let page = Page::load(root.path(), "tab-1");
    validate(&page, Factor::Face, "5");
    validate(&page, Factor::Voice, "5");
    assert_eq!(page.sequencer.pending_len(), 1);

    // Another tab overwrites the voice identity before this one renders.
    let other_tab = Page::load(root.path(), "tab-2");
    validate(&other_tab, Factor::Voice, "6");
    assert_eq!(other_tab.sequencer.violations().len(), 1);

    // The other tab reset the shared durable state, so this tab's pending
    // render is dropped quietly.
    assert!(page.render_pending().is_empty());
    assert_eq!(page.sequencer.pending_len(), 0);
    assert!(page.navigator.redirects().is_empty());
    assert!(!page.controller.is_animation_visible());
}

#[test]
fn test_server_responses_drive_the_flow() {
    let root = tempfile::tempdir().unwrap();
    let page = Page::load(root.path(), "tab-1");
    let success = ValidationResponse::from_json(
        r#"{"success": true, "user": {"id": 1, "name": "Kailash"}, "vehicles": []}"#,
    )
    .unwrap();

    page.controller.apply_server_response(Factor::Face, &success);
    page.controller.apply_server_response(Factor::Voice, &success);

    assert_eq!(
        page.render_pending()[1],
        SequenceEvent::Welcome {
            label: Some("Kailash".to_string())
        }
    );
}

#[test]
fn test_corrupt_durable_file_recovers_on_next_write() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("durable.json"), b"{not json").unwrap();
    let page = Page::load(root.path(), "tab-1");
    assert_eq!(page.controller.snapshot().valid_count, 0);

    validate(&page, Factor::Face, "42");
    validate(&page, Factor::Retina, "42");

    assert_eq!(page.sequencer.pending_len(), 1);
    let reloaded = Page::load(root.path(), "tab-2");
    assert_eq!(reloaded.controller.snapshot().valid_count, 2);
}
