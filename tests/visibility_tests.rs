//! What each role sees of a contact's history.

mod common;

use common::*;
use contacts_journal::contact::ContactField;
use contacts_journal::journal::Journal;
use contacts_journal::user::{ProjectStatus, ProjectStore, UserSetting, UserSettingsStore};
use contacts_journal::{ContactManagerConfig, ContactsError};

fn indices(journals: &[Journal]) -> Vec<usize> {
    journals.iter().filter_map(|j| j.indice).collect()
}

/// Three journals: a public note, a private note by the manager, and a
/// change to the manager-only rating field.
fn world_with_history() -> (TestWorld, i64) {
    let world = TestWorld::create();
    let contact_id = world.create_contact("Ada", "Lovelace");
    let editor = world.user(EDITOR_LOGIN);
    let manager = world.user(MANAGER_LOGIN);

    world.change(contact_id, &editor, Some("Called her"), |edit| {
        edit.set_attribute(ContactField::Company, Some("Engines Ltd"))
            .unwrap();
    });
    world.change(contact_id, &manager, Some("Owes us money"), |edit| {
        edit.set_private_notes(true);
    });
    let rating = world.rating_field.clone();
    world.change(contact_id, &manager, None, |edit| {
        edit.set_custom_field_value(&rating, Some("5"));
    });
    (world, contact_id)
}

#[test]
fn test_manager_sees_everything() {
    let (world, contact_id) = world_with_history();
    let journals = world
        .manager
        .visible_journals(contact_id, &world.user(MANAGER_LOGIN))
        .unwrap();
    assert_eq!(indices(&journals), vec![1, 2, 3]);
    assert!(journals[1].private_notes);
    assert_eq!(journals[2].details.len(), 1);
}

#[test]
fn test_viewer_loses_private_and_hidden_entries_but_keeps_numbering() {
    let (world, contact_id) = world_with_history();
    let journals = world
        .manager
        .visible_journals(contact_id, &world.user(VIEWER_LOGIN))
        .unwrap();
    assert_eq!(indices(&journals), vec![1]);
    assert_eq!(journals[0].notes.as_deref(), Some("Called her"));
}

#[test]
fn test_admin_sees_hidden_fields() {
    let (world, contact_id) = world_with_history();
    let journals = world
        .manager
        .visible_journals(contact_id, &world.user(ADMIN_LOGIN))
        .unwrap();
    assert_eq!(indices(&journals), vec![1, 2, 3]);
}

#[test]
fn test_author_sees_own_private_note() {
    let world = TestWorld::create();
    let contact_id = world.create_contact("Ada", "Lovelace");
    let manager = world.user(MANAGER_LOGIN);
    world.change(contact_id, &manager, Some("Between us"), |edit| {
        edit.set_private_notes(true);
    });

    let seen_by_author = world.manager.visible_journals(contact_id, &manager).unwrap();
    assert_eq!(seen_by_author.len(), 1);

    let seen_by_editor = world
        .manager
        .visible_journals(contact_id, &world.user(EDITOR_LOGIN))
        .unwrap();
    assert!(seen_by_editor.is_empty());
}

#[test]
fn test_private_note_with_visible_detail_is_hidden_whole() {
    let world = TestWorld::create();
    let contact_id = world.create_contact("Ada", "Lovelace");
    let manager = world.user(MANAGER_LOGIN);
    world.change(contact_id, &manager, Some("Moved her"), |edit| {
        edit.set_attribute(ContactField::Company, Some("Engines Ltd"))
            .unwrap();
        edit.set_private_notes(true);
    });

    let journals = world
        .manager
        .visible_journals(contact_id, &world.user(VIEWER_LOGIN))
        .unwrap();
    assert!(journals.is_empty());
}

#[test]
fn test_hidden_detail_is_stripped_from_mixed_journal() {
    let world = TestWorld::create();
    let contact_id = world.create_contact("Ada", "Lovelace");
    let manager = world.user(MANAGER_LOGIN);
    let rating = world.rating_field.clone();
    world.change(contact_id, &manager, None, |edit| {
        edit.set_custom_field_value(&rating, Some("4"));
        edit.set_attribute(ContactField::Phone, Some("5550001111"))
            .unwrap();
    });

    let journals = world
        .manager
        .visible_journals(contact_id, &world.user(VIEWER_LOGIN))
        .unwrap();
    assert_eq!(journals.len(), 1);
    assert_eq!(journals[0].details.len(), 1);
    assert_eq!(journals[0].details[0].prop_key, "phone");
}

#[test]
fn test_outsider_cannot_read_history() {
    let (world, contact_id) = world_with_history();
    let result = world
        .manager
        .visible_journals(contact_id, &world.user(OUTSIDER_LOGIN));
    assert!(matches!(
        result,
        Err(ContactsError::PermissionDenied { .. })
    ));
}

#[test]
fn test_archived_project_hides_history_even_from_admin() {
    let (world, contact_id) = world_with_history();
    world
        .store
        .set_project_status(world.sales_project, ProjectStatus::Archived)
        .unwrap();
    assert!(world
        .manager
        .visible_journals(contact_id, &world.user(ADMIN_LOGIN))
        .is_err());
}

#[test]
fn test_history_order_follows_preference() {
    let (world, contact_id) = world_with_history();
    let manager = world.user(MANAGER_LOGIN);

    let details = world.manager.show_contact(contact_id, &manager).unwrap();
    assert_eq!(indices(&details.journals), vec![1, 2, 3]);

    world
        .store
        .set_user_setting(manager.id, UserSetting::CommentsInReverseOrder(true))
        .unwrap();
    let details = world.manager.show_contact(contact_id, &manager).unwrap();
    assert_eq!(indices(&details.journals), vec![3, 2, 1]);
}

#[test]
fn test_configured_default_order_applies_without_preference() {
    let world = TestWorld::with_config(ContactManagerConfig {
        reverse_order_default: true,
        ..ContactManagerConfig::default()
    });
    let contact_id = world.create_contact("Ada", "Lovelace");
    let editor = world.user(EDITOR_LOGIN);
    world.change(contact_id, &editor, Some("one"), |_| {});
    world.change(contact_id, &editor, Some("two"), |_| {});

    let details = world.manager.show_contact(contact_id, &editor).unwrap();
    assert_eq!(indices(&details.journals), vec![2, 1]);

    world
        .store
        .set_user_setting(editor.id, UserSetting::CommentsInReverseOrder(false))
        .unwrap();
    let details = world.manager.show_contact(contact_id, &editor).unwrap();
    assert_eq!(indices(&details.journals), vec![1, 2]);
}

#[test]
fn test_show_contact_serializes_visible_state_only() {
    let (world, contact_id) = world_with_history();
    let details = world
        .manager
        .show_contact(contact_id, &world.user(VIEWER_LOGIN))
        .unwrap();
    assert!(!details.editable);

    let json = serde_json::to_value(&details).unwrap();
    let field_names: Vec<&str> = json["custom_fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(!field_names.contains(&RATING_FIELD));
    assert!(json["custom_values"]
        .as_object()
        .unwrap()
        .get(&world.rating_field.id.to_string())
        .is_none());
    assert_eq!(json["journals"].as_array().unwrap().len(), 1);
}
