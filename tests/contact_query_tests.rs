//! Filtering, sorting and paging contacts through `ContactQuery`.

mod common;

use common::*;
use contacts_journal::contact::{
    ContactField, ContactQuery, FilterField, NewAttachment, Operator, QueryColumn, SortDirection,
};
use contacts_journal::user::{ProjectStatus, ProjectStore, User};
use contacts_journal::ContactsError;

fn ids(world: &TestWorld, query: &ContactQuery, user: &User) -> Vec<i64> {
    let mut ids = world.manager.contact_ids(query, user).unwrap();
    ids.sort();
    ids
}

struct Seeded {
    world: TestWorld,
    ada: i64,
    charles: i64,
    grace: i64,
    partner: i64,
}

fn seeded() -> Seeded {
    let world = TestWorld::create();
    let ada = world.create_contact("Ada", "Lovelace");
    let charles = world.create_contact("Charles", "Babbage");
    let grace = world.create_contact_in(world.sales_project, MANAGER_LOGIN, "Grace", "Hopper");
    let partner = world.create_contact_in(world.partners_project, OUTSIDER_LOGIN, "Alan", "Turing");

    let editor = world.user(EDITOR_LOGIN);
    let source = world.source_field.clone();
    world.change(ada, &editor, None, |edit| {
        edit.set_custom_field_values(&source, &["web", "fair"]);
        edit.set_attribute(ContactField::Phone, Some("5550001111"))
            .unwrap();
        edit.attach(NewAttachment {
            filename: "engine_notes.pdf".to_string(),
            filesize: 100,
            content_type: Some("application/pdf".to_string()),
        });
    });
    world.change(charles, &world.user(MANAGER_LOGIN), None, |edit| {
        edit.set_custom_field_value(&source, Some("referral"));
        edit.set_attribute(ContactField::Company, Some("Difference Engines"))
            .unwrap();
    });

    Seeded {
        world,
        ada,
        charles,
        grace,
        partner,
    }
}

#[test]
fn test_scope_follows_view_permission() {
    let s = seeded();
    let query = ContactQuery::new(None);

    let mut all = vec![s.ada, s.charles, s.grace, s.partner];
    all.sort();
    assert_eq!(ids(&s.world, &query, &s.world.user(ADMIN_LOGIN)), all);

    let mut sales = vec![s.ada, s.charles, s.grace];
    sales.sort();
    assert_eq!(ids(&s.world, &query, &s.world.user(VIEWER_LOGIN)), sales);
    assert_eq!(
        ids(&s.world, &query, &s.world.user(OUTSIDER_LOGIN)),
        vec![s.partner]
    );
    assert_eq!(
        s.world
            .manager
            .contact_count(&query, &s.world.user(VIEWER_LOGIN))
            .unwrap(),
        3
    );
}

#[test]
fn test_text_operators() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);
    let check = |field: FilterField, op: Operator, values: &[&str], expected: Vec<i64>| {
        let mut query = ContactQuery::new(Some(s.world.sales_project));
        query.add_filter(field, op, values);
        let mut expected = expected;
        expected.sort();
        assert_eq!(ids(&s.world, &query, &viewer), expected, "{:?} {:?}", field, op);
    };

    check(FilterField::FirstName, Operator::Contains, &["a"], vec![s.ada, s.charles, s.grace]);
    check(FilterField::LastName, Operator::StartsWith, &["bab"], vec![s.charles]);
    check(FilterField::LastName, Operator::EndsWith, &["per"], vec![s.grace]);
    check(FilterField::FirstName, Operator::NotContains, &["ace"], vec![s.ada, s.charles]);
    check(FilterField::FirstName, Operator::Equals, &["Ada"], vec![s.ada]);
    check(FilterField::FirstName, Operator::NotEquals, &["Ada"], vec![s.charles, s.grace]);
    check(FilterField::Phone, Operator::Any, &[], vec![s.ada]);
    check(FilterField::Phone, Operator::None, &[], vec![s.charles, s.grace]);
}

#[test]
fn test_like_wildcards_are_literal() {
    let s = seeded();
    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::FirstName, Operator::Contains, &["%"]);
    assert!(ids(&s.world, &query, &s.world.user(ADMIN_LOGIN)).is_empty());
}

#[test]
fn test_author_filter_with_me() {
    let s = seeded();
    let manager = s.world.user(MANAGER_LOGIN);
    let mut query = ContactQuery::new(None);
    query
        .add_filter_expression("author_id:=:me")
        .unwrap();
    assert_eq!(ids(&s.world, &query, &manager), vec![s.grace]);
}

#[test]
fn test_updated_by_and_last_updated_by() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);
    let editor = s.world.user(EDITOR_LOGIN);
    let manager = s.world.user(MANAGER_LOGIN);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::UpdatedBy, Operator::Equals, &[editor.id.to_string().as_str()]);
    assert_eq!(ids(&s.world, &query, &viewer), vec![s.ada]);

    s.world.change(s.ada, &manager, Some("follow up"), |_| {});

    let mut query = ContactQuery::new(None);
    query.add_filter(
        FilterField::LastUpdatedBy,
        Operator::Equals,
        &[manager.id.to_string().as_str()],
    );
    let mut expected = vec![s.ada, s.charles];
    expected.sort();
    assert_eq!(ids(&s.world, &query, &viewer), expected);

    let mut query = ContactQuery::new(Some(s.world.sales_project));
    query.add_filter(FilterField::LastUpdatedBy, Operator::None, &[]);
    assert_eq!(ids(&s.world, &query, &viewer), vec![s.grace]);
}

#[test]
fn test_last_updated_by_ignores_private_notes_for_viewer() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);
    let editor = s.world.user(EDITOR_LOGIN);
    let manager = s.world.user(MANAGER_LOGIN);
    s.world.change(s.ada, &manager, Some("private"), |edit| {
        edit.set_private_notes(true);
    });

    let mut query = ContactQuery::new(None);
    query.add_filter(
        FilterField::LastUpdatedBy,
        Operator::Equals,
        &[editor.id.to_string().as_str()],
    );
    assert_eq!(ids(&s.world, &query, &viewer), vec![s.ada]);
    assert!(ids(&s.world, &query, &manager).is_empty());
}

#[test]
fn test_attachment_and_custom_field_filters() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::Attachment, Operator::Contains, &["notes"]);
    assert_eq!(ids(&s.world, &query, &viewer), vec![s.ada]);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::Attachment, Operator::None, &[]);
    let mut expected = vec![s.charles, s.grace];
    expected.sort();
    assert_eq!(ids(&s.world, &query, &viewer), expected);

    let source = FilterField::CustomField(s.world.source_field.id);
    let mut query = ContactQuery::new(None);
    query.add_filter(source, Operator::Equals, &["fair", "referral"]);
    let mut expected = vec![s.ada, s.charles];
    expected.sort();
    assert_eq!(ids(&s.world, &query, &viewer), expected);

    let mut query = ContactQuery::new(None);
    query.add_filter(source, Operator::NotEquals, &["web"]);
    let mut expected = vec![s.charles, s.grace];
    expected.sort();
    assert_eq!(ids(&s.world, &query, &viewer), expected);
}

#[test]
fn test_hidden_custom_field_filter_is_invalid_for_viewer() {
    let s = seeded();
    let mut query = ContactQuery::new(None);
    query.add_filter(
        FilterField::CustomField(s.world.rating_field.id),
        Operator::Any,
        &[],
    );

    let result = s.world.manager.contact_ids(&query, &s.world.user(VIEWER_LOGIN));
    assert!(matches!(result, Err(ContactsError::InvalidQuery(_))));
    assert!(s
        .world
        .manager
        .contact_ids(&query, &s.world.user(MANAGER_LOGIN))
        .is_ok());
}

#[test]
fn test_invalid_operator_and_values_are_reported() {
    let s = seeded();
    let admin = s.world.user(ADMIN_LOGIN);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::FirstName, Operator::Today, &[]);
    query.add_filter(FilterField::CreatedOn, Operator::Equals, &["yesterday-ish"]);
    match s.world.manager.contact_count(&query, &admin) {
        Err(ContactsError::InvalidQuery(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("Expected an invalid query, got {:?}", other),
    }
}

#[test]
fn test_date_and_id_filters() {
    let s = seeded();
    let admin = s.world.user(ADMIN_LOGIN);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::CreatedOn, Operator::Today, &[]);
    assert_eq!(s.world.manager.contact_count(&query, &admin).unwrap(), 4);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::CreatedOn, Operator::MoreThanDaysAgo, &["2"]);
    assert_eq!(s.world.manager.contact_count(&query, &admin).unwrap(), 0);

    let mut query = ContactQuery::new(None);
    query.add_filter(FilterField::UpdatedOn, Operator::LessThanDaysAgo, &["1"]);
    assert_eq!(s.world.manager.contact_count(&query, &admin).unwrap(), 4);

    let mut query = ContactQuery::new(None);
    let list = format!("{}, {}", s.ada, s.grace);
    query.add_filter(FilterField::ContactId, Operator::Equals, &[list.as_str()]);
    let mut expected = vec![s.ada, s.grace];
    expected.sort();
    assert_eq!(ids(&s.world, &query, &admin), expected);
}

#[test]
fn test_keyword_search() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);
    let search = |text: &str| {
        let mut query = ContactQuery::new(None);
        query.set_search(text);
        ids(&s.world, &query, &viewer)
    };

    assert_eq!(search("lovelace"), vec![s.ada]);
    assert_eq!(search("difference"), vec![s.charles]);
    assert_eq!(search("555000"), vec![s.ada]);
    assert_eq!(search("grace.hopper@"), vec![s.grace]);
    // every word must match, each in any column
    assert_eq!(search("charles engines"), vec![s.charles]);
    assert!(search("ada engines").is_empty());
    assert!(search("\"difference engines\" ada").is_empty());
    assert!(search("%%").is_empty());
    assert!(search("a").is_empty());
    assert!(search("turing").is_empty());

    let mut query = ContactQuery::new(None);
    query.set_search("turing");
    assert_eq!(ids(&s.world, &query, &s.world.user(ADMIN_LOGIN)), vec![s.partner]);

    let mut query = ContactQuery::new(Some(s.world.sales_project));
    query.set_search("  ");
    query.add_filter(FilterField::LastName, Operator::StartsWith, &["bab"]);
    assert_eq!(s.world.manager.contact_count(&query, &viewer).unwrap(), 1);
}

#[test]
fn test_days_ago_out_of_calendar_range_is_invalid() {
    let s = seeded();
    let admin = s.world.user(ADMIN_LOGIN);

    for operator in [Operator::MoreThanDaysAgo, Operator::LessThanDaysAgo] {
        let mut query = ContactQuery::new(None);
        query.add_filter(FilterField::CreatedOn, operator, &["4000000000"]);
        match s.world.manager.contact_count(&query, &admin) {
            Err(ContactsError::InvalidQuery(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("Expected an invalid query, got {:?}", other),
        }
    }

    let mut query = ContactQuery::new(None);
    query.add_filter_expression("created_on:>t-:4000000000").unwrap();
    assert!(matches!(
        s.world.manager.contact_ids(&query, &admin),
        Err(ContactsError::InvalidQuery(_))
    ));
}

#[test]
fn test_project_status_filter() {
    let s = seeded();
    let admin = s.world.user(ADMIN_LOGIN);
    s.world
        .store
        .set_project_status(s.world.partners_project, ProjectStatus::Closed)
        .unwrap();

    let mut query = ContactQuery::new(None);
    query.add_filter(
        FilterField::ProjectStatus,
        Operator::Equals,
        &[ProjectStatus::Closed.to_int().to_string().as_str()],
    );
    assert_eq!(ids(&s.world, &query, &admin), vec![s.partner]);
}

#[test]
fn test_project_scoped_query_rejects_project_filter() {
    let s = seeded();
    let mut query = ContactQuery::new(Some(s.world.sales_project));
    query.add_filter(
        FilterField::ProjectId,
        Operator::Equals,
        &[s.world.partners_project.to_string().as_str()],
    );
    assert!(matches!(
        s.world.manager.contact_ids(&query, &s.world.user(ADMIN_LOGIN)),
        Err(ContactsError::InvalidQuery(_))
    ));
}

#[test]
fn test_sorting_grouping_and_paging() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);

    let mut query = ContactQuery::new(Some(s.world.sales_project));
    query.sort = vec![(QueryColumn::FirstName, SortDirection::Asc)];
    let names: Vec<String> = s
        .world
        .manager
        .contacts(&query, &viewer, 2, 0)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.contact.first_name)
        .collect();
    assert_eq!(names, vec!["Ada", "Charles"]);

    let page_two = s.world.manager.contacts(&query, &viewer, 2, 2).unwrap();
    assert_eq!(page_two.len(), 1);
    assert_eq!(page_two[0].contact.id, s.grace);

    // default sort is newest first
    let query = ContactQuery::new(Some(s.world.sales_project));
    let rows = s.world.manager.contacts(&query, &viewer, 10, 0).unwrap();
    let order: Vec<i64> = rows.iter().map(|r| r.contact.id).collect();
    assert_eq!(order, vec![s.grace, s.charles, s.ada]);

    let mut query = ContactQuery::new(Some(s.world.sales_project));
    query.group_by = Some(QueryColumn::Company);
    let rows = s.world.manager.contacts(&query, &viewer, 10, 0).unwrap();
    // contacts without a company sort first within the group order
    assert_eq!(rows.last().map(|r| r.contact.id), Some(s.charles));
}

#[test]
fn test_journals_of_matching_contacts() {
    let s = seeded();
    let viewer = s.world.user(VIEWER_LOGIN);
    let manager = s.world.user(MANAGER_LOGIN);
    s.world.change(s.grace, &manager, Some("hush"), |edit| {
        edit.set_private_notes(true);
    });

    let query = ContactQuery::new(Some(s.world.sales_project));
    let journals = s.world.manager.journals(&query, &viewer).unwrap();
    let contacts: Vec<i64> = journals.iter().map(|j| j.contact_id).collect();
    assert_eq!(contacts, vec![s.charles, s.ada]);

    let journals = s.world.manager.journals(&query, &manager).unwrap();
    assert_eq!(journals.len(), 3);
    assert_eq!(journals[0].contact_id, s.grace);
}
