//! Seeded contacts database in a temporary directory

use super::constants::*;
use contacts_journal::contact::{
    ContactField, ContactStore, CustomField, CustomFieldStore, FieldFormat, NewCustomField,
};
use contacts_journal::journal::PendingEdit;
use contacts_journal::user::{BuiltinRole, Membership, ProjectStore, User, UserStore};
use contacts_journal::{ContactManager, ContactManagerConfig, SqliteContactStore};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A database with two projects, one user per role and three custom fields.
///
/// | login    | Sales   | Partners |
/// |----------|---------|----------|
/// | admin    | (admin) | (admin)  |
/// | manager  | Manager |          |
/// | editor   | Editor  |          |
/// | viewer   | Viewer  |          |
/// | outsider |         | Editor   |
pub struct TestWorld {
    _dir: TempDir,
    pub db_path: PathBuf,
    pub store: Arc<SqliteContactStore>,
    pub manager: ContactManager,
    pub sales_project: i64,
    pub partners_project: i64,
    pub source_field: CustomField,
    pub rating_field: CustomField,
    pub background_field: CustomField,
    users: HashMap<&'static str, User>,
}

impl TestWorld {
    pub fn create() -> Self {
        Self::with_config(ContactManagerConfig::default())
    }

    pub fn with_config(config: ContactManagerConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("contacts.db");
        let store = Arc::new(SqliteContactStore::new(&db_path).expect("Failed to open store"));

        let sales_project = store.create_project(SALES_PROJECT).unwrap();
        let partners_project = store.create_project(PARTNERS_PROJECT).unwrap();

        let mut role_ids = HashMap::new();
        for role in [BuiltinRole::Manager, BuiltinRole::Editor, BuiltinRole::Viewer] {
            let id = store.create_role(role.as_str(), role.permissions()).unwrap();
            role_ids.insert(role.as_str(), id);
        }

        let mut users = HashMap::new();
        for (login, first, last, admin) in [
            (ADMIN_LOGIN, "Ada", "Admin", true),
            (MANAGER_LOGIN, "Mona", "Manager", false),
            (EDITOR_LOGIN, "Ed", "Editor", false),
            (VIEWER_LOGIN, "Vic", "Viewer", false),
            (OUTSIDER_LOGIN, "Otto", "Outsider", false),
        ] {
            let id = store.create_user(login, first, last, admin).unwrap();
            users.insert(login, store.get_user(id).unwrap().unwrap());
        }

        for (login, project_id, role) in [
            (MANAGER_LOGIN, sales_project, BuiltinRole::Manager),
            (EDITOR_LOGIN, sales_project, BuiltinRole::Editor),
            (VIEWER_LOGIN, sales_project, BuiltinRole::Viewer),
            (OUTSIDER_LOGIN, partners_project, BuiltinRole::Editor),
        ] {
            store
                .add_member(Membership {
                    user_id: users[login].id,
                    project_id,
                    role_id: role_ids[role.as_str()],
                })
                .unwrap();
        }

        let mut source = NewCustomField::new(SOURCE_FIELD, FieldFormat::List);
        source.multiple = true;
        source.possible_values = SOURCE_VALUES.iter().map(|v| v.to_string()).collect();
        let mut rating = NewCustomField::new(RATING_FIELD, FieldFormat::Int);
        rating.visible = false;
        rating.role_ids = vec![role_ids[BuiltinRole::Manager.as_str()]];
        let background = NewCustomField::new(BACKGROUND_FIELD, FieldFormat::Text);
        for field in [&source, &rating, &background] {
            store.create_custom_field(field).unwrap();
        }
        let fields = store.get_custom_fields().unwrap();
        let field = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .cloned()
                .expect("Seeded custom field missing")
        };

        let manager = ContactManager::new(store.clone(), config);
        Self {
            db_path,
            sales_project,
            partners_project,
            source_field: field(SOURCE_FIELD),
            rating_field: field(RATING_FIELD),
            background_field: field(BACKGROUND_FIELD),
            store,
            manager,
            users,
            _dir: dir,
        }
    }

    pub fn user(&self, login: &str) -> User {
        self.users
            .get(login)
            .cloned()
            .unwrap_or_else(|| panic!("Unknown test user {}", login))
    }

    /// Creates a contact in the sales project as the editor, without a note.
    pub fn create_contact(&self, first_name: &str, last_name: &str) -> i64 {
        self.create_contact_in(self.sales_project, EDITOR_LOGIN, first_name, last_name)
    }

    pub fn create_contact_in(
        &self,
        project_id: i64,
        login: &str,
        first_name: &str,
        last_name: &str,
    ) -> i64 {
        let email = format!(
            "{}.{}@{}",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            DEFAULT_EMAIL_DOMAIN
        );
        let edit = self
            .manager
            .create_contact(
                project_id,
                &self.user(login),
                &[
                    (ContactField::FirstName, Some(first_name)),
                    (ContactField::LastName, Some(last_name)),
                    (ContactField::Email, Some(email.as_str())),
                ],
                None,
            )
            .expect("Failed to begin contact creation");
        self.manager
            .save(&edit)
            .expect("Failed to create contact")
            .contact_id
    }

    /// Begins a change as `user`, applies `apply` and saves. Returns the id of
    /// the recorded journal, if any.
    pub fn change(
        &self,
        contact_id: i64,
        user: &User,
        notes: Option<&str>,
        apply: impl FnOnce(&mut PendingEdit),
    ) -> Option<i64> {
        let mut edit = self
            .manager
            .begin_change(contact_id, user, notes)
            .expect("Failed to begin change");
        apply(&mut edit);
        self.manager
            .save(&edit)
            .expect("Failed to save change")
            .journal_id
    }

    /// Ids of the contact's stored attachments.
    pub fn store_attachments(&self, contact_id: i64) -> Vec<i64> {
        self.store
            .get_attachments(contact_id)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect()
    }

    /// Overwrites the contact's update time with a raw connection.
    pub fn set_updated_on(&self, contact_id: i64, updated_on: i64) {
        let conn = Connection::open(&self.db_path).unwrap();
        conn.execute(
            "UPDATE contacts SET updated_on = ?1 WHERE id = ?2",
            rusqlite::params![updated_on, contact_id],
        )
        .unwrap();
    }

    /// Counts rows of `table` with a raw connection, bypassing the store.
    pub fn count_rows(&self, table: &str) -> i64 {
        let conn = Connection::open(&self.db_path).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}
