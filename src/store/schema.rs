//! Table definitions of the contacts database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::Result;
use rusqlite::Connection;

const PROJECTS_FK: ForeignKey = ForeignKey {
    foreign_table: "projects",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const USERS_CASCADE_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const USERS_SET_NULL_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};
const ROLES_FK: ForeignKey = ForeignKey {
    foreign_table: "roles",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const CONTACTS_FK: ForeignKey = ForeignKey {
    foreign_table: "contacts",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};
const CUSTOM_FIELDS_FK: ForeignKey = ForeignKey {
    foreign_table: "custom_fields",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const PROJECTS_TABLE_V_0: Table = Table {
    name: "projects",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};
const USERS_TABLE_V_0: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("login", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "firstname",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "lastname",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "admin",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};
const ROLES_TABLE_V_0: Table = Table {
    name: "roles",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};
const ROLE_PERMISSIONS_TABLE_V_0: Table = Table {
    name: "role_permissions",
    columns: &[
        sqlite_column!(
            "role_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ROLES_FK)
        ),
        sqlite_column!("permission", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["role_id", "permission"]],
};
const MEMBERS_TABLE_V_0: Table = Table {
    name: "members",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USERS_CASCADE_FK)
        ),
        sqlite_column!(
            "project_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROJECTS_FK)
        ),
        sqlite_column!(
            "role_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ROLES_FK)
        ),
    ],
    indices: &[("idx_members_user", "user_id")],
    unique_constraints: &[&["user_id", "project_id", "role_id"]],
};
const CONTACTS_TABLE_V_0: Table = Table {
    name: "contacts",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("first_name", &SqlType::Text),
        sqlite_column!("last_name", &SqlType::Text),
        sqlite_column!("company", &SqlType::Text),
        sqlite_column!("email", &SqlType::Text),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!("website", &SqlType::Text),
        sqlite_column!("birthday", &SqlType::Text),
        sqlite_column!(
            "is_company",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "project_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROJECTS_FK)
        ),
        sqlite_column!(
            "author_id",
            &SqlType::Integer,
            foreign_key = Some(&USERS_SET_NULL_FK)
        ),
        sqlite_column!(
            "created_on",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_on",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_contacts_project", "project_id")],
    unique_constraints: &[],
};
const ADDRESSES_TABLE_V_0: Table = Table {
    name: "addresses",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "contact_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CONTACTS_FK)
        ),
        sqlite_column!("street", &SqlType::Text),
        sqlite_column!("city", &SqlType::Text),
        sqlite_column!("region", &SqlType::Text),
        sqlite_column!("postcode", &SqlType::Text),
        sqlite_column!("country_code", &SqlType::Text),
        sqlite_column!("address_type", &SqlType::Text),
    ],
    indices: &[("idx_addresses_contact", "contact_id")],
    unique_constraints: &[],
};
const CUSTOM_FIELDS_TABLE_V_0: Table = Table {
    name: "custom_fields",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("field_format", &SqlType::Text, non_null = true),
        sqlite_column!(
            "is_multiple",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "visible",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!(
            "position",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        // JSON array of strings
        sqlite_column!("possible_values", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};
const CUSTOM_FIELD_ROLES_TABLE_V_0: Table = Table {
    name: "custom_field_roles",
    columns: &[
        sqlite_column!(
            "custom_field_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CUSTOM_FIELDS_FK)
        ),
        sqlite_column!(
            "role_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ROLES_FK)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["custom_field_id", "role_id"]],
};
const CUSTOM_VALUES_TABLE_V_0: Table = Table {
    name: "custom_values",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "contact_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CONTACTS_FK)
        ),
        sqlite_column!(
            "custom_field_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CUSTOM_FIELDS_FK)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_custom_values_contact", "contact_id")],
    unique_constraints: &[],
};
const ATTACHMENTS_TABLE_V_0: Table = Table {
    name: "attachments",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "contact_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CONTACTS_FK)
        ),
        sqlite_column!("filename", &SqlType::Text, non_null = true),
        sqlite_column!(
            "filesize",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("content_type", &SqlType::Text),
        sqlite_column!(
            "author_id",
            &SqlType::Integer,
            foreign_key = Some(&USERS_SET_NULL_FK)
        ),
        sqlite_column!(
            "created_on",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_attachments_contact", "contact_id")],
    unique_constraints: &[],
};
const JOURNALS_TABLE_V_0: Table = Table {
    name: "journals",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "contact_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CONTACTS_FK)
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "users",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::NoAction,
            })
        ),
        sqlite_column!("notes", &SqlType::Text),
        sqlite_column!(
            "private_notes",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_on",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_journals_contact", "contact_id")],
    unique_constraints: &[],
};
const JOURNAL_DETAILS_TABLE_V_0: Table = Table {
    name: "journal_details",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "journal_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "journals",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("property", &SqlType::Text, non_null = true),
        sqlite_column!("prop_key", &SqlType::Text, non_null = true),
        sqlite_column!("old_value", &SqlType::Text),
        sqlite_column!("value", &SqlType::Text),
    ],
    indices: &[("idx_journal_details_journal", "journal_id")],
    unique_constraints: &[],
};

/// V 1
const USER_PREFERENCES_TABLE_V_1: Table = Table {
    name: "user_preferences",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USERS_CASCADE_FK)
        ),
        sqlite_column!("key", &SqlType::Text, non_null = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["user_id", "key"]],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            PROJECTS_TABLE_V_0,
            USERS_TABLE_V_0,
            ROLES_TABLE_V_0,
            ROLE_PERMISSIONS_TABLE_V_0,
            MEMBERS_TABLE_V_0,
            CONTACTS_TABLE_V_0,
            ADDRESSES_TABLE_V_0,
            CUSTOM_FIELDS_TABLE_V_0,
            CUSTOM_FIELD_ROLES_TABLE_V_0,
            CUSTOM_VALUES_TABLE_V_0,
            ATTACHMENTS_TABLE_V_0,
            JOURNALS_TABLE_V_0,
            JOURNAL_DETAILS_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            PROJECTS_TABLE_V_0,
            USERS_TABLE_V_0,
            ROLES_TABLE_V_0,
            ROLE_PERMISSIONS_TABLE_V_0,
            MEMBERS_TABLE_V_0,
            CONTACTS_TABLE_V_0,
            ADDRESSES_TABLE_V_0,
            CUSTOM_FIELDS_TABLE_V_0,
            CUSTOM_FIELD_ROLES_TABLE_V_0,
            CUSTOM_VALUES_TABLE_V_0,
            ATTACHMENTS_TABLE_V_0,
            JOURNALS_TABLE_V_0,
            JOURNAL_DETAILS_TABLE_V_0,
            USER_PREFERENCES_TABLE_V_1,
        ],
        migration: Some(migrate_to_v1),
    },
];

fn migrate_to_v1(conn: &Connection) -> Result<()> {
    USER_PREFERENCES_TABLE_V_1.create(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::{open_versioned, validate_and_migrate, BASE_DB_VERSION};
    use tempfile::TempDir;

    #[test]
    fn fresh_database_is_latest_version() {
        let dir = TempDir::new().unwrap();
        let conn = open_versioned(dir.path().join("contacts.db"), VERSIONED_SCHEMAS).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 1);
    }

    #[test]
    fn v0_database_gains_preferences_table() {
        let conn = Connection::open_in_memory().unwrap();
        VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        validate_and_migrate(&conn, VERSIONED_SCHEMAS).unwrap();
        VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }
}
