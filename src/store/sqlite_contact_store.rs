use super::sqlite_journal_store::record_journal_internal;
use super::sqlite_user_store::{allowed_projects_condition, row_to_user};
use super::{bool_to_int, placeholders, SqliteContactStore};
use crate::contact::{
    Address, Attachment, Contact, ContactEvent, ContactStore, CustomField, CustomFieldStore,
    CustomFieldValues, FieldFormat, NewCustomField, SavedEdit,
};
use crate::journal::{DetailDraft, DetailProperty, PendingEdit};
use crate::user::{Permission, User};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashMap;
use tracing::{debug, info};

pub(super) const CONTACT_COLUMNS: &str = "c.id, c.first_name, c.last_name, c.company, c.email, \
     c.phone, c.website, c.birthday, c.is_company, c.project_id, c.author_id, c.created_on, \
     c.updated_on";

const ADDRESS_COLUMNS: &str =
    "id, street, city, region, postcode, country_code, address_type, contact_id";

fn row_to_address(row: &Row) -> rusqlite::Result<Address> {
    Ok(Address {
        id: row.get(0)?,
        street: row.get(1)?,
        city: row.get(2)?,
        region: row.get(3)?,
        postcode: row.get(4)?,
        country_code: row.get(5)?,
        address_type: row.get(6)?,
    })
}

pub(super) fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
    let birthday: Option<String> = row.get(7)?;
    Ok(Contact {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        company: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        website: row.get(6)?,
        birthday: birthday.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        is_company: row.get::<_, i32>(8)? != 0,
        project_id: row.get(9)?,
        author_id: row.get(10)?,
        created_on: row.get(11)?,
        updated_on: row.get(12)?,
    })
}

fn birthday_to_sql(contact: &Contact) -> Option<String> {
    contact.birthday.map(|d| d.format("%Y-%m-%d").to_string())
}

pub(super) fn load_custom_fields(conn: &Connection) -> Result<Vec<CustomField>> {
    let mut roles: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT custom_field_id, role_id FROM custom_field_roles ORDER BY custom_field_id, role_id",
    )?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))? {
        let (field_id, role_id) = row?;
        roles.entry(field_id).or_default().push(role_id);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, field_format, is_multiple, visible, position, possible_values
         FROM custom_fields ORDER BY position, id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)? != 0,
                row.get::<_, i32>(4)? != 0,
                row.get::<_, i32>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(
            |(id, name, format, multiple, visible, position, possible_values)| -> Result<CustomField> {
                let possible_values = match possible_values {
                    Some(json) => serde_json::from_str(&json).with_context(|| {
                        format!("Invalid possible values for custom field {}", id)
                    })?,
                    None => vec![],
                };
                Ok(CustomField {
                    id,
                    name,
                    format: FieldFormat::from_str(&format)
                        .ok_or_else(|| anyhow!("Unknown field format {} for custom field {}", format, id))?,
                    multiple,
                    visible,
                    position,
                    role_ids: roles.remove(&id).unwrap_or_default(),
                    possible_values,
                })
            },
        )
        .collect()
}

/// Roles the user holds on the project, or on any project when `project_id` is None.
pub(super) fn load_member_role_ids(
    conn: &Connection,
    user_id: i64,
    project_id: Option<i64>,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT role_id FROM members
         WHERE user_id = ?1 AND (?2 IS NULL OR project_id = ?2)",
    )?;
    let ids = stmt
        .query_map(params![user_id, project_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub(super) fn visible_fields_for(
    conn: &Connection,
    viewer: &User,
    project_id: Option<i64>,
) -> Result<Vec<CustomField>> {
    let fields = load_custom_fields(conn)?;
    let role_ids = load_member_role_ids(conn, viewer.id, project_id)?;
    Ok(fields
        .into_iter()
        .filter(|f| f.visible_to(viewer, &role_ids))
        .collect())
}

impl ContactStore for SqliteContactStore {
    fn get_contact(&self, contact_id: i64) -> Result<Option<Contact>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM contacts c WHERE c.id = ?1", CONTACT_COLUMNS),
                params![contact_id],
                row_to_contact,
            )
            .optional()?)
    }

    fn get_addresses(&self, contact_id: i64) -> Result<Vec<Address>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM addresses WHERE contact_id = ?1 ORDER BY id",
            ADDRESS_COLUMNS
        ))?;
        let addresses = stmt
            .query_map(params![contact_id], row_to_address)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(addresses)
    }

    fn get_custom_values(&self, contact_id: i64) -> Result<CustomFieldValues> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT custom_field_id, value FROM custom_values WHERE contact_id = ?1 ORDER BY id",
        )?;
        let mut values = CustomFieldValues::new();
        for row in stmt.query_map(params![contact_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })? {
            let (field_id, value) = row?;
            values.entry(field_id).or_default().push(value);
        }
        Ok(values)
    }

    fn get_attachments(&self, contact_id: i64) -> Result<Vec<Attachment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, contact_id, filename, filesize, content_type, author_id, created_on
             FROM attachments WHERE contact_id = ?1 ORDER BY id",
        )?;
        let attachments = stmt
            .query_map(params![contact_id], |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    contact_id: row.get(1)?,
                    filename: row.get(2)?,
                    filesize: row.get(3)?,
                    content_type: row.get(4)?,
                    author_id: row.get(5)?,
                    created_on: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    fn save_edit(&self, edit: &PendingEdit, now: i64) -> Result<SavedEdit> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let contact = edit.contact();

        let contact_id = if edit.is_new() {
            tx.execute(
                "INSERT INTO contacts (first_name, last_name, company, email, phone, website,
                     birthday, is_company, project_id, author_id, created_on, updated_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    contact.first_name,
                    contact.last_name,
                    contact.company,
                    contact.email,
                    contact.phone,
                    contact.website,
                    birthday_to_sql(contact),
                    bool_to_int(contact.is_company),
                    contact.project_id,
                    contact.author_id,
                    now,
                ],
            )?;
            tx.last_insert_rowid()
        } else {
            if edit.attributes_changed() {
                let updated = tx.execute(
                    "UPDATE contacts SET first_name = ?1, last_name = ?2, company = ?3,
                         email = ?4, phone = ?5, website = ?6, birthday = ?7, is_company = ?8,
                         project_id = ?9, author_id = ?10, updated_on = ?11
                     WHERE id = ?12",
                    params![
                        contact.first_name,
                        contact.last_name,
                        contact.company,
                        contact.email,
                        contact.phone,
                        contact.website,
                        birthday_to_sql(contact),
                        bool_to_int(contact.is_company),
                        contact.project_id,
                        contact.author_id,
                        now,
                        contact.id,
                    ],
                )?;
                if updated == 0 {
                    bail!("Contact {} not found", contact.id);
                }
            }
            contact.id
        };

        if edit.custom_values_changed() {
            tx.execute(
                "DELETE FROM custom_values WHERE contact_id = ?1",
                params![contact_id],
            )?;
            for (field_id, values) in edit.custom_values() {
                for value in values {
                    tx.execute(
                        "INSERT INTO custom_values (contact_id, custom_field_id, value)
                         VALUES (?1, ?2, ?3)",
                        params![contact_id, field_id, value],
                    )?;
                }
            }
        }

        for attachment_id in edit.deleted_attachment_ids() {
            tx.execute(
                "DELETE FROM attachments WHERE id = ?1 AND contact_id = ?2",
                params![attachment_id, contact_id],
            )?;
        }

        let mut attachment_details = Vec::new();
        for attachment in edit.new_attachments() {
            tx.execute(
                "INSERT INTO attachments (contact_id, filename, filesize, content_type, author_id,
                     created_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    contact_id,
                    attachment.filename,
                    attachment.filesize,
                    attachment.content_type,
                    edit.user().id,
                    now,
                ],
            )?;
            let attachment_id = tx.last_insert_rowid().to_string();
            if !edit.is_new() {
                attachment_details.push(DetailDraft {
                    property: DetailProperty::Attachment,
                    prop_key: attachment_id.clone(),
                    old_value: None,
                    value: Some(attachment_id),
                });
            }
        }

        for address_id in edit.removed_address_ids() {
            tx.execute(
                "DELETE FROM addresses WHERE id = ?1 AND contact_id = ?2",
                params![address_id, contact_id],
            )?;
        }
        for address in edit.new_addresses() {
            tx.execute(
                "INSERT INTO addresses (contact_id, street, city, region, postcode, country_code,
                     address_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    contact_id,
                    address.street,
                    address.city,
                    address.region,
                    address.postcode,
                    address.country_code,
                    address.address_type,
                ],
            )?;
        }

        let journal_id = match edit.journal() {
            Some(draft) => {
                record_journal_internal(&tx, contact_id, draft, &attachment_details, now)?
            }
            None => None,
        };

        tx.commit()?;
        debug!(
            "Saved contact {} (journal {:?})",
            contact_id, journal_id
        );
        Ok(SavedEdit {
            contact_id,
            journal_id,
        })
    }

    fn delete_contact(&self, contact_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM contacts WHERE id = ?1", params![contact_id])?;
        if deleted > 0 {
            info!("Deleted contact {}", contact_id);
        }
        Ok(deleted > 0)
    }

    fn contact_events(&self, viewer: &User, from: i64, to: i64) -> Result<Vec<ContactEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut params: Vec<Box<dyn ToSql>> = vec![];
        let viewable =
            allowed_projects_condition("c.project_id", viewer, Permission::ViewContacts, &mut params);
        params.push(Box::new(from));
        params.push(Box::new(to));
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.id, u.login, u.firstname, u.lastname, u.admin
             FROM contacts c LEFT JOIN users u ON u.id = c.author_id
             WHERE {} AND c.updated_on BETWEEN ? AND ?
             ORDER BY c.updated_on DESC, c.id DESC",
            CONTACT_COLUMNS, viewable
        ))?;
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let author = match row.get::<_, Option<i64>>(13)? {
                    Some(_) => Some(row_to_user(row, 13)?),
                    None => None,
                };
                Ok((row_to_contact(row)?, author))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let contact_ids: Vec<i64> = rows.iter().map(|(contact, _)| contact.id).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM addresses WHERE contact_id IN ({}) ORDER BY id",
            ADDRESS_COLUMNS,
            placeholders(contact_ids.len())
        ))?;
        let mut first_addresses: HashMap<i64, Address> = HashMap::new();
        for row in stmt.query_map(params_from_iter(contact_ids.iter()), |row| {
            Ok((row.get::<_, i64>(7)?, row_to_address(row)?))
        })? {
            let (contact_id, address) = row?;
            first_addresses.entry(contact_id).or_insert(address);
        }

        debug!(
            "Found {} contact events between {} and {} for user {}",
            rows.len(),
            from,
            to,
            viewer.id
        );
        Ok(rows
            .into_iter()
            .map(|(contact, author)| {
                let address = first_addresses.get(&contact.id);
                ContactEvent::new(contact, author, address)
            })
            .collect())
    }
}

impl CustomFieldStore for SqliteContactStore {
    fn create_custom_field(&self, field: &NewCustomField) -> Result<i64> {
        field
            .validate()
            .map_err(|e| anyhow!("Invalid custom field {}: {}", field.name, e))?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO custom_fields (name, field_format, is_multiple, visible, position,
                 possible_values)
             VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(position), 0) + 1 FROM custom_fields), ?5)",
            params![
                field.name,
                field.format.as_str(),
                bool_to_int(field.multiple),
                bool_to_int(field.visible),
                serde_json::to_string(&field.possible_values)?,
            ],
        )?;
        let field_id = tx.last_insert_rowid();
        for role_id in &field.role_ids {
            tx.execute(
                "INSERT OR IGNORE INTO custom_field_roles (custom_field_id, role_id) VALUES (?1, ?2)",
                params![field_id, role_id],
            )?;
        }
        tx.commit()?;
        Ok(field_id)
    }

    fn get_custom_fields(&self) -> Result<Vec<CustomField>> {
        let conn = self.conn.lock().unwrap();
        load_custom_fields(&conn)
    }

    fn visible_custom_fields(
        &self,
        viewer: &User,
        project_id: Option<i64>,
    ) -> Result<Vec<CustomField>> {
        let conn = self.conn.lock().unwrap();
        visible_fields_for(&conn, viewer, project_id)
    }
}
