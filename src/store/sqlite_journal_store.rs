//! Journal persistence and the read queries over it.
//!
//! Journals are only ever inserted by `record_journal_internal`, inside the
//! transaction that saves the contact they belong to.

use super::sqlite_contact_store::visible_fields_for;
use super::sqlite_user_store::{
    allowed_projects_condition, allowed_to, load_project, load_user, row_to_user,
};
use super::{bool_to_int, placeholders, SqliteContactStore};
use crate::contact::ReferenceKind;
use crate::journal::{
    DetailDraft, DetailProperty, Journal, JournalDetail, JournalDraft, JournalStore,
    ReferenceLookup, ViewerContext,
};
use crate::user::{Permission, User};
use anyhow::{anyhow, Result};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use std::collections::HashMap;
use tracing::debug;

const JOURNAL_SELECT: &str = "SELECT j.id, j.contact_id, j.user_id, j.notes, j.private_notes, \
     j.created_on, u.id, u.login, u.firstname, u.lastname, u.admin \
     FROM journals j JOIN users u ON u.id = j.user_id";

/// Inserts the draft and its details, plus `extra_details`, and returns the
/// new journal id. Returns Ok(None) and writes nothing when there is
/// nothing to record. Runs on the caller's connection so it shares the
/// caller's transaction.
pub(super) fn record_journal_internal(
    conn: &Connection,
    contact_id: i64,
    draft: &JournalDraft,
    extra_details: &[DetailDraft],
    now: i64,
) -> Result<Option<i64>> {
    if draft.is_empty() && extra_details.is_empty() {
        return Ok(None);
    }
    conn.execute(
        "INSERT INTO journals (contact_id, user_id, notes, private_notes, created_on)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            contact_id,
            draft.user_id,
            draft.notes,
            bool_to_int(draft.private_notes),
            now
        ],
    )?;
    let journal_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare(
        "INSERT INTO journal_details (journal_id, property, prop_key, old_value, value)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for detail in draft.details().iter().chain(extra_details) {
        stmt.execute(params![
            journal_id,
            detail.property.as_db_str(),
            detail.prop_key,
            detail.old_value,
            detail.value
        ])?;
    }
    debug!(
        "Recorded journal {} for contact {} with {} details",
        journal_id,
        contact_id,
        draft.details().len() + extra_details.len()
    );
    Ok(Some(journal_id))
}

/// SQL condition, over `journals j` joined with `contacts c`, that holds for
/// journals `viewer` can see: private notes require authorship or the
/// permission, and at least a note or one visible detail must remain.
pub(super) fn visible_journal_condition(viewer: &User, params: &mut Vec<Box<dyn ToSql>>) -> String {
    params.push(Box::new(viewer.id));
    let private_allowed =
        allowed_projects_condition("c.project_id", viewer, Permission::ViewPrivateNotes, params);
    params.push(Box::new(bool_to_int(viewer.admin)));
    params.push(Box::new(viewer.id));
    format!(
        "(j.private_notes = 0 OR j.user_id = ? OR {})
     AND (COALESCE(j.notes, '') <> '' OR EXISTS (
         SELECT 1 FROM journal_details d WHERE d.journal_id = j.id AND (
             d.property <> 'cf' OR EXISTS (
                 SELECT 1 FROM custom_fields f
                 WHERE f.id = CAST(d.prop_key AS INTEGER) AND (f.visible = 1 OR ? = 1 OR EXISTS (
                     SELECT 1 FROM custom_field_roles r
                     JOIN members m2 ON m2.role_id = r.role_id
                     WHERE r.custom_field_id = f.id AND m2.user_id = ?
                       AND m2.project_id = c.project_id))))))",
        private_allowed
    )
}

impl SqliteContactStore {
    /// Runs `JOURNAL_SELECT` with the given tail and attaches every detail.
    fn load_journals(
        &self,
        conn: &Connection,
        tail: &str,
        params: &[Box<dyn ToSql>],
    ) -> Result<Vec<Journal>> {
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&format!("{} {}", JOURNAL_SELECT, tail))?;
        self.count_fetch();
        let mut journals = stmt
            .query_map(param_refs.as_slice(), |row| {
                let user = row_to_user(row, 6)?;
                Ok(Journal {
                    id: row.get(0)?,
                    contact_id: row.get(1)?,
                    user_id: row.get(2)?,
                    user_name: user.name(),
                    notes: row.get(3)?,
                    private_notes: row.get::<_, i32>(4)? != 0,
                    created_on: row.get(5)?,
                    details: vec![],
                    indice: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if journals.is_empty() {
            return Ok(journals);
        }

        let ids: Vec<i64> = journals.iter().map(|j| j.id).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, journal_id, property, prop_key, old_value, value
             FROM journal_details WHERE journal_id IN ({}) ORDER BY id",
            placeholders(ids.len())
        ))?;
        self.count_fetch();
        let mut details: HashMap<i64, Vec<JournalDetail>> = HashMap::new();
        for row in stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })? {
            let (id, journal_id, property, prop_key, old_value, value) = row?;
            let property = DetailProperty::from_db_str(&property)
                .ok_or_else(|| anyhow!("Unknown detail property {} on detail {}", property, id))?;
            details.entry(journal_id).or_default().push(JournalDetail {
                id,
                journal_id,
                property,
                prop_key,
                old_value,
                value,
            });
        }
        for journal in journals.iter_mut() {
            journal.details = details.remove(&journal.id).unwrap_or_default();
        }
        Ok(journals)
    }
}

impl JournalStore for SqliteContactStore {
    fn last_journal_id(&self, contact_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        self.count_fetch();
        let id: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM journals WHERE contact_id = ?1",
            params![contact_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn journals_after(&self, contact_id: i64, watermark: Option<i64>) -> Result<Vec<Journal>> {
        let conn = self.conn.lock().unwrap();
        let params: Vec<Box<dyn ToSql>> = vec![Box::new(contact_id), Box::new(watermark)];
        self.load_journals(
            &conn,
            "WHERE j.contact_id = ?1 AND (?2 IS NULL OR j.id > ?2) ORDER BY j.id",
            &params,
        )
    }

    fn get_journals(&self, contact_id: i64) -> Result<Vec<Journal>> {
        let conn = self.conn.lock().unwrap();
        let params: Vec<Box<dyn ToSql>> = vec![Box::new(contact_id)];
        self.load_journals(
            &conn,
            "WHERE j.contact_id = ? ORDER BY j.created_on, j.id",
            &params,
        )
    }

    fn get_journal(&self, journal_id: i64) -> Result<Option<Journal>> {
        let conn = self.conn.lock().unwrap();
        let params: Vec<Box<dyn ToSql>> = vec![Box::new(journal_id)];
        Ok(self
            .load_journals(&conn, "WHERE j.id = ?", &params)?
            .into_iter()
            .next())
    }

    fn get_journals_for_contacts(&self, contact_ids: &[i64]) -> Result<Vec<Journal>> {
        if contact_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().unwrap();
        let params: Vec<Box<dyn ToSql>> = contact_ids
            .iter()
            .map(|id| Box::new(*id) as Box<dyn ToSql>)
            .collect();
        self.load_journals(
            &conn,
            &format!(
                "WHERE j.contact_id IN ({}) ORDER BY j.created_on, j.id",
                placeholders(contact_ids.len())
            ),
            &params,
        )
    }

    fn viewer_context(&self, viewer: &User, project_id: i64) -> Result<ViewerContext> {
        let conn = self.conn.lock().unwrap();
        Ok(ViewerContext {
            user_id: viewer.id,
            can_view_private_notes: allowed_to(
                &conn,
                viewer,
                Permission::ViewPrivateNotes,
                project_id,
            )?,
            visible_custom_field_ids: visible_fields_for(&conn, viewer, Some(project_id))?
                .into_iter()
                .map(|f| f.id)
                .collect(),
        })
    }

    fn last_updated_by(
        &self,
        contact_ids: &[i64],
        viewer: &User,
    ) -> Result<HashMap<i64, Option<User>>> {
        let mut result: HashMap<i64, Option<User>> =
            contact_ids.iter().map(|id| (*id, None)).collect();
        if contact_ids.is_empty() {
            return Ok(result);
        }
        let conn = self.conn.lock().unwrap();

        let mut params: Vec<Box<dyn ToSql>> = contact_ids
            .iter()
            .map(|id| Box::new(*id) as Box<dyn ToSql>)
            .collect();
        let viewable =
            allowed_projects_condition("c.project_id", viewer, Permission::ViewContacts, &mut params);
        let condition = visible_journal_condition(viewer, &mut params);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT MAX(j.id) FROM journals j JOIN contacts c ON c.id = j.contact_id
             WHERE j.contact_id IN ({}) AND {} AND {}
             GROUP BY j.contact_id",
            placeholders(contact_ids.len()),
            viewable,
            condition
        ))?;
        self.count_fetch();
        let journal_ids = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if journal_ids.is_empty() {
            return Ok(result);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT j.contact_id, u.id, u.login, u.firstname, u.lastname, u.admin
             FROM journals j JOIN users u ON u.id = j.user_id
             WHERE j.id IN ({})",
            placeholders(journal_ids.len())
        ))?;
        self.count_fetch();
        for row in stmt.query_map(params_from_iter(journal_ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row_to_user(row, 1)?))
        })? {
            let (contact_id, user) = row?;
            result.insert(contact_id, Some(user));
        }
        Ok(result)
    }
}

impl ReferenceLookup for SqliteContactStore {
    fn reference_name(&self, kind: ReferenceKind, id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(match kind {
            ReferenceKind::Project => load_project(&conn, id)?.map(|p| p.name),
            ReferenceKind::User => load_user(&conn, id)?.map(|u| u.name()),
        })
    }
}
