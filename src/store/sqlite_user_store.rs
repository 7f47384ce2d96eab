use super::{bool_to_int, SqliteContactStore};
use crate::user::{
    Membership, Permission, Project, ProjectStatus, ProjectStore, Role, User, UserSetting,
    UserSettingsStore, UserStore,
};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;

const USER_COLUMNS: &str = "id, login, firstname, lastname, admin";

pub(super) fn row_to_user(row: &Row, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        login: row.get(offset + 1)?,
        firstname: row.get(offset + 2)?,
        lastname: row.get(offset + 3)?,
        admin: row.get::<_, i32>(offset + 4)? != 0,
    })
}

pub(super) fn load_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            |row| row_to_user(row, 0),
        )
        .optional()?)
}

fn load_role_permissions(conn: &Connection, role_id: i64) -> Result<Vec<Permission>> {
    let mut stmt =
        conn.prepare("SELECT permission FROM role_permissions WHERE role_id = ?1 ORDER BY permission")?;
    let permissions = stmt
        .query_map(params![role_id], |row| row.get::<_, i32>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .filter_map(Permission::from_int)
        .collect();
    Ok(permissions)
}

pub(super) fn load_project(conn: &Connection, project_id: i64) -> Result<Option<Project>> {
    let row = conn
        .query_row(
            "SELECT id, name, status FROM projects WHERE id = ?1",
            params![project_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i32>(2)?)),
        )
        .optional()?;
    row.map(|(id, name, status)| -> Result<Project> {
        Ok(Project {
            id,
            name,
            status: ProjectStatus::from_int(status)
                .with_context(|| format!("Invalid status {} for project {}", status, id))?,
        })
    })
    .transpose()
}

/// Admins hold every permission; nobody holds any on an archived project.
pub(super) fn allowed_to(
    conn: &Connection,
    user: &User,
    permission: Permission,
    project_id: i64,
) -> Result<bool> {
    match load_project(conn, project_id)? {
        None => return Ok(false),
        Some(project) if project.status == ProjectStatus::Archived => return Ok(false),
        Some(_) => {}
    }
    if user.admin {
        return Ok(true);
    }
    let allowed = conn
        .query_row(
            "SELECT 1 FROM members m
             JOIN role_permissions rp ON rp.role_id = m.role_id
             WHERE m.user_id = ?1 AND m.project_id = ?2 AND rp.permission = ?3
             LIMIT 1",
            params![user.id, project_id, permission.as_int()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(allowed)
}

/// SQL counterpart of `allowed_to`: holds when the project id in `column`
/// is not archived and `user` is admin or holds `permission` through a role.
pub(super) fn allowed_projects_condition(
    column: &str,
    user: &User,
    permission: Permission,
    params: &mut Vec<Box<dyn ToSql>>,
) -> String {
    params.push(Box::new(ProjectStatus::Archived.to_int()));
    params.push(Box::new(bool_to_int(user.admin)));
    params.push(Box::new(user.id));
    params.push(Box::new(permission.as_int()));
    format!(
        "{} IN (
         SELECT p.id FROM projects p WHERE p.status <> ? AND (? = 1 OR EXISTS (
             SELECT 1 FROM members m JOIN role_permissions rp ON rp.role_id = m.role_id
             WHERE m.project_id = p.id AND m.user_id = ? AND rp.permission = ?)))",
        column
    )
}

impl UserStore for SqliteContactStore {
    fn create_user(
        &self,
        login: &str,
        firstname: &str,
        lastname: &str,
        admin: bool,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (login, firstname, lastname, admin) VALUES (?1, ?2, ?3, ?4)",
            params![login, firstname, lastname, bool_to_int(admin)],
        )
        .with_context(|| format!("Failed to create user {}", login))?;
        let id = conn.last_insert_rowid();
        debug!("Created user {} with id {}", login, id);
        Ok(id)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        load_user(&conn, user_id)
    }

    fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM users WHERE login = ?1", USER_COLUMNS),
                params![login],
                |row| row_to_user(row, 0),
            )
            .optional()?)
    }
}

impl ProjectStore for SqliteContactStore {
    fn create_project(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO projects (name, status) VALUES (?1, ?2)",
            params![name, ProjectStatus::Active.to_int()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_project(&self, project_id: i64) -> Result<Option<Project>> {
        let conn = self.conn.lock().unwrap();
        load_project(&conn, project_id)
    }

    fn set_project_status(&self, project_id: i64, status: ProjectStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE projects SET status = ?1 WHERE id = ?2",
            params![status.to_int(), project_id],
        )?;
        if updated == 0 {
            return Err(anyhow!("Project {} not found", project_id));
        }
        Ok(())
    }

    fn create_role(&self, name: &str, permissions: &[Permission]) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("INSERT INTO roles (name) VALUES (?1)", params![name])
            .with_context(|| format!("Failed to create role {}", name))?;
        let role_id = tx.last_insert_rowid();
        for permission in permissions {
            tx.execute(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission) VALUES (?1, ?2)",
                params![role_id, permission.as_int()],
            )?;
        }
        tx.commit()?;
        Ok(role_id)
    }

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn.lock().unwrap();
        let role_id: Option<i64> = conn
            .query_row("SELECT id FROM roles WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        role_id
            .map(|id| -> Result<Role> {
                Ok(Role {
                    id,
                    name: name.to_string(),
                    permissions: load_role_permissions(&conn, id)?,
                })
            })
            .transpose()
    }

    fn add_member(&self, membership: Membership) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO members (user_id, project_id, role_id) VALUES (?1, ?2, ?3)",
            params![membership.user_id, membership.project_id, membership.role_id],
        )?;
        Ok(())
    }

    fn get_user_roles(&self, user_id: i64, project_id: i64) -> Result<Vec<Role>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.name FROM roles r
             JOIN members m ON m.role_id = r.id
             WHERE m.user_id = ?1 AND m.project_id = ?2
             ORDER BY r.id",
        )?;
        let roles = stmt
            .query_map(params![user_id, project_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        roles
            .into_iter()
            .map(|(id, name)| -> Result<Role> {
                Ok(Role {
                    id,
                    name,
                    permissions: load_role_permissions(&conn, id)?,
                })
            })
            .collect()
    }

    fn is_allowed_to(&self, user: &User, permission: Permission, project_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        allowed_to(&conn, user, permission, project_id)
    }

    fn allowed_project_ids(&self, user: &User, permission: Permission) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT p.id FROM projects p
             WHERE p.status <> ?1
               AND (?2 = 1 OR EXISTS (
                   SELECT 1 FROM members m
                   JOIN role_permissions rp ON rp.role_id = m.role_id
                   WHERE m.project_id = p.id AND m.user_id = ?3 AND rp.permission = ?4))
             ORDER BY p.id",
        )?;
        let ids = stmt
            .query_map(
                params![
                    ProjectStatus::Archived.to_int(),
                    bool_to_int(user.admin),
                    user.id,
                    permission.as_int()
                ],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }
}

impl UserSettingsStore for SqliteContactStore {
    fn get_user_setting(&self, user_id: i64, key: &str) -> Result<Option<UserSetting>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM user_preferences WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|v| UserSetting::from_key_value(key, &v).map_err(|e| anyhow!(e)))
            .transpose()
    }

    fn set_user_setting(&self, user_id: i64, setting: UserSetting) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_preferences (user_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value",
            params![user_id, setting.key(), setting.value_to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::BuiltinRole;

    fn store_with_member(builtin: BuiltinRole) -> (SqliteContactStore, User, i64) {
        let store = SqliteContactStore::in_memory().unwrap();
        let user_id = store.create_user("jsmith", "John", "Smith", false).unwrap();
        let project_id = store.create_project("Sales").unwrap();
        let role_id = store
            .create_role(builtin.as_str(), builtin.permissions())
            .unwrap();
        store
            .add_member(Membership {
                user_id,
                project_id,
                role_id,
            })
            .unwrap();
        let user = store.get_user(user_id).unwrap().unwrap();
        (store, user, project_id)
    }

    #[test]
    fn users_by_id_and_login() {
        let store = SqliteContactStore::in_memory().unwrap();
        let id = store.create_user("admin", "Ada", "Min", true).unwrap();
        let user = store.get_user_by_login("admin").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(user.admin);
        assert!(store.get_user(id + 1).unwrap().is_none());
        assert!(store.create_user("admin", "", "", false).is_err());
    }

    #[test]
    fn permissions_follow_roles() {
        let (store, user, project_id) = store_with_member(BuiltinRole::Viewer);
        assert!(store
            .is_allowed_to(&user, Permission::ViewContacts, project_id)
            .unwrap());
        assert!(!store
            .is_allowed_to(&user, Permission::ViewPrivateNotes, project_id)
            .unwrap());

        let other_project = store.create_project("Support").unwrap();
        assert!(!store
            .is_allowed_to(&user, Permission::ViewContacts, other_project)
            .unwrap());
        assert_eq!(
            store
                .allowed_project_ids(&user, Permission::ViewContacts)
                .unwrap(),
            vec![project_id]
        );
    }

    #[test]
    fn archived_projects_allow_nothing() {
        let (store, user, project_id) = store_with_member(BuiltinRole::Manager);
        store
            .set_project_status(project_id, ProjectStatus::Archived)
            .unwrap();
        assert!(!store
            .is_allowed_to(&user, Permission::ViewContacts, project_id)
            .unwrap());

        let admin_id = store.create_user("root", "Root", "", true).unwrap();
        let admin = store.get_user(admin_id).unwrap().unwrap();
        assert!(!store
            .is_allowed_to(&admin, Permission::ViewContacts, project_id)
            .unwrap());
        assert!(store
            .allowed_project_ids(&admin, Permission::ViewContacts)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn user_roles_carry_permissions() {
        let (store, user, project_id) = store_with_member(BuiltinRole::Editor);
        let roles = store.get_user_roles(user.id, project_id).unwrap();
        assert_eq!(roles.len(), 1);
        assert!(roles[0].allows(Permission::ManageContacts));
        assert!(!roles[0].allows(Permission::SetNotesPrivate));
        assert_eq!(
            store.get_role_by_name("Editor").unwrap().unwrap().id,
            roles[0].id
        );
    }

    #[test]
    fn settings_roundtrip_and_default() {
        let (store, user, _) = store_with_member(BuiltinRole::Viewer);
        assert!(!store.wants_comments_in_reverse_order(user.id).unwrap());
        store
            .set_user_setting(user.id, UserSetting::CommentsInReverseOrder(true))
            .unwrap();
        assert!(store.wants_comments_in_reverse_order(user.id).unwrap());
        store
            .set_user_setting(user.id, UserSetting::CommentsInReverseOrder(false))
            .unwrap();
        assert!(!store.wants_comments_in_reverse_order(user.id).unwrap());
    }
}
