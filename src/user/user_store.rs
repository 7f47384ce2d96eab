use super::permissions::{Permission, Role};
use super::settings::UserSetting;
use super::user_models::{Membership, Project, ProjectStatus, User};
use anyhow::Result;

pub trait UserStore: Send + Sync {
    /// Creates a new user and returns the user id.
    fn create_user(&self, login: &str, firstname: &str, lastname: &str, admin: bool)
        -> Result<i64>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Returns Ok(None) if no user has the given login.
    fn get_user_by_login(&self, login: &str) -> Result<Option<User>>;
}

pub trait ProjectStore: Send + Sync {
    /// Creates an active project and returns its id.
    fn create_project(&self, name: &str) -> Result<i64>;

    fn get_project(&self, project_id: i64) -> Result<Option<Project>>;

    fn set_project_status(&self, project_id: i64, status: ProjectStatus) -> Result<()>;

    /// Creates a role with the given permissions and returns its id.
    fn create_role(&self, name: &str, permissions: &[Permission]) -> Result<i64>;

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    fn add_member(&self, membership: Membership) -> Result<()>;

    /// Roles the user holds on the project, empty if not a member.
    fn get_user_roles(&self, user_id: i64, project_id: i64) -> Result<Vec<Role>>;

    /// Whether `user` holds `permission` on the project. Admins are allowed
    /// everything on non-archived projects.
    fn is_allowed_to(&self, user: &User, permission: Permission, project_id: i64) -> Result<bool>;

    /// Ids of non-archived projects on which `user` holds `permission`.
    fn allowed_project_ids(&self, user: &User, permission: Permission) -> Result<Vec<i64>>;
}

pub trait UserSettingsStore: Send + Sync {
    /// Returns Ok(None) when the user never stored this setting.
    fn get_user_setting(&self, user_id: i64, key: &str) -> Result<Option<UserSetting>>;

    fn set_user_setting(&self, user_id: i64, setting: UserSetting) -> Result<()>;

    /// The newest-first history preference, `false` when unset.
    fn wants_comments_in_reverse_order(&self, user_id: i64) -> Result<bool> {
        Ok(matches!(
            self.get_user_setting(user_id, "comments_in_reverse_order")?,
            Some(UserSetting::CommentsInReverseOrder(true))
        ))
    }
}
