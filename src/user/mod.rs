pub mod permissions;
pub mod settings;
pub mod user_models;
mod user_store;

pub use permissions::{BuiltinRole, Permission, Role};
pub use settings::UserSetting;
pub use user_models::{Membership, Project, ProjectStatus, User};
pub use user_store::{ProjectStore, UserSettingsStore, UserStore};
