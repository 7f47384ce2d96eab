use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ViewContacts,
    ManageContacts,
    ViewPrivateNotes,
    SetNotesPrivate,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ViewContacts,
        Permission::ManageContacts,
        Permission::ViewPrivateNotes,
        Permission::SetNotesPrivate,
    ];

    pub fn as_int(self) -> i32 {
        match self {
            Permission::ViewContacts => 1,
            Permission::ManageContacts => 2,
            Permission::ViewPrivateNotes => 3,
            Permission::SetNotesPrivate => 4,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(Permission::ViewContacts),
            2 => Some(Permission::ManageContacts),
            3 => Some(Permission::ViewPrivateNotes),
            4 => Some(Permission::SetNotesPrivate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewContacts => "view_contacts",
            Permission::ManageContacts => "manage_contacts",
            Permission::ViewPrivateNotes => "view_private_notes",
            Permission::SetNotesPrivate => "set_notes_private",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const MANAGER_PERMISSIONS: &[Permission] = &Permission::ALL;
const EDITOR_PERMISSIONS: &[Permission] = &[Permission::ViewContacts, Permission::ManageContacts];
const VIEWER_PERMISSIONS: &[Permission] = &[Permission::ViewContacts];

/// Role presets and their default permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRole {
    Manager,
    Editor,
    Viewer,
}

impl BuiltinRole {
    pub const ALL: [BuiltinRole; 3] = [BuiltinRole::Manager, BuiltinRole::Editor, BuiltinRole::Viewer];

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            BuiltinRole::Manager => MANAGER_PERMISSIONS,
            BuiltinRole::Editor => EDITOR_PERMISSIONS,
            BuiltinRole::Viewer => VIEWER_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinRole::Manager => "Manager",
            BuiltinRole::Editor => "Editor",
            BuiltinRole::Viewer => "Viewer",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manager" => Some(BuiltinRole::Manager),
            "editor" => Some(BuiltinRole::Editor),
            "viewer" => Some(BuiltinRole::Viewer),
            _ => None,
        }
    }
}

/// A named bundle of permissions, granted to users per project through memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
