//! Role model and capability checks

use super::text_enum;

text_enum! {
    /// Coarse capability tier of a user
    Role("role") {
        User => "user",
        Trainer => "trainer",
        Admin => "admin",
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Trainers and admins run trainings and skip the subscription check
    pub fn is_staff(&self) -> bool {
        match self {
            Role::Trainer | Role::Admin => true,
            Role::User => false,
        }
    }
}
