use tracing::info;
use uuid::Uuid;

use hearth_db::models::UserRow;
use hearth_types::models::{Session, User};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// What login needs to check a password. Never serialized.
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

impl Workflows {
    /// Creates the account unless `username` is taken. The caller hashes the
    /// password and checks the username format.
    pub fn register_user(
        &self,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> WorkflowResult<User> {
        let display_name = validate_display_name(display_name)?;
        let id = Uuid::new_v4();
        let uid = id.to_string();
        let created = retry_once("create user", || {
            self.db.create_user(&uid, username, display_name, password_hash)
        })?;
        if !created {
            return Err(WorkflowError::UsernameTaken);
        }
        info!("Registered user {} ({})", username, id);
        self.get_user(id)
    }

    pub fn credentials(&self, username: &str) -> WorkflowResult<Option<Credentials>> {
        let Some(row) = retry_once("load credentials", || self.db.get_user_by_username(username))?
        else {
            return Ok(None);
        };
        let password_hash = row.password.clone();
        let user = row.into_model().map_err(WorkflowError::Store)?;
        Ok(Some(Credentials {
            user,
            password_hash,
        }))
    }

    pub fn get_user(&self, user_id: Uuid) -> WorkflowResult<User> {
        let uid = user_id.to_string();
        retry_once("load user", || self.db.get_user_by_id(&uid))?
            .ok_or_else(|| WorkflowError::NotFound(format!("user {}", user_id)))
            .and_then(|row: UserRow| row.into_model().map_err(WorkflowError::Store))
    }

    /// Profile edit. Only the display name is editable.
    pub fn update_profile(&self, session: &Session, display_name: &str) -> WorkflowResult<User> {
        let display_name = validate_display_name(display_name)?;
        let uid = session.user_id.to_string();
        let row = retry_once("update display name", || {
            self.db.update_display_name(&uid, display_name)
        })?
        .ok_or_else(|| WorkflowError::NotFound(format!("user {}", session.user_id)))?;
        info!("User {} is now shown as {:?}", session.user_id, display_name);
        row.into_model().map_err(WorkflowError::Store)
    }

    pub(crate) fn require_user(&self, user_id: Uuid) -> WorkflowResult<()> {
        let uid = user_id.to_string();
        if retry_once("check user", || self.db.user_exists(&uid))? {
            Ok(())
        } else {
            Err(WorkflowError::NotFound(format!("user {}", user_id)))
        }
    }
}

fn validate_display_name(name: &str) -> WorkflowResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WorkflowError::validation("display name is required"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(WorkflowError::validation(format!(
            "display name is longer than {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name)
}
