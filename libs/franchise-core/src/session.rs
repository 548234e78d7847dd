//! Session context: the signed-in user, their token and permissions
//!
//! A [`SessionContext`] is created once at startup and handed to whatever
//! needs the current identity. Persistence goes through a [`SessionStore`] so
//! the CLI can keep the session in a JSON file and tests can keep it in memory.

use crate::api::UserApi;
use crate::error::{FranchiseError, Result};
use crate::models::{Permission, Permissions, Role, User};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

/// Persisted session state
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    pub signed_in_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("permissions", &self.permissions)
            .field("signed_in_at", &self.signed_in_at)
            .finish()
    }
}

/// Where a session is kept between runs
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any
    ///
    /// # Errors
    /// Returns an error if the stored session exists but cannot be read
    fn load(&self) -> Result<Option<Session>>;

    /// Persist the session
    ///
    /// # Errors
    /// Returns an error if the session cannot be written
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove the stored session
    ///
    /// # Errors
    /// Returns an error if the stored session cannot be removed
    fn clear(&self) -> Result<()>;
}

/// Session kept as a JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session kept in process memory
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.lock() = None;
        Ok(())
    }
}

/// Typed access to the current session
pub struct SessionContext {
    store: Box<dyn SessionStore>,
    state: RwLock<Option<Session>>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Open the context, loading whatever session the store holds
    ///
    /// # Errors
    /// Returns an error if the store cannot be read
    pub fn open(store: impl SessionStore + 'static) -> Result<Self> {
        let session = store.load()?;
        debug!(signed_in = session.is_some(), "Session context opened");
        Ok(Self {
            store: Box::new(store),
            state: RwLock::new(session),
        })
    }

    /// Context backed by memory only
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemorySessionStore::new()),
            state: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.state.read().is_some()
    }

    /// Copy of the whole session
    #[must_use]
    pub fn snapshot(&self) -> Option<Session> {
        self.state.read().clone()
    }

    /// Bearer token for API calls
    ///
    /// # Errors
    /// Returns `FranchiseError::Unauthenticated` if nobody is signed in
    pub fn token(&self) -> Result<String> {
        self.state
            .read()
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or_else(|| FranchiseError::unauthenticated("no session token"))
    }

    /// The signed-in user
    ///
    /// # Errors
    /// Returns `FranchiseError::Unauthenticated` if nobody is signed in
    pub fn current_user(&self) -> Result<SessionUser> {
        self.state
            .read()
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or_else(|| FranchiseError::unauthenticated("no signed-in user"))
    }

    /// Id of the signed-in user
    ///
    /// # Errors
    /// Returns `FranchiseError::Unauthenticated` if nobody is signed in
    pub fn user_id(&self) -> Result<String> {
        self.current_user().map(|u| u.id)
    }

    /// Effective permissions; admins hold every permission
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        match self.state.read().as_ref() {
            Some(session) if session.user.role.is_admin() => Permissions::all(),
            Some(session) => session.permissions.unwrap_or_default(),
            None => Permissions::default(),
        }
    }

    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions().allows(permission)
    }

    /// Fail unless the current user holds `permission`
    ///
    /// # Errors
    /// Returns `FranchiseError::Unauthenticated` when signed out and
    /// `FranchiseError::PermissionDenied` when the flag is missing
    pub fn require(&self, permission: Permission) -> Result<()> {
        if !self.is_signed_in() {
            return Err(FranchiseError::unauthenticated("sign in first"));
        }
        if self.can(permission) {
            Ok(())
        } else {
            Err(FranchiseError::permission_denied(permission.as_str()))
        }
    }

    /// Start a session for `user` with `token`
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted
    #[instrument(skip(self, token, user), fields(user_id = %user.id))]
    pub fn sign_in(&self, token: impl Into<String>, user: &User) -> Result<()> {
        let session = Session {
            token: token.into(),
            user: SessionUser::from(user),
            permissions: Some(user.permissions),
            signed_in_at: Utc::now(),
        };
        self.store.save(&session)?;
        *self.state.write() = Some(session);
        info!("Signed in");
        Ok(())
    }

    /// Replace the cached permissions
    ///
    /// # Errors
    /// Returns `FranchiseError::Unauthenticated` if nobody is signed in, or
    /// an error if the session cannot be persisted
    pub fn set_permissions(&self, permissions: Permissions) -> Result<()> {
        let updated = {
            let mut state = self.state.write();
            let session = state
                .as_mut()
                .ok_or_else(|| FranchiseError::unauthenticated("no session to update"))?;
            session.permissions = Some(permissions);
            session.clone()
        };
        self.store.save(&updated)
    }

    /// Fetch the current user's permissions from the backend and cache them
    ///
    /// # Errors
    /// Returns an error if signed out, if the fetch fails, or if the session
    /// cannot be persisted
    #[instrument(skip(self, api))]
    pub async fn refresh_permissions(&self, api: &dyn UserApi) -> Result<Permissions> {
        let user_id = self.user_id()?;
        let permissions = api.get_permissions(&user_id).await?;
        self.set_permissions(permissions)?;
        debug!(?permissions, "Permissions refreshed");
        Ok(permissions)
    }

    /// End the session
    ///
    /// # Errors
    /// Returns an error if the stored session cannot be removed
    pub fn sign_out(&self) -> Result<()> {
        self.store.clear()?;
        *self.state.write() = None;
        info!("Signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_user, MockBackend};
    use tempfile::TempDir;

    #[test]
    fn test_signed_out_context() {
        let session = SessionContext::in_memory();
        assert!(!session.is_signed_in());
        assert!(matches!(
            session.token(),
            Err(FranchiseError::Unauthenticated { .. })
        ));
        assert_eq!(session.permissions(), Permissions::default());
        assert!(matches!(
            session.require(Permission::Edit),
            Err(FranchiseError::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_sign_in_and_permissions() {
        let session = SessionContext::in_memory();
        let mut user = mock_user("u1", "Asha");
        user.permissions.remarks = true;
        session.sign_in("tok-1", &user).unwrap();

        assert_eq!(session.token().unwrap(), "tok-1");
        assert_eq!(session.user_id().unwrap(), "u1");
        assert!(session.can(Permission::Remarks));
        assert!(!session.can(Permission::Delete));
        assert!(matches!(
            session.require(Permission::Delete),
            Err(FranchiseError::PermissionDenied { permission }) if permission == "delete"
        ));
    }

    #[test]
    fn test_admin_holds_every_permission() {
        let session = SessionContext::in_memory();
        let mut user = mock_user("a1", "Root");
        user.role = Role::SuperAdmin;
        session.sign_in("tok", &user).unwrap();
        assert!(session.can(Permission::AllCaseAccess));
        assert!(session.require(Permission::Delete).is_ok());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let session = SessionContext::open(FileSessionStore::new(&path)).unwrap();
        session.sign_in("tok-2", &mock_user("u2", "Ravi")).unwrap();
        assert!(path.exists());

        let reopened = SessionContext::open(FileSessionStore::new(&path)).unwrap();
        assert_eq!(reopened.token().unwrap(), "tok-2");
        assert_eq!(reopened.current_user().unwrap().name, "Ravi");

        reopened.sign_out().unwrap();
        assert!(!path.exists());
        let reopened = SessionContext::open(FileSessionStore::new(&path)).unwrap();
        assert!(!reopened.is_signed_in());
    }

    #[test]
    fn test_file_store_clear_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("absent.json"));
        assert!(store.clear().is_ok());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = SessionContext::in_memory();
        session.sign_in("secret-token", &mock_user("u1", "Asha")).unwrap();
        let rendered = format!("{:?}", session.snapshot().unwrap());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_refresh_permissions() {
        let backend = MockBackend::new();
        let mut user = mock_user("u1", "Asha");
        user.permissions = Permissions {
            edit: true,
            ..Permissions::default()
        };
        backend.add_user(user.clone());

        let session = SessionContext::in_memory();
        session.sign_in("tok", &mock_user("u1", "Asha")).unwrap();
        assert!(!session.can(Permission::Edit));

        let permissions = session.refresh_permissions(&backend).await.unwrap();
        assert!(permissions.edit);
        assert!(session.can(Permission::Edit));
    }
}
