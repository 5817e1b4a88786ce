//! Registration, login, and session restore over bcrypt-hashed passwords.
//!
//! Unknown username and wrong password produce the same error message so a
//! failed login never reveals which usernames exist.

use crate::domain::{DomainError, User};
use crate::ports::{SessionPort, UserRepoPort};
use std::sync::Arc;
use tracing::info;

/// Auth service. Owns no state beyond its ports; the logged-in user lives
/// in the session store.
pub struct AuthService {
    users: Arc<dyn UserRepoPort>,
    session: Arc<dyn SessionPort>,
    /// bcrypt work factor for newly created hashes. Verification reads the
    /// factor out of the stored hash, so changing this never locks anyone out.
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepoPort>, session: Arc<dyn SessionPort>, bcrypt_cost: u32) -> Self {
        Self {
            users,
            session,
            bcrypt_cost,
        }
    }

    /// Create an account and log it in.
    ///
    /// Rejects empty/whitespace usernames and passwords, and usernames that
    /// already exist. The schema enforces uniqueness as well, so a race
    /// between two registrations still cannot produce duplicates.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, DomainError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(DomainError::Auth(
                "Username and password must not be empty".into(),
            ));
        }
        if self.users.find_by_username(username).await?.is_some() {
            return Err(DomainError::Auth("Username already exists".into()));
        }

        let password_hash = bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| DomainError::Auth(format!("hash password: {}", e)))?;
        let user = self.users.create_user(username, &password_hash).await?;
        self.session.set_current_user(user.id).await?;

        info!(user_id = user.id, username, "registered new user");
        Ok(user)
    }

    /// Verify credentials and persist the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, DomainError> {
        let user = match self.users.find_by_username(username.trim()).await? {
            Some(user) => user,
            None => return Err(Self::invalid_credentials()),
        };
        let verified = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| DomainError::Auth(format!("verify password: {}", e)))?;
        if !verified {
            return Err(Self::invalid_credentials());
        }
        self.session.set_current_user(user.id).await?;

        info!(user_id = user.id, username = %user.username, "logged in");
        Ok(user)
    }

    /// Forget the persisted session.
    pub async fn logout(&self) -> Result<(), DomainError> {
        self.session.clear().await
    }

    /// Map the persisted session back to a user, if one is stored.
    ///
    /// A stale id (account no longer in the repository) clears the session
    /// and restores nothing instead of failing.
    pub async fn restore_session(&self) -> Result<Option<User>, DomainError> {
        let Some(user_id) = self.session.current_user_id().await? else {
            return Ok(None);
        };
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(Some(user)),
            None => {
                info!(user_id, "stale session cleared");
                self.session.clear().await?;
                Ok(None)
            }
        }
    }

    fn invalid_credentials() -> DomainError {
        DomainError::Auth("Invalid username or password".into())
    }
}
