use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tokio::task;
use tracing::info;

use crate::entities::users;

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            is_admin: model.is_admin,
            created_at: model.created_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Verify credentials; returns the user on success, None on unknown
    /// username or wrong password (callers must not distinguish the two).
    ///
    /// Argon2 verification is CPU-intensive and runs in `spawn_blocking` so
    /// it does not stall the async runtime.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for credential verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }

    /// Create an account with a freshly hashed password. Usernames are
    /// unique; inserting a duplicate fails.
    pub async fn create(&self, username: &str, password: &str, is_admin: bool) -> Result<User> {
        let password = password.to_string();
        let password_hash = task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let user = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = user
            .insert(&self.conn)
            .await
            .context("Failed to create user")?;

        Ok(User::from(model))
    }

    /// Create the bootstrap admin account if no user with that name exists.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<()> {
        if self.get_by_username(username).await?.is_some() {
            return Ok(());
        }

        self.create(username, password, true).await?;
        info!("Seeded bootstrap admin user: {username}");
        Ok(())
    }

    /// Delete a user together with all of their track records in one
    /// transaction. Returns false when no such user exists. Backing files
    /// must already have been removed by the caller; file deletion is not
    /// covered by the database transaction.
    pub async fn delete_with_tracks(&self, user_id: i32) -> Result<bool> {
        use sea_orm::TransactionTrait;

        use crate::entities::tracks;

        let Some(user) = users::Entity::find_by_id(user_id).one(&self.conn).await? else {
            return Ok(false);
        };

        let txn = self.conn.begin().await?;

        tracks::Entity::delete_many()
            .filter(tracks::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .context("Failed to delete user's tracks")?;

        users::Entity::delete_by_id(user.id)
            .exec(&txn)
            .await
            .context("Failed to delete user")?;

        txn.commit().await?;

        info!("Deleted user {} and their tracks", user.username);
        Ok(true)
    }

    /// Paginated user listing for the admin panel (1-based page).
    pub async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64)> {
        let paginator = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .paginate(&self.conn, page_size);

        let total_pages = paginator.num_pages().await?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch user page")?;

        Ok((users.into_iter().map(User::from).collect(), total_pages))
    }
}

/// Hash a password using Argon2id with default params.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::PasswordVerifier;

    #[test]
    fn test_hash_password_verifies() {
        let hash = hash_password("hunter2").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter2", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong", &parsed)
                .is_err()
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }
}
