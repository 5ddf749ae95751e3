use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Explicit allow-list of mutable fields. Anything else in an update request
/// body is dropped before it gets here, so there is no mass assignment.
#[derive(Debug, Clone)]
pub struct UserPatch {
    pub name: String,
    pub email: String,
}

/// Persistence seam for the user directory. The service logic runs unchanged
/// against the in-memory implementation (tests, dev) and Postgres.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, new: NewUser) -> Result<User, StoreError>;
    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;
    async fn set_avatar(&self, id: Uuid, avatar: Option<String>)
        -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

// --- in-memory store ---

/// Vec keeps insertion order, which is the order List returns. Email
/// uniqueness holds because every check-then-write runs under the write lock.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            role: None,
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.id != id && u.email == patch.email) {
            return Err(StoreError::DuplicateEmail);
        }
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.name = patch.name;
            u.email = patch.email;
            u.clone()
        }))
    }

    async fn set_avatar(
        &self,
        id: Uuid,
        avatar: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.avatar = avatar;
            u.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let pos = users.iter().position(|u| u.id == id);
        Ok(pos.map(|i| users.remove(i)))
    }
}

// --- postgres store ---

/// Postgres-backed store. The unique index on `users(email)` is the real
/// uniqueness guarantee; violations surface as `DuplicateEmail`.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, name, email, role, avatar, created_at";

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Backend(e.into()),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(map_sqlx)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.email)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn set_avatar(
        &self,
        id: Uuid,
        avatar: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(avatar)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids_in_order() {
        let store = MemoryStore::default();
        let a = store.insert(new("Alice", "alice@example.com")).await.unwrap();
        let b = store.insert(new("Bob", "bob@example.com")).await.unwrap();
        assert_ne!(a.id, b.id);

        let listed = store.list().await.unwrap();
        assert_eq!(
            listed.iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[tokio::test]
    async fn insert_enforces_email_uniqueness() {
        let store = MemoryStore::default();
        store.insert(new("Alice", "alice@example.com")).await.unwrap();
        let err = store.insert(new("Bob", "alice@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_excludes_own_email_from_conflict() {
        let store = MemoryStore::default();
        let a = store.insert(new("Alice", "alice@example.com")).await.unwrap();
        store.insert(new("Bob", "bob@example.com")).await.unwrap();

        // keeping her own email is fine
        let updated = store
            .update(
                a.id,
                UserPatch {
                    name: "Alice B".into(),
                    email: "alice@example.com".into(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Alice B");

        // taking Bob's is not
        let err = store
            .update(
                a.id,
                UserPatch {
                    name: "Alice".into(),
                    email: "bob@example.com".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn set_avatar_and_clear() {
        let store = MemoryStore::default();
        let a = store.insert(new("Alice", "alice@example.com")).await.unwrap();
        let u = store
            .set_avatar(a.id, Some("http://x/uploads/avatars/a.jpg".into()))
            .await
            .unwrap()
            .unwrap();
        assert!(u.avatar.is_some());
        let u = store.set_avatar(a.id, None).await.unwrap().unwrap();
        assert!(u.avatar.is_none());
    }

    #[tokio::test]
    async fn delete_returns_removed_record_once() {
        let store = MemoryStore::default();
        let a = store.insert(new("Alice", "alice@example.com")).await.unwrap();
        let removed = store.delete(a.id).await.unwrap();
        assert_eq!(removed.map(|u| u.id), Some(a.id));
        assert!(store.delete(a.id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }
}
