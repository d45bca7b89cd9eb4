use crate::error::StoreError;
use crate::models::{NewUser, User, UserChanges, UserId};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository Trait
///
/// The record store contract. Handlers and the access gate only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// Every method is a single round trip and atomic on its own. "Record absent" is reported
/// as `Ok(None)`; `Err` is reserved for conflicts and store failures.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All live records, ascending by id.
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Inserts a record and returns it with its store-assigned id.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Conditional update: `Ok(None)` when no record with `id` exists.
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Conditional delete: returns the removed record, or `Ok(None)` when it never existed.
    async fn delete(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the `users` table (see `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT id, username, email, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("find_all error: {:?}", e);
                e.into()
            })
    }

    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT id, username, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("find error: {:?}", e);
                e.into()
            })
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, role
            "#,
        )
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("create error: {:?}", e);
            e.into()
        })
    }

    /// Uses `COALESCE` so that `None` fields keep their current column value, and
    /// `RETURNING` so that existence check and write are one statement.
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING id, username, email, role
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("update error: {:?}", e);
            e.into()
        })
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "DELETE FROM users WHERE id = $1 RETURNING id, username, email, role",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete error: {:?}", e);
            e.into()
        })
    }
}

#[derive(Default)]
struct MemoryTable {
    rows: BTreeMap<UserId, User>,
    last_id: UserId,
}

impl MemoryTable {
    /// Mirrors the table's UNIQUE constraints. `except` is the row being updated, which may
    /// keep its own values.
    fn check_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<UserId>,
    ) -> Result<(), StoreError> {
        let others = || self.rows.values().filter(move |u| Some(u.id) != except);

        if let Some(name) = username {
            if others().any(|u| u.username == name) {
                return Err(StoreError::Conflict("username already exists".into()));
            }
        }
        if let Some(email) = email {
            if others().any(|u| u.email == email) {
                return Err(StoreError::Conflict("email already exists".into()));
            }
        }
        Ok(())
    }
}

/// InMemoryRepository
///
/// A process-local store with the same contract as `PostgresRepository`: monotonically
/// assigned ids (never reused after delete) and unique usernames/emails. Each call holds the
/// table lock for its whole duration, which gives the per-operation atomicity the service
/// relies on.
#[derive(Default)]
pub struct InMemoryRepository {
    table: RwLock<MemoryTable>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `users`, keeping their ids.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut table = MemoryTable::default();
        for user in users {
            table.last_id = table.last_id.max(user.id);
            table.rows.insert(user.id, user);
        }
        Self {
            table: RwLock::new(table),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        table.check_unique(Some(&new_user.username), Some(&new_user.email), None)?;

        table.last_id += 1;
        let user = User {
            id: table.last_id,
            username: new_user.username,
            email: new_user.email,
            role: new_user.role,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        table.check_unique(changes.username.as_deref(), changes.email.as_deref(), Some(id))?;

        let Some(user) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.table.write().await.rows.remove(&id))
    }
}
