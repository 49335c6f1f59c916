//! User account operations on top of the `users` collection.

use serde_json::Value;
use tracing::{debug, info};

use super::{
    Collection, DeleteResult, Document, DocumentStore, Filter, Role, StoreError, UpdateResult,
    User, ID_FIELD,
};

pub async fn find_by_email(
    store: &dyn DocumentStore,
    email: &str,
) -> Result<Option<User>, StoreError> {
    store
        .find_one(Collection::Users, &Filter::all().eq("email", email))
        .await?
        .map(User::from_document)
        .transpose()
}

/// Return the user with `email`, creating it from `profile` if absent.
///
/// The lookup and insert are separate store calls. Two first-time requests
/// for the same email can both miss the lookup; the unique email index
/// rejects the second insert, which then re-reads the winner's record.
pub async fn find_or_create(
    store: &dyn DocumentStore,
    email: &str,
    mut profile: Document,
) -> Result<(User, bool), StoreError> {
    if let Some(user) = find_by_email(store, email).await? {
        return Ok((user, false));
    }

    // Roles are only granted through promotion.
    profile.remove("role");
    profile.remove(ID_FIELD);
    profile.insert("email".to_string(), Value::String(email.to_string()));

    match store.insert_one(Collection::Users, profile).await {
        Ok(result) => {
            info!(user_id = %result.inserted_id, "Created user {}", email);
            Ok((
                User {
                    id: result.inserted_id,
                    email: email.to_string(),
                    role: Role::User,
                },
                true,
            ))
        }
        Err(err) if err.is_conflict() => {
            debug!("Concurrent insert for {}, re-reading", email);
            match find_by_email(store, email).await? {
                Some(user) => Ok((user, false)),
                None => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

pub async fn list(store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
    store.find_all(Collection::Users, &Filter::all()).await
}

pub async fn promote_to_admin(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<UpdateResult, StoreError> {
    let mut set = Document::new();
    if let Some(role) = Role::Admin.to_field() {
        set.insert("role".to_string(), role);
    }

    let result = store
        .update_one(Collection::Users, &Filter::by_id(id), set)
        .await?;
    if result.modified_count > 0 {
        info!(user_id = %id, "Promoted user to admin");
    }
    Ok(result)
}

pub async fn delete(store: &dyn DocumentStore, id: &str) -> Result<DeleteResult, StoreError> {
    let result = store
        .delete_one(Collection::Users, &Filter::by_id(id))
        .await?;
    if result.deleted_count > 0 {
        info!(user_id = %id, "Deleted user");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InsertOneResult, MemoryStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryStore::new();

        let (first, created) = find_or_create(&store, "a@b.c", Document::new())
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.role, Role::User);

        let (second, created) = find_or_create(&store, "a@b.c", Document::new())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        let users = list(&store).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].get("email"), Some(&json!("a@b.c")));
        assert!(!users[0].contains_key("role"));
    }

    #[tokio::test]
    async fn test_find_or_create_ignores_client_role() {
        let store = MemoryStore::new();
        let profile = json!({"name": "Mallory", "role": "admin"})
            .as_object()
            .cloned()
            .unwrap();

        let (user, _) = find_or_create(&store, "m@b.c", profile).await.unwrap();
        assert_eq!(user.role, Role::User);

        let stored = find_by_email(&store, "m@b.c").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);
    }

    #[tokio::test]
    async fn test_promote_and_delete() {
        let store = MemoryStore::new();
        let (user, _) = find_or_create(&store, "a@b.c", Document::new())
            .await
            .unwrap();

        let result = promote_to_admin(&store, &user.id).await.unwrap();
        assert_eq!(result, UpdateResult::new(1, 1));
        let stored = find_by_email(&store, "a@b.c").await.unwrap().unwrap();
        assert!(stored.role.is_admin());

        let result = delete(&store, &user.id).await.unwrap();
        assert_eq!(result.deleted_count, 1);
        assert!(find_by_email(&store, "a@b.c").await.unwrap().is_none());
    }

    /// Store whose first user lookup always misses, as if another request
    /// inserted the same email between lookup and insert.
    struct RacingStore {
        inner: MemoryStore,
        stale_reads: Mutex<u32>,
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn find_all(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<Vec<Document>, StoreError> {
            self.inner.find_all(collection, filter).await
        }

        async fn find_one(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<Option<Document>, StoreError> {
            {
                let mut stale = self.stale_reads.lock();
                if *stale > 0 {
                    *stale -= 1;
                    return Ok(None);
                }
            }
            self.inner.find_one(collection, filter).await
        }

        async fn insert_one(
            &self,
            collection: Collection,
            doc: Document,
        ) -> Result<InsertOneResult, StoreError> {
            self.inner.insert_one(collection, doc).await
        }

        async fn update_one(
            &self,
            collection: Collection,
            filter: &Filter,
            set: Document,
        ) -> Result<UpdateResult, StoreError> {
            self.inner.update_one(collection, filter, set).await
        }

        async fn delete_one(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<DeleteResult, StoreError> {
            self.inner.delete_one(collection, filter).await
        }
    }

    #[tokio::test]
    async fn test_find_or_create_recovers_from_lost_race() {
        let store = RacingStore {
            inner: MemoryStore::new(),
            stale_reads: Mutex::new(0),
        };
        let (winner, created) = find_or_create(&store, "a@b.c", Document::new())
            .await
            .unwrap();
        assert!(created);

        *store.stale_reads.lock() = 1;
        let (loser, created) = find_or_create(&store, "a@b.c", Document::new())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(loser.id, winner.id);
        assert_eq!(list(&store).await.unwrap().len(), 1);
    }
}
