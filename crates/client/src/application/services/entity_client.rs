//! Entity Client - persisted collection of entities under one namespace
//!
//! The collection lives under `{namespace}:items` as a JSON array in insertion order;
//! the selected id lives under `{namespace}:selectedId` as a JSON string. Every
//! mutation goes through one [`MutationQueue`] per client, so mutations are applied
//! strictly in the order they were issued. A mutation starts as soon as it is issued:
//! awaiting (or dropping) the returned future only decides whether the caller sees
//! the outcome. Reads are not queued and observe whatever the last completed mutation
//! wrote.
//!
//! Exactly one client per namespace is assumed: two clients over the same namespace
//! do not order their mutations against each other.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use geomarks_domain::{Entity, EntityId};

use crate::application::EntityError;
use crate::infrastructure::mutation_queue::{MutationAborted, MutationQueue};
use crate::ports::outbound::{RandomPort, StorageProvider};

/// Storage keys derived from a collection namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionKeys {
    pub items: String,
    pub selected: String,
}

impl CollectionKeys {
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            items: format!("{namespace}:items"),
            selected: format!("{namespace}:selectedId"),
        }
    }
}

/// Shared, non-generic part of a client; cloned into queued mutation futures.
struct Collection {
    namespace: String,
    keys: CollectionKeys,
    latency: Duration,
    storage: Arc<dyn StorageProvider>,
    random: Arc<dyn RandomPort>,
    queue: MutationQueue,
}

impl Collection {
    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Read the collection; missing or malformed data reads as empty.
    fn read_items<E: Entity>(&self) -> Vec<E> {
        let Some(raw) = self.storage.load(&self.keys.items) else {
            return Vec::new();
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to parse persisted collection, treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn write_items<E: Entity>(&self, items: &[E]) -> Result<(), EntityError> {
        let raw = serde_json::to_string(items)?;
        self.storage.save(&self.keys.items, &raw);
        Ok(())
    }

    /// Read the selected id; missing or malformed data reads as `None`.
    fn read_selected(&self) -> Option<EntityId> {
        let raw = self.storage.load(&self.keys.selected)?;

        match serde_json::from_str::<Option<EntityId>>(&raw) {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to parse persisted selection, treating as unset"
                );
                None
            }
        }
    }

    fn next_id(&self) -> EntityId {
        EntityId::new(self.random.gen_uuid().to_string())
    }
}

/// Fold a queue cancellation into the mutation's own error type.
async fn settled<T>(
    pending: impl Future<Output = Result<Result<T, EntityError>, MutationAborted>>,
) -> Result<T, EntityError> {
    pending.await?
}

/// Generic CRUD client over a named collection of `E`.
pub struct EntityClient<E: Entity> {
    collection: Arc<Collection>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for EntityClient<E> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityClient<E> {
    /// Create a client for `namespace`, seeding an empty collection if none exists.
    pub fn new(
        namespace: impl Into<String>,
        latency: Duration,
        storage: Arc<dyn StorageProvider>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        let namespace = namespace.into();
        let keys = CollectionKeys::for_namespace(&namespace);

        if storage.load(&keys.items).is_none() {
            storage.save(&keys.items, "[]");
        }

        Self {
            collection: Arc::new(Collection {
                namespace,
                keys,
                latency,
                storage,
                random,
                queue: MutationQueue::new(),
            }),
            _entity: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.collection.namespace
    }

    pub fn keys(&self) -> &CollectionKeys {
        &self.collection.keys
    }

    /// All entities in storage order. Never fails: unreadable data lists as empty.
    pub async fn list(&self) -> Vec<E> {
        self.collection.simulate_latency().await;
        self.collection.read_items()
    }

    /// Append a new entity built from `draft`.
    ///
    /// Without an explicit `id` a fresh one is generated. An explicit id is always
    /// honoured; if it is already present the earlier entity is replaced, so the
    /// latest write wins and ids stay unique.
    pub fn create(
        &self,
        draft: E::Draft,
        id: Option<EntityId>,
    ) -> impl Future<Output = Result<E, EntityError>> + Send + 'static {
        let collection = Arc::clone(&self.collection);

        settled(self.collection.queue.enqueue(move || async move {
            collection.simulate_latency().await;

            let mut items: Vec<E> = collection.read_items();
            let id = id.unwrap_or_else(|| collection.next_id());

            let before = items.len();
            items.retain(|item| item.id() != &id);
            if items.len() != before {
                tracing::debug!(kind = E::KIND, id = %id, "Replacing entity with colliding id");
            }

            let entity = E::from_draft(id, draft);
            items.push(entity.clone());
            collection.write_items(&items)?;

            tracing::debug!(
                kind = E::KIND,
                namespace = %collection.namespace,
                id = %entity.id(),
                "Entity created"
            );
            Ok::<_, EntityError>(entity)
        }))
    }

    /// Remove the entity with `id`, clearing the selection if it pointed at it.
    ///
    /// Removing an unknown id succeeds without changing anything.
    pub fn remove(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<(), EntityError>> + Send + 'static {
        let collection = Arc::clone(&self.collection);

        settled(self.collection.queue.enqueue(move || async move {
            collection.simulate_latency().await;

            let mut items: Vec<E> = collection.read_items();
            let before = items.len();
            items.retain(|item| item.id() != &id);
            let removed = items.len() != before;
            collection.write_items(&items)?;

            if collection.read_selected().as_ref() == Some(&id) {
                collection.storage.remove(&collection.keys.selected);
            }

            tracing::debug!(
                kind = E::KIND,
                namespace = %collection.namespace,
                id = %id,
                removed,
                "Entity removal applied"
            );
            Ok::<_, EntityError>(())
        }))
    }

    /// The persisted selection, or `None` when unset or unreadable.
    ///
    /// The id may dangle if its entity was removed elsewhere; callers treat a failed
    /// lookup as "not found".
    pub async fn get_selected_id(&self) -> Option<EntityId> {
        self.collection.simulate_latency().await;
        self.collection.read_selected()
    }

    /// Persist `id` as the selection, or clear it with `None`.
    pub fn set_selected_id(
        &self,
        id: Option<EntityId>,
    ) -> impl Future<Output = Result<(), EntityError>> + Send + 'static {
        let collection = Arc::clone(&self.collection);

        settled(self.collection.queue.enqueue(move || async move {
            collection.simulate_latency().await;

            match id.filter(|id| !id.is_empty()) {
                Some(id) => {
                    let raw = serde_json::to_string(&id)?;
                    collection.storage.save(&collection.keys.selected, &raw);
                }
                None => collection.storage.remove(&collection.keys.selected),
            }
            Ok::<_, EntityError>(())
        }))
    }

    /// Empty the collection and clear the selection in one queued step.
    pub fn clear(&self) -> impl Future<Output = Result<(), EntityError>> + Send + 'static {
        let collection = Arc::clone(&self.collection);

        settled(self.collection.queue.enqueue(move || async move {
            collection.simulate_latency().await;

            collection.storage.remove(&collection.keys.selected);
            collection.write_items::<E>(&[])?;

            tracing::debug!(namespace = %collection.namespace, "Collection cleared");
            Ok::<_, EntityError>(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::platform::{InMemoryStorage, SystemRandom};
    use crate::ports::outbound::{MockRandomPort, MockStorageProvider};
    use geomarks_domain::{Marker, MarkerDraft};
    use uuid::Uuid;

    const LATENCY: Duration = Duration::from_millis(150);

    fn client_with(storage: &InMemoryStorage) -> EntityClient<Marker> {
        EntityClient::new(
            "markers",
            LATENCY,
            Arc::new(storage.clone()),
            Arc::new(SystemRandom::new()),
        )
    }

    fn draft(title: &str) -> MarkerDraft {
        MarkerDraft::new(title, 1.0, 2.0)
    }

    fn ids(items: &[Marker]) -> Vec<&str> {
        items.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn seeds_empty_collection_on_construction() {
        let storage = InMemoryStorage::new();
        let _client = client_with(&storage);

        assert_eq!(storage.load("markers:items").as_deref(), Some("[]"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_remove_round_trip() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let created = client.create(draft("A"), None).await.unwrap();
        assert_eq!(created.id.as_str().len(), 36);
        assert_eq!(created.title, "A");
        assert_eq!(client.list().await, vec![created.clone()]);

        client.remove(created.id.clone()).await.unwrap();
        assert!(client.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn generated_ids_are_distinct() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let (a, b) = tokio::join!(client.create(draft("A"), None), client.create(draft("B"), None));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test(start_paused = true)]
    async fn unawaited_mutations_apply_in_submission_order() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let first = client.create(draft("one"), Some("1".into()));
        let second = client.create(draft("two"), Some("2".into()));
        let drop_first = client.remove("1".into());
        let third = client.create(draft("three"), Some("3".into()));

        // Join in an order unrelated to submission.
        let (r3, r1, rm, r2) = tokio::join!(third, first, drop_first, second);
        r1.unwrap();
        r2.unwrap();
        r3.unwrap();
        rm.unwrap();

        assert_eq!(ids(&client.list().await), vec!["2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_do_not_interleave() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let handles: Vec<_> = (0..5)
            .map(|i| tokio::spawn(client.create(draft(&format!("m{i}")), Some(i.to_string().into()))))
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Interleaved read-modify-write would lose entries.
        assert_eq!(ids(&client.list().await), vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_mutation_still_applies_in_order() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let running = tokio::spawn(client.create(draft("x"), Some("x".into())));
        let waiting = client.create(draft("a"), Some("a".into()));

        // Stop waiting for "a" while "x" is still inside its latency.
        let abandoned = tokio::time::timeout(Duration::from_millis(1), waiting).await;
        assert!(abandoned.is_err());

        let last = client.create(draft("b"), Some("b".into())).await.unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(last.title, "b");
        assert_eq!(ids(&client.list().await), vec!["x", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_create_is_still_removed_by_later_remove() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(1),
            client.create(draft("A"), Some("a".into())),
        )
        .await;
        assert!(abandoned.is_err());

        client.remove("a".into()).await.unwrap();

        assert!(client.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn colliding_explicit_id_replaces_previous_entity() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        client.create(draft("old"), Some("dup".into())).await.unwrap();
        client.create(draft("other"), Some("x".into())).await.unwrap();
        client.create(draft("new"), Some("dup".into())).await.unwrap();

        let items = client.list().await;
        assert_eq!(ids(&items), vec!["x", "dup"]);
        assert_eq!(items[1].title, "new");
    }

    #[tokio::test(start_paused = true)]
    async fn removing_unknown_id_is_a_no_op() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);
        let kept = client.create(draft("A"), None).await.unwrap();

        client.remove("missing".into()).await.unwrap();

        assert_eq!(client.list().await, vec![kept]);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_selected_entity_clears_selection() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);
        let a = client.create(draft("A"), None).await.unwrap();
        let b = client.create(draft("B"), None).await.unwrap();

        client.set_selected_id(Some(a.id.clone())).await.unwrap();
        client.remove(b.id.clone()).await.unwrap();
        assert_eq!(client.get_selected_id().await, Some(a.id.clone()));

        client.remove(a.id.clone()).await.unwrap();
        assert_eq!(client.get_selected_id().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_is_stored_as_json_string() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        client.set_selected_id(Some("m1".into())).await.unwrap();
        assert_eq!(storage.load("markers:selectedId").as_deref(), Some("\"m1\""));

        client.set_selected_id(None).await.unwrap();
        assert_eq!(storage.load("markers:selectedId"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dangling_selection_is_tolerated() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        client.set_selected_id(Some("ghost".into())).await.unwrap();

        assert_eq!(client.get_selected_id().await, Some("ghost".into()));
        assert!(client.list().await.iter().all(|m| m.id != "ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_empties_collection_and_selection() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);
        let a = client.create(draft("A"), None).await.unwrap();
        client.set_selected_id(Some(a.id)).await.unwrap();

        client.clear().await.unwrap();

        assert!(client.list().await.is_empty());
        assert_eq!(client.get_selected_id().await, None);
        assert_eq!(storage.load("markers:items").as_deref(), Some("[]"));
    }

    #[tokio::test(start_paused = true)]
    async fn corrupted_storage_degrades_to_empty() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        storage.save("markers:items", "{definitely not an array");
        storage.save("markers:selectedId", "not-json");

        assert!(client.list().await.is_empty());
        assert_eq!(client.get_selected_id().await, None);

        // Writing over corrupted data starts a fresh collection.
        let created = client.create(draft("A"), None).await.unwrap();
        assert_eq!(client.list().await, vec![created]);
    }

    #[tokio::test(start_paused = true)]
    async fn reads_wait_for_simulated_latency() {
        let storage = InMemoryStorage::new();
        let client = client_with(&storage);

        let started = tokio::time::Instant::now();
        client.list().await;
        assert!(started.elapsed() >= LATENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn uses_injected_id_source() {
        let fixed = Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001);
        let mut random = MockRandomPort::new();
        random.expect_gen_uuid().times(1).return_const(fixed);

        let client: EntityClient<Marker> = EntityClient::new(
            "pins",
            Duration::ZERO,
            Arc::new(InMemoryStorage::new()),
            Arc::new(random),
        );

        let created = client.create(draft("A"), None).await.unwrap();
        assert_eq!(created.id.as_str(), fixed.to_string());
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let storage = InMemoryStorage::new();
        let markers = client_with(&storage);
        let pins: EntityClient<Marker> = EntityClient::new(
            "pins",
            Duration::ZERO,
            Arc::new(storage.clone()),
            Arc::new(SystemRandom::new()),
        );

        pins.create(draft("pin"), None).await.unwrap();

        assert_eq!(pins.keys().items, "pins:items");
        assert_eq!(pins.list().await.len(), 1);
        assert!(markers.list().await.is_empty());
    }

    #[test]
    fn existing_collection_is_not_reseeded() {
        let mut storage = MockStorageProvider::new();
        storage
            .expect_load()
            .withf(|key| key == "markers:items")
            .times(1)
            .return_const(Some("[]".to_string()));
        storage.expect_save().never();

        let client: EntityClient<Marker> = EntityClient::new(
            "markers",
            Duration::ZERO,
            Arc::new(storage),
            Arc::new(SystemRandom::new()),
        );
        assert_eq!(client.namespace(), "markers");
    }
}
