//! Discovery-or-create protocol for provider resources.
//!
//! Every managed provider resource (security group, endpoint) is found the
//! same way: by the id recorded in status, else by its identity tags, else
//! it is created. A stale recorded id is not an error; the id was only ever
//! a cache of what the tags prove. Tag repair keeps drifted resources
//! adoptable: anything found with its identity tags intact gets the missing
//! required tags added back, never replaced.

use crate::error::ControllerError;
use async_trait::async_trait;
use cloud_client::{CloudError, Tag};
use tracing::{debug, info, warn};

/// The slice of a provider resource discovery cares about.
#[derive(Debug, Clone)]
pub struct TaggedResource {
    /// Provider id.
    pub id: String,
    /// Current tags on the resource.
    pub tags: Vec<Tag>,
}

/// Outcome of `discover_or_create`. A created resource needs its id
/// persisted and a fresh pass before it is converged on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    /// The resource already existed.
    Existing(String),
    /// The resource was created this pass.
    Created(String),
}

impl Discovered {
    /// The provider id either way.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Discovered::Existing(id) | Discovered::Created(id) => id,
        }
    }

    /// Whether this pass created the resource.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Discovered::Created(_))
    }
}

/// Per-resource-kind adapter the protocol runs against.
#[async_trait]
pub trait TagDiscovery: Send + Sync {
    /// Direct lookup. `NotFound` is expected for stale recorded ids.
    async fn get_by_id(&self, id: &str) -> Result<TaggedResource, CloudError>;

    /// Search by tags; all given tags must match.
    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Option<TaggedResource>, CloudError>;

    /// Create the resource with the given name and tags.
    async fn create(&self, name: &str, tags: &[Tag]) -> Result<TaggedResource, CloudError>;

    /// Additively apply tags to an existing resource.
    async fn repair_tags(&self, id: &str, tags: &[Tag]) -> Result<(), CloudError>;
}

/// Run the discovery protocol:
/// 1. `recorded_id` → direct lookup; `NotFound` falls through to search.
/// 2. search by `identity_tags`.
/// 3. create with `required_tags` under the generated `name`.
///
/// Found resources get missing `required_tags` repaired additively.
/// Idempotent: a second pass over unchanged state issues zero creates.
pub async fn discover_or_create<D: TagDiscovery + ?Sized>(
    discovery: &D,
    recorded_id: Option<&str>,
    name: &str,
    identity_tags: &[Tag],
    required_tags: &[Tag],
) -> Result<Discovered, ControllerError> {
    if let Some(id) = recorded_id {
        match discovery.get_by_id(id).await {
            Ok(resource) => {
                debug!(id = %resource.id, "Found resource by recorded id");
                repair_missing_tags(discovery, &resource, required_tags).await?;
                return Ok(Discovered::Existing(resource.id));
            }
            Err(e) if e.is_not_found() => {
                warn!(id, "Recorded resource id is stale, rediscovering by tag");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(resource) = discovery.find_by_tags(identity_tags).await? {
        info!(id = %resource.id, "Adopted resource found by identity tags");
        repair_missing_tags(discovery, &resource, required_tags).await?;
        return Ok(Discovered::Existing(resource.id));
    }

    let resource = discovery.create(name, required_tags).await?;
    info!(id = %resource.id, name, "Created resource");
    Ok(Discovered::Created(resource.id))
}

async fn repair_missing_tags<D: TagDiscovery + ?Sized>(
    discovery: &D,
    resource: &TaggedResource,
    required_tags: &[Tag],
) -> Result<(), ControllerError> {
    let missing: Vec<Tag> = required_tags
        .iter()
        .filter(|t| !resource.tags.contains(t))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    info!(id = %resource.id, count = missing.len(), "Repairing missing tags");
    discovery.repair_tags(&resource.id, &missing).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Minimal adapter over a single optional stored resource.
    #[derive(Default)]
    struct FakeDiscovery {
        stored: Mutex<Option<TaggedResource>>,
        creates: Mutex<u32>,
        repairs: Mutex<Vec<Vec<Tag>>>,
    }

    #[async_trait]
    impl TagDiscovery for FakeDiscovery {
        async fn get_by_id(&self, id: &str) -> Result<TaggedResource, CloudError> {
            self.stored
                .lock()
                .unwrap()
                .clone()
                .filter(|r| r.id == id)
                .ok_or_else(|| CloudError::NotFound(id.to_string()))
        }

        async fn find_by_tags(&self, tags: &[Tag]) -> Result<Option<TaggedResource>, CloudError> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .clone()
                .filter(|r| tags.iter().all(|t| r.tags.contains(t))))
        }

        async fn create(&self, _name: &str, tags: &[Tag]) -> Result<TaggedResource, CloudError> {
            *self.creates.lock().unwrap() += 1;
            let resource = TaggedResource {
                id: "res-1".to_string(),
                tags: tags.to_vec(),
            };
            *self.stored.lock().unwrap() = Some(resource.clone());
            Ok(resource)
        }

        async fn repair_tags(&self, _id: &str, tags: &[Tag]) -> Result<(), CloudError> {
            self.repairs.lock().unwrap().push(tags.to_vec());
            if let Some(resource) = self.stored.lock().unwrap().as_mut() {
                resource.tags.extend(tags.iter().cloned());
            }
            Ok(())
        }
    }

    fn tags() -> (Vec<Tag>, Vec<Tag>) {
        let identity = vec![
            Tag::new("cloudnet.dev/managed-by", "endpoint-controller"),
            Tag::new("kubernetes.io/cluster/prod", "owned"),
        ];
        let mut required = identity.clone();
        required.push(Tag::new("Name", "prod-db-sg"));
        (identity, required)
    }

    #[tokio::test]
    async fn test_creates_when_absent_then_finds_by_tag() {
        let fake = FakeDiscovery::default();
        let (identity, required) = tags();

        let first = discover_or_create(&fake, None, "prod-db-sg", &identity, &required)
            .await
            .unwrap();
        assert!(first.is_created());

        // second pass with no recorded id still finds it; no second create
        let second = discover_or_create(&fake, None, "prod-db-sg", &identity, &required)
            .await
            .unwrap();
        assert_eq!(second, Discovered::Existing("res-1".to_string()));
        assert_eq!(*fake.creates.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_recorded_id_falls_back_to_tag_search() {
        let fake = FakeDiscovery::default();
        let (identity, required) = tags();
        fake.create("prod-db-sg", &required).await.unwrap();
        *fake.creates.lock().unwrap() = 0;

        let found = discover_or_create(&fake, Some("res-gone"), "prod-db-sg", &identity, &required)
            .await
            .unwrap();
        assert_eq!(found, Discovered::Existing("res-1".to_string()));
        assert_eq!(*fake.creates.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repairs_missing_required_tags() {
        let fake = FakeDiscovery::default();
        let (identity, required) = tags();
        // resource exists with identity tags only
        *fake.stored.lock().unwrap() = Some(TaggedResource {
            id: "res-1".to_string(),
            tags: identity.clone(),
        });

        discover_or_create(&fake, Some("res-1"), "prod-db-sg", &identity, &required)
            .await
            .unwrap();
        let repairs = fake.repairs.lock().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0], vec![Tag::new("Name", "prod-db-sg")]);
    }

    #[tokio::test]
    async fn test_fully_tagged_resource_needs_no_repair() {
        let fake = FakeDiscovery::default();
        let (identity, required) = tags();
        fake.create("prod-db-sg", &required).await.unwrap();

        discover_or_create(&fake, Some("res-1"), "prod-db-sg", &identity, &required)
            .await
            .unwrap();
        assert!(fake.repairs.lock().unwrap().is_empty());
    }
}
