//! Reading live cluster state.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::core::ErrorResponse;
use kube::Resource;
use serde::de::{DeserializeOwned, Deserialize};
use serde::Serialize;
use tracing::debug;

use crate::{Error, Result};

/// Get-by-key and list-by-namespace. Absence is `Ok(None)` or an empty list, never an error.
#[allow(async_fn_in_trait)]
pub trait ClusterReader {
    async fn get<K>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug;

    async fn list<K>(&self, namespace: &str) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug;
}

fn describe<K: Resource<DynamicType = ()>>(verb: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if name.is_empty() => format!("{verb} {} in {ns}", K::kind(&())),
        Some(ns) => format!("{verb} {} {ns}/{name}", K::kind(&())),
        None => format!("{verb} {} {name}", K::kind(&())),
    }
}

/// Run a read, giving up after `timeout`
pub async fn with_timeout<T>(
    timeout: Duration,
    operation: impl Into<String>,
    read: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, read).await {
        Ok(result) => result,
        Err(_) => Err(Error::ClusterReadTimeout {
            operation: operation.into(),
            timeout,
        }),
    }
}

pub async fn get_with_timeout<K, C>(
    cluster: &C,
    timeout: Duration,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>>
where
    C: ClusterReader,
    K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
{
    with_timeout(
        timeout,
        describe::<K>("get", namespace, name),
        cluster.get::<K>(namespace, name),
    )
    .await
}

pub async fn list_with_timeout<K, C>(cluster: &C, timeout: Duration, namespace: &str) -> Result<Vec<K>>
where
    C: ClusterReader,
    K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
{
    with_timeout(
        timeout,
        describe::<K>("list", Some(namespace), ""),
        cluster.list::<K>(namespace),
    )
    .await
}

/// The API server answers 404 both for a missing object and for a kind it does not serve
fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { code: 404, .. }))
}

fn from_dynamic<K: DeserializeOwned>(obj: DynamicObject) -> Result<K> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

fn dynamic_api<K: Resource<DynamicType = ()>>(
    client: &kube::Client,
    namespace: Option<&str>,
) -> Api<DynamicObject> {
    // erased so that cluster scoped and namespaced kinds go through the same code
    let resource = ApiResource::erase::<K>(&());
    match namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
        None => Api::all_with(client.clone(), &resource),
    }
}

impl ClusterReader for kube::Client {
    async fn get<K>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
    {
        let api = dynamic_api::<K>(self, namespace);
        match api.get_opt(name).await {
            Ok(Some(obj)) => Ok(Some(from_dynamic(obj)?)),
            Ok(None) => {
                debug!("{} not found", describe::<K>("get", namespace, name));
                Ok(None)
            }
            Err(source) => Err(Error::ClusterRead {
                operation: describe::<K>("get", namespace, name),
                source,
            }),
        }
    }

    async fn list<K>(&self, namespace: &str) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
    {
        let api = dynamic_api::<K>(self, Some(namespace));
        match api.list(&ListParams::default()).await {
            Ok(objects) => objects.items.into_iter().map(from_dynamic).collect(),
            Err(source) if is_not_found(&source) => {
                debug!("{} not served", describe::<K>("list", Some(namespace), ""));
                Ok(vec![])
            }
            Err(source) => Err(Error::ClusterRead {
                operation: describe::<K>("list", Some(namespace), ""),
                source,
            }),
        }
    }
}

type ObjectKey = (String, String, String);

fn type_key<K: Resource<DynamicType = ()>>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

/// Cluster state held in memory, for rendering without a cluster and for tests.
#[derive(Clone, Debug, Default)]
pub struct StaticCluster {
    objects: BTreeMap<ObjectKey, serde_json::Value>,
    failures: BTreeMap<String, u16>,
    delay: Option<Duration>,
}

impl StaticCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load objects from a multi-document YAML stream
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut cluster = Self::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            let obj: DynamicObject = serde_yaml::from_value(value)?;
            cluster.insert_dynamic(obj)?;
        }
        Ok(cluster)
    }

    fn insert_dynamic(&mut self, obj: DynamicObject) -> Result<()> {
        let types = obj.types.clone().ok_or_else(|| {
            Error::InvalidConfiguration("cluster state object without apiVersion and kind".into())
        })?;
        let key = (
            format!("{}/{}", types.api_version, types.kind),
            obj.metadata.namespace.clone().unwrap_or_default(),
            obj.metadata.name.clone().unwrap_or_default(),
        );
        self.objects.insert(key, serde_json::to_value(&obj)?);
        Ok(())
    }

    pub fn insert<K>(&mut self, obj: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let key = (
            type_key::<K>(),
            obj.meta().namespace.clone().unwrap_or_default(),
            obj.meta().name.clone().unwrap_or_default(),
        );
        let mut value = serde_json::to_value(obj)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("apiVersion".into(), K::api_version(&()).into_owned().into());
            map.insert("kind".into(), K::kind(&()).into_owned().into());
        }
        self.objects.insert(key, value);
        Ok(())
    }

    pub fn with<K>(mut self, obj: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        self.insert(obj)?;
        Ok(self)
    }

    /// Make every read of `K` fail with the given HTTP status
    pub fn fail_reads_of<K: Resource<DynamicType = ()>>(mut self, code: u16) -> Self {
        self.failures.insert(type_key::<K>(), code);
        self
    }

    /// Delay every read, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn before_read<K: Resource<DynamicType = ()>>(&self, operation: String) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.get(&type_key::<K>()) {
            Some(code) => Err(Error::ClusterRead {
                operation,
                source: kube::Error::Api(ErrorResponse {
                    status: "Failure".into(),
                    message: format!("injected failure reading {}", K::kind(&())),
                    reason: "InternalError".into(),
                    code: *code,
                }),
            }),
            None => Ok(()),
        }
    }
}

impl ClusterReader for StaticCluster {
    async fn get<K>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
    {
        match self.before_read::<K>(describe::<K>("get", namespace, name)).await {
            Err(Error::ClusterRead { source, .. }) if is_not_found(&source) => return Ok(None),
            result => result?,
        }
        let key = (
            type_key::<K>(),
            namespace.unwrap_or_default().to_owned(),
            name.to_owned(),
        );
        self.objects
            .get(&key)
            .map(|value| serde_json::from_value(value.clone()).map_err(Error::from))
            .transpose()
    }

    async fn list<K>(&self, namespace: &str) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Debug,
    {
        match self.before_read::<K>(describe::<K>("list", Some(namespace), "")).await {
            Err(Error::ClusterRead { source, .. }) if is_not_found(&source) => return Ok(vec![]),
            result => result?,
        }
        let type_key = type_key::<K>();
        self.objects
            .iter()
            .filter(|((t, ns, _), _)| *t == type_key && ns == namespace)
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(Error::from))
            .collect()
    }
}
