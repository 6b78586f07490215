//! The build representation shared by all generators during one synthesis run.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvFromSource, EnvVar, Volume, VolumeMount};
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What the apply loop must do with a resource. It is never inferred from the resource type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    /// Idempotent upsert
    CreateOrUpdate,
    /// Delete, then create; used where fields are immutable in place
    CreateOrRecreate,
    /// Never touch an object that already exists
    CreateIfNotExists,
    /// Remove state that is no longer wanted
    DeleteIfExists,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub operation: OperationType,
    pub resource: DynamicObject,
}

impl Operation {
    pub fn kind(&self) -> &str {
        self.resource
            .types
            .as_ref()
            .map(|t| t.kind.as_str())
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.resource.metadata.name.as_deref().unwrap_or_default()
    }

    /// Turn the erased resource back into a typed one
    pub fn parse<K: DeserializeOwned>(&self) -> Result<K> {
        Ok(serde_json::from_value(serde_json::to_value(&self.resource)?)?)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Ast {
    pub operations: Vec<Operation>,

    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub env: Vec<EnvVar>,
    pub env_from: Vec<EnvFromSource>,
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
    pub containers: Vec<Container>,
    pub init_containers: Vec<Container>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only way resources end up in the output.
    pub fn append_operation<K>(&mut self, operation: OperationType, resource: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let mut resource: DynamicObject = serde_json::from_value(serde_json::to_value(resource)?)?;
        if let Some(data) = resource.data.as_object_mut() {
            data.remove("apiVersion");
            data.remove("kind");
        }
        resource.types = Some(TypeMeta {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
        });
        self.operations.push(Operation {
            operation,
            resource,
        });
        Ok(())
    }

    /// Set an environment variable, replacing any earlier value with the same name
    pub fn set_env(&mut self, var: EnvVar) {
        match self.env.iter_mut().find(|e| e.name == var.name) {
            Some(existing) => *existing = var,
            None => self.env.push(var),
        }
    }

    pub fn add_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_env(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        })
    }

    /// Add a volume and mount it into the main container.
    ///
    /// Mounting two different volumes at the same path is an error; adding the
    /// same volume and mount twice is not.
    pub fn add_volume(&mut self, volume: Volume, mount: VolumeMount) -> Result<()> {
        self.add_volume_mount(mount)?;
        self.add_pod_volume(volume);
        Ok(())
    }

    /// Add a volume only used by sidecars or init containers
    pub fn add_pod_volume(&mut self, volume: Volume) {
        if !self.volumes.iter().any(|v| v.name == volume.name) {
            self.volumes.push(volume);
        }
    }

    pub fn add_volume_mount(&mut self, mount: VolumeMount) -> Result<()> {
        if let Some(existing) = self
            .volume_mounts
            .iter()
            .find(|m| m.mount_path == mount.mount_path)
        {
            if existing.name != mount.name || existing.sub_path != mount.sub_path {
                return Err(Error::InvalidConfiguration(format!(
                    "volumes {:?} and {:?} are both mounted at {}",
                    existing.name, mount.name, mount.mount_path
                )));
            }
            return Ok(());
        }
        self.volume_mounts.push(mount);
        Ok(())
    }
}
