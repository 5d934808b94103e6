//! Compose document model.
//!
//! Only the fields the checkers read are typed; every other key in a service
//! definition is ignored whatever its type. Callers parse YAML themselves and hand over the
//! resulting value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Compose document reduced to its services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Services keyed by name, iterated in name order.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

impl ComposeFile {
    /// Build from an already-parsed document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Add or replace a service.
    pub fn with_service(mut self, name: impl Into<String>, spec: ServiceSpec) -> Self {
        self.services.insert(name.into(), spec);
        self
    }
}

/// The security-relevant subset of a Compose service definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_drop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<ResourceValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

impl ServiceSpec {
    /// Whether a memory limit is set via `deploy.resources.limits.memory` or `mem_limit`.
    pub fn has_memory_limit(&self) -> bool {
        self.mem_limit.is_some() || self.limits().is_some_and(|l| l.memory.is_some())
    }

    /// Whether a process limit is set via `pids_limit` or `deploy.resources.limits.pids`.
    pub fn has_pids_limit(&self) -> bool {
        self.pids_limit.is_some() || self.limits().is_some_and(|l| l.pids.is_some())
    }

    /// Whether `cap_drop` contains `ALL`.
    pub fn drops_all_capabilities(&self) -> bool {
        self.cap_drop.iter().any(|c| c == "ALL")
    }

    /// Whether any `security_opt` entry mentions `no-new-privileges`.
    pub fn has_no_new_privileges(&self) -> bool {
        self.security_opt
            .iter()
            .any(|opt| opt.contains("no-new-privileges"))
    }

    fn limits(&self) -> Option<&ResourceLimits> {
        self.deploy
            .as_ref()
            .and_then(|d| d.resources.as_ref())
            .and_then(|r| r.limits.as_ref())
    }
}

/// `deploy:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deploy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

/// `deploy.resources:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,
}

/// `deploy.resources.limits:` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<ResourceValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids: Option<i64>,
}

/// A resource quantity written either as a number or a string such as `"512m"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceValue {
    Number(f64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let compose = ComposeFile::from_value(json!({
            "version": "3.9",
            "services": {
                "web": {
                    "image": "nginx:1.25-alpine",
                    "privileged": true,
                    "cap_drop": ["ALL"],
                    "deploy": {"resources": {"limits": {"memory": "256M", "cpus": 0.5}}},
                    "ports": ["80:80"]
                },
                "db": {"image": "postgres:16", "mem_limit": 536870912u64}
            }
        }))
        .unwrap();

        assert_eq!(compose.services.len(), 2);
        let web = &compose.services["web"];
        assert_eq!(web.privileged, Some(true));
        assert!(web.drops_all_capabilities());
        assert!(web.has_memory_limit());
        assert!(compose.services["db"].has_memory_limit());
    }

    #[test]
    fn test_untyped_keys_are_ignored() {
        let compose = ComposeFile::from_value(json!({
            "services": {
                "web": {
                    "image": "nginx:1.25",
                    "user": 1000,
                    "cap_add": "NET_ADMIN",
                    "environment": {"DEBUG": true, "WORKERS": 4},
                    "healthcheck": {"test": ["CMD", "true"], "interval": "30s"},
                    "deploy": {
                        "replicas": 2,
                        "resources": {
                            "limits": {"cpus": "0.5", "memory": "256M"},
                            "reservations": {"devices": [{"capabilities": ["gpu"]}]}
                        }
                    },
                    "privileged": true
                }
            }
        }))
        .unwrap();

        let web = &compose.services["web"];
        assert_eq!(web.privileged, Some(true));
        assert!(web.has_memory_limit());
    }

    #[test]
    fn test_missing_services_is_empty() {
        let compose = ComposeFile::from_value(json!({"version": "3"})).unwrap();
        assert!(compose.services.is_empty());
    }

    #[test]
    fn test_limits_absent() {
        let spec = ServiceSpec {
            deploy: Some(Deploy {
                resources: Some(Resources::default()),
            }),
            ..Default::default()
        };
        assert!(!spec.has_memory_limit());
        assert!(!spec.has_pids_limit());
    }

    #[test]
    fn test_pids_from_deploy_limits() {
        let spec: ServiceSpec =
            serde_json::from_value(json!({"deploy": {"resources": {"limits": {"pids": 100}}}}))
                .unwrap();
        assert!(spec.has_pids_limit());
    }

    #[test]
    fn test_no_new_privileges_variants() {
        let spec = ServiceSpec {
            security_opt: vec!["no-new-privileges:true".into()],
            ..Default::default()
        };
        assert!(spec.has_no_new_privileges());
        let spec = ServiceSpec {
            security_opt: vec!["no-new-privileges".into()],
            ..Default::default()
        };
        assert!(spec.has_no_new_privileges());
        assert!(!ServiceSpec::default().has_no_new_privileges());
    }

    #[test]
    fn test_services_iterate_in_name_order() {
        let compose = ComposeFile::default()
            .with_service("worker", ServiceSpec::default())
            .with_service("api", ServiceSpec::default());
        let names: Vec<_> = compose.services.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["api", "worker"]);
    }
}
