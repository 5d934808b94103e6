//! CIS Docker Benchmark control catalogue.
//!
//! Lists the controls the Dockerfile rules and Compose checkers map to, each
//! tagged with its benchmark profile level.

use serde::{Deserialize, Serialize};

/// CIS benchmark profile level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CisLevel {
    /// Baseline controls; these gate the audit.
    #[serde(rename = "1")]
    Level1,
    /// Defense-in-depth controls.
    #[serde(rename = "2")]
    Level2,
}

impl std::fmt::Display for CisLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CisLevel::Level1 => write!(f, "Level 1"),
            CisLevel::Level2 => write!(f, "Level 2"),
        }
    }
}

/// A single benchmark control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CisControl {
    /// Control identifier (e.g. "5.4").
    pub id: String,
    /// Control title.
    pub title: String,
    /// Benchmark section the control belongs to.
    pub section: String,
    pub level: CisLevel,
}

impl CisControl {
    fn new(id: &str, title: &str, level: CisLevel) -> Self {
        let section = id.split_once('.').map_or(id, |(s, _)| s).to_string();
        Self {
            id: id.into(),
            title: title.into(),
            section,
            level,
        }
    }
}

/// The set of known controls, in benchmark order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CisCatalogue {
    controls: Vec<CisControl>,
}

impl CisCatalogue {
    /// Build from an explicit control list.
    pub fn new(controls: Vec<CisControl>) -> Self {
        Self { controls }
    }

    /// All controls.
    pub fn controls(&self) -> &[CisControl] {
        &self.controls
    }

    /// Look up a control by id.
    pub fn get(&self, id: &str) -> Option<&CisControl> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Whether `id` names a level-1 control.
    pub fn is_level1(&self, id: &str) -> bool {
        self.get(id).is_some_and(|c| c.level == CisLevel::Level1)
    }

    /// Number of level-1 controls.
    pub fn level1_total(&self) -> usize {
        self.controls
            .iter()
            .filter(|c| c.level == CisLevel::Level1)
            .count()
    }
}

impl Default for CisCatalogue {
    /// CIS Docker Benchmark sections 4 (images and build files) and 5
    /// (container runtime).
    fn default() -> Self {
        use CisLevel::*;
        Self::new(vec![
            CisControl::new("4.1", "Ensure that a user for the container has been created", Level1),
            CisControl::new("4.5", "Ensure Content trust for Docker is Enabled", Level2),
            CisControl::new("4.6", "Ensure that HEALTHCHECK instructions have been added to container images", Level1),
            CisControl::new("4.8", "Ensure setuid and setgid permissions are removed", Level2),
            CisControl::new("4.9", "Ensure that COPY is used instead of ADD in Dockerfiles", Level1),
            CisControl::new("4.10", "Ensure secrets are not stored in Dockerfiles", Level1),
            CisControl::new("5.2", "Ensure that, if applicable, SELinux security options are set", Level2),
            CisControl::new("5.3", "Ensure that Linux kernel capabilities are restricted within containers", Level1),
            CisControl::new("5.4", "Ensure that privileged containers are not used", Level1),
            CisControl::new("5.10", "Ensure that the memory usage for containers is limited", Level1),
            CisControl::new("5.11", "Ensure that the PIDs cgroup limit is used", Level1),
            CisControl::new("5.12", "Ensure that the container's root filesystem is mounted as read only", Level1),
            CisControl::new("5.13", "Ensure that the host's network namespace is not shared", Level1),
            CisControl::new("5.14", "Ensure that the 'on-failure' container restart policy is set to '5'", Level1),
            CisControl::new("5.25", "Ensure that the container is restricted from acquiring additional privileges", Level1),
        ])
    }
}
