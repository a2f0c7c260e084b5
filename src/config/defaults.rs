//! Default configuration values
//!
//! Provides default configuration instances and the built-in kind lists.

use super::schema::Config;

/// Kinds commonly carrying ownerReferences
const INDEXED_KINDS: &[&str] = &[
    "apps/v1/Deployment",
    "apps/v1/ReplicaSet",
    "apps/v1/StatefulSet",
    "apps/v1/DaemonSet",
    "apps/v1/ControllerRevision",
    "batch/v1/Job",
    "v1/Pod",
    "v1/PersistentVolumeClaim",
    "v1/Service",
    "v1/ConfigMap",
    "discovery.k8s.io/v1/EndpointSlice",
];

/// Kinds ArgoCD commonly applies from an Application's sources
const LABEL_KINDS: &[&str] = &[
    "v1/Namespace",
    "v1/ServiceAccount",
    "v1/ConfigMap",
    "v1/Secret",
    "v1/Service",
    "v1/PersistentVolumeClaim",
    "apps/v1/Deployment",
    "apps/v1/StatefulSet",
    "apps/v1/DaemonSet",
    "batch/v1/Job",
    "batch/v1/CronJob",
    "networking.k8s.io/v1/Ingress",
    "autoscaling/v2/HorizontalPodAutoscaler",
    "policy/v1/PodDisruptionBudget",
    "rbac.authorization.k8s.io/v1/Role",
    "rbac.authorization.k8s.io/v1/RoleBinding",
    "rbac.authorization.k8s.io/v1/ClusterRole",
    "rbac.authorization.k8s.io/v1/ClusterRoleBinding",
];

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}

pub fn indexed_kinds() -> Vec<String> {
    INDEXED_KINDS.iter().map(|k| k.to_string()).collect()
}

pub fn label_kinds() -> Vec<String> {
    LABEL_KINDS.iter().map(|k| k.to_string()).collect()
}
