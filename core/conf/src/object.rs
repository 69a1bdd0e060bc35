//! Data object storing the control plane configuration.
use serde::Deserialize;
use serde::Serialize;

use fleetcore_relations::RelationsConf;

/// Global configuration for the control plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Names of the identities with authorization administrator (superuser) access.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Authorization graph client configuration.
    #[serde(default)]
    pub relations: RelationsConf,

    /// Principal Store service configuration.
    pub store: BackendConf,
}

impl Conf {
    /// Check if the named identity is an authorization administrator.
    pub fn is_admin(&self, name: &str) -> bool {
        self.admins.iter().any(|admin| admin == name)
    }
}

/// Unstructured configuration for runtime selected service backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendConf {
    /// ID of the backend selected to provide the service.
    pub backend: String,

    /// Backend specific configuration options.
    #[serde(default, flatten)]
    pub options: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::Conf;

    #[test]
    fn decode_minimal() {
        let conf: Conf = serde_yaml::from_str("store:\n  backend: sqlite\n  path: ':memory:'\n")
            .unwrap();
        assert_eq!(conf.store.backend, "sqlite");
        assert_eq!(conf.store.options, serde_json::json!({"path": ":memory:"}));
        assert_eq!(conf.relations.page_size, 50);
        assert!(conf.admins.is_empty());
    }

    #[test]
    fn decode_admins() {
        let source = r#"
admins:
  - alice
relations:
  page_size: 10
  trace_checks: true
store:
  backend: sqlite
  path: fleet.db
"#;
        let conf: Conf = serde_yaml::from_str(source).unwrap();
        assert!(conf.is_admin("alice"));
        assert!(!conf.is_admin("bob"));
        assert_eq!(conf.relations.page_size, 10);
        assert!(conf.relations.trace_checks);
    }
}
