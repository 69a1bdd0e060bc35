//! Configuration of the authorization graph client.
use serde::Deserialize;
use serde::Serialize;

/// Options for access to the authorization graph.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelationsConf {
    /// Number of tuples to request for each page of a graph scan.
    #[serde(default = "RelationsConf::default_page_size")]
    pub page_size: u32,

    /// Request a diagnostic explanation for every relation check.
    #[serde(default)]
    pub trace_checks: bool,
}

impl Default for RelationsConf {
    fn default() -> Self {
        RelationsConf {
            page_size: Self::default_page_size(),
            trace_checks: false,
        }
    }
}

impl RelationsConf {
    fn default_page_size() -> u32 {
        50
    }
}
