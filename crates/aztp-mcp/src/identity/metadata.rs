//! Identity metadata sent with the secure-connect call.
//!
//! The provider's acceptance rules depend on which keys are present, so an
//! absent or empty input is left out of the record entirely. It is never
//! serialized as `null` or `""`.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Metadata describing where a server identity sits in the trust graph.
///
/// Built once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMetadata {
    is_global_identity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trust_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link_to: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_identity: Option<String>,
}

impl IdentityMetadata {
    /// Build metadata from optional inputs. Empty values are omitted.
    pub fn build(
        trust_domain: Option<&str>,
        link_to: &[String],
        parent_identity: Option<&str>,
    ) -> Self {
        let links: Vec<String> = link_to
            .iter()
            .filter(|l| !l.trim().is_empty())
            .cloned()
            .collect();
        Self {
            is_global_identity: false,
            trust_domain: present(trust_domain),
            link_to: (!links.is_empty()).then_some(links),
            parent_identity: present(parent_identity),
        }
    }

    pub fn is_global_identity(&self) -> bool {
        self.is_global_identity
    }

    pub fn trust_domain(&self) -> Option<&str> {
        self.trust_domain.as_deref()
    }

    pub fn link_to(&self) -> Option<&[String]> {
        self.link_to.as_deref()
    }

    pub fn parent_identity(&self) -> Option<&str> {
        self.parent_identity.as_deref()
    }
}

impl Default for IdentityMetadata {
    fn default() -> Self {
        Self::build(None, &[], None)
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse the link-target input.
///
/// Accepts a single identity reference (`aztp://...`) or a JSON array string
/// of references. A value that looks like an array but does not parse is
/// logged and dropped.
pub fn parse_link_to(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };

    if !raw.starts_with('[') {
        return vec![raw.to_string()];
    }

    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(links) => links
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        Err(e) => {
            warn!("ignoring AZTP_LINK_TO, expected a JSON array of strings: {e}");
            Vec::new()
        }
    }
}
