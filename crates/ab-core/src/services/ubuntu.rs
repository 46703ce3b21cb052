use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::error::{OrchestratorError, Result};
use crate::models::{ArtifactFilter, ResolvedArtifact};

use super::resolver::ArtifactResolver;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Inner text of the `<a href=...>ami-...</a>` cells the locator emits.
static ANCHOR_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a[^>]*>\s*([^<\s]+)\s*</a>").unwrap());

static SERIAL_PART_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Wire shape of the cloud image locator's releases table.
#[derive(Debug, Deserialize)]
struct LocatorTable {
    #[serde(rename = "aaData")]
    rows: Vec<Vec<String>>,
}

/// One published Ubuntu cloud image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub cloud: String,
    pub zone: String,
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub instance_type: String,
    pub release: String,
    pub id: String,
}

impl ImageRow {
    /// Columns: cloud, zone, name, version, arch, instance type, release, id.
    fn from_columns(columns: &[String]) -> Option<Self> {
        let [cloud, zone, name, version, architecture, instance_type, release, id, ..] =
            columns
        else {
            return None;
        };
        let id = match ANCHOR_TEXT_RE.captures(id) {
            Some(caps) => caps[1].to_string(),
            None => id.trim().to_string(),
        };
        if id.is_empty() {
            return None;
        }
        Some(Self {
            cloud: cloud.trim().to_string(),
            zone: zone.trim().to_string(),
            name: name.trim().to_string(),
            version: version.trim().to_string(),
            architecture: architecture.trim().to_string(),
            instance_type: instance_type.trim().to_string(),
            release: release.trim().to_string(),
            id,
        })
    }

    fn field(&self, attribute: &str) -> Option<&str> {
        let value = match attribute {
            "cloud" => &self.cloud,
            "zone" => &self.zone,
            "version" => &self.version,
            "architecture" => &self.architecture,
            "instance_type" => &self.instance_type,
            "release" => &self.release,
            _ => return None,
        };
        Some(value)
    }

    fn matches(&self, filter: &ArtifactFilter) -> bool {
        filter.iter().all(|(attribute, wanted)| {
            if attribute == "version" && self.name.eq_ignore_ascii_case(wanted) {
                return true;
            }
            self.field(attribute)
                .is_some_and(|value| value.eq_ignore_ascii_case(wanted))
        })
    }

    fn into_artifact(self) -> ResolvedArtifact {
        ResolvedArtifact::new(self.id)
            .with_detail("cloud", self.cloud)
            .with_detail("zone", self.zone)
            .with_detail("name", self.name)
            .with_detail("version", self.version)
            .with_detail("architecture", self.architecture)
            .with_detail("instance_type", self.instance_type)
            .with_detail("release", self.release)
    }
}

/// Resolves Ubuntu cloud images through the public image locator.
pub struct UbuntuResolver {
    locator_url: String,
    client: reqwest::Client,
}

impl UbuntuResolver {
    pub fn new(locator_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                OrchestratorError::Resolution(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            locator_url: locator_url.to_string(),
            client,
        })
    }

    async fn fetch_rows(&self) -> Result<Vec<ImageRow>> {
        tracing::debug!(url = %self.locator_url, "fetching ubuntu image table");
        let response = self
            .client
            .get(&self.locator_url)
            .send()
            .await
            .map_err(|e| OrchestratorError::Resolution(format!("locator request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestratorError::Resolution(format!(
                "locator returned HTTP {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| OrchestratorError::Resolution(format!("reading locator body: {e}")))?;
        parse_table(&body)
    }
}

#[async_trait]
impl ArtifactResolver for UbuntuResolver {
    async fn latest(&self, filter: &ArtifactFilter) -> Result<ResolvedArtifact> {
        let rows = self.fetch_rows().await?;
        let artifact = select_latest(rows, filter)?;
        tracing::info!(id = %artifact.id, filter = %filter, "resolved ubuntu image");
        Ok(artifact)
    }
}

/// Decode the locator JSON, skipping rows that lack an image id.
pub fn parse_table(body: &str) -> Result<Vec<ImageRow>> {
    let table: LocatorTable = serde_json::from_str(body).map_err(|e| {
        OrchestratorError::Resolution(format!("unexpected locator payload: {e}"))
    })?;
    Ok(table
        .rows
        .iter()
        .filter_map(|columns| ImageRow::from_columns(columns))
        .collect())
}

/// Pick the newest release among rows matching `filter`.
///
/// Several rows sharing the newest serial are only accepted when they agree
/// on the image id.
pub fn select_latest(rows: Vec<ImageRow>, filter: &ArtifactFilter) -> Result<ResolvedArtifact> {
    let matching: Vec<ImageRow> = rows.into_iter().filter(|r| r.matches(filter)).collect();
    let newest = matching
        .iter()
        .map(|r| serial_key(&r.release))
        .max()
        .ok_or_else(|| {
            OrchestratorError::Resolution(format!("no ubuntu image matches {filter}"))
        })?;

    let mut latest: Vec<ImageRow> = matching
        .into_iter()
        .filter(|r| serial_key(&r.release) == newest)
        .collect();
    let mut ids: Vec<&str> = latest.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() > 1 {
        return Err(OrchestratorError::Resolution(format!(
            "ambiguous filter {filter}: {} images share the newest release ({})",
            ids.len(),
            ids.join(", ")
        )));
    }
    Ok(latest.swap_remove(0).into_artifact())
}

/// Numeric ordering for serials like `20240301` or `20240301.1`.
fn serial_key(release: &str) -> Vec<u64> {
    SERIAL_PART_RE
        .find_iter(release)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r##"{"aaData": [
        ["Amazon AWS", "eu-west-1", "jammy", "22.04", "amd64", "hvm-ssd", "20240101", "<a href=\"https://console.aws.amazon.com/ec2/home?region=eu-west-1#launchAmi=ami-0aaa\">ami-0aaa</a>"],
        ["Amazon AWS", "eu-west-1", "jammy", "22.04", "amd64", "hvm-ssd", "20240301", "<a href=\"https://console.aws.amazon.com/ec2/home?region=eu-west-1#launchAmi=ami-0bbb\">ami-0bbb</a>"],
        ["Amazon AWS", "us-east-1", "jammy", "22.04", "amd64", "hvm-ssd", "20240301", "<a href=\"#\">ami-0ccc</a>"],
        ["Amazon AWS", "eu-west-1", "noble", "24.04", "arm64", "hvm-ssd", "20240425", "ami-0ddd"],
        ["broken row"]
    ]}"##;

    fn rows() -> Vec<ImageRow> {
        parse_table(TABLE).unwrap()
    }

    #[test]
    fn parse_extracts_ids_from_anchors() {
        let rows = rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].id, "ami-0aaa");
        assert_eq!(rows[3].id, "ami-0ddd");
        assert_eq!(rows[3].architecture, "arm64");
    }

    #[test]
    fn parse_rejects_unexpected_payload() {
        assert!(matches!(
            parse_table("<html>down</html>"),
            Err(OrchestratorError::Resolution(_))
        ));
    }

    #[test]
    fn latest_matching_release_wins() {
        let filter = ArtifactFilter::new()
            .with("zone", "eu-west-1")
            .with("version", "22.04");
        let artifact = select_latest(rows(), &filter).unwrap();
        assert_eq!(artifact.id, "ami-0bbb");
        assert_eq!(artifact.details.get("release").map(String::as_str), Some("20240301"));
    }

    #[test]
    fn version_filter_accepts_codename() {
        let filter = ArtifactFilter::new()
            .with("version", "Noble")
            .with("architecture", "ARM64");
        assert_eq!(select_latest(rows(), &filter).unwrap().id, "ami-0ddd");
    }

    #[test]
    fn no_match_is_resolution_error() {
        let filter = ArtifactFilter::new().with("zone", "ap-south-2");
        let err = select_latest(rows(), &filter).unwrap_err();
        assert!(matches!(&err, OrchestratorError::Resolution(m) if m.contains("zone=ap-south-2")));
    }

    #[test]
    fn unknown_attribute_matches_nothing() {
        let filter = ArtifactFilter::new().with("flavour", "minimal");
        assert!(select_latest(rows(), &filter).is_err());
    }

    #[test]
    fn ambiguous_newest_release_is_rejected() {
        let filter = ArtifactFilter::new().with("version", "jammy");
        let err = select_latest(rows(), &filter).unwrap_err();
        assert!(err.to_string().contains("ambiguous"), "{err}");
    }

    #[test]
    fn serials_compare_numerically() {
        assert!(serial_key("20240301.10") > serial_key("20240301.9"));
        assert!(serial_key("20240302") > serial_key("20240301.1"));
    }

    #[tokio::test]
    async fn resolver_fetches_and_selects() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/releasesTable")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TABLE)
            .create_async()
            .await;

        let resolver = UbuntuResolver::new(&format!("{}/releasesTable", server.url())).unwrap();
        let filter = ArtifactFilter::new().with("zone", "us-east-1");
        let artifact = resolver.latest(&filter).await.unwrap();

        assert_eq!(artifact.id, "ami-0ccc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn resolver_reports_http_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/releasesTable")
            .with_status(503)
            .create_async()
            .await;

        let resolver = UbuntuResolver::new(&format!("{}/releasesTable", server.url())).unwrap();
        let err = resolver.latest(&ArtifactFilter::new()).await.unwrap_err();
        assert!(matches!(&err, OrchestratorError::Resolution(m) if m.contains("503")));
    }
}
