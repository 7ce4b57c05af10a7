use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Regions probed for every candidate name.
pub const REGIONS: [&str; 19] = [
    "us-east-1", "us-east-2", "us-west-1", "us-west-2",
    "ca-central-1", "eu-west-1", "eu-west-2", "eu-west-3",
    "eu-central-1", "eu-north-1", "ap-south-1", "ap-northeast-1",
    "ap-northeast-2", "ap-northeast-3", "ap-southeast-1", "ap-southeast-2",
    "sa-east-1", "af-south-1", "me-south-1",
];

/// HEAD statuses that mean the bucket namespace answered for this URL.
const QUALIFYING_STATUS: [u16; 4] = [200, 301, 302, 307];

/// Body markers of an object listing on an unauthenticated GET.
const LISTING_MARKERS: [&str; 2] = ["<?xml", "ListBucketResult"];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
    Accessible,
    Exists,
    Unknown,
}

impl Access {
    /// Listable or readable buckets land in the public partition.
    pub fn is_open(&self) -> bool {
        matches!(self, Access::Public | Access::Accessible)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProbeResult {
    pub url: String,
    pub bucket: String,
    pub region: String,
    pub status: u16,
    pub access: Access,
    pub timestamp: String,
}

pub fn virtual_hosted_url(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com", bucket, region)
}

pub fn path_style_url(bucket: &str, region: &str) -> String {
    format!("https://s3.{}.amazonaws.com/{}", region, bucket)
}

/// Map the follow-up GET onto an access classification.
fn classify(status: u16, body: &str) -> Access {
    match status {
        200 if LISTING_MARKERS.iter().any(|m| body.contains(m)) => Access::Public,
        200 => Access::Accessible,
        403 => Access::Private,
        301 | 302 | 307 => Access::Exists,
        _ => Access::Unknown,
    }
}

/// Existence/access check for one (bucket, region) target. `None` means the
/// target is absent, never an error; the scheduler treats the two the same.
pub trait Prober: Send + Sync {
    fn probe(&self, bucket: &str, region: &str) -> impl Future<Output = Option<ProbeResult>> + Send;
}

pub struct HttpProber {
    client: reqwest::Client,
    verbose: bool,
}

impl HttpProber {
    pub fn new(timeout_secs: u64, verbose: bool) -> Result<Self> {
        // redirects stay unfollowed: 301/302/307 are themselves signals
        let client = reqwest::Client::builder()
            .user_agent(concat!("rubucket/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build http client")?;
        Ok(HttpProber { client, verbose })
    }

    /// GET the qualifying URL and classify. Network failure here means the
    /// bucket rejected the read, which we record as private.
    async fn determine_access(&self, url: &str) -> Access {
        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                if self.verbose {
                    eprintln!("[!] Error: {} -> {}", url, e);
                }
                return Access::Private;
            }
        };
        let status = resp.status().as_u16();
        if status != 200 {
            return classify(status, "");
        }
        match resp.text().await {
            Ok(body) => classify(200, &body),
            Err(_) => Access::Private,
        }
    }
}

impl Prober for HttpProber {
    fn probe(&self, bucket: &str, region: &str) -> impl Future<Output = Option<ProbeResult>> + Send {
        async move {
            let urls = [
                virtual_hosted_url(bucket, region),
                path_style_url(bucket, region),
            ];
            for url in urls {
                if self.verbose {
                    eprintln!("[~] Checking: {}", url);
                }
                match self.client.head(&url).send().await {
                    Ok(resp) => {
                        let status = resp.status().as_u16();
                        if self.verbose {
                            eprintln!("[>] Response: {} -> Status: {}", url, status);
                        }
                        if QUALIFYING_STATUS.contains(&status) {
                            let access = self.determine_access(&url).await;
                            return Some(ProbeResult {
                                url,
                                bucket: bucket.to_string(),
                                region: region.to_string(),
                                status,
                                access,
                                timestamp: Local::now().to_rfc3339(),
                            });
                        }
                    }
                    // timeout / connect failure: fall through to the next URL shape
                    Err(e) => {
                        if self.verbose {
                            eprintln!("[!] Error: {} -> {}", url, e);
                        }
                    }
                }
            }
            None
        }
    }
}
