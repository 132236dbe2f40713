use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::PrefixRegistry;
use crate::error::LabError;

#[derive(Debug, Deserialize)]
struct AnnouncedPrefixesResponse {
    data: AnnouncedPrefixesData,
}

#[derive(Debug, Deserialize)]
struct AnnouncedPrefixesData {
    #[serde(default)]
    prefixes: Vec<AnnouncedPrefix>,
}

#[derive(Debug, Deserialize)]
struct AnnouncedPrefix {
    prefix: String,
}

/// RIPEstat announced-prefixes API client
pub struct RipeStat {
    url: String,
    lookback_days: i64,
    client: Client,
}

impl RipeStat {
    pub fn new(url: String, lookback_days: i64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            url,
            lookback_days,
            client,
        })
    }

    /// Start of the observation window, e.g. "2024-05-01T12:00"
    fn start_time(&self) -> String {
        (chrono::Utc::now() - chrono::Duration::days(self.lookback_days))
            .format("%Y-%m-%dT%H:%M")
            .to_string()
    }
}

#[async_trait]
impl PrefixRegistry for RipeStat {
    async fn announced_prefixes(&self, asn: u32) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("resource", format!("AS{}", asn)),
                ("starttime", self.start_time()),
            ])
            .header("Accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LabError::AnnouncedPrefixes {
                asn,
                status: resp.status().as_u16(),
            }
            .into());
        }

        let body: AnnouncedPrefixesResponse = resp.json().await?;
        Ok(parse_prefixes(body))
    }
}

fn parse_prefixes(body: AnnouncedPrefixesResponse) -> Vec<String> {
    body.data.prefixes.into_iter().map(|p| p.prefix).collect()
}
