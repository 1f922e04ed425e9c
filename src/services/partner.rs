// src/services/partner.rs

//! Partner branch manifest lookup over HTTP.
//!
//! `GET {base}/manifest/search?awb_number=<AWB>` answers with
//! `{ success, data: { penerima: {...}, pengirim: {...} } }`. Only AWBs whose
//! prefix belongs to a partnered branch are sent here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::Result;
use crate::models::{ManifestRecord, Party, SourceTag};
use crate::services::Awb;
use crate::services::manifest::ManifestSource;

/// Manifest source backed by the partner branch API.
pub struct PartnerManifest {
    client: Client,
    search_url: Url,
    partner_prefixes: Vec<String>,
}

impl PartnerManifest {
    pub fn new(client: Client, base_url: &str, partner_prefixes: &[String]) -> Result<Self> {
        let mut base = Url::parse(base_url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            search_url: base.join("manifest/search")?,
            partner_prefixes: partner_prefixes
                .iter()
                .map(|p| p.trim().to_uppercase())
                .collect(),
        })
    }

    pub fn search_url(&self, candidate: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("awb_number", candidate);
        url
    }

    /// Parse a search response body into a record.
    pub fn parse_response(candidate: &str, body: &str) -> Result<Option<ManifestRecord>> {
        let response: SearchResponse = serde_json::from_str(body)?;
        if !response.success {
            return Ok(None);
        }
        let Some(data) = response.data else {
            return Ok(None);
        };
        let Some(receiver) = data.penerima else {
            return Ok(None);
        };

        let sender = data
            .pengirim
            .map(|p| Party::new(p.nama_pengirim, p.alamat_pengirim, p.no_pengirim))
            .unwrap_or_else(Party::placeholder);

        Ok(Some(ManifestRecord {
            awb: candidate.to_string(),
            sender,
            receiver: Party::new(
                receiver.nama_penerima,
                receiver.alamat_penerima,
                receiver.no_penerima,
            ),
            source: SourceTag::PartnerApi,
        }))
    }
}

#[async_trait]
impl ManifestSource for PartnerManifest {
    fn tag(&self) -> SourceTag {
        SourceTag::PartnerApi
    }

    fn covers(&self, awb: &Awb) -> bool {
        awb.prefix()
            .is_some_and(|p| self.partner_prefixes.iter().any(|q| q == p))
    }

    async fn find(&self, candidate: &str) -> Result<Option<ManifestRecord>> {
        let url = self.search_url(candidate);
        log::debug!("Partner manifest lookup: {}", url);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.text().await?;
        Self::parse_response(candidate, &body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    penerima: Option<Penerima>,
    #[serde(default)]
    pengirim: Option<Pengirim>,
}

#[derive(Debug, Deserialize)]
struct Penerima {
    #[serde(default, deserialize_with = "lenient_string")]
    nama_penerima: String,
    #[serde(default, deserialize_with = "lenient_string")]
    alamat_penerima: String,
    #[serde(default, deserialize_with = "lenient_string")]
    no_penerima: String,
}

#[derive(Debug, Deserialize)]
struct Pengirim {
    #[serde(default, deserialize_with = "lenient_string")]
    nama_pengirim: String,
    #[serde(default, deserialize_with = "lenient_string")]
    alamat_pengirim: String,
    #[serde(default, deserialize_with = "lenient_string")]
    no_pengirim: String,
}

/// Accepts strings, numbers (phone numbers often arrive unquoted) and null.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
