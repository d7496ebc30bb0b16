//! Every Election client for upcoming elections at a postcode.

use pollfinder_core::{ElectionExplanation, ElectionsSummary, Settings};
use serde::Deserialize;
use tracing::{info, warn};

use crate::RemoteError;

/// Queries the Every Election API.
///
/// Every public method fails open: when the request fails for any reason an
/// election is assumed and no explanations are returned, so the station page
/// is never hidden by an outage.
pub struct ElectionsClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ElectionsPage {
    results: Vec<Election>,
}

#[derive(Deserialize)]
struct Election {
    #[serde(default)]
    election_title: String,
    #[serde(default)]
    explanation: Option<String>,
}

impl ElectionsClient {
    pub fn new(settings: &Settings) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder().timeout(settings.elections_timeout);
        if let Some(ua) = &settings.custom_user_agent {
            builder = builder.user_agent(ua.clone());
        }
        Ok(Self {
            client: builder.build()?,
            base_url: settings.ee_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, postcode: &str) -> Result<Vec<Election>, RemoteError> {
        let url = format!("{}/api/elections.json", self.base_url);

        info!(url = %url, postcode, "querying every election");
        let resp = self
            .client
            .get(&url)
            .query(&[("postcode", postcode), ("future", "1")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let page: ElectionsPage = serde_json::from_str(&body)?;
        info!(count = page.results.len(), "fetched upcoming elections");
        Ok(page.results)
    }

    /// Election flag and explanations from a single request.
    pub async fn summary(&self, postcode: &str) -> ElectionsSummary {
        match self.fetch(postcode).await {
            Ok(elections) => ElectionsSummary {
                has_election: !elections.is_empty(),
                explanations: elections
                    .into_iter()
                    .filter_map(|e| match e.explanation {
                        Some(explanation) if !explanation.is_empty() => {
                            Some(ElectionExplanation {
                                title: e.election_title,
                                explanation,
                            })
                        }
                        _ => None,
                    })
                    .collect(),
            },
            Err(e) => {
                warn!(postcode, error = %e, "election lookup failed, assuming an election");
                ElectionsSummary {
                    has_election: true,
                    explanations: Vec::new(),
                }
            }
        }
    }

    pub async fn has_upcoming_election(&self, postcode: &str) -> bool {
        self.summary(postcode).await.has_election
    }

    pub async fn get_explanations(&self, postcode: &str) -> Vec<ElectionExplanation> {
        self.summary(postcode).await.explanations
    }
}
