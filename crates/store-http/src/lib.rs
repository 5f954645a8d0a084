//! `PersistenceApi` over the institutional REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use sched_core::PersistenceApi;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use types::{
    AvailabilityWindow, ClassroomId, DeleteResponse, PlacementId, PlacementPayload, ProfessorId,
    ResourceBooking, SaveResponse, SectionId, SectionSchedule,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

// The backend reports double bookings with one of these plus a conflict body.
fn carries_conflicts(status: StatusCode) -> bool {
    status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, url: &str, req: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        debug!(%url, "backend request");
        req.send().await.map_err(|source| StoreError::Transport {
            url: url.to_string(),
            source,
        })
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, StoreError> {
        response.json().await.map_err(|source| StoreError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn status_error(url: &str, response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::Status {
            url: url.to_string(),
            status,
            body,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = self.url(path);
        let response = self.send(&url, self.client.get(&url)).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(&url, response).await);
        }
        Self::decode(&url, response).await
    }

    async fn save(&self, url: String, req: RequestBuilder) -> Result<SaveResponse, StoreError> {
        let response = self.send(&url, req).await?;
        let status = response.status();
        if status.is_success() || carries_conflicts(status) {
            return Self::decode(&url, response).await;
        }
        Err(Self::status_error(&url, response).await)
    }
}

#[async_trait]
impl PersistenceApi for HttpStore {
    async fn get_professor_availability(&self, id: &ProfessorId) -> anyhow::Result<Vec<AvailabilityWindow>> {
        Ok(self.get_json(&format!("professors/{id}/availability")).await?)
    }

    async fn get_professor_bookings(&self, id: &ProfessorId) -> anyhow::Result<Vec<ResourceBooking>> {
        Ok(self.get_json(&format!("professors/{id}/bookings")).await?)
    }

    async fn get_classroom_bookings(&self, id: &ClassroomId) -> anyhow::Result<Vec<ResourceBooking>> {
        Ok(self.get_json(&format!("classrooms/{id}/bookings")).await?)
    }

    async fn create_class_placement(&self, payload: &PlacementPayload) -> anyhow::Result<SaveResponse> {
        let url = self.url("schedules");
        let req = self.client.post(&url).json(payload);
        Ok(self.save(url, req).await?)
    }

    async fn update_class_placement(
        &self,
        id: &PlacementId,
        payload: &PlacementPayload,
    ) -> anyhow::Result<SaveResponse> {
        let url = self.url(&format!("schedules/{id}"));
        let req = self.client.put(&url).json(payload);
        Ok(self.save(url, req).await?)
    }

    async fn delete_class_placement(&self, id: &PlacementId) -> anyhow::Result<DeleteResponse> {
        let url = self.url(&format!("schedules/{id}"));
        let response = self.send(&url, self.client.delete(&url)).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(DeleteResponse { success: true, message: None });
        }
        if !status.is_success() {
            return Err(Self::status_error(&url, response).await.into());
        }
        Ok(Self::decode(&url, response).await?)
    }

    async fn get_section_schedule(&self, id: &SectionId) -> anyhow::Result<SectionSchedule> {
        Ok(self.get_json(&format!("sections/{id}/schedule")).await?)
    }
}
