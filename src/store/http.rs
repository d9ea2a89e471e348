// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, span, Instrument, Level, Span};

use super::{
    AssociationId, AssociationRecord, LocationRecord, NewAssociation, SampleId, SampleRecord,
    StoreError,
};

const SAMPLES: &str = "sample";
const LOCATIONS: &str = "location";
const ASSOCIATIONS: &str = "sampletolocation";

/// A store client for the REST API. Every request carries the static API key.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    span: Span,
}

impl Client {
    /// Creates a new client for the API rooted at the given base URL.
    pub fn new(base_url: &str, api_key: &str) -> Client {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Client {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.to_string(),
            span: span!(Level::INFO, "store"),
        }
    }

    /// The URL of a collection, or of one record in it.
    fn url(&self, collection: &str, id: Option<i64>) -> String {
        match id {
            Some(id) => format!("{}{}/{}/", self.base_url, collection, id),
            None => format!("{}{}/", self.base_url, collection),
        }
    }

    fn request(&self, method: Method, collection: &str, id: Option<i64>) -> RequestBuilder {
        self.http
            .request(method, self.url(collection, id))
            .query(&[("api_key", self.api_key.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends the request, mapping statuses to store errors. A 404 on a single record is a
    /// missing record rather than a failure.
    async fn send(
        &self,
        request: RequestBuilder,
        kind: &'static str,
        id: Option<i64>,
    ) -> Result<String, StoreError> {
        let response = request.send().instrument(self.span.clone()).await?;
        let status = response.status();
        let url = response.url().to_string();
        debug!(parent: &self.span, status = status.as_u16(), kind, "Store responded.");

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StoreError::NotFound { kind, id });
            }
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.text().await?)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: &'static str,
        id: Option<i64>,
    ) -> Result<T, StoreError> {
        let body = self.send(request, kind, id).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl super::Store for Client {
    async fn list_samples(&self) -> Result<Vec<SampleRecord>, StoreError> {
        self.fetch(self.request(Method::GET, SAMPLES, None), "sample", None)
            .await
    }

    async fn get_sample(&self, id: SampleId) -> Result<SampleRecord, StoreError> {
        self.fetch(
            self.request(Method::GET, SAMPLES, Some(id.0)),
            "sample",
            Some(id.0),
        )
        .await
    }

    async fn create_sample(&self, sample: &SampleRecord) -> Result<SampleRecord, StoreError> {
        self.fetch(
            self.request(Method::POST, SAMPLES, None).json(sample),
            "sample",
            None,
        )
        .await
    }

    async fn update_sample(
        &self,
        id: SampleId,
        sample: &SampleRecord,
    ) -> Result<SampleRecord, StoreError> {
        let sample = SampleRecord {
            id: Some(id),
            ..sample.clone()
        };
        self.fetch(
            self.request(Method::PUT, SAMPLES, Some(id.0)).json(&sample),
            "sample",
            Some(id.0),
        )
        .await
    }

    async fn list_locations(&self) -> Result<Vec<LocationRecord>, StoreError> {
        self.fetch(self.request(Method::GET, LOCATIONS, None), "location", None)
            .await
    }

    async fn list_associations(&self) -> Result<Vec<AssociationRecord>, StoreError> {
        self.fetch(
            self.request(Method::GET, ASSOCIATIONS, None),
            "association",
            None,
        )
        .await
    }

    async fn create_association(
        &self,
        association: NewAssociation,
    ) -> Result<AssociationRecord, StoreError> {
        self.fetch(
            self.request(Method::POST, ASSOCIATIONS, None)
                .json(&association),
            "association",
            None,
        )
        .await
    }

    async fn delete_association(&self, id: AssociationId) -> Result<(), StoreError> {
        self.send(
            self.request(Method::DELETE, ASSOCIATIONS, Some(id.0)),
            "association",
            Some(id.0),
        )
        .await?;
        Ok(())
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

#[cfg(test)]
mod test {
    use super::Client;

    #[test]
    fn test_urls() {
        let client = Client::new("https://example.com/api", "key");
        assert_eq!("https://example.com/api/sample/", client.url("sample", None));
        assert_eq!(
            "https://example.com/api/sampletolocation/4/",
            client.url("sampletolocation", Some(4))
        );
        assert_eq!("https://example.com/api/", client.to_string());
    }

    #[test]
    fn test_requests_carry_api_key() -> Result<(), reqwest::Error> {
        let client = Client::new("https://example.com/api/", "s3cret");
        let request = client
            .request(reqwest::Method::GET, "location", None)
            .build()?;
        assert_eq!(
            "https://example.com/api/location/?api_key=s3cret",
            request.url().as_str()
        );
        Ok(())
    }
}
