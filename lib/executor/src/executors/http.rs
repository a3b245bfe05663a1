use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use http::HeaderValue;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::{body::Bytes, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tracing::{debug, instrument};

use crate::executors::common::{SubgraphRequest, SubgraphResponse, SubgraphTransport};
use crate::executors::error::TransportError;

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

#[derive(Debug)]
pub struct HttpSubgraphTransport {
    pub subgraph_name: String,
    pub endpoint: http::Uri,
    pub http_client: Arc<HttpClient>,
    pub header_map: HeaderMap,
    pub timeout: Option<Duration>,
}

impl HttpSubgraphTransport {
    pub fn new(
        subgraph_name: &str,
        endpoint: &str,
        http_client: Arc<HttpClient>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let endpoint = endpoint.parse::<http::Uri>().map_err(|e| {
            TransportError::EndpointParseFailure(endpoint.to_string(), e.to_string())
        })?;

        let mut header_map = HeaderMap::new();
        header_map.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        header_map.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        header_map.insert(
            http::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        Ok(Self {
            subgraph_name: subgraph_name.to_string(),
            endpoint,
            http_client,
            header_map,
            timeout,
        })
    }

    async fn _send(&self, body: Vec<u8>) -> Result<SubgraphResponse, TransportError> {
        let mut req = hyper::Request::builder()
            .method(http::Method::POST)
            .uri(&self.endpoint)
            .version(Version::HTTP_11)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| {
                TransportError::RequestBuildFailure(self.subgraph_name.clone(), e.to_string())
            })?;

        *req.headers_mut() = self.header_map.clone();

        let res = self.http_client.request(req).await.map_err(|e| {
            TransportError::RequestFailure(self.subgraph_name.clone(), e.to_string())
        })?;

        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::RequestFailure(self.subgraph_name.clone(), e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus(
                self.subgraph_name.clone(),
                status.as_u16(),
            ));
        }

        let response: SubgraphResponse = serde_json::from_slice(&bytes).map_err(|e| {
            TransportError::InvalidResponse(self.subgraph_name.clone(), e.to_string())
        })?;

        if response.data.is_none() && response.errors.is_none() {
            return Err(TransportError::InvalidResponse(
                self.subgraph_name.clone(),
                "response has neither data nor errors".to_string(),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl SubgraphTransport for HttpSubgraphTransport {
    #[instrument(level = "debug", skip_all, fields(subgraph = %self.subgraph_name, endpoint = %self.endpoint))]
    async fn send<'a>(
        &self,
        request: SubgraphRequest<'a>,
    ) -> Result<SubgraphResponse, TransportError> {
        let body = serde_json::to_vec(&request).map_err(|e| {
            TransportError::RequestBuildFailure(self.subgraph_name.clone(), e.to_string())
        })?;
        debug!(bytes = body.len(), "sending subgraph request");

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self._send(body))
                .await
                .map_err(|_| TransportError::RequestTimeout(self.subgraph_name.clone(), timeout))?,
            None => self._send(body).await,
        }
    }
}
