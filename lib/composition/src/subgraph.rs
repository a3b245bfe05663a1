use serde::{Deserialize, Serialize};

/// One subgraph participating in a fusion graph: its schema document, the
/// clients used to reach it, and the extension documents applied on top of the
/// schema before composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphConfiguration {
    pub name: String,
    pub schema: String,
    pub clients: Vec<ClientConfiguration>,
    pub extensions: Vec<String>,
}

impl SubgraphConfiguration {
    pub fn new(
        name: impl Into<String>,
        schema: impl Into<String>,
        clients: Vec<ClientConfiguration>,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            clients,
            extensions,
        }
    }

    /// The HTTP client, if the subgraph declares one.
    pub fn http_client(&self) -> Option<&HttpClientConfiguration> {
        self.clients.iter().find_map(|client| match client {
            ClientConfiguration::Http(http) => Some(http),
            ClientConfiguration::WebSocket(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientConfiguration {
    Http(HttpClientConfiguration),
    WebSocket(WebSocketClientConfiguration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientConfiguration {
    pub base_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketClientConfiguration {
    pub base_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}
