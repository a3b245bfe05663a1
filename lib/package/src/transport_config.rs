use fusion_composition::{
    ClientConfiguration, HttpClientConfiguration, WebSocketClientConfiguration,
};
use serde::{Deserialize, Serialize};

/// The `subgraph-config.json` document: the subgraph name plus the clients
/// the gateway uses to reach it. Unknown properties are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub subgraph: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpClientConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket: Option<WebSocketClientConfiguration>,
}

impl TransportConfig {
    pub fn parse(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn from_clients(subgraph: &str, clients: &[ClientConfiguration]) -> Self {
        let mut config = TransportConfig {
            subgraph: subgraph.to_string(),
            http: None,
            websocket: None,
        };

        for client in clients {
            match client {
                ClientConfiguration::Http(http) if config.http.is_none() => {
                    config.http = Some(http.clone());
                }
                ClientConfiguration::WebSocket(ws) if config.websocket.is_none() => {
                    config.websocket = Some(ws.clone());
                }
                _ => {}
            }
        }

        config
    }

    /// Clients in declaration order: HTTP first, then WebSocket.
    pub fn clients(&self) -> Vec<ClientConfiguration> {
        self.http
            .iter()
            .cloned()
            .map(ClientConfiguration::Http)
            .chain(
                self.websocket
                    .iter()
                    .cloned()
                    .map(ClientConfiguration::WebSocket),
            )
            .collect()
    }

    pub fn to_json(&self) -> String {
        // Serializing plain strings and options cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
