mod fusion_package;
mod subgraph_package;

use fusion_composition::{ClientConfiguration, HttpClientConfiguration, SubgraphConfiguration};

pub const ACCOUNTS_SCHEMA: &str = r#"type Query {
  user(id: ID!): User
}

type User @key(fields: "id") {
  id: ID!
  name: String!
}
"#;

pub const REVIEWS_SCHEMA: &str = r#"type Review {
  id: ID!
  authorId: ID!
}

type User @key(fields: "id") {
  id: ID!
  reviews: [Review]
}

type Query {
  review(id: ID!): Review
}
"#;

pub fn http_subgraph(name: &str, schema: &str) -> SubgraphConfiguration {
    SubgraphConfiguration::new(
        name,
        schema,
        vec![ClientConfiguration::Http(HttpClientConfiguration {
            base_address: format!("http://{}.local/graphql", name.to_lowercase()),
            client_name: None,
        })],
        vec![],
    )
}

pub fn accounts() -> SubgraphConfiguration {
    http_subgraph("Accounts", ACCOUNTS_SCHEMA)
}

pub fn reviews() -> SubgraphConfiguration {
    http_subgraph("Reviews", REVIEWS_SCHEMA)
}
