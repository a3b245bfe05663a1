pub mod error_normalization;
pub mod graphql_error;
pub mod graphql_response;
pub mod merge;
