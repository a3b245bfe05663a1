mod execution;
mod http;
