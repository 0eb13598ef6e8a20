//! API Gateway constructs.
//!
//! # Responsibilities
//! - REST, HTTP and WebSocket gateways in front of Lambda handlers
//! - MCP server endpoint on top of the HTTP API wiring
//! - Regional custom domains with alias records, shared by every flavor
//!
//! # Design Decisions
//! - Handlers are referenced by function construct id and must be declared earlier
//! - Access logs are on by default; streaming is a typed flag rather than a raw
//!   property override

pub mod domain;
pub mod http;
pub mod integration;
pub mod mcp;
pub mod rest;
pub mod websocket;

pub use domain::CustomDomainProps;
pub use http::{CorsProps, HttpApiConstruct, HttpApiProps};
pub use integration::{AccessLogProps, ThrottleProps};
pub use mcp::{McpServerConstruct, McpServerProps, MCP_ENDPOINT_ENV};
pub use rest::{RestApiConstruct, RestApiProps};
pub use websocket::{WebSocketApiConstruct, WebSocketApiProps, WebSocketRoute};
