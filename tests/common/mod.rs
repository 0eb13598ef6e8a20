//! Shared fixtures for integration tests.

use apptheory_constructs::config::parse_config;
use apptheory_constructs::Template;
use serde_json::Value;

/// An app using every construct type.
pub const FULL_APP: &str = r#"
description = "full catalogue"

[stack]
name = "shop"
region = "us-east-1"
account = "123456789012"

[[constructs]]
type = "function"
id = "api"
code = { s3_bucket = "artifacts", s3_key = "api.zip" }

[[constructs]]
type = "function"
id = "worker"
code = { s3_bucket = "artifacts", s3_key = "worker.zip" }

[[constructs]]
type = "function"
id = "ssr"
code = { s3_bucket = "artifacts", s3_key = "ssr.zip" }

[[constructs]]
type = "function"
id = "tools"
code = { s3_bucket = "artifacts", s3_key = "tools.zip" }

[[constructs]]
type = "table"
id = "orders"
partition_key = { name = "pk", type = "S" }
sort_key = { name = "sk", type = "S" }
functions = ["api"]
read_functions = ["worker"]

[[constructs]]
type = "rate_limit_table"
id = "limits"
functions = ["api"]

[[constructs]]
type = "queue"
id = "jobs"
consumers = ["worker"]
producers = ["api"]
environment_key = "JOBS_QUEUE_URL"
dead_letter_queue = {}

[[constructs]]
type = "secret"
id = "stripe"
readers = ["api"]
environment_key = "STRIPE_SECRET_ARN"

[[constructs]]
type = "security_group"
id = "db"
vpc_id = "vpc-123"
ingress = [{ protocol = "tcp", from_port = 5432, cidr = "10.0.0.0/16" }]

[[constructs]]
type = "certificate"
id = "cert"
domain_name = "shop.example.com"
subject_alternative_names = ["api.shop.example.com", "mcp.shop.example.com"]
hosted_zone = { hosted_zone_id = "Z123", zone_name = "example.com" }

[[constructs]]
type = "dns_record"
id = "verify"
domain_name = "_verify.example.com"
hosted_zone = { hosted_zone_id = "Z123", zone_name = "example.com" }
target = { kind = "txt", values = ["token"] }

[[constructs]]
type = "web_acl"
id = "edge"
scope = "cloudfront"
ip_deny_list = ["203.0.113.0/24"]

[[constructs]]
type = "distribution"
id = "cdn"
backend_url = "https://origin.example.net/prod"
bypass_paths = ["/api/*"]
spa_origins = [{ bucket_name = "shop-admin", path_pattern = "/admin/*", strip_prefix_before_origin = true }]
domain_name = "www.example.com"
certificate_arn = "arn:aws:acm:us-east-1:123456789012:certificate/www"
web_acl = "edge"

[[constructs]]
type = "ssr_site"
id = "site"
ssr_function = "ssr"
cache_table = true
domain_name = "shop.example.com"
certificate = "cert"
hosted_zone = { hosted_zone_id = "Z123", zone_name = "example.com" }

[[constructs]]
type = "rest_api"
id = "public"
handler = "api"
streaming = true
domain = { domain_name = "api.shop.example.com", certificate = "cert" }

[[constructs]]
type = "http_api"
id = "internal"
handler = "worker"

[[constructs]]
type = "websocket_api"
id = "live"
handler = "api"
routes = [{ route_key = "sendMessage", handler = "worker" }]

[[constructs]]
type = "mcp_server"
id = "mcp"
handler = "tools"
domain = { domain_name = "mcp.shop.example.com", certificate = "cert" }
"#;

/// Parse, validate and synthesize an app file.
pub fn synth(source: &str) -> Template {
    parse_config(source)
        .expect("app file is valid")
        .synthesize()
        .expect("app synthesizes")
}

/// Environment variables of a function resource.
#[allow(dead_code)]
pub fn environment(template: &Template, function: &str) -> Value {
    template.resources[function]
        .get("Environment")
        .map(|e| e["Variables"].clone())
        .unwrap_or(Value::Null)
}
