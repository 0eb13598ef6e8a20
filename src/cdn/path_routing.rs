//! Path-routing behavior compiler.
//!
//! # Responsibilities
//! - Turn bypass patterns and SPA origin descriptors into ordered cache behaviors
//! - Reject malformed and duplicate path patterns
//! - Build the rewrite table consumed by the viewer-request edge function
//!
//! # Data Flow
//! ```text
//! bypass_paths + spa_origins
//!     → validate patterns (leading '/', no duplicates, quota)
//!     → behaviors: bypass first, then SPA, in declaration order
//!     → rewrite table: SPA entries that rewrite or strip,
//!       longest prefix first
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::synth::{ConstructError, ConstructResult};

/// Default document served for client-side routes.
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

/// CloudFront limit on cache behaviors per distribution.
pub const MAX_CACHE_BEHAVIORS: usize = 25;

/// How requests under an SPA prefix are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteMode {
    /// Extensionless paths are served the prefix's index document.
    #[default]
    Spa,
    /// Paths are forwarded as-is.
    None,
}

/// A static bucket mounted under a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpaOriginConfig {
    pub bucket_name: String,
    /// CloudFront path pattern, e.g. `/app/*`.
    pub path_pattern: String,
    pub rewrite_mode: RewriteMode,
    /// Remove the matched prefix before the request reaches the bucket.
    pub strip_prefix_before_origin: bool,
    /// Document served for extensionless paths (default: `index.html`).
    pub index_document: String,
}

impl Default for SpaOriginConfig {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            path_pattern: String::new(),
            rewrite_mode: RewriteMode::default(),
            strip_prefix_before_origin: false,
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
        }
    }
}

/// Where a compiled behavior sends traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorTarget {
    /// Primary backend, uncached.
    Backend,
    /// SPA bucket; `rewrite` is set when the edge function handles this prefix.
    Bucket { bucket_name: String, rewrite: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBehavior {
    pub path_pattern: String,
    pub target: BehaviorTarget,
}

/// One row of the edge rewrite table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteEntry {
    pub prefix: String,
    pub rewrite_mode: RewriteMode,
    pub strip_prefix_before_origin: bool,
    pub index_path: String,
}

/// Prefix rewrite rules, longest prefix first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteTable {
    entries: Vec<RewriteEntry>,
}

impl RewriteTable {
    /// Sort entries by descending prefix length, ties lexicographically.
    pub fn new(mut entries: Vec<RewriteEntry>) -> Self {
        entries.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[RewriteEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URI forwarded to the origin for a viewer request URI.
    ///
    /// Mirrors the generated edge function.
    pub fn resolve(&self, uri: &str) -> String {
        let Some(entry) = self.entries.iter().find(|e| uri.starts_with(&e.prefix)) else {
            return uri.to_string();
        };

        let mut resolved = uri.to_string();
        let rest = &uri[entry.prefix.len()..];
        let last_segment = rest.rsplit('/').next().unwrap_or_default();
        if entry.rewrite_mode == RewriteMode::Spa && !last_segment.contains('.') {
            resolved = entry.index_path.clone();
        }
        if entry.strip_prefix_before_origin {
            let stripped = resolved.get(entry.prefix.len()..).unwrap_or_default();
            resolved = format!("/{}", stripped.trim_start_matches('/'));
        }
        resolved
    }
}

/// Output of [`compile_routing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingPlan {
    pub behaviors: Vec<CompiledBehavior>,
    /// Present when at least one SPA entry rewrites or strips.
    pub rewrite_table: Option<RewriteTable>,
}

/// Prefix matched by a path pattern: the pattern without its trailing `*`.
pub fn pattern_prefix(pattern: &str) -> &str {
    pattern.strip_suffix('*').unwrap_or(pattern)
}

fn index_path(prefix: &str, document: &str) -> String {
    let document = document.trim_start_matches('/');
    if prefix.ends_with('/') {
        format!("{prefix}{document}")
    } else {
        format!("{prefix}/{document}")
    }
}

/// Compile bypass patterns and SPA origins into behaviors and a rewrite table.
pub fn compile_routing(
    construct: &str,
    bypass_paths: &[String],
    spa_origins: &[SpaOriginConfig],
) -> ConstructResult<RoutingPlan> {
    let mut seen = BTreeSet::new();
    let mut check = |pattern: &str| -> ConstructResult<()> {
        if !pattern.starts_with('/') {
            return Err(ConstructError::invalid(
                construct,
                "path_pattern",
                format!("`{pattern}` must start with '/'"),
            ));
        }
        if !seen.insert(pattern.to_string()) {
            return Err(ConstructError::DuplicatePathPattern {
                construct: construct.to_string(),
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    };

    let mut behaviors = Vec::with_capacity(bypass_paths.len() + spa_origins.len());
    for pattern in bypass_paths {
        check(pattern)?;
        behaviors.push(CompiledBehavior {
            path_pattern: pattern.clone(),
            target: BehaviorTarget::Backend,
        });
    }

    let mut entries = Vec::new();
    for spa in spa_origins {
        if spa.bucket_name.trim().is_empty() {
            return Err(ConstructError::missing(construct, "spa_origins.bucket_name"));
        }
        check(&spa.path_pattern)?;

        let rewrite = spa.rewrite_mode == RewriteMode::Spa || spa.strip_prefix_before_origin;
        if rewrite {
            let prefix = pattern_prefix(&spa.path_pattern);
            let document = if spa.index_document.trim().is_empty() {
                DEFAULT_INDEX_DOCUMENT
            } else {
                spa.index_document.as_str()
            };
            entries.push(RewriteEntry {
                prefix: prefix.to_string(),
                rewrite_mode: spa.rewrite_mode,
                strip_prefix_before_origin: spa.strip_prefix_before_origin,
                index_path: index_path(prefix, document),
            });
        }
        behaviors.push(CompiledBehavior {
            path_pattern: spa.path_pattern.clone(),
            target: BehaviorTarget::Bucket {
                bucket_name: spa.bucket_name.clone(),
                rewrite,
            },
        });
    }

    if behaviors.len() > MAX_CACHE_BEHAVIORS {
        return Err(ConstructError::invalid(
            construct,
            "path_pattern",
            format!(
                "{} cache behaviors exceed the limit of {MAX_CACHE_BEHAVIORS}",
                behaviors.len()
            ),
        ));
    }

    let rewrite_table = (!entries.is_empty()).then(|| RewriteTable::new(entries));
    Ok(RoutingPlan {
        behaviors,
        rewrite_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spa(bucket: &str, pattern: &str) -> SpaOriginConfig {
        SpaOriginConfig {
            bucket_name: bucket.into(),
            path_pattern: pattern.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_behavior_order_bypass_first() {
        let plan = compile_routing(
            "site",
            &["/api/*".to_string()],
            &[spa("web", "/app/*"), spa("docs", "/docs/*")],
        )
        .unwrap();
        let patterns: Vec<&str> = plan.behaviors.iter().map(|b| b.path_pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/api/*", "/app/*", "/docs/*"]);
        assert_eq!(plan.behaviors[0].target, BehaviorTarget::Backend);
    }

    #[test]
    fn test_longest_prefix_first() {
        let plan = compile_routing(
            "site",
            &[],
            &[spa("a", "/app/*"), spa("b", "/app/admin/*")],
        )
        .unwrap();
        let table = plan.rewrite_table.unwrap();
        let prefixes: Vec<&str> = table.entries().iter().map(|e| e.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["/app/admin/", "/app/"]);

        assert_eq!(table.resolve("/app/admin/users"), "/app/admin/index.html");
        assert_eq!(table.resolve("/app/settings"), "/app/index.html");
    }

    #[test]
    fn test_resolve_rules() {
        let mut strip = spa("b", "/app/*");
        strip.strip_prefix_before_origin = true;
        let table = compile_routing("site", &[], &[strip]).unwrap().rewrite_table.unwrap();

        assert_eq!(table.resolve("/app/dashboard"), "/index.html");
        assert_eq!(table.resolve("/app/assets/main.js"), "/assets/main.js");
        assert_eq!(table.resolve("/app/"), "/index.html");
        assert_eq!(table.resolve("/other/page"), "/other/page");
    }

    #[test]
    fn test_spa_without_strip_keeps_asset_paths() {
        let table = compile_routing("site", &[], &[spa("b", "/app/*")])
            .unwrap()
            .rewrite_table
            .unwrap();
        assert_eq!(table.resolve("/app/logo.png"), "/app/logo.png");
        assert_eq!(table.resolve("/app/img/v1.2/logo"), "/app/index.html");
        assert_eq!(table.resolve("/app/settings"), "/app/index.html");
    }

    #[test]
    fn test_no_rewrite_mode_only_strips() {
        let mut entry = spa("b", "/static/*");
        entry.rewrite_mode = RewriteMode::None;
        let plan = compile_routing("site", &[], &[entry.clone()]).unwrap();
        assert!(plan.rewrite_table.is_none());

        entry.strip_prefix_before_origin = true;
        let table = compile_routing("site", &[], &[entry]).unwrap().rewrite_table.unwrap();
        assert_eq!(table.resolve("/static/page"), "/page");
    }

    #[test]
    fn test_custom_index_document() {
        let mut entry = spa("b", "/portal/*");
        entry.index_document = "app.html".into();
        let table = compile_routing("site", &[], &[entry]).unwrap().rewrite_table.unwrap();
        assert_eq!(table.entries()[0].index_path, "/portal/app.html");
    }

    #[test]
    fn test_duplicate_patterns_rejected() {
        let err = compile_routing("site", &["/app/*".to_string()], &[spa("b", "/app/*")])
            .unwrap_err();
        assert_eq!(
            err,
            ConstructError::DuplicatePathPattern {
                construct: "site".into(),
                pattern: "/app/*".into()
            }
        );
        assert!(compile_routing("site", &[], &[spa("a", "/x/*"), spa("b", "/x/*")]).is_err());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            compile_routing("site", &["api/*".to_string()], &[]),
            Err(ConstructError::Invalid { .. })
        ));
        assert!(matches!(
            compile_routing("site", &[], &[spa("", "/x/*")]),
            Err(ConstructError::MissingField { .. })
        ));
        let many: Vec<String> = (0..26).map(|i| format!("/p{i}/*")).collect();
        assert!(compile_routing("site", &many, &[]).is_err());
    }

    #[test]
    fn test_equal_length_prefixes_sorted_lexicographically() {
        let plan = compile_routing("site", &[], &[spa("b", "/bb/*"), spa("a", "/aa/*")]).unwrap();
        let table = plan.rewrite_table.unwrap();
        assert_eq!(table.entries()[0].prefix, "/aa/");
    }
}
