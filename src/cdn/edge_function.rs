//! Viewer-request function source for SPA rewrites.

use crate::cdn::path_routing::RewriteTable;
use crate::synth::{ConstructError, ConstructResult};

/// Runtime the generated code targets.
pub const FUNCTION_RUNTIME: &str = "cloudfront-js-2.0";

const HANDLER: &str = r#"
function handler(event) {
  var request = event.request;
  var uri = request.uri;
  for (var i = 0; i < ROUTES.length; i++) {
    var route = ROUTES[i];
    if (uri.indexOf(route.prefix) !== 0) {
      continue;
    }
    var rest = uri.substring(route.prefix.length);
    var last = rest.split('/').pop();
    if (route.rewriteMode === 'spa' && last.indexOf('.') === -1) {
      uri = route.indexPath;
    }
    if (route.stripPrefixBeforeOrigin) {
      uri = '/' + uri.substring(route.prefix.length).replace(/^\/+/, '');
    }
    request.uri = uri;
    return request;
  }
  return request;
}
"#;

/// Render the edge function with the table embedded as JSON.
pub fn render_rewrite_function(construct: &str, table: &RewriteTable) -> ConstructResult<String> {
    let routes = serde_json::to_string(table.entries())
        .map_err(|e| ConstructError::invalid(construct, "spa_origins", e.to_string()))?;
    Ok(format!("var ROUTES = {routes};\n{}", HANDLER.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::path_routing::{RewriteEntry, RewriteMode};

    #[test]
    fn test_embeds_sorted_table() {
        let table = RewriteTable::new(vec![
            RewriteEntry {
                prefix: "/a/".into(),
                rewrite_mode: RewriteMode::Spa,
                strip_prefix_before_origin: false,
                index_path: "/a/index.html".into(),
            },
            RewriteEntry {
                prefix: "/a/b/".into(),
                rewrite_mode: RewriteMode::None,
                strip_prefix_before_origin: true,
                index_path: "/a/b/index.html".into(),
            },
        ]);
        let code = render_rewrite_function("site", &table).unwrap();
        assert!(code.starts_with(
            r#"var ROUTES = [{"prefix":"/a/b/","rewriteMode":"none","stripPrefixBeforeOrigin":true,"indexPath":"/a/b/index.html"},"#
        ));
        assert!(code.contains("function handler(event)"));
        assert!(code.contains("route.rewriteMode === 'spa'"));
    }

    fn sample_table() -> RewriteTable {
        RewriteTable::new(vec![
            RewriteEntry {
                prefix: "/app/".into(),
                rewrite_mode: RewriteMode::Spa,
                strip_prefix_before_origin: false,
                index_path: "/app/index.html".into(),
            },
            RewriteEntry {
                prefix: "/app/admin/".into(),
                rewrite_mode: RewriteMode::Spa,
                strip_prefix_before_origin: true,
                index_path: "/app/admin/index.html".into(),
            },
            RewriteEntry {
                prefix: "/static/".into(),
                rewrite_mode: RewriteMode::None,
                strip_prefix_before_origin: true,
                index_path: "/static/index.html".into(),
            },
        ])
    }

    #[test]
    fn test_rendered_source_is_pinned() {
        let code = render_rewrite_function("site", &RewriteTable::new(vec![RewriteEntry {
            prefix: "/app/".into(),
            rewrite_mode: RewriteMode::Spa,
            strip_prefix_before_origin: true,
            index_path: "/app/index.html".into(),
        }]))
        .unwrap();
        let expected = r#"var ROUTES = [{"prefix":"/app/","rewriteMode":"spa","stripPrefixBeforeOrigin":true,"indexPath":"/app/index.html"}];
function handler(event) {
  var request = event.request;
  var uri = request.uri;
  for (var i = 0; i < ROUTES.length; i++) {
    var route = ROUTES[i];
    if (uri.indexOf(route.prefix) !== 0) {
      continue;
    }
    var rest = uri.substring(route.prefix.length);
    var last = rest.split('/').pop();
    if (route.rewriteMode === 'spa' && last.indexOf('.') === -1) {
      uri = route.indexPath;
    }
    if (route.stripPrefixBeforeOrigin) {
      uri = '/' + uri.substring(route.prefix.length).replace(/^\/+/, '');
    }
    request.uri = uri;
    return request;
  }
  return request;
}
"#;
        assert_eq!(code, expected);
    }

    #[test]
    #[ignore = "needs node on PATH"]
    fn test_generated_handler_matches_resolve() {
        let table = sample_table();
        let uris = [
            "/",
            "/app",
            "/app/",
            "/app/settings",
            "/app/logo.png",
            "/app/v1.2/page",
            "/app/admin/",
            "/app/admin/users",
            "/app/admin/app.js",
            "/static/",
            "/static/css/site.css",
            "/static/page",
            "/other/page",
        ];
        let script = format!(
            "{}\nvar uris = {};\n{}",
            render_rewrite_function("site", &table).unwrap(),
            serde_json::to_string(&uris).unwrap(),
            "console.log(JSON.stringify(uris.map(function (u) {\n  \
             return handler({ request: { uri: u } }).uri;\n})));"
        );
        let output = std::process::Command::new("node")
            .arg("-e")
            .arg(&script)
            .output()
            .expect("node runs");
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let from_js: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
        let from_rust: Vec<String> = uris.iter().map(|u| table.resolve(u)).collect();
        assert_eq!(from_js, from_rust);
    }
}
