//! Route table: which requests are answered by a generator.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::core::types::ResponseSchema;
use crate::io::config::RouteConfig;

/// Method wildcard accepted by [`RouteTable::register`].
pub const ANY_METHOD: &str = "ANY";

/// A registered route and the schema its responses follow.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: String,
    pub path_prefix: String,
    pub schema: ResponseSchema,
}

/// Ordered set of routes; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let mut table = Self::new();
        for route in routes {
            table.register(
                &route.method,
                &route.path_prefix,
                route.schema.clone(),
                route.hints.clone(),
            );
        }
        table
    }

    /// Intercept `method` requests whose path starts with `path_prefix`.
    ///
    /// The method is upper-cased and the prefix gains a leading `/` if it
    /// lacks one. Use [`ANY_METHOD`] to match every method.
    pub fn register(
        &mut self,
        method: &str,
        path_prefix: &str,
        sample: Value,
        hints: BTreeMap<String, String>,
    ) {
        let method = method.trim().to_uppercase();
        let path_prefix = if path_prefix.starts_with('/') {
            path_prefix.to_string()
        } else {
            format!("/{path_prefix}")
        };
        debug!(method = %method, path_prefix = %path_prefix, "registered route");
        self.routes.push(Route {
            method,
            path_prefix,
            schema: ResponseSchema { sample, hints },
        });
    }

    /// First route matching `method` and `path`, if any.
    pub fn matches(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| {
            (route.method == ANY_METHOD || route.method.eq_ignore_ascii_case(method))
                && path.starts_with(&route.path_prefix)
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn matches_method_and_prefix() {
        let mut table = RouteTable::new();
        table.register("get", "users", json!({}), BTreeMap::new());

        let route = table.matches("GET", "/users/7").expect("match");
        assert_eq!(route.method, "GET");
        assert_eq!(route.path_prefix, "/users");
        assert!(table.matches("POST", "/users/7").is_none());
        assert!(table.matches("GET", "/orders").is_none());
    }

    #[test]
    fn any_matches_every_method() {
        let mut table = RouteTable::new();
        table.register("any", "/async", json!({"foo": "bar"}), BTreeMap::new());
        assert!(table.matches("DELETE", "/async").is_some());
        assert!(table.matches("GET", "/async/1").is_some());
    }

    #[test]
    fn first_registered_route_wins() {
        let mut table = RouteTable::new();
        table.register("GET", "/api", json!({"first": true}), BTreeMap::new());
        table.register("GET", "/api/users", json!({"second": true}), BTreeMap::new());

        let route = table.matches("GET", "/api/users").expect("match");
        assert_eq!(route.schema.sample, json!({"first": true}));
    }

    #[test]
    fn builds_from_config() {
        let routes = vec![RouteConfig {
            method: "POST".to_string(),
            path_prefix: "/v1/charge".to_string(),
            schema: json!({"status": ""}),
            hints: BTreeMap::from([("status".to_string(), "APPROVED".to_string())]),
        }];
        let table = RouteTable::from_config(&routes);
        assert_eq!(table.len(), 1);
        let route = table.matches("POST", "/v1/charge").expect("match");
        assert_eq!(route.schema.hints["status"], "APPROVED");
    }
}
