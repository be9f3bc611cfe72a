use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Access flags attached to a route definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RouteRequirement {
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteRequirement {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_admin: false,
    };

    pub const AUTH: Self = Self {
        requires_auth: true,
        requires_admin: false,
    };

    pub const ADMIN: Self = Self {
        requires_auth: true,
        requires_admin: true,
    };
}

/// A route definition. Child paths are relative to their parent unless
/// they start with `/`.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub name: Option<String>,
    pub requirement: RouteRequirement,
    pub redirect: Option<String>,
    pub children: Vec<Route>,
}

impl Route {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: None,
            requirement: RouteRequirement::PUBLIC,
            redirect: None,
            children: Vec::new(),
        }
    }

    /// A route that only forwards to another path
    pub fn redirect(path: &str, to: &str) -> Self {
        Self {
            redirect: Some(to.to_string()),
            ..Self::new(path)
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn requires(mut self, requirement: RouteRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn children(mut self, children: Vec<Route>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// A route flattened to its absolute path, carrying the requirements of
/// every ancestor.
#[derive(Debug, Clone)]
struct CompiledRoute {
    path: String,
    segments: Vec<Segment>,
    name: Option<String>,
    redirect: Option<String>,
    requirements: Vec<RouteRequirement>,
}

impl CompiledRoute {
    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(s) if s == part => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

/// Result of resolving a path against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Route pattern that matched, e.g. `/product/:id`
    pub pattern: String,
    pub name: Option<String>,
    pub redirect: Option<String>,
    /// Requirements of the matched route and all of its ancestors,
    /// outermost first.
    pub requirements: Vec<RouteRequirement>,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        let mut compiled = Vec::new();
        for route in &routes {
            Self::compile(route, "", &[], &mut compiled);
        }
        Self { routes: compiled }
    }

    /// Route table of the storefront application
    pub fn storefront() -> Self {
        Self::new(vec![
            Route::new("/login").named("login"),
            Route::new("/register").named("register"),
            Route::new("/profile").named("profile").requires(RouteRequirement::AUTH),
            Route::new("/home").named("home"),
            Route::new("/cart").named("cart"),
            Route::new("/category/:id").named("category"),
            Route::new("/product/:id").named("product"),
            Route::new("/favorites").named("favorites").requires(RouteRequirement::AUTH),
            Route::new("/search").named("search"),
            Route::new("/catalog").named("catalog"),
            Route::new("/checkout").named("checkout").requires(RouteRequirement::AUTH),
            Route::new("/order-success/:orderId")
                .named("order-success")
                .requires(RouteRequirement::AUTH),
            Route::new("/admin")
                .named("admin")
                .requires(RouteRequirement::ADMIN)
                .children(vec![
                    Route::new("products").named("admin-products"),
                    Route::new("products/create").named("admin-create-product"),
                    Route::new("products/:id/edit").named("admin-edit-product"),
                    Route::new("orders").named("admin-orders"),
                ]),
            Route::redirect("/", "/home"),
        ])
    }

    fn compile(
        route: &Route,
        parent_path: &str,
        parent_requirements: &[RouteRequirement],
        out: &mut Vec<CompiledRoute>,
    ) {
        let path = if route.path.starts_with('/') {
            normalize_path(&route.path)
        } else {
            normalize_path(&format!("{}/{}", parent_path, route.path))
        };

        let mut requirements = parent_requirements.to_vec();
        requirements.push(route.requirement);

        let segments = split_segments(&path)
            .into_iter()
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();

        out.push(CompiledRoute {
            path: path.clone(),
            segments,
            name: route.name.clone(),
            redirect: route.redirect.clone(),
            requirements: requirements.clone(),
        });

        for child in &route.children {
            Self::compile(child, &path, &requirements, out);
        }
    }

    /// Find the first route matching `path`. Query strings and trailing
    /// slashes are ignored.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or_default();
        let parts = split_segments(path);

        self.routes.iter().find_map(|route| {
            let params = route.matches(&parts)?;
            Some(RouteMatch {
                pattern: route.path.clone(),
                name: route.name.clone(),
                redirect: route.redirect.clone(),
                requirements: route.requirements.clone(),
                params,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Collapse repeated and trailing slashes; always rooted.
pub fn normalize_path(path: &str) -> String {
    let segments = split_segments(path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("home"), "/home");
        assert_eq!(normalize_path("/admin//orders/"), "/admin/orders");
    }

    #[test]
    fn test_table_flattens_children() {
        assert!(RouteTable::default().is_empty());

        // 12 top-level pages, /admin with 4 children, and the root redirect
        let table = RouteTable::storefront();
        assert!(!table.is_empty());
        assert_eq!(table.len(), 18);
    }

    #[test]
    fn test_resolve_static_route() {
        let table = RouteTable::storefront();
        let m = table.resolve("/cart").unwrap();
        assert_eq!(m.name.as_deref(), Some("cart"));
        assert_eq!(m.requirements, vec![RouteRequirement::PUBLIC]);
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_resolve_params() {
        let table = RouteTable::storefront();
        let m = table.resolve("/order-success/42").unwrap();
        assert_eq!(m.pattern, "/order-success/:orderId");
        assert_eq!(m.params.get("orderId").map(String::as_str), Some("42"));

        let m = table.resolve("/admin/products/7/edit").unwrap();
        assert_eq!(m.name.as_deref(), Some("admin-edit-product"));
        assert_eq!(m.params.get("id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_resolve_ignores_query_and_trailing_slash() {
        let table = RouteTable::storefront();
        assert_eq!(
            table.resolve("/search?q=phone").unwrap().name.as_deref(),
            Some("search")
        );
        assert_eq!(table.resolve("/catalog/").unwrap().name.as_deref(), Some("catalog"));
    }

    #[test]
    fn test_children_inherit_ancestor_requirements() {
        let table = RouteTable::storefront();
        let m = table.resolve("/admin/orders").unwrap();
        assert_eq!(
            m.requirements,
            vec![RouteRequirement::ADMIN, RouteRequirement::PUBLIC]
        );
        assert!(m.requirements.iter().any(|r| r.requires_admin));
    }

    #[test]
    fn test_absolute_child_path() {
        let table = RouteTable::new(vec![Route::new("/account")
            .requires(RouteRequirement::AUTH)
            .children(vec![Route::new("/settings").named("settings")])]);

        let m = table.resolve("/settings").unwrap();
        assert_eq!(m.requirements.len(), 2);
        assert!(table.resolve("/account/settings").is_none());
    }

    #[test]
    fn test_root_redirect() {
        let table = RouteTable::storefront();
        let m = table.resolve("/").unwrap();
        assert_eq!(m.redirect.as_deref(), Some("/home"));
    }

    #[test]
    fn test_unknown_path() {
        let table = RouteTable::storefront();
        assert!(table.resolve("/nowhere").is_none());
        assert!(table.resolve("/product").is_none());
        assert!(table.resolve("/product/1/reviews").is_none());
    }

    #[test]
    fn test_first_definition_wins() {
        let table = RouteTable::new(vec![
            Route::new("/product/new").named("new-product"),
            Route::new("/product/:id").named("product"),
        ]);
        assert_eq!(table.resolve("/product/new").unwrap().name.as_deref(), Some("new-product"));
        assert_eq!(table.resolve("/product/5").unwrap().name.as_deref(), Some("product"));
    }
}
