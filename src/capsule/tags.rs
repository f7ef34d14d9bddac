//! Tag classification and synonym-aware matching.
//!
//! Free-text tags get a semantic prefix (`file:`, `table:`, `service:`,
//! `concept:`, `api:`) on write. The lookup tables live in a
//! [`TagClassifier`] value so callers can substitute their own.

/// Recognized tag prefixes, without the trailing colon.
pub const TAG_PREFIXES: [&str; 5] = ["file", "table", "service", "concept", "api"];

const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const API_MARKERS: [&str; 3] = ["/api/", "/v1/", "/v2/"];

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "ts", "tsx", "js", "jsx", "java", "kt", "rb", "c", "h", "cpp", "hpp", "cs",
    "swift", "sql", "md", "toml", "yaml", "yml", "json", "sh", "proto", "html", "css", "vue",
];

const TABLE_SUFFIXES: &[&str] = &[
    "_users", "_events", "_logs", "_sessions", "_accounts", "_orders", "_items", "_records",
    "_table", "_history",
];

const SERVICE_SUFFIXES: &[&str] = &[
    "Service",
    "Controller",
    "Handler",
    "Manager",
    "Provider",
    "Repository",
    "Client",
    "Worker",
    "Middleware",
];

const SYNONYM_GROUPS: &[&[&str]] = &[
    &["auth", "authentication", "login", "oauth", "jwt", "token"],
    &["db", "database", "sql", "postgres", "postgresql", "mysql", "sqlite"],
    &["cache", "caching", "redis", "memcached"],
    &["test", "testing", "tests", "spec", "unittest"],
    &["config", "configuration", "settings", "env"],
    &["api", "endpoint", "rest", "http", "route"],
    &["deploy", "deployment", "release", "ci", "cd"],
    &["error", "errors", "exception", "failure"],
    &["log", "logging", "logs", "tracing"],
    &["perf", "performance", "latency", "speed"],
];

/// Split a tag into its prefix (if recognized) and value.
pub fn parse_tag(tag: &str) -> (Option<&str>, &str) {
    if let Some((prefix, value)) = tag.split_once(':') {
        if let Some(known) = TAG_PREFIXES.iter().find(|p| p.eq_ignore_ascii_case(prefix)) {
            return (Some(*known), value);
        }
    }
    (None, tag)
}

/// `true` if the tag already starts with a recognized prefix.
pub fn has_prefix(tag: &str) -> bool {
    parse_tag(tag).0.is_some()
}

/// Tag prefix inference and matching tables.
#[derive(Debug, Clone)]
pub struct TagClassifier {
    source_extensions: Vec<String>,
    table_suffixes: Vec<String>,
    service_suffixes: Vec<String>,
    synonym_groups: Vec<Vec<String>>,
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self {
            source_extensions: to_owned(SOURCE_EXTENSIONS),
            table_suffixes: to_owned(TABLE_SUFFIXES),
            service_suffixes: to_owned(SERVICE_SUFFIXES),
            synonym_groups: SYNONYM_GROUPS.iter().map(|g| to_owned(g)).collect(),
        }
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl TagClassifier {
    /// Replace the synonym table. Groups are matched case-insensitively.
    pub fn with_synonyms(mut self, groups: Vec<Vec<String>>) -> Self {
        self.synonym_groups = groups
            .into_iter()
            .map(|g| g.into_iter().map(|s| s.to_lowercase()).collect())
            .collect();
        self
    }

    /// Infer the prefixed form of a tag.
    ///
    /// Rules apply in order; API detection runs before file detection because
    /// API paths contain `/`.
    pub fn infer_prefix(&self, tag: &str) -> String {
        if has_prefix(tag) {
            return tag.to_string();
        }
        let prefix = if self.looks_like_api(tag) {
            "api"
        } else if self.looks_like_file(tag) {
            "file"
        } else if self.looks_like_table(tag) {
            "table"
        } else if self.looks_like_service(tag) {
            "service"
        } else {
            "concept"
        };
        format!("{prefix}:{tag}")
    }

    fn looks_like_api(&self, tag: &str) -> bool {
        let upper = tag.to_ascii_uppercase();
        let method_prefixed = HTTP_METHODS
            .iter()
            .any(|m| upper.starts_with(m) && upper[m.len()..].starts_with(' '));
        method_prefixed || API_MARKERS.iter().any(|m| tag.contains(m))
    }

    fn looks_like_file(&self, tag: &str) -> bool {
        if tag.contains('/') {
            return true;
        }
        match tag.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .source_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }

    fn looks_like_table(&self, tag: &str) -> bool {
        let snake = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if snake && self.table_suffixes.iter().any(|s| tag.ends_with(s.as_str())) {
            return true;
        }
        tag.contains('_') && !tag.contains('.')
    }

    fn looks_like_service(&self, tag: &str) -> bool {
        let pascal = tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && tag.chars().all(|c| c.is_ascii_alphanumeric());
        pascal
            && self
                .service_suffixes
                .iter()
                .any(|s| tag.len() > s.len() && tag.ends_with(s.as_str()))
    }

    /// Strip incidental backtick wrapping and add a prefix if none is present.
    pub fn normalize_tag(&self, tag: &str) -> String {
        let trimmed = tag.trim().trim_matches('`').trim();
        if trimmed.is_empty() {
            return String::new();
        }
        self.infer_prefix(trimmed)
    }

    /// Normalize every tag, dropping empties and duplicates (first wins).
    pub fn normalize_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let normalized = self.normalize_tag(tag.as_ref());
            if !normalized.is_empty() && !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        out
    }

    /// Match a tag query against a tag set.
    ///
    /// A prefixed query needs the same prefix and a substring match on the
    /// value; an unprefixed query matches the value of any tag.
    pub fn matches_tag_query<S: AsRef<str>>(&self, tags: &[S], query: &str) -> bool {
        let (query_prefix, query_value) = parse_tag(query.trim());
        let needle = query_value.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        tags.iter().any(|tag| {
            let (prefix, value) = parse_tag(tag.as_ref());
            if query_prefix.is_some() && prefix != query_prefix {
                return false;
            }
            value.to_lowercase().contains(&needle)
        })
    }

    /// Like [`matches_tag_query`](Self::matches_tag_query), retrying with each
    /// synonym of the query value when the direct match fails.
    pub fn matches_tag_query_with_synonyms<S: AsRef<str>>(&self, tags: &[S], query: &str) -> bool {
        if self.matches_tag_query(tags, query) {
            return true;
        }
        let (prefix, value) = parse_tag(query.trim());
        self.synonyms_of(value).into_iter().any(|syn| {
            let expanded = match prefix {
                Some(p) => format!("{p}:{syn}"),
                None => syn,
            };
            self.matches_tag_query(tags, &expanded)
        })
    }

    /// Every other member of the synonym groups containing `term`.
    pub fn synonyms_of(&self, term: &str) -> Vec<String> {
        let term = term.trim().to_lowercase();
        let mut out = Vec::new();
        for group in &self.synonym_groups {
            if group.iter().any(|g| g.eq_ignore_ascii_case(&term)) {
                for syn in group {
                    if !syn.eq_ignore_ascii_case(&term) && !out.contains(syn) {
                        out.push(syn.clone());
                    }
                }
            }
        }
        out
    }
}

/// `true` if a `file:` tag value and a requested path refer to the same file
/// or one lies inside the other as a directory.
pub fn path_matches(tag_path: &str, query_path: &str) -> bool {
    let tag_path = clean_path(tag_path);
    let query_path = clean_path(query_path);
    if tag_path.is_empty() || query_path.is_empty() {
        return false;
    }
    tag_path == query_path
        || is_within(query_path, tag_path)
        || is_within(tag_path, query_path)
        || tag_path.ends_with(&format!("/{query_path}"))
        || query_path.ends_with(&format!("/{tag_path}"))
}

/// `true` if any `file:` tag matches `path` under [`path_matches`].
pub fn touches_file<S: AsRef<str>>(tags: &[S], path: &str) -> bool {
    tags.iter().any(|tag| match parse_tag(tag.as_ref()) {
        (Some("file"), value) => path_matches(value, path),
        _ => false,
    })
}

fn clean_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_end_matches('/')
}

fn is_within(child: &str, dir: &str) -> bool {
    child.len() > dir.len() && child.starts_with(dir) && child.as_bytes()[dir.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TagClassifier {
        TagClassifier::default()
    }

    #[test]
    fn infer_keeps_existing_prefix() {
        assert_eq!(classifier().infer_prefix("concept:src/main.rs"), "concept:src/main.rs");
        assert_eq!(classifier().infer_prefix("file:x"), "file:x");
    }

    #[test]
    fn infer_api_before_file() {
        let c = classifier();
        assert_eq!(c.infer_prefix("GET /users"), "api:GET /users");
        assert_eq!(c.infer_prefix("post /login"), "api:post /login");
        assert_eq!(c.infer_prefix("/api/users"), "api:/api/users");
        assert_eq!(c.infer_prefix("svc/v1/orders"), "api:svc/v1/orders");
    }

    #[test]
    fn infer_file() {
        let c = classifier();
        assert_eq!(c.infer_prefix("src/store/mod.rs"), "file:src/store/mod.rs");
        assert_eq!(c.infer_prefix("main.go"), "file:main.go");
        assert_eq!(c.infer_prefix("docs"), "concept:docs");
    }

    #[test]
    fn infer_table() {
        let c = classifier();
        assert_eq!(c.infer_prefix("auth_users"), "table:auth_users");
        assert_eq!(c.infer_prefix("order_lines"), "table:order_lines");
        assert_eq!(c.infer_prefix("v1.2_beta"), "concept:v1.2_beta");
        assert_eq!(c.infer_prefix("legacy orders_tmp"), "table:legacy orders_tmp");
    }

    #[test]
    fn infer_service() {
        let c = classifier();
        assert_eq!(c.infer_prefix("PaymentService"), "service:PaymentService");
        assert_eq!(c.infer_prefix("AuthHandler"), "service:AuthHandler");
        assert_eq!(c.infer_prefix("Service"), "concept:Service");
        assert_eq!(c.infer_prefix("Payments"), "concept:Payments");
    }

    #[test]
    fn normalize_strips_backticks_without_double_prefix() {
        let c = classifier();
        assert_eq!(c.normalize_tag("`src/lib.rs`"), "file:src/lib.rs");
        assert_eq!(c.normalize_tag("file:src/lib.rs"), "file:src/lib.rs");
        assert_eq!(c.normalize_tag("  caching "), "concept:caching");
        assert_eq!(c.normalize_tag("``"), "");
    }

    #[test]
    fn normalize_tags_dedups() {
        let c = classifier();
        let tags = c.normalize_tags(&["auth", "concept:auth", "", "src/a.rs"]);
        assert_eq!(tags, vec!["concept:auth", "file:src/a.rs"]);
    }

    #[test]
    fn parse_tag_splits_known_prefix_only() {
        assert_eq!(parse_tag("file:src/a.rs"), (Some("file"), "src/a.rs"));
        assert_eq!(parse_tag("http://x"), (None, "http://x"));
        assert_eq!(parse_tag("plain"), (None, "plain"));
    }

    #[test]
    fn prefixed_query_requires_same_prefix() {
        let c = classifier();
        let tags = vec!["file:src/auth.rs".to_string(), "concept:cache".to_string()];
        assert!(c.matches_tag_query(&tags, "file:auth"));
        assert!(!c.matches_tag_query(&tags, "concept:auth"));
        assert!(c.matches_tag_query(&tags, "auth"));
        assert!(c.matches_tag_query(&tags, "CACHE"));
        assert!(!c.matches_tag_query(&tags, "queue"));
    }

    #[test]
    fn synonym_expansion() {
        let c = classifier();
        let tags = vec!["concept:jwt".to_string()];
        assert!(!c.matches_tag_query(&tags, "authentication"));
        assert!(c.matches_tag_query_with_synonyms(&tags, "authentication"));
        assert!(c.matches_tag_query_with_synonyms(&tags, "concept:login"));
        assert!(!c.matches_tag_query_with_synonyms(&tags, "file:login"));
    }

    #[test]
    fn substituted_synonym_table() {
        let c = classifier().with_synonyms(vec![vec!["Queue".into(), "kafka".into()]]);
        let tags = vec!["concept:kafka".to_string()];
        assert!(c.matches_tag_query_with_synonyms(&tags, "queue"));
        let jwt = vec!["concept:jwt".to_string()];
        assert!(!c.matches_tag_query_with_synonyms(&jwt, "auth"));
    }

    #[test]
    fn path_matching_rules() {
        assert!(path_matches("src/auth/jwt.rs", "src/auth/jwt.rs"));
        assert!(path_matches("./src/auth/", "src/auth/jwt.rs"));
        assert!(path_matches("src/auth/jwt.rs", "src/auth"));
        assert!(path_matches("auth/jwt.rs", "src/auth/jwt.rs"));
        assert!(!path_matches("src/authz.rs", "src/auth"));
        assert!(!path_matches("src/auth.rs", "src/auth.rs.bak"));
        assert!(!path_matches("", "src"));
    }

    #[test]
    fn touches_file_only_checks_file_tags() {
        let tags = vec!["concept:src/auth".to_string(), "file:src/db/pool.rs".to_string()];
        assert!(touches_file(&tags, "src/db"));
        assert!(!touches_file(&tags, "src/auth"));
    }
}
