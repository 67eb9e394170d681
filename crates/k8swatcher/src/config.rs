//! Watch configuration.
//!
//! [`WatchConfig`] identifies one logical watch, [`WatcherSettings`] holds the
//! runtime tuning shared by every watch of a coordinator, and [`WatchFile`]
//! loads several watch configurations from YAML for fan-in.

use crate::error::WatcherError;
use resource_client::QueryParams;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_true() -> bool {
    true
}

/// One logical watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Unique among concurrently active watches
    pub id: String,
    /// Resource kind, e.g. `Ingress`
    pub kind: String,
    /// Optional `v1` or `group/version` to disambiguate the kind
    #[serde(default)]
    pub api_version: Option<String>,
    /// Namespace scope (namespaced kinds only); `None` watches all namespaces
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub field_selector: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
    /// Do not emit BOOKMARK events (the cursor still advances)
    #[serde(default = "default_true")]
    pub suppress_bookmarks: bool,
    /// Embed the full object in every tracked object
    #[serde(default)]
    pub include_k8s_objects: bool,
}

impl WatchConfig {
    /// Create a config watching every object of `kind` across all namespaces.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            api_version: None,
            namespace: None,
            field_selector: None,
            label_selector: None,
            suppress_bookmarks: true,
            include_k8s_objects: false,
        }
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_field_selector(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }

    #[must_use]
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    #[must_use]
    pub fn with_suppress_bookmarks(mut self, suppress: bool) -> Self {
        self.suppress_bookmarks = suppress;
        self
    }

    #[must_use]
    pub fn with_include_k8s_objects(mut self, include: bool) -> Self {
        self.include_k8s_objects = include;
        self
    }

    /// Selectors as passed to the resource client.
    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            field_selector: self.field_selector.clone(),
            label_selector: self.label_selector.clone(),
        }
    }

    /// Check identity fields and selector syntax.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.id.trim().is_empty() {
            return Err(WatcherError::InvalidConfig("watch id must not be empty".to_string()));
        }
        if self.kind.trim().is_empty() {
            return Err(WatcherError::InvalidConfig(format!(
                "watch {}: kind must not be empty",
                self.id
            )));
        }
        if self.namespace.as_deref().is_some_and(|ns| ns.trim().is_empty()) {
            return Err(WatcherError::InvalidConfig(format!(
                "watch {}: namespace must not be blank",
                self.id
            )));
        }
        if let Some(selector) = self.field_selector.as_deref() {
            validate_selector(selector, false).map_err(|reason| {
                WatcherError::InvalidConfig(format!(
                    "watch {}: field selector {selector:?}: {reason}",
                    self.id
                ))
            })?;
        }
        if let Some(selector) = self.label_selector.as_deref() {
            validate_selector(selector, true).map_err(|reason| {
                WatcherError::InvalidConfig(format!(
                    "watch {}: label selector {selector:?}: {reason}",
                    self.id
                ))
            })?;
        }
        Ok(())
    }
}

/// Split on commas that are not inside a `( ... )` value set.
fn split_terms(selector: &str) -> Result<Vec<&str>, &'static str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or("unbalanced parenthesis")?,
            ',' if depth == 0 => {
                terms.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced parenthesis");
    }
    terms.push(&selector[start..]);
    Ok(terms)
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn validate_term(term: &str, set_based: bool) -> Result<(), &'static str> {
    let term = term.trim();
    if term.is_empty() {
        return Err("empty term");
    }
    for op in ["!=", "==", "="] {
        if let Some((key, _value)) = term.split_once(op) {
            return if valid_key(key.trim()) { Ok(()) } else { Err("invalid key") };
        }
    }
    if !set_based {
        return Err("expected key=value, key==value or key!=value");
    }
    if let Some(key) = term.strip_prefix('!') {
        return if valid_key(key.trim()) { Ok(()) } else { Err("invalid key") };
    }
    for op in [" notin ", " in "] {
        if let Some((key, values)) = term.split_once(op) {
            let values = values.trim();
            if !(values.starts_with('(') && values.ends_with(')')) {
                return Err("set values must be parenthesised");
            }
            return if valid_key(key.trim()) { Ok(()) } else { Err("invalid key") };
        }
    }
    if valid_key(term) { Ok(()) } else { Err("invalid key") }
}

/// Syntactic check of a field (`set_based = false`) or label selector.
pub fn validate_selector(selector: &str, set_based: bool) -> Result<(), &'static str> {
    for term in split_terms(selector)? {
        validate_term(term, set_based)?;
    }
    Ok(())
}

/// Runtime tuning shared by all watches of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSettings {
    /// Server-side timeout of each watch long poll
    pub poll_timeout: Duration,
    /// Capacity of every event channel
    pub channel_capacity: usize,
    /// First retry delay after an API failure
    pub retry_min: Duration,
    /// Upper bound of the retry delay
    pub retry_max: Duration,
    /// How often an idle consumer re-checks its stop flag
    pub consumer_idle_tick: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            channel_capacity: 1024,
            retry_min: Duration::from_secs(1),
            retry_max: Duration::from_secs(30),
            consumer_idle_tick: Duration::from_secs(1),
        }
    }
}

fn env_u64(name: &str) -> Result<Option<u64>, WatcherError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<u64>().map(Some).map_err(|e| {
            WatcherError::InvalidConfig(format!("{name}={raw:?} is not a number: {e}"))
        }),
        Err(_) => Ok(None),
    }
}

impl WatcherSettings {
    /// Defaults overridden by `K8SWATCHER_*` environment variables.
    pub fn from_env() -> Result<Self, WatcherError> {
        let mut settings = Self::default();
        if let Some(secs) = env_u64("K8SWATCHER_POLL_TIMEOUT_SECS")? {
            settings.poll_timeout = Duration::from_secs(secs);
        }
        if let Some(cap) = env_u64("K8SWATCHER_CHANNEL_CAPACITY")? {
            settings.channel_capacity = usize::try_from(cap).map_err(|e| {
                WatcherError::InvalidConfig(format!("K8SWATCHER_CHANNEL_CAPACITY: {e}"))
            })?;
        }
        if let Some(ms) = env_u64("K8SWATCHER_RETRY_MIN_MS")? {
            settings.retry_min = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("K8SWATCHER_RETRY_MAX_MS")? {
            settings.retry_max = Duration::from_millis(ms);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.channel_capacity == 0 {
            return Err(WatcherError::InvalidConfig(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(WatcherError::InvalidConfig("poll timeout must be positive".to_string()));
        }
        if self.retry_min > self.retry_max {
            return Err(WatcherError::InvalidConfig(format!(
                "retry min {:?} exceeds retry max {:?}",
                self.retry_min, self.retry_max
            )));
        }
        Ok(())
    }
}

/// Several watch configurations loaded from YAML.
///
/// ```yaml
/// watches:
///   - id: ingresses
///     kind: Ingress
///     namespace: prod
///     suppressBookmarks: false
///   - id: nodes
///     kind: Node
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchFile {
    pub watches: Vec<WatchConfig>,
}

impl WatchFile {
    /// Parse and validate a watch file.
    pub fn from_yaml(yaml: &str) -> Result<Self, WatcherError> {
        let file: WatchFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WatcherError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<(), WatcherError> {
        if self.watches.is_empty() {
            return Err(WatcherError::InvalidConfig("watch file lists no watches".to_string()));
        }
        let mut seen = HashSet::new();
        for watch in &self.watches {
            watch.validate()?;
            if !seen.insert(watch.id.as_str()) {
                return Err(WatcherError::DuplicateWatchId(watch.id.clone()));
            }
        }
        Ok(())
    }
}
