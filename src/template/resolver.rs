//! Template lookup across override, shared and built-in sources.
//!
//! Each source maps a normalized key to optional text. The resolver asks
//! them in order and the first hit wins:
//! 1. local override directory (`<key>.md`, then `follow_up.md`)
//! 2. shared template root (same two files)
//! 3. built-in text, for `follow_up` only

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::config::TemplateConfig;
use crate::error::TemplateError;

/// Key used when a row names no template, and the fallback file name.
pub const DEFAULT_TEMPLATE_KEY: &str = "follow_up";

/// Template file extension.
const TEMPLATE_EXT: &str = "md";

/// Subdirectory of a shared root holding email templates.
const SHARED_TEMPLATE_SUBDIR: &str = "templates/email";

pub const BUILTIN_FOLLOW_UP_TEMPLATE: &str = "Hi {{first_name}},\n\
\n\
Quick follow-up on your recent request.\n\
\n\
If you are still interested, reply here and we can get everything lined up for next steps.\n\
\n\
Best,\n\
{{last_name}}";

/// Trim, lowercase, collapse whitespace runs to `_`; empty becomes `follow_up`.
pub fn normalize_template_key(raw: &str) -> String {
    let key = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if key.is_empty() {
        DEFAULT_TEMPLATE_KEY.to_string()
    } else {
        key
    }
}

/// A single lookup strategy.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Short label for logging.
    fn name(&self) -> &str;

    /// Template text for a normalized key, if this source has one.
    async fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError>;
}

/// Templates stored as `<dir>/<key>.md`, falling back to `<dir>/follow_up.md`.
pub struct DirectorySource {
    name: String,
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl TemplateSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError> {
        lookup_in_dir(&self.dir, key).await
    }
}

/// Shared templates under the first existing candidate root.
pub struct SharedRootSource {
    roots: Vec<PathBuf>,
}

impl SharedRootSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// First candidate root that exists on disk.
    async fn resolve_root(&self) -> Option<&Path> {
        for root in &self.roots {
            if tokio::fs::try_exists(root).await.unwrap_or(false) {
                return Some(root.as_path());
            }
        }
        None
    }
}

#[async_trait]
impl TemplateSource for SharedRootSource {
    fn name(&self) -> &str {
        "shared"
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError> {
        match self.resolve_root().await {
            Some(root) => lookup_in_dir(&root.join(SHARED_TEMPLATE_SUBDIR), key).await,
            None => Ok(None),
        }
    }
}

/// The compiled-in `follow_up` template.
pub struct BuiltinSource;

#[async_trait]
impl TemplateSource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError> {
        Ok((key == DEFAULT_TEMPLATE_KEY).then(|| BUILTIN_FOLLOW_UP_TEMPLATE.to_string()))
    }
}

/// Ordered list of template sources.
pub struct TemplateResolver {
    sources: Vec<Box<dyn TemplateSource>>,
}

impl TemplateResolver {
    pub fn new(sources: Vec<Box<dyn TemplateSource>>) -> Self {
        Self { sources }
    }

    /// Standard layering: local override, shared root, built-in.
    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(vec![
            Box::new(DirectorySource::new("local", config.local_dir.clone())),
            Box::new(SharedRootSource::new(config.shared_roots.clone())),
            Box::new(BuiltinSource),
        ])
    }

    /// Resolve a raw template key to template text.
    pub async fn resolve(&self, raw_key: &str) -> Result<String, TemplateError> {
        let key = normalize_template_key(raw_key);
        for source in &self.sources {
            if let Some(text) = source.lookup(&key).await? {
                debug!(template = %key, source = source.name(), "Template resolved");
                return Ok(text);
            }
        }
        Err(TemplateError::NotFound(key))
    }
}

async fn lookup_in_dir(dir: &Path, key: &str) -> Result<Option<String>, TemplateError> {
    // Keys come from sheet cells; never let one escape the directory.
    if key.contains(['/', '\\']) || key.contains("..") {
        return Ok(None);
    }

    if let Some(text) = read_if_exists(&dir.join(format!("{key}.{TEMPLATE_EXT}"))).await? {
        return Ok(Some(text));
    }
    if key == DEFAULT_TEMPLATE_KEY {
        return Ok(None);
    }
    read_if_exists(&dir.join(format!("{DEFAULT_TEMPLATE_KEY}.{TEMPLATE_EXT}"))).await
}

/// Read a template file; missing or empty files count as absent.
async fn read_if_exists(path: &Path) -> Result<Option<String>, TemplateError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
        Err(e) => Err(TemplateError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn resolver(local: &Path, shared_roots: Vec<PathBuf>) -> TemplateResolver {
        TemplateResolver::from_config(&TemplateConfig {
            local_dir: local.to_path_buf(),
            shared_roots,
        })
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_template_key("  Second Touch "), "second_touch");
        assert_eq!(normalize_template_key("A\t B"), "a_b");
        assert_eq!(normalize_template_key(""), "follow_up");
        assert_eq!(normalize_template_key("   "), "follow_up");
    }

    #[tokio::test]
    async fn builtin_used_when_nothing_on_disk() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp.path().join("missing"), vec![]);
        assert_eq!(r.resolve("").await.unwrap(), BUILTIN_FOLLOW_UP_TEMPLATE);
        assert_eq!(r.resolve("Follow Up").await.unwrap(), BUILTIN_FOLLOW_UP_TEMPLATE);
    }

    #[tokio::test]
    async fn unknown_key_without_overrides_fails() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp.path().join("missing"), vec![tmp.path().join("nope")]);
        let err = r.resolve("unknown_key").await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(ref k) if k == "unknown_key"));
    }

    #[tokio::test]
    async fn local_named_template_wins() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        write(&local, "second_touch.md", "local second");
        write(&local, "follow_up.md", "local default");
        let r = resolver(&local, vec![]);
        assert_eq!(r.resolve("Second Touch").await.unwrap(), "local second");
    }

    #[tokio::test]
    async fn local_follow_up_is_fallback_for_any_key() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        write(&local, "follow_up.md", "local default");
        let r = resolver(&local, vec![]);
        assert_eq!(r.resolve("unknown_key").await.unwrap(), "local default");
    }

    #[tokio::test]
    async fn default_shared_roots_find_prophet_core() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp.path().join("prophet-core/templates/email"),
            "welcome.md",
            "core welcome",
        );
        let defaults = TemplateConfig::default();
        let r = resolver(
            &tmp.path().join("templates/email"),
            defaults.shared_roots.iter().map(|root| tmp.path().join(root)).collect(),
        );
        assert_eq!(r.resolve("welcome").await.unwrap(), "core welcome");
    }

    #[tokio::test]
    async fn shared_root_consulted_after_local() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("prophet-core");
        write(&shared.join("templates/email"), "welcome.md", "shared welcome");
        let r = resolver(
            &tmp.path().join("local"),
            vec![tmp.path().join("absent"), shared],
        );
        assert_eq!(r.resolve("welcome").await.unwrap(), "shared welcome");
    }

    #[tokio::test]
    async fn only_first_existing_shared_root_is_used() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        std::fs::create_dir_all(&first).unwrap();
        write(&second.join("templates/email"), "welcome.md", "second welcome");
        let r = resolver(&tmp.path().join("local"), vec![first, second]);
        assert!(r.resolve("welcome").await.is_err());
    }

    #[tokio::test]
    async fn local_overrides_shared_and_builtin() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        let shared = tmp.path().join("prophet-core");
        write(&local, "follow_up.md", "local default");
        write(&shared.join("templates/email"), "follow_up.md", "shared default");
        let r = resolver(&local, vec![shared]);
        assert_eq!(r.resolve("follow_up").await.unwrap(), "local default");
    }

    #[tokio::test]
    async fn empty_file_counts_as_absent() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        write(&local, "follow_up.md", "");
        let r = resolver(&local, vec![]);
        assert_eq!(r.resolve("follow_up").await.unwrap(), BUILTIN_FOLLOW_UP_TEMPLATE);
    }

    #[tokio::test]
    async fn path_like_keys_never_leave_directory() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        write(tmp.path(), "secret.md", "secret");
        std::fs::create_dir_all(&local).unwrap();
        let r = resolver(&local, vec![]);
        assert!(r.resolve("../secret").await.is_err());
    }

    #[tokio::test]
    async fn resolving_twice_is_stable() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local");
        write(&local, "welcome.md", "Hello {{first_name}}");
        let r = resolver(&local, vec![]);
        let first = r.resolve("welcome").await.unwrap();
        let second = r.resolve("welcome").await.unwrap();
        assert_eq!(first, second);
    }
}
