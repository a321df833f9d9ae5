use std::path::PathBuf;

/// Store directory used when none is configured.
pub const DEFAULT_STORE_DIR: &str = ".dsio";

/// Settings shared by every command, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Namespace to read and write; a record file may name its own
    pub namespace: Option<String>,
    /// Project that `KEY(PROJECT(...))` literals must match
    pub project_id: Option<String>,
    /// Directory of the local store
    pub store_dir: PathBuf,
    /// Resolve records but write nothing
    pub dry_run: bool,
    pub verbose: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            namespace: None,
            project_id: None,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            dry_run: false,
            verbose: false,
        }
    }
}

impl Context {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|p| !p.is_empty())
    }
}
