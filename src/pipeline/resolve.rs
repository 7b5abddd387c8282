//! URI resolution: map a mesh reference to a file on disk.
//!
//! Resolution runs an ordered list of [`SchemeStrategy`] values. Each
//! strategy either claims the URI and produces a definitive candidate path,
//! or passes ("try next"). The last strategy, [`SchemeStrategy::Plain`],
//! claims everything, so the chain always yields a candidate. The candidate
//! is normalised lexically and then checked for existence.
//!
//! ## `package://` is approximate
//!
//! Real `package://` resolution needs a ROS package index. This resolver
//! does not consult one: it drops the package name and resolves the rest of
//! the URI relative to the document's directory. That is correct only for
//! documents that live at their package root; anything else will come back
//! as unresolved.

use crate::error::ReferenceError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Environment variables whose colon-separated entries are appended to the
/// default `model://` search roots, in this order.
pub const MODEL_PATH_ENV_VARS: [&str; 3] = [
    "GAZEBO_MODEL_PATH",
    "GZ_SIM_RESOURCE_PATH",
    "IGN_GAZEBO_RESOURCE_PATH",
];

/// The addressing scheme a reference was resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    File,
    Model,
    Package,
    Plain,
}

/// An absolute, normalised path to an existing mesh file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub scheme: Scheme,
}

/// One link of the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeStrategy {
    /// `file://<path>`
    File,
    /// `model://<model>/<rest>` against the model roots, then `<rest>`
    /// relative to the document.
    Model,
    /// `package://<package>/<rest>` → `<rest>` relative to the document.
    Package,
    /// Any URI: absolute as-is, relative to the document otherwise.
    Plain,
}

/// Default chain: specific schemes first, plain path last.
pub const DEFAULT_CHAIN: [SchemeStrategy; 4] = [
    SchemeStrategy::File,
    SchemeStrategy::Model,
    SchemeStrategy::Package,
    SchemeStrategy::Plain,
];

static RE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://(.*)$").unwrap());

/// Split `scheme://rest`; `None` when the URI carries no scheme.
fn split_scheme(uri: &str) -> Option<(&str, &str)> {
    let caps = RE_SCHEME.captures(uri)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

impl SchemeStrategy {
    pub fn scheme(self) -> Scheme {
        match self {
            SchemeStrategy::File => Scheme::File,
            SchemeStrategy::Model => Scheme::Model,
            SchemeStrategy::Package => Scheme::Package,
            SchemeStrategy::Plain => Scheme::Plain,
        }
    }

    /// Produce a candidate path, or `None` to pass to the next strategy.
    fn attempt(self, uri: &str, doc_dir: &Path, model_roots: &[PathBuf]) -> Option<PathBuf> {
        match self {
            SchemeStrategy::File => match split_scheme(uri)? {
                ("file", rest) => Some(join_to_document(doc_dir, rest)),
                _ => None,
            },
            SchemeStrategy::Model => match split_scheme(uri)? {
                ("model", rest) => {
                    let (model, inner) = rest.split_once('/').unwrap_or((rest, ""));
                    for root in model_roots {
                        let candidate = normalize_lexically(&root.join(model).join(inner));
                        if candidate.exists() {
                            debug!("model://{} found under {}", model, root.display());
                            return Some(candidate);
                        }
                    }
                    debug!("model://{} not under any root, trying document dir", model);
                    Some(doc_dir.join(inner))
                }
                _ => None,
            },
            SchemeStrategy::Package => match split_scheme(uri)? {
                ("package", rest) => {
                    let inner = rest.split_once('/').map(|(_, inner)| inner).unwrap_or("");
                    Some(doc_dir.join(inner))
                }
                _ => None,
            },
            SchemeStrategy::Plain => Some(join_to_document(doc_dir, uri)),
        }
    }
}

fn join_to_document(doc_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        doc_dir.join(p)
    }
}

/// Collapse `.` and `..` segments without touching the filesystem.
///
/// `..` at the root stays at the root; leading `..` of a relative path is
/// kept. An empty result becomes `.`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Maps mesh URIs to existing files.
#[derive(Debug, Clone)]
pub struct UriResolver {
    model_roots: Vec<PathBuf>,
    chain: Vec<SchemeStrategy>,
}

impl UriResolver {
    /// Resolver with the default strategy chain and the given model roots.
    pub fn new(model_roots: Vec<PathBuf>) -> Self {
        Self {
            model_roots,
            chain: DEFAULT_CHAIN.to_vec(),
        }
    }

    /// Replace the strategy chain. A chain that does not end in
    /// [`SchemeStrategy::Plain`] gets it appended.
    pub fn with_chain(mut self, mut chain: Vec<SchemeStrategy>) -> Self {
        if chain.last() != Some(&SchemeStrategy::Plain) {
            chain.push(SchemeStrategy::Plain);
        }
        self.chain = chain;
        self
    }

    pub fn model_roots(&self) -> &[PathBuf] {
        &self.model_roots
    }

    /// Compute the normalised candidate path without checking existence.
    pub fn candidate(&self, raw_uri: &str, document: &Path) -> (Scheme, PathBuf) {
        let document = std::path::absolute(document).unwrap_or_else(|_| document.to_path_buf());
        let doc_dir = document.parent().unwrap_or(Path::new("/"));

        for strategy in &self.chain {
            if let Some(path) = strategy.attempt(raw_uri, doc_dir, &self.model_roots) {
                return (strategy.scheme(), normalize_lexically(&path));
            }
        }
        // The chain always ends in Plain; keep a defined answer regardless.
        (
            Scheme::Plain,
            normalize_lexically(&join_to_document(doc_dir, raw_uri)),
        )
    }

    /// Resolve `raw_uri` found in `document` to an existing file.
    ///
    /// # Errors
    /// [`ReferenceError::Unresolved`] when the final candidate does not exist.
    pub fn resolve(&self, raw_uri: &str, document: &Path) -> Result<ResolvedPath, ReferenceError> {
        let (scheme, path) = self.candidate(raw_uri, document);
        if path.exists() {
            debug!("Resolved {} -> {} ({:?})", raw_uri, path.display(), scheme);
            Ok(ResolvedPath { path, scheme })
        } else {
            Err(ReferenceError::Unresolved {
                uri: raw_uri.to_string(),
                candidate: path.display().to_string(),
            })
        }
    }
}

impl Default for UriResolver {
    fn default() -> Self {
        Self::new(default_model_roots())
    }
}

/// The default `model://` search roots.
///
/// Order: `~/.gazebo/models`, `/usr/share/gazebo/models`, every
/// `/opt/ros/<distro>/share/gazebo/models` (sorted), then the entries of
/// [`MODEL_PATH_ENV_VARS`].
pub fn default_model_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".gazebo").join("models"));
    }
    roots.push(PathBuf::from("/usr/share/gazebo/models"));
    roots.extend(ros_model_roots(Path::new("/opt/ros")));
    for var in MODEL_PATH_ENV_VARS {
        if let Some(value) = std::env::var_os(var) {
            roots.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
    }
    roots
}

/// `<ros_base>/<distro>/share/gazebo/models` for every distro directory.
fn ros_model_roots(ros_base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(ros_base) else {
        return Vec::new();
    };
    let mut distros: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    distros.sort();
    distros
        .into_iter()
        .map(|d| d.join("share").join("gazebo").join("models"))
        .collect()
}
