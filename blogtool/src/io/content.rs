//! Content Lister: enumerate, describe and delete content files.
//!
//! Microposts are flat files under `content/microposts/`. Posts and
//! conversations are page bundles under
//! `content/<language dir>/<posts|conversations>/<slug>/index.md`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::derive::{self, PREVIEW_CHARS};
use crate::core::frontmatter;
use crate::core::types::{ContentDescriptor, ContentKind, newest_first};
use crate::error::{BlogError, Result};
use crate::io::tools::is_hugo_site;

const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown"];
const BUNDLE_INDEX_FILES: &[&str] = &["index.md", "index.markdown"];

/// A file that was skipped while listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one listing call, ordered newest first.
///
/// The listing is a snapshot: it can be iterated any number of times and is not
/// affected by later changes on disk.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    entries: Vec<ContentDescriptor>,
    warnings: Vec<ListingWarning>,
}

impl Listing {
    pub fn iter(&self) -> std::slice::Iter<'_, ContentDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> &[ListingWarning] {
        &self.warnings
    }

    fn sorted(mut self) -> Self {
        self.entries.sort_by(newest_first);
        self
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a ContentDescriptor;
    type IntoIter = std::slice::Iter<'a, ContentDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// `removed` is the file, or the bundle directory for a page bundle.
    Deleted { removed: PathBuf },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ContentLister {
    site_root: PathBuf,
    content_dir: PathBuf,
    languages: BTreeMap<String, String>,
    default_language: String,
}

impl ContentLister {
    /// Open the content tree of the Hugo site at `site_root`.
    ///
    /// `languages` maps a language code to its content directory name.
    pub fn open(
        site_root: &Path,
        languages: &BTreeMap<String, String>,
        default_language: &str,
    ) -> Result<Self> {
        if !is_hugo_site(site_root) {
            return Err(BlogError::NotAContentTree {
                path: site_root.to_path_buf(),
            });
        }
        Ok(Self {
            site_root: site_root.to_path_buf(),
            content_dir: site_root.join("content"),
            languages: languages.clone(),
            default_language: default_language.to_string(),
        })
    }

    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    #[instrument(skip_all, fields(kind = %kind))]
    pub fn list(&self, kind: ContentKind) -> Listing {
        let mut listing = Listing::default();
        self.collect(kind, &mut listing);
        self.finish(listing)
    }

    /// Every kind in every language, merged into one ordering.
    #[instrument(skip_all)]
    pub fn list_all(&self) -> Listing {
        let mut listing = Listing::default();
        for kind in ContentKind::ALL {
            self.collect(kind, &mut listing);
        }
        self.finish(listing)
    }

    fn finish(&self, listing: Listing) -> Listing {
        let listing = listing.sorted();
        debug!(
            entries = listing.len(),
            warnings = listing.warnings.len(),
            "listed content"
        );
        listing
    }

    fn collect(&self, kind: ContentKind, listing: &mut Listing) {
        if kind.is_bundle() {
            for (code, dir) in &self.languages {
                let section = self.content_dir.join(dir).join(kind.section_dir());
                self.collect_bundles(&section, kind, code, listing);
            }
        } else {
            let section = self.content_dir.join(kind.section_dir());
            self.collect_flat(&section, kind, listing);
        }
    }

    fn collect_flat(&self, section: &Path, kind: ContentKind, listing: &mut Listing) {
        let Some(entries) = read_dir_or_warn(section, listing) else {
            return;
        };
        for path in entries {
            if !path.is_file() || !is_content_file(&path) {
                continue;
            }
            let name = file_name(&path);
            let fallback_slug = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match describe(&path, kind, &self.default_language, &name, &fallback_slug) {
                Ok(descriptor) => listing.entries.push(descriptor),
                Err(reason) => push_warning(listing, path, reason),
            }
        }
    }

    fn collect_bundles(
        &self,
        section: &Path,
        kind: ContentKind,
        language: &str,
        listing: &mut Listing,
    ) {
        let Some(entries) = read_dir_or_warn(section, listing) else {
            return;
        };
        for bundle in entries {
            if !bundle.is_dir() {
                continue;
            }
            let Some(index) = bundle_index(&bundle) else {
                debug!(dir = %bundle.display(), "directory without index file, skipping");
                continue;
            };
            let slug = file_name(&bundle);
            match describe(&index, kind, language, &slug, &slug) {
                Ok(descriptor) => listing.entries.push(descriptor),
                Err(reason) => push_warning(listing, index, reason),
            }
        }
    }

    /// Delete a content file after `confirm` agrees.
    ///
    /// A bundle's index file (or the bundle directory itself) removes the whole
    /// bundle. Paths outside `content/` are refused before `confirm` is asked.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn delete(
        &self,
        path: &Path,
        confirm: impl FnOnce(&Path) -> bool,
    ) -> Result<DeleteOutcome> {
        let target = self.deletion_target(path)?;
        if !confirm(&target) {
            debug!("deletion cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        let removed = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.map_err(|e| BlogError::io(format!("delete {}", target.display()), e))?;
        info!(removed = %target.display(), "deleted content");
        Ok(DeleteOutcome::Deleted { removed: target })
    }

    fn deletion_target(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.site_root.join(path)
        };
        let target = joined
            .canonicalize()
            .map_err(|e| BlogError::io(format!("resolve {}", joined.display()), e))?;
        let content_dir = self
            .content_dir
            .canonicalize()
            .map_err(|e| BlogError::io(format!("resolve {}", self.content_dir.display()), e))?;
        if !target.starts_with(&content_dir) || target == content_dir {
            return Err(BlogError::InvalidInput(format!(
                "{} is outside the content directory",
                path.display()
            )));
        }

        if target.is_dir() {
            if bundle_index(&target).is_some() {
                return Ok(target);
            }
            return Err(BlogError::InvalidInput(format!(
                "{} is a directory, not a content file or page bundle",
                path.display()
            )));
        }
        if !is_content_file(&target) {
            return Err(BlogError::InvalidInput(format!(
                "{} is not a content file",
                path.display()
            )));
        }
        let name = file_name(&target);
        if BUNDLE_INDEX_FILES.contains(&name.as_str())
            && let Some(parent) = target.parent()
            && parent != content_dir
        {
            return Ok(parent.to_path_buf());
        }
        Ok(target)
    }
}

/// Build a descriptor for one file. `name` drives title and date fallbacks.
fn describe(
    path: &Path,
    kind: ContentKind,
    language: &str,
    name: &str,
    fallback_slug: &str,
) -> std::result::Result<ContentDescriptor, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
    let (fm, body) = frontmatter::parse(&contents)?;
    let date = match fm.date.as_deref() {
        Some(raw) => {
            derive::parse_date(raw).ok_or_else(|| format!("unrecognized date '{raw}'"))?
        }
        None => derive::date_from_name(name)
            .ok_or_else(|| "no date in front matter or filename".to_string())?,
    };
    let slug = match kind {
        ContentKind::Micropost => fm
            .slug
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| fallback_slug.to_string()),
        ContentKind::Post | ContentKind::Conversation => fallback_slug.to_string(),
    };
    Ok(ContentDescriptor {
        path: path.to_path_buf(),
        kind,
        language: language.to_string(),
        slug,
        title: derive::derive_title(fm.title.as_deref(), body, name),
        date,
        draft: fm.draft,
        preview: derive::derive_preview(body, PREVIEW_CHARS),
        description: fm.description.unwrap_or_default(),
        tags: fm.tags,
        keywords: fm.keywords,
    })
}

fn read_dir_or_warn(dir: &Path, listing: &mut Listing) -> Option<Vec<PathBuf>> {
    match fs::read_dir(dir) {
        Ok(entries) => Some(entries.filter_map(|e| e.ok()).map(|e| e.path()).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            push_warning(listing, dir.to_path_buf(), format!("read directory failed: {e}"));
            None
        }
    }
}

fn push_warning(listing: &mut Listing, path: PathBuf, reason: String) {
    warn!(path = %path.display(), %reason, "skipping content file");
    listing.warnings.push(ListingWarning { path, reason });
}

fn is_content_file(path: &Path) -> bool {
    let is_section_index = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("_index."));
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext));
    has_extension && !is_section_index
}

fn bundle_index(dir: &Path) -> Option<PathBuf> {
    BUNDLE_INDEX_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
