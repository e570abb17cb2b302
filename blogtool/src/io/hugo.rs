//! Content creation through `hugo new content`.
//!
//! Hugo renders the archetype for the new file; we then fill in the body or the
//! front matter fields the user supplied.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::core::frontmatter::{self, FieldValue};
use crate::core::types::ContentKind;
use crate::error::{BlogError, Result};
use crate::io::process::run_tool;
use crate::io::tools::Tools;

/// Fields for a new post or conversation bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBundle {
    pub title: String,
    pub slug: String,
    /// Language code, e.g. `en`.
    pub language: String,
    pub description: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Hugo {
    tools: Tools,
    site_root: PathBuf,
    languages: BTreeMap<String, String>,
}

impl Hugo {
    pub fn new(tools: &Tools, site_root: &Path, languages: &BTreeMap<String, String>) -> Self {
        Self {
            tools: tools.clone(),
            site_root: site_root.to_path_buf(),
            languages: languages.clone(),
        }
    }

    /// `hugo version` output, used to check the installation.
    #[instrument(skip_all)]
    pub fn version(&self) -> Result<String> {
        let mut cmd = self.tools.command(&self.tools.hugo);
        cmd.arg("version").current_dir(&self.site_root);
        let out = run_tool(cmd, None, self.tools.timeout, self.tools.output_limit_bytes)?
            .check("hugo version", self.tools.timeout)?;
        Ok(out.stdout.trim().to_string())
    }

    /// Create `content/microposts/<filename>` and set its body.
    #[instrument(skip_all, fields(filename))]
    pub fn create_micropost(&self, filename: &str, body: &str) -> Result<PathBuf> {
        if !is_plain_name(filename) || !filename.ends_with(".md") {
            return Err(BlogError::InvalidInput(format!(
                "micropost filename must be a plain '*.md' name, got '{filename}'"
            )));
        }
        let rel = format!(
            "content/{}/{filename}",
            ContentKind::Micropost.section_dir()
        );
        let created = self.new_content(&rel, ContentKind::Micropost.archetype())?;
        let contents = read(&created)?;
        let updated = frontmatter::replace_body(&contents, body)
            .map_err(|reason| BlogError::parse(created.display().to_string(), reason))?;
        write(&created, &updated)?;
        info!(path = %created.display(), "created micropost");
        Ok(created)
    }

    pub fn create_post(&self, bundle: &NewBundle) -> Result<PathBuf> {
        self.create_bundle(ContentKind::Post, bundle)
    }

    pub fn create_conversation(&self, bundle: &NewBundle) -> Result<PathBuf> {
        self.create_bundle(ContentKind::Conversation, bundle)
    }

    #[instrument(skip_all, fields(kind = %kind, slug = %bundle.slug))]
    fn create_bundle(&self, kind: ContentKind, bundle: &NewBundle) -> Result<PathBuf> {
        if bundle.title.trim().is_empty() {
            return Err(BlogError::InvalidInput("title is required".to_string()));
        }
        if !is_plain_name(&bundle.slug) {
            return Err(BlogError::InvalidInput(format!(
                "slug must be a plain directory name, got '{}'",
                bundle.slug
            )));
        }
        let language_dir = self.languages.get(&bundle.language).ok_or_else(|| {
            BlogError::InvalidInput(format!("unknown language '{}'", bundle.language))
        })?;
        let rel = format!(
            "content/{language_dir}/{}/{}/index.md",
            kind.section_dir(),
            bundle.slug
        );
        let created = self.new_content(&rel, kind.archetype())?;

        let contents = read(&created)?;
        let fields = [
            ("title", FieldValue::Text(bundle.title.trim().to_string())),
            ("description", FieldValue::Text(bundle.description.trim().to_string())),
            ("tags", FieldValue::List(bundle.tags.clone())),
            ("keywords", FieldValue::List(bundle.keywords.clone())),
        ];
        let updated = frontmatter::upsert_fields(&contents, &fields)
            .map_err(|reason| BlogError::parse(created.display().to_string(), reason))?;
        write(&created, &updated)?;
        info!(path = %created.display(), "created {kind}");
        Ok(created)
    }

    /// Run `hugo new content <rel> [--kind <kind>]` and return the created file.
    fn new_content(&self, rel: &str, kind: Option<&str>) -> Result<PathBuf> {
        let target = self.site_root.join(rel);
        if target.exists() {
            return Err(BlogError::InvalidInput(format!("{rel} already exists")));
        }
        let mut cmd = self.tools.command(&self.tools.hugo);
        cmd.args(["new", "content", rel]).current_dir(&self.site_root);
        if let Some(kind) = kind {
            cmd.args(["--kind", kind]);
        }
        let label = match kind {
            Some(kind) => format!("hugo new content {rel} --kind {kind}"),
            None => format!("hugo new content {rel}"),
        };
        debug!(cmd = %label, "creating content");
        run_tool(cmd, None, self.tools.timeout, self.tools.output_limit_bytes)?
            .check(&label, self.tools.timeout)?;

        if !target.is_file() {
            return Err(BlogError::parse(
                label,
                format!("hugo reported success but {} was not created", target.display()),
            ));
        }
        Ok(target)
    }
}

fn is_plain_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| BlogError::io(format!("read {}", path.display()), e))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| BlogError::io(format!("write {}", path.display()), e))
}
