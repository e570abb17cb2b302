//! Commit message templates.
//!
//! Templates are static text with `minijinja` substitution. The context exposes
//! `title`, `slug` and `kind` of the content the commit is about; all three may
//! be empty.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior, context};
use serde::Serialize;

use crate::error::{BlogError, Result};

const BUILTIN: &[(&str, &str)] = &[
    (
        "Add new micropost",
        "Add new micropost{% if title %}: {{ title }}{% endif %}\n\nCreated a new micropost with relevant content.",
    ),
    (
        "Update existing content",
        "Update content{% if title %}: {{ title }}{% endif %}\n\nImproved existing content with corrections and enhancements.",
    ),
    (
        "Fix content issues",
        "Fix content issues{% if title %} in {{ title }}{% endif %}\n\nResolved formatting, spelling, or structural issues.",
    ),
    (
        "Add new blog post",
        "Add new blog post{% if title %}: {{ title }}{% endif %}\n\nPublished a new blog post covering {{ title or \"[topic]\" }}.",
    ),
    (
        "Update blog configuration",
        "Update blog configuration\n\nModified blog settings, themes, or config.",
    ),
];

/// Values substituted into a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
    pub title: String,
    pub slug: String,
    pub kind: String,
}

/// Built-in templates plus any configured ones, in display order.
pub struct CommitTemplates {
    env: Environment<'static>,
    names: Vec<String>,
}

impl CommitTemplates {
    /// Configured templates override built-ins with the same name.
    pub fn new(extra: &BTreeMap<String, String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        let mut names = Vec::new();
        for (name, source) in BUILTIN {
            if !extra.contains_key(*name) {
                env.add_template_owned(name.to_string(), source.to_string())?;
            }
            names.push(name.to_string());
        }
        for (name, source) in extra {
            env.add_template_owned(name.clone(), source.clone())?;
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Ok(Self { env, names })
    }

    #[cfg(test)]
    pub fn builtin() -> Self {
        Self::new(&BTreeMap::new()).expect("built-in templates should be valid")
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| BlogError::InvalidInput(format!("unknown commit template '{name}'")))?;
        let rendered = template.render(context! {
            title => ctx.title.trim(),
            slug => ctx.slug.trim(),
            kind => ctx.kind.trim(),
        })?;
        Ok(rendered.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_title_when_present() {
        let templates = CommitTemplates::builtin();
        let ctx = TemplateContext {
            title: "Rust notes".to_string(),
            ..TemplateContext::default()
        };
        let msg = templates.render("Add new micropost", &ctx).expect("render");
        assert!(msg.starts_with("Add new micropost: Rust notes\n\n"));
    }

    #[test]
    fn omits_title_when_empty() {
        let templates = CommitTemplates::builtin();
        let msg = templates
            .render("Add new blog post", &TemplateContext::default())
            .expect("render");
        assert!(msg.starts_with("Add new blog post\n\n"));
        assert!(msg.ends_with("covering [topic]."));
    }

    #[test]
    fn configured_templates_override_and_extend() {
        let mut extra = BTreeMap::new();
        extra.insert("Fix content issues".to_string(), "fix: {{ slug }}".to_string());
        extra.insert("Translate".to_string(), "i18n({{ kind }}): {{ title }}".to_string());
        let templates = CommitTemplates::new(&extra).expect("templates");

        let ctx = TemplateContext {
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            kind: "post".to_string(),
        };
        assert_eq!(
            templates.render("Fix content issues", &ctx).expect("render"),
            "fix: hello"
        );
        assert_eq!(
            templates.render("Translate", &ctx).expect("render"),
            "i18n(post): Hello"
        );
        assert_eq!(templates.names().len(), BUILTIN.len() + 1);
    }

    #[test]
    fn unknown_template_is_invalid_input() {
        let err = CommitTemplates::builtin()
            .render("Nope", &TemplateContext::default())
            .unwrap_err();
        assert!(matches!(err, BlogError::InvalidInput(_)));
    }
}
