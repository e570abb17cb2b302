//! Content creation through a fake `hugo new content`.
#![cfg(unix)]

use std::fs;

use blogtool::core::types::ContentKind;
use blogtool::error::BlogError;
use blogtool::io::config::ToolsConfig;
use blogtool::io::content::ContentLister;
use blogtool::io::hugo::{Hugo, NewBundle};
use blogtool::io::tools::Tools;
use blogtool::test_support::{TestSite, fake_hugo_new, fake_tool};

fn hugo_for(site: &TestSite) -> Hugo {
    let hugo = fake_hugo_new(site.path()).expect("fake hugo");
    let tools = Tools::resolve(&ToolsConfig {
        hugo: Some(hugo),
        ..ToolsConfig::default()
    });
    Hugo::new(&tools, site.path(), &site.config().site.languages)
}

fn lister(site: &TestSite) -> ContentLister {
    let cfg = site.config();
    ContentLister::open(site.path(), &cfg.site.languages, &cfg.site.default_language)
        .expect("open lister")
}

fn bundle(title: &str, slug: &str, language: &str) -> NewBundle {
    NewBundle {
        title: title.to_string(),
        slug: slug.to_string(),
        language: language.to_string(),
        description: "A short description".to_string(),
        tags: vec!["rust".to_string(), "hugo".to_string()],
        keywords: vec!["blog".to_string()],
    }
}

#[test]
fn micropost_body_replaces_archetype_body() {
    let site = TestSite::new().expect("site");
    let hugo = hugo_for(&site);

    let path = hugo
        .create_micropost("2025-06-28-first.md", "Hello from the command line.")
        .expect("create");

    assert_eq!(
        path,
        site.path().join("content/microposts/2025-06-28-first.md")
    );
    let contents = fs::read_to_string(&path).expect("read");
    assert!(contents.starts_with("---\n"));
    assert!(contents.contains("draft: true"));
    assert!(contents.contains("Hello from the command line."));

    let listing = lister(&site).list(ContentKind::Micropost);
    let item = listing.iter().next().expect("listed");
    assert_eq!(item.preview, "Hello from the command line.");
}

#[test]
fn post_front_matter_is_filled_in() {
    let site = TestSite::new().expect("site");
    let hugo = hugo_for(&site);

    let path = hugo
        .create_post(&bundle("Shipping It", "shipping-it", "en"))
        .expect("create");

    assert_eq!(
        path,
        site.path().join("content/english/posts/shipping-it/index.md")
    );
    let listing = lister(&site).list(ContentKind::Post);
    let item = listing.iter().next().expect("listed");
    assert_eq!(item.title, "Shipping It");
    assert_eq!(item.slug, "shipping-it");
    assert_eq!(item.language, "en");
    assert_eq!(item.description, "A short description");
    assert_eq!(item.tags, vec!["rust", "hugo"]);
    assert_eq!(item.keywords, vec!["blog"]);
    assert!(item.draft);
}

#[test]
fn conversation_lands_in_language_directory() {
    let site = TestSite::new().expect("site");
    let hugo = hugo_for(&site);

    let path = hugo
        .create_conversation(&bundle("Rozmowa", "rozmowa", "pl"))
        .expect("create");

    assert_eq!(
        path,
        site.path().join("content/polish/conversations/rozmowa/index.md")
    );
    let listing = lister(&site).list(ContentKind::Conversation);
    assert_eq!(listing.len(), 1);
}

#[test]
fn unknown_language_is_rejected() {
    let site = TestSite::new().expect("site");
    let hugo = hugo_for(&site);

    let err = hugo
        .create_post(&bundle("Bonjour", "bonjour", "fr"))
        .unwrap_err();

    assert!(matches!(err, BlogError::InvalidInput(ref msg) if msg.contains("fr")));
}

#[test]
fn existing_file_is_not_overwritten() {
    let site = TestSite::new().expect("site");
    let existing = site
        .write("content/microposts/2025-06-28-taken.md", "keep me\n")
        .expect("write");
    let hugo = hugo_for(&site);

    let err = hugo
        .create_micropost("2025-06-28-taken.md", "new body")
        .unwrap_err();

    assert!(matches!(err, BlogError::InvalidInput(_)));
    assert_eq!(fs::read_to_string(existing).expect("read"), "keep me\n");
}

#[test]
fn nested_micropost_name_is_rejected() {
    let site = TestSite::new().expect("site");
    let hugo = hugo_for(&site);

    let err = hugo.create_micropost("../escape.md", "x").unwrap_err();
    assert!(matches!(err, BlogError::InvalidInput(_)));
}

#[test]
fn hugo_failure_carries_its_stderr() {
    let site = TestSite::new().expect("site");
    let bin = tempfile::tempdir().expect("bin dir");
    let hugo = fake_tool(bin.path(), "hugo", "echo 'Error: no archetype found' >&2\nexit 255")
        .expect("fake hugo");
    let tools = Tools::resolve(&ToolsConfig {
        hugo: Some(hugo),
        ..ToolsConfig::default()
    });
    let hugo = Hugo::new(&tools, site.path(), &site.config().site.languages);

    let err = hugo
        .create_post(&bundle("Broken", "broken", "en"))
        .unwrap_err();

    match err {
        BlogError::CommandFailed { code, stderr, .. } => {
            assert_eq!(code, 255);
            assert!(stderr.contains("no archetype found"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}
