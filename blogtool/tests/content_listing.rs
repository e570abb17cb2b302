//! Content Lister tests against throwaway Hugo sites.
//!
//! Covers ordering, malformed-file tallies, the three front matter flavors,
//! and title/preview derivation as seen through a listing.

use blogtool::core::types::ContentKind;
use blogtool::io::content::ContentLister;
use blogtool::test_support::TestSite;

fn lister(site: &TestSite) -> ContentLister {
    let cfg = site.config();
    ContentLister::open(site.path(), &cfg.site.languages, &cfg.site.default_language)
        .expect("open lister")
}

#[test]
fn malformed_files_are_tallied_not_listed() {
    let site = TestSite::new().expect("site");
    site.write(
        "content/microposts/2025-06-01-ok.md",
        "---\ntitle: Ok\ndate: 2025-06-01T10:00:00Z\n---\nfine\n",
    )
    .expect("write");
    site.write(
        "content/microposts/unterminated.md",
        "---\ntitle: Broken\ndate: 2025-06-02\nno closing delimiter\n",
    )
    .expect("write");
    site.write(
        "content/microposts/bad-date.md",
        "---\ndate: someday\n---\nbody\n",
    )
    .expect("write");
    site.write(
        "content/microposts/2025-06-03-toml.md",
        "+++\ntitle = 'From TOML'\ndraft = true\n+++\nbody\n",
    )
    .expect("write");

    let listing = lister(&site).list(ContentKind::Micropost);

    assert_eq!(listing.len(), 2);
    assert_eq!(listing.warnings().len(), 2);
    let titles: Vec<&str> = listing.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["From TOML", "Ok"]);
    assert!(listing.iter().next().expect("first").draft);
}

#[test]
fn order_is_newest_first_with_name_tiebreak() {
    let site = TestSite::new().expect("site");
    // Written oldest-first so directory order cannot produce the expected result.
    for (name, date) in [
        ("a.md", "2024-01-01T00:00:00Z"),
        ("b.md", "2025-03-01T00:00:00Z"),
        ("c.md", "2025-03-01T00:00:00Z"),
        ("d.md", "2025-02-01T00:00:00+01:00"),
    ] {
        site.write(
            &format!("content/microposts/{name}"),
            &format!("---\ndate: {date}\n---\ntext\n"),
        )
        .expect("write");
    }

    let listing = lister(&site).list(ContentKind::Micropost);
    let names: Vec<&str> = listing.iter().map(|c| c.sort_name()).collect();
    assert_eq!(names, vec!["c.md", "b.md", "d.md", "a.md"]);
}

#[test]
fn listing_can_be_iterated_repeatedly() {
    let site = TestSite::new().expect("site");
    site.write("content/microposts/2025-01-01-one.md", "one\n")
        .expect("write");
    site.write("content/microposts/2025-01-02-two.md", "two\n")
        .expect("write");

    let listing = lister(&site).list(ContentKind::Micropost);
    let first: Vec<_> = listing.iter().map(|c| c.path.clone()).collect();
    let second: Vec<_> = (&listing).into_iter().map(|c| c.path.clone()).collect();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn front_matter_title_wins_and_heading_is_stripped() {
    let site = TestSite::new().expect("site");
    site.write(
        "content/microposts/2025-05-01-explicit.md",
        "---\ntitle: \"Hello\"\n---\n# Ignored heading\n",
    )
    .expect("write");
    site.write(
        "content/microposts/2025-05-02-derived.md",
        "---\ndate: 2025-05-02\n---\n\n# My Heading\n\nBody text.\n",
    )
    .expect("write");

    let listing = lister(&site).list(ContentKind::Micropost);
    let titles: Vec<&str> = listing.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["My Heading", "Hello"]);
}

#[test]
fn json_front_matter_and_filename_title() {
    let site = TestSite::new().expect("site");
    site.write(
        "content/microposts/2025-04-01-json-note.md",
        "{\n  \"date\": \"2025-04-01T08:00:00Z\",\n  \"tags\": [\"x\"]\n}\nhttps://example.com/link\n",
    )
    .expect("write");

    let listing = lister(&site).list(ContentKind::Micropost);
    let item = listing.iter().next().expect("item");
    assert_eq!(item.title, "Json Note");
    assert_eq!(item.tags, vec!["x"]);
    assert_eq!(item.preview, "https://example.com/link");
}

#[test]
fn preview_is_plain_and_bounded() {
    let site = TestSite::new().expect("site");
    let body = format!("**Bold** start {}", "word ".repeat(60));
    site.write(
        "content/microposts/2025-04-02-long.md",
        &format!("---\ntitle: Long\n---\n{body}\n"),
    )
    .expect("write");

    let listing = lister(&site).list(ContentKind::Micropost);
    let preview = &listing.iter().next().expect("item").preview;
    assert!(preview.starts_with("Bold start word"));
    assert!(preview.ends_with("..."));
    assert!(preview.chars().count() <= 150 + 3);
}

#[test]
fn list_all_merges_kinds_and_languages() {
    let site = TestSite::new().expect("site");
    site.write(
        "content/microposts/2025-01-05-micro.md",
        "---\ntitle: Micro\n---\nm\n",
    )
    .expect("write");
    site.write(
        "content/english/posts/hello-world/index.md",
        "---\ntitle: Hello World\ndate: 2025-01-07\n---\np\n",
    )
    .expect("write");
    site.write(
        "content/polish/conversations/rozmowa/index.md",
        "---\ntitle: Rozmowa\ndate: 2025-01-06\n---\nc\n",
    )
    .expect("write");
    site.write(
        "content/english/posts/_index.md",
        "---\ntitle: Posts\n---\n",
    )
    .expect("write");

    let listing = lister(&site).list_all();
    let summary: Vec<(ContentKind, &str, &str)> = listing
        .iter()
        .map(|c| (c.kind, c.language.as_str(), c.slug.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ContentKind::Post, "en", "hello-world"),
            (ContentKind::Conversation, "pl", "rozmowa"),
            (ContentKind::Micropost, "en", "2025-01-05-micro"),
        ]
    );
    assert!(listing.warnings().is_empty());
}
