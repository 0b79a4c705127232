// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use super::super::*;

    fn config() -> SiteConfig {
        SiteConfig::new("medium", "medium.com", "medium", json!({"tags": ["rust", "startups"]}))
    }

    const LISTING: &str = r#"
        <html><head>
          <link rel="next" href="/tag/rust/archive?page=2">
          <script type="application/ld+json">
            {"@type": "Article", "headline": "Async in practice", "author": {"name": "Erin Doe", "url": "https://medium.com/@erin?source=ld"}}
          </script>
          <script type="application/ld+json">{not json</script>
        </head><body>
          <article>
            <a data-testid="authorName" href="/@jane.smith/?source=tag_page">Jane   Smith</a>
            <a href="/tag/rust">Rust</a>
          </article>
          <article>
            <a rel="author" href="https://medium.com/@kim#top">Kim Lee</a>
            <a href="https://medium.com/tag/startups?source=post">Startups</a>
          </article>
          <article>
            <a data-testid="authorName" href="/@jane.smith">Jane Smith</a>
          </article>
        </body></html>
    "#;

    #[test]
    fn test_build_request_first_page_from_tag() {
        let request = MediumParser.build_request(&config(), None).unwrap();
        assert_eq!(request.url, "https://medium.com/tag/rust");
        assert!(request.headers.get("Accept").unwrap().starts_with("text/html"));
    }

    #[test]
    fn test_build_request_uses_cursor_url() {
        let request = MediumParser
            .build_request(&config(), Some("https://medium.com/tag/rust/archive?page=2"))
            .unwrap();
        assert_eq!(request.url, "https://medium.com/tag/rust/archive?page=2");
    }

    #[test]
    fn test_build_request_requires_tags_or_seed() {
        let cfg = SiteConfig::new("medium", "medium.com", "medium", json!({}));
        assert!(matches!(
            MediumParser.build_request(&cfg, None),
            Err(ParserError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_parse_listing_page() {
        let page = MediumParser.parse(&config(), None, LISTING).unwrap();

        assert!(page.has_more);
        assert_eq!(
            page.next_cursor.as_deref(),
            Some("https://medium.com/tag/rust/archive?page=2")
        );

        let urls: Vec<&str> = page.candidates.iter().map(|c| c.profile_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://medium.com/@jane.smith",
                "https://medium.com/@kim",
                "https://medium.com/@erin",
            ]
        );

        let jane = &page.candidates[0];
        assert_eq!(jane.name, "Jane Smith");
        assert_eq!(jane.source_domain, "medium.com");
        assert_eq!(jane.tags, vec!["rust".to_string(), "startups".to_string()]);

        assert_eq!(page.candidates[2].snippet, "Async in practice");
    }

    #[test]
    fn test_parse_profile_page() {
        let html = r#"
            <html><head>
              <meta property="og:type" content="profile">
              <meta property="og:title" content="Jane Smith – Medium">
              <meta name="description" content="Founder at Acme. Writing about Rust.">
            </head><body><a href="/tag/rust">Rust</a></body></html>
        "#;

        let page = MediumParser
            .parse(&config(), Some("https://medium.com/@jane.smith/"), html)
            .unwrap();

        assert!(!page.has_more);
        assert_eq!(page.candidates.len(), 1);
        let lead = &page.candidates[0];
        assert_eq!(lead.name, "Jane Smith");
        assert_eq!(lead.role, "Founder at Acme. Writing about Rust.");
        assert_eq!(lead.profile_url, "https://medium.com/@jane.smith");
        assert_eq!(lead.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_parse_page_without_authors() {
        let page = MediumParser
            .parse(&config(), None, "<html><body><p>nothing here</p></body></html>")
            .unwrap();
        assert!(page.candidates.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(matches!(
            MediumParser.parse(&config(), None, "   "),
            Err(ParseError::Malformed { format: "html", .. })
        ));
    }

    #[test]
    fn test_normalize_profile_url() {
        assert_eq!(
            normalize_profile_url("https://medium.com/@a/?x=1#y"),
            "https://medium.com/@a"
        );
        assert_eq!(normalize_profile_url("https://medium.com/@a"), "https://medium.com/@a");
    }
}
