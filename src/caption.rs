//! Caption retrieval.
//!
//! `CaptionSource` is the collaborator boundary. `WebCaptionSource` scrapes the
//! public embed page first and the post page second; `StaticCaptionSource`
//! serves a fixed text (CLI `--caption-file`, tests).

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

static JSON_LD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static META_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s+(?:[^>]*?\s)?(?:name|property)\s*=\s*["'](?:og:)?description["'][^>]*?\scontent\s*=\s*"([^"]*)""#,
    )
    .expect("valid regex")
});

static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);").expect("valid regex")
});

/// Post description, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCaption(String);

impl RawCaption {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.0.lines()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("not a post URL: {0}")]
    InvalidReference(String),

    #[error("caption unavailable after {attempts} attempts")]
    Unavailable { attempts: usize },
}

pub trait CaptionSource: Send + Sync {
    fn fetch_caption(&self, post_ref: &str) -> Result<RawCaption, CaptionError>;
}

/// Always returns the same caption.
pub struct StaticCaptionSource {
    caption: String,
}

impl StaticCaptionSource {
    pub fn new(caption: impl Into<String>) -> Self {
        Self { caption: caption.into() }
    }
}

impl CaptionSource for StaticCaptionSource {
    fn fetch_caption(&self, _post_ref: &str) -> Result<RawCaption, CaptionError> {
        Ok(RawCaption::new(self.caption.clone()))
    }
}

// ─── Web scraping source ────────────────────────────────────────

pub struct WebCaptionSource {
    agent: ureq::Agent,
}

impl WebCaptionSource {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build();
        Self { agent }
    }

    fn fetch_page(&self, url: &str) -> Option<String> {
        let response = self
            .agent
            .get(url)
            .set("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .set("Accept-Language", "en-US,en;q=0.5")
            .call();
        match response {
            Ok(r) => r.into_string().map_err(|e| warn!(url, error = %e, "unreadable page body")).ok(),
            Err(e) => {
                warn!(url, error = %e, "caption page request failed");
                None
            }
        }
    }
}

impl CaptionSource for WebCaptionSource {
    fn fetch_caption(&self, post_ref: &str) -> Result<RawCaption, CaptionError> {
        let post = Url::parse(post_ref.trim())
            .map_err(|_| CaptionError::InvalidReference(post_ref.to_string()))?;

        let mut pages = Vec::new();
        if let Some(embed) = embed_url(&post) {
            pages.push(embed);
        }
        pages.push(post.to_string());

        for (attempt, page) in pages.iter().enumerate() {
            let Some(html) = self.fetch_page(page) else { continue };
            if let Some(caption) = caption_from_html(&html) {
                info!(attempt = attempt + 1, chars = caption.len(), "extracted caption");
                return Ok(RawCaption::new(caption));
            }
            debug!(page = %page, "no caption in page");
        }

        warn!(post = post_ref, "could not extract caption");
        Err(CaptionError::Unavailable { attempts: pages.len() })
    }
}

/// `/reel/<code>/?x` → `/p/<code>/embed/` (query dropped). `None` for
/// non-post paths.
pub fn embed_url(post: &Url) -> Option<String> {
    let segments: Vec<&str> = post.path_segments()?.filter(|s| !s.is_empty()).collect();
    let code = match segments.as_slice() {
        ["reel", code, ..] | ["reels", code, ..] | ["p", code, ..] => *code,
        _ => return None,
    };
    let mut embed = post.clone();
    embed.set_query(None);
    embed.set_fragment(None);
    embed.set_path(&format!("/p/{}/embed/", code));
    Some(embed.to_string())
}

/// JSON-LD `caption` first, then the description meta tag.
pub fn caption_from_html(html: &str) -> Option<String> {
    for block in JSON_LD.captures_iter(html) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(block[1].trim()) else {
            continue;
        };
        let candidates = match &value {
            serde_json::Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        for item in candidates {
            if let Some(caption) = item.get("caption").and_then(|c| c.as_str()) {
                if !caption.trim().is_empty() {
                    return Some(caption.to_string());
                }
            }
        }
    }

    META_DESCRIPTION
        .captures(html)
        .map(|c| unescape_html(&c[1]))
        .filter(|d| !d.trim().is_empty())
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "eacute" => 'é',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "aacute" => 'á',
        "agrave" => 'à',
        "acirc" => 'â',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ccedil" => 'ç',
        "ntilde" => 'ñ',
        "auml" => 'ä',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "hellip" => '…',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "bull" => '•',
        "middot" => '·',
        "deg" => '°',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        _ => return None,
    };
    Some(c)
}

/// Single pass, so `&amp;lt;` decodes to `&lt;`. Unknown entities are kept.
fn unescape_html(s: &str) -> String {
    HTML_ENTITY
        .replace_all(s, |caps: &regex::Captures| {
            let raw = &caps[1];
            let decoded = match raw.strip_prefix('#') {
                Some(num) => match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
                    None => num.parse::<u32>().ok().and_then(char::from_u32),
                },
                None => named_entity(raw),
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_caption_lines() {
        let c = RawCaption::new("a\r\nb\n\nc");
        assert_eq!(c.lines().collect::<Vec<_>>(), vec!["a", "b", "", "c"]);
        assert!(RawCaption::new(" \n ").is_blank());
    }

    #[test]
    fn test_embed_url() {
        let u = Url::parse("https://www.instagram.com/reel/C8abc12/?igsh=xyz").unwrap();
        assert_eq!(
            embed_url(&u).as_deref(),
            Some("https://www.instagram.com/p/C8abc12/embed/")
        );
        let u = Url::parse("https://www.instagram.com/p/C8abc12/").unwrap();
        assert_eq!(
            embed_url(&u).as_deref(),
            Some("https://www.instagram.com/p/C8abc12/embed/")
        );
        let u = Url::parse("https://www.instagram.com/someuser/").unwrap();
        assert!(embed_url(&u).is_none());
    }

    #[test]
    fn test_caption_from_json_ld() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type":"VideoObject","caption":"Location: MG Road\nKochi"}</script>
            <meta name="description" content="ignored">
        </head></html>"#;
        assert_eq!(caption_from_html(html).as_deref(), Some("Location: MG Road\nKochi"));
    }

    #[test]
    fn test_caption_from_meta() {
        let html = r#"<meta property="og:description" content="Caf&eacute; &quot;Oven&quot; &#x1F4CD; Fort Kochi &amp; more">"#;
        assert_eq!(
            caption_from_html(html).as_deref(),
            Some("Café \"Oven\" \u{1F4CD} Fort Kochi & more")
        );
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("Ros&eacute;&#39;s &ndash; Kochi"), "Rosé's – Kochi");
        assert_eq!(unescape_html("&amp;lt;b&amp;gt;"), "&lt;b&gt;");
        assert_eq!(unescape_html("&#X1F4CD; &#128205;"), "\u{1F4CD} \u{1F4CD}");
        assert_eq!(unescape_html("&bogus; &#xZZ; & alone"), "&bogus; &#xZZ; & alone");
    }

    #[test]
    fn test_caption_missing() {
        assert!(caption_from_html("<html><body>login required</body></html>").is_none());
        assert!(caption_from_html(r#"<meta name="description" content="  ">"#).is_none());
    }

    #[test]
    fn test_static_source() {
        let src = StaticCaptionSource::new("Place: Vyttila");
        assert_eq!(src.fetch_caption("anything").unwrap().text(), "Place: Vyttila");
    }

    #[test]
    fn test_web_source_rejects_non_url() {
        let src = WebCaptionSource::new(Duration::from_secs(1));
        assert!(matches!(
            src.fetch_caption("not a url"),
            Err(CaptionError::InvalidReference(_))
        ));
    }

    mod web {
        use super::*;
        use axum::extract::Path;
        use axum::http::StatusCode;
        use axum::response::Html;
        use axum::routing::get;
        use axum::Router;

        fn og_page(description: &str) -> Html<String> {
            Html(format!(
                r#"<html><head><meta property="og:description" content="{}"></head></html>"#,
                description
            ))
        }

        async fn embed_page(Path(code): Path<String>) -> (StatusCode, Html<String>) {
            match code.as_str() {
                "both" => (StatusCode::OK, og_page("Place: Embed Cafe, Fort Kochi")),
                _ => (StatusCode::NOT_FOUND, Html("not found".to_string())),
            }
        }

        async fn post_page(Path(code): Path<String>) -> Html<String> {
            match code.as_str() {
                "none" => Html("<html><body>login required</body></html>".to_string()),
                _ => og_page("Place: Post Cafe, Vyttila"),
            }
        }

        async fn serve_site() -> String {
            let app = Router::new()
                .route("/p/{code}/embed/", get(embed_page))
                .route("/reel/{code}/", get(post_page));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        async fn fetch(base: &str, code: &str) -> Result<RawCaption, CaptionError> {
            let url = format!("{}/reel/{}/?igsh=abc", base, code);
            tokio::task::spawn_blocking(move || {
                WebCaptionSource::new(Duration::from_secs(5)).fetch_caption(&url)
            })
            .await
            .unwrap()
        }

        #[tokio::test]
        async fn test_missing_embed_falls_back_to_post_page() {
            let base = serve_site().await;
            let caption = fetch(&base, "postonly").await.unwrap();
            assert_eq!(caption.text(), "Place: Post Cafe, Vyttila");
        }

        #[tokio::test]
        async fn test_embed_page_wins() {
            let base = serve_site().await;
            let caption = fetch(&base, "both").await.unwrap();
            assert_eq!(caption.text(), "Place: Embed Cafe, Fort Kochi");
        }

        #[tokio::test]
        async fn test_both_pages_fail() {
            let base = serve_site().await;
            assert!(matches!(
                fetch(&base, "none").await,
                Err(CaptionError::Unavailable { attempts: 2 })
            ));
        }
    }
}
