//! HTML 文本与链接提取 - 基础设施层
//!
//! 把渲染后的 HTML 变成模型可读的文本：
//! - 去掉 `<script>` / `<style>` / `<noscript>` 和注释
//! - `<a href>` 改写为 `文本 (绝对地址)`
//! - `<img src>` 改写为 `[Image: 绝对地址]`
//! - 其余标签与实体交给 `html2text`
//! - 去掉空行，每行首尾空白

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use url::Url;

/// 文本被截断时追加的标记
pub const TRUNCATED_MARKER: &str = "... [TRUNCATED]";

/// html2text 的折行宽度，取足够大以免把一行拆开
const RENDER_WIDTH: usize = 10_000;

struct Patterns {
    hidden: Vec<Regex>,
    comment: Regex,
    anchor: Regex,
    image: Regex,
    href: Regex,
    src: Regex,
    any_link_attr: Regex,
    tag: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        let hidden = ["script", "style", "noscript"]
            .iter()
            .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>.*?</{t}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            hidden,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            anchor: Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>")?,
            image: Regex::new(r"(?is)<img\b([^>]*)/?>")?,
            href: Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)?,
            src: Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)?,
            any_link_attr: Regex::new(
                r#"(?i)\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#,
            )?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
        })
    }
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(Patterns::compile);

fn patterns() -> Result<&'static Patterns, regex::Error> {
    PATTERNS.as_ref().map_err(Clone::clone)
}

/// 取出属性正则三个分组中命中的那个
fn attr_value<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

/// 把相对地址解析为绝对地址；无法解析时原样返回
pub fn resolve_url(base: &str, link: &str) -> String {
    let link = decode_attribute(link.trim());
    match Url::parse(base).and_then(|b| b.join(&link)) {
        Ok(url) => url.to_string(),
        Err(_) => link,
    }
}

/// 属性值中的实体（如 `&amp;`）交给 html2text 解码
fn decode_attribute(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    html2text::from_read(value.as_bytes(), RENDER_WIDTH)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// 插回 HTML 的地址需要转义，避免被当成实体或标签
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 提取页面中所有 href / src 的绝对地址（去重）
pub fn extract_all_urls(html: &str, base_url: &str) -> Result<Vec<String>, regex::Error> {
    let urls: BTreeSet<String> = patterns()?
        .any_link_attr
        .captures_iter(html)
        .filter_map(|caps| attr_value(&caps).map(|link| resolve_url(base_url, link)))
        .filter(|url| !url.is_empty())
        .collect();
    Ok(urls.into_iter().collect())
}

/// 把 HTML 转成可读文本
pub fn clean_text(html: &str, base_url: &str) -> Result<String> {
    let p = patterns()?;

    let mut markup = p.comment.replace_all(html, "").into_owned();
    for hidden in &p.hidden {
        markup = hidden.replace_all(&markup, "").into_owned();
    }

    markup = p
        .anchor
        .replace_all(&markup, |caps: &Captures| {
            let inner = p.tag.replace_all(&caps[2], "").trim().to_string();
            match p.href.captures(&caps[1]).as_ref().and_then(attr_value) {
                Some(href) => format!("{} ({})", inner, escape_html(&resolve_url(base_url, href))),
                None => inner,
            }
        })
        .into_owned();

    markup = p
        .image
        .replace_all(&markup, |caps: &Captures| {
            match p.src.captures(&caps[1]).as_ref().and_then(attr_value) {
                Some(src) => format!(
                    "<div>[Image: {}]</div>",
                    escape_html(&resolve_url(base_url, src))
                ),
                None => String::new(),
            }
        })
        .into_owned();

    let text = html2text::from_read(markup.as_bytes(), RENDER_WIDTH)
        .context("HTML 转文本失败")?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// 超过 `max_chars` 个字符时截断并追加标记
pub fn truncate_page_text(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATED_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://quiz.example/tasks/q1";

    #[test]
    fn test_clean_text_rewrites_links_and_images() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script>var secret = 1;</script></head>
            <body><h1>Question 1</h1>
            <p>Download <a href="data.csv">the <b>data</b></a> first.</p>
            <img src="/img/chart.png">
            <!-- hidden comment -->
            </body></html>"#;

        let text = clean_text(html, BASE).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3, "{text}");
        assert!(lines[0].ends_with("Question 1"));
        assert_eq!(
            lines[1],
            "Download the data (https://quiz.example/tasks/data.csv) first."
        );
        assert_eq!(lines[2], "[Image: https://quiz.example/img/chart.png]");
        assert!(!text.contains("secret"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("hidden comment"));
    }

    #[test]
    fn test_clean_text_decodes_entities() {
        let text = clean_text("<p>1 &lt; 2 &amp;&amp; 3 &gt; 2</p>", BASE).unwrap();
        assert_eq!(text, "1 < 2 && 3 > 2");
    }

    #[test]
    fn test_clean_text_decodes_numeric_and_named_entities() {
        let text = clean_text("<p>Don&#8217;t use &#x2F;tmp &copy; &#36;5</p>", BASE).unwrap();
        assert_eq!(text, "Don\u{2019}t use /tmp \u{a9} $5");
    }

    #[test]
    fn test_clean_text_keeps_query_string_in_link() {
        let text = clean_text(r#"<a href="/data?id=1&amp;fmt=csv">data</a>"#, BASE).unwrap();
        assert_eq!(text, "data (https://quiz.example/data?id=1&fmt=csv)");
    }

    #[test]
    fn test_extract_all_urls_resolves_and_dedups() {
        let html = r#"<a href="/submit">x</a><a href='/submit'>y</a>
            <script src="https://cdn.example/app.js"></script>
            <audio src=clip.mp3></audio>"#;

        let urls = extract_all_urls(html, BASE).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example/app.js".to_string(),
                "https://quiz.example/submit".to_string(),
                "https://quiz.example/tasks/clip.mp3".to_string(),
            ]
        );
    }

    #[test]
    fn test_resolve_url_with_invalid_base() {
        assert_eq!(resolve_url("not a url", "file.csv"), "file.csv");
        assert_eq!(resolve_url(BASE, "?page=2"), "https://quiz.example/tasks/q1?page=2");
    }

    #[test]
    fn test_truncate_page_text() {
        assert_eq!(truncate_page_text("short".to_string(), 10), "short");
        assert_eq!(
            truncate_page_text("abcdef".to_string(), 3),
            format!("abc{}", TRUNCATED_MARKER)
        );
    }
}
