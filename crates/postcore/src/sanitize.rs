use std::collections::HashSet;

use ammonia::Builder;
use anyhow::{anyhow, Context, Result};
use html5ever::{local_name, namespace_url, ns, QualName};
use kuchiki::traits::*;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use lazy_static::lazy_static;
use url::Url;

use crate::allowlist;
use crate::config::SanitizeConfig;

/// Escaped zero-width space left behind by some upstream renderers.
pub const ZERO_WIDTH_SPACE_ENTITY: &str = "&amp;#x200B;";

lazy_static! {
    static ref DEFAULT_SANITIZER: HtmlSanitizer = HtmlSanitizer::new();
}

/// Sanitizes untrusted post HTML with the default configuration.
pub fn sanitize_html(html: &str) -> String {
    DEFAULT_SANITIZER.clean(html)
}

/// Allow-list sanitizer followed by the post-specific rewrites: image links
/// become figures and span classes other than the spoiler marker are cleared.
pub struct HtmlSanitizer {
    cleaner: Builder<'static>,
    image_hosts: HashSet<String>,
    spoiler_class: String,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self::from_config(&SanitizeConfig::default())
    }

    pub fn from_config(config: &SanitizeConfig) -> Self {
        Self {
            cleaner: create_allowlist_cleaner(),
            image_hosts: config
                .image_hosts
                .iter()
                .map(|host| host.to_ascii_lowercase())
                .collect(),
            spoiler_class: config.spoiler_class.clone(),
        }
    }

    pub fn is_image_host(&self, host: &str) -> bool {
        self.image_hosts.contains(&host.to_ascii_lowercase())
    }

    pub fn clean(&self, html: &str) -> String {
        let cleaned = self
            .cleaner
            .clean(html)
            .to_string()
            .replace(ZERO_WIDTH_SPACE_ENTITY, "");

        let document = kuchiki::parse_html().one(cleaned.as_str());

        for anchor in select_all(&document, "a") {
            match self.rewrite_image_link(&anchor) {
                Ok(true) => log::debug!("Rewrote image link into figure"),
                Ok(false) => {}
                Err(e) => log::debug!("Leaving anchor untouched: {:#}", e),
            }
        }

        for span in select_all(&document, "span[class]") {
            if let Err(e) = self.strip_span_class(&span) {
                log::debug!("Leaving span class untouched: {:#}", e);
            }
        }

        match document.select_first("body") {
            Ok(body) => inner_html(body.as_node()),
            Err(()) => {
                log::warn!("Parsed document has no body, returning cleaned markup");
                cleaned
            }
        }
    }

    /// Replaces an anchor pointing at an image host with
    /// `<figure><img><figcaption>`. Returns whether the anchor was replaced.
    fn rewrite_image_link(&self, anchor: &NodeDataRef<ElementData>) -> Result<bool> {
        let href = match anchor.attributes.borrow().get("href") {
            Some(href) => href.to_string(),
            None => return Ok(false),
        };
        let url = Url::parse(&href).with_context(|| format!("invalid href {:?}", href))?;

        match url.host_str() {
            Some(host) if self.is_image_host(host) => {}
            _ => return Ok(false),
        }

        let node = anchor.as_node();
        let caption_text = node.text_contents();

        let img = new_element(QualName::new(None, ns!(html), local_name!("img")));
        {
            let img_data = img
                .as_element()
                .ok_or_else(|| anyhow!("created img is not an element"))?;
            let mut attrs = img_data
                .attributes
                .try_borrow_mut()
                .context("img attributes already borrowed")?;
            attrs.insert("src", url.to_string());
            attrs.insert("alt", caption_text.clone());
        }

        let caption = new_element(QualName::new(None, ns!(html), local_name!("figcaption")));
        caption.append(NodeRef::new_text(caption_text));

        let figure = new_element(QualName::new(None, ns!(html), local_name!("figure")));
        figure.append(img);
        figure.append(caption);

        node.insert_before(figure.clone());
        node.detach();

        // A parser closes an open <p> when it meets <figure>, so keep the
        // figure out of paragraphs or a second pass would reshape the output.
        if let Some(paragraph) = enclosing_paragraph(&figure) {
            split_paragraph_around(&paragraph, &figure)?;
        }
        Ok(true)
    }

    /// Clears the class of a span unless it is exactly the spoiler marker.
    fn strip_span_class(&self, span: &NodeDataRef<ElementData>) -> Result<()> {
        let mut attrs = span
            .attributes
            .try_borrow_mut()
            .context("span attributes already borrowed")?;
        if attrs.get("class") != Some(self.spoiler_class.as_str()) {
            attrs.insert("class", String::new());
        }
        Ok(())
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn create_allowlist_cleaner() -> Builder<'static> {
    let mut cleaner = Builder::default();
    cleaner
        .tags(allowlist::allowed_tags())
        .tag_attributes(allowlist::tag_attributes())
        .generic_attributes(HashSet::new())
        .link_rel(None)
        .strip_comments(true);
    cleaner
}

/// Collects matches up front so the tree can be mutated while walking them.
fn select_all(document: &NodeRef, selector: &str) -> Vec<NodeDataRef<ElementData>> {
    match document.select(selector) {
        Ok(matches) => matches.collect(),
        Err(()) => {
            log::warn!("Invalid selector {:?}", selector);
            Vec::new()
        }
    }
}

fn enclosing_paragraph(node: &NodeRef) -> Option<NodeRef> {
    node.ancestors().find(|ancestor| {
        ancestor
            .as_element()
            .map_or(false, |el| el.name.local == local_name!("p"))
    })
}

/// Moves `target` out of `paragraph` so it becomes the paragraph's next
/// sibling. Content after `target` goes into a copy of the paragraph (and of
/// every element between the two) placed after it. Halves left blank are
/// removed.
fn split_paragraph_around(paragraph: &NodeRef, target: &NodeRef) -> Result<()> {
    let mut current = target.clone();
    let mut tail: Option<NodeRef> = None;
    loop {
        let parent = current
            .parent()
            .ok_or_else(|| anyhow!("node lost its parent while splitting paragraph"))?;
        let copy = shallow_copy(&parent)?;
        if let Some(inner) = tail.take() {
            copy.append(inner);
        }
        while let Some(next) = current.next_sibling() {
            copy.append(next);
        }
        tail = Some(copy);
        if parent == *paragraph {
            break;
        }
        current = parent;
    }

    paragraph.insert_after(target.clone());
    if let Some(tail) = tail {
        if is_blank(&tail) {
            tail.detach();
        } else {
            target.insert_after(tail);
        }
    }
    if is_blank(paragraph) {
        paragraph.detach();
    }
    Ok(())
}

fn shallow_copy(node: &NodeRef) -> Result<NodeRef> {
    let el = node
        .as_element()
        .ok_or_else(|| anyhow!("expected an element while splitting paragraph"))?;
    let attrs = el
        .attributes
        .try_borrow()
        .context("element attributes already borrowed")?
        .map
        .clone();
    Ok(NodeRef::new_element(el.name.clone(), attrs))
}

/// No visible text and no void content such as images or line breaks.
fn is_blank(node: &NodeRef) -> bool {
    if !node.text_contents().trim().is_empty() {
        return false;
    }
    match node.select("img, br, hr") {
        Ok(mut found) => found.next().is_none(),
        Err(()) => false,
    }
}

fn new_element(name: QualName) -> NodeRef {
    NodeRef::new_element(name, std::iter::empty())
}

fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| child.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_scripts() {
        let sanitized = sanitize_html("<script>alert(1)</script><p>hi</p>");
        assert_eq!(sanitized, "<p>hi</p>");
    }

    #[test]
    fn test_keeps_text_of_stripped_tags() {
        let sanitized = sanitize_html(r#"<div onclick="x()"><u>under</u> line</div>"#);
        assert_eq!(sanitized, "under line");
    }

    #[test]
    fn test_drops_disallowed_attributes() {
        let sanitized = sanitize_html(r#"<p style="color:red" title="t">text</p>"#);
        assert_eq!(sanitized, "<p>text</p>");
    }

    #[test]
    fn test_img_keeps_only_allowed_attributes() {
        let sanitized =
            sanitize_html(r#"<img src="x.png" alt="a" title="t" onerror="y()" width="1">"#);
        assert!(sanitized.starts_with("<img "));
        assert!(sanitized.contains(r#"src="x.png""#));
        assert!(sanitized.contains(r#"alt="a""#));
        assert!(sanitized.contains(r#"title="t""#));
        assert!(!sanitized.contains("onerror"));
        assert!(!sanitized.contains("width"));
    }

    #[test]
    fn test_removes_dangerous_hrefs() {
        let sanitized = sanitize_html(r#"<a href="javascript:alert('XSS')">Click me</a>"#);
        assert!(!sanitized.contains("javascript:"));
        assert!(sanitized.contains("Click me"));
    }

    #[test]
    fn test_links_get_no_rel() {
        let sanitized = sanitize_html(r#"<a href="https://example.com">link</a>"#);
        assert_eq!(sanitized, r#"<a href="https://example.com">link</a>"#);
    }

    #[test]
    fn test_strips_zero_width_space_entity() {
        let sanitized = sanitize_html("<p>&amp;#x200B;</p><p>a&amp;#x200B;b</p>");
        assert_eq!(sanitized, "<p></p><p>ab</p>");
    }

    #[test]
    fn test_image_host_becomes_figure() {
        let sanitized = sanitize_html(r#"<a href="https://i.redd.it/x.jpg">pic</a>"#);
        assert!(sanitized.starts_with("<figure><img "));
        assert!(sanitized.contains(r#"src="https://i.redd.it/x.jpg""#));
        assert!(sanitized.contains(r#"alt="pic""#));
        assert!(sanitized.ends_with("<figcaption>pic</figcaption></figure>"));
        assert!(!sanitized.contains("<a"));
    }

    #[test]
    fn test_every_image_host_is_rewritten() {
        for url in [
            "https://i.imgur.com/abc.png",
            "https://preview.redd.it/y.jpg?width=640",
            "http://I.REDD.IT/z.gif",
        ] {
            let sanitized = sanitize_html(&format!(r#"<a href="{url}">img</a>"#));
            assert!(sanitized.contains("<figure>"), "{url}: {sanitized}");
        }
    }

    #[test]
    fn test_image_link_lifted_out_of_paragraph() {
        let sanitized = sanitize_html(r#"<p><a href="https://preview.redd.it/x.jpg">pic</a></p>"#);
        assert!(sanitized.starts_with("<figure><img "));
        assert!(sanitized.ends_with("<figcaption>pic</figcaption></figure>"));
        assert!(!sanitized.contains("<p>"));
    }

    #[test]
    fn test_paragraph_split_keeps_surrounding_content() {
        let sanitized = sanitize_html(concat!(
            r#"<p>see <b>this <a href="https://i.redd.it/a.png">pic</a> now</b> ok</p>"#,
            "<p>next</p>",
        ));
        assert!(sanitized.starts_with("<p>see <b>this </b></p><figure>"));
        assert!(sanitized.ends_with("</figure><p><b> now</b> ok</p><p>next</p>"));
    }

    #[test]
    fn test_two_image_links_in_one_paragraph() {
        let sanitized = sanitize_html(concat!(
            r#"<p><a href="https://i.redd.it/a.png">a</a> and "#,
            r#"<a href="https://i.imgur.com/b.png">b</a></p>"#,
        ));
        assert_eq!(sanitized.matches("<figure>").count(), 2);
        assert!(sanitized.contains("</figure><p> and </p><figure>"));
        assert!(!sanitized.contains("<a "));
    }

    #[test]
    fn test_relative_href_left_alone() {
        let html = r#"<a href="/r/rust">sub</a>"#;
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_anchor_without_href_left_alone() {
        assert_eq!(sanitize_html("<a>bare</a>"), "<a>bare</a>");
    }

    #[test]
    fn test_spoiler_class_kept() {
        let html = r#"<span class="spoiler">secret</span>"#;
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_other_class_cleared() {
        assert_eq!(
            sanitize_html(r#"<span class="other">x</span>"#),
            r#"<span class="">x</span>"#
        );
        assert_eq!(
            sanitize_html(r#"<span class="spoiler other">x</span>"#),
            r#"<span class="">x</span>"#
        );
    }

    #[test]
    fn test_span_without_class_untouched() {
        assert_eq!(sanitize_html("<span>x</span>"), "<span>x</span>");
    }

    #[test]
    fn test_configured_hosts_and_spoiler() {
        let sanitizer = HtmlSanitizer::from_config(&SanitizeConfig {
            image_hosts: vec!["cdn.example.com".to_string()],
            spoiler_class: "hidden".to_string(),
        });
        assert!(sanitizer.is_image_host("CDN.example.com"));
        assert!(!sanitizer.is_image_host("i.redd.it"));

        let out = sanitizer.clean(
            r#"<a href="https://cdn.example.com/a.png">a</a><a href="https://i.redd.it/b.png">b</a>"#,
        );
        assert_eq!(out.matches("<figure>").count(), 1);
        assert!(out.contains(r#"<a href="https://i.redd.it/b.png">b</a>"#));

        let out = sanitizer.clean(r#"<span class="hidden">h</span><span class="spoiler">s</span>"#);
        assert_eq!(
            out,
            r#"<span class="hidden">h</span><span class="">s</span>"#
        );
    }
}
