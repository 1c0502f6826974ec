//! HTML fragment sanitizer for untrusted bot content.
//!
//! Bot feedback arrives with a rendered HTML body. Before anything derived
//! from it is shown, the fragment is parsed into a node tree, tags outside a
//! fixed allow-list are unwrapped (replaced by their children so inline text
//! survives), attributes outside per-tag allow-lists are stripped, comments
//! are dropped, and links are hardened. Malformed input never errors; the
//! parser recovers and the result is whatever survived.

/// Tags allowed to remain in sanitized output
const ALLOWED_TAGS: &[&str] = &[
    "p", "strong", "b", "em", "i", "u", "br", "code", "pre", "blockquote", "ul", "ol", "li",
    "table", "thead", "tbody", "tr", "td", "th", "details", "summary", "a", "span", "div", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr",
];

/// Elements that never have children or end tags
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "source", "col"];

/// Per-tag attribute allow-list
fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title"],
        "td" | "th" => &["align", "colspan", "rowspan"],
        "span" | "code" | "div" => &["class"],
        _ => &[],
    }
}

/// A node of a parsed HTML fragment (comments are dropped at parse time)
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
}

/// Sanitize an untrusted HTML fragment.
///
/// Output contains only allow-listed tags and attributes, links carry
/// `target="_blank" rel="noopener noreferrer"`, and text is re-escaped.
/// Idempotent; never fails.
pub fn sanitize(html: &str) -> String {
    let nodes = parse_fragment(html);
    let clean = sanitize_nodes(nodes);
    let mut out = String::new();
    serialize_nodes(&clean, &mut out);
    out
}

/// Flatten a sanitized fragment to plain text for terminal display.
///
/// Block-level boundaries and `<br>` become newlines; everything else is
/// concatenated in document order.
pub fn text_content(html: &str) -> String {
    let nodes = sanitize_nodes(parse_fragment(html));
    let mut out = String::new();
    flatten_nodes(&nodes, &mut out);
    // Collapse the trailing separator runs the block rule leaves behind
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse an HTML fragment into a node tree, recovering from malformed input.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let chars: Vec<char> = html.chars().collect();
    let mut pos = 0;

    // Stack of open elements; index 0 is a virtual root
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<Node>)> =
        vec![(String::new(), Vec::new(), Vec::new())];

    while pos < chars.len() {
        if chars[pos] == '<' {
            if let Some(next) = chars.get(pos + 1) {
                if *next == '!' {
                    pos = skip_comment_or_decl(&chars, pos);
                    continue;
                }
                if *next == '/' {
                    pos = parse_end_tag(&chars, pos, &mut stack);
                    continue;
                }
                if next.is_ascii_alphabetic() {
                    pos = parse_start_tag(&chars, pos, &mut stack);
                    continue;
                }
            }
            // Stray '<' without a tag: treat as text
            push_text(&mut stack, "<");
            pos += 1;
        } else {
            let start = pos;
            while pos < chars.len() && chars[pos] != '<' {
                pos += 1;
            }
            let raw: String = chars[start..pos].iter().collect();
            push_text(&mut stack, &decode_entities(&raw));
        }
    }

    // Unclosed elements close at end of input
    while stack.len() > 1 {
        close_top(&mut stack);
    }

    let (_, _, children) = stack.pop().unwrap_or_default();
    children
}

fn push_text(stack: &mut [(String, Vec<(String, String)>, Vec<Node>)], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some((_, _, children)) = stack.last_mut() {
        // Merge with a preceding text node so re-parses are stable
        if let Some(Node::Text(prev)) = children.last_mut() {
            prev.push_str(text);
        } else {
            children.push(Node::Text(text.to_string()));
        }
    }
}

fn close_top(stack: &mut Vec<(String, Vec<(String, String)>, Vec<Node>)>) {
    if stack.len() <= 1 {
        return;
    }
    let (tag, attrs, children) = stack.pop().unwrap();
    if let Some((_, _, parent)) = stack.last_mut() {
        parent.push(Node::Element {
            tag,
            attrs,
            children,
        });
    }
}

/// Skip `<!-- comments -->` and `<!doctype ...>` style declarations
fn skip_comment_or_decl(chars: &[char], pos: usize) -> usize {
    let is_comment = chars.get(pos + 2) == Some(&'-') && chars.get(pos + 3) == Some(&'-');
    if is_comment {
        let mut i = pos + 4;
        while i < chars.len() {
            if chars[i] == '>' && chars.get(i.wrapping_sub(1)) == Some(&'-') && chars.get(i.wrapping_sub(2)) == Some(&'-') {
                return i + 1;
            }
            i += 1;
        }
        return chars.len();
    }

    let mut i = pos + 2;
    while i < chars.len() && chars[i] != '>' {
        i += 1;
    }
    (i + 1).min(chars.len())
}

fn parse_end_tag(
    chars: &[char],
    pos: usize,
    stack: &mut Vec<(String, Vec<(String, String)>, Vec<Node>)>,
) -> usize {
    let mut i = pos + 2;
    let mut name = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        name.push(chars[i].to_ascii_lowercase());
        i += 1;
    }
    while i < chars.len() && chars[i] != '>' {
        i += 1;
    }
    let end = (i + 1).min(chars.len());

    // Only pop if the named element is actually open; a stray end tag is
    // ignored rather than corrupting the tree
    let open_at = stack.iter().rposition(|(tag, _, _)| *tag == name);
    if let Some(idx) = open_at {
        if idx > 0 {
            while stack.len() > idx {
                close_top(stack);
            }
        }
    }

    end
}

fn parse_start_tag(
    chars: &[char],
    pos: usize,
    stack: &mut Vec<(String, Vec<(String, String)>, Vec<Node>)>,
) -> usize {
    let mut i = pos + 1;
    let mut tag = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        tag.push(chars[i].to_ascii_lowercase());
        i += 1;
    }

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        match chars.get(i) {
            None => break,
            Some(&'>') => {
                i += 1;
                break;
            }
            Some(&'/') => {
                self_closing = true;
                i += 1;
            }
            _ => {
                let (attr, next) = parse_attribute(chars, i);
                if let Some((name, value)) = attr {
                    if !attrs.iter().any(|(n, _)| *n == name) {
                        attrs.push((name, value));
                    }
                }
                // Guard against a scanner that failed to advance
                i = next.max(i + 1);
            }
        }
    }

    if VOID_TAGS.contains(&tag.as_str()) || self_closing {
        if let Some((_, _, children)) = stack.last_mut() {
            children.push(Node::Element {
                tag,
                attrs,
                children: Vec::new(),
            });
        }
    } else {
        stack.push((tag, attrs, Vec::new()));
    }

    i
}

/// Parse one `name`, `name=value`, `name="value"` attribute
fn parse_attribute(chars: &[char], pos: usize) -> (Option<(String, String)>, usize) {
    let mut i = pos;
    let mut name = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '=' || c == '>' || c == '/' {
            break;
        }
        name.push(c.to_ascii_lowercase());
        i += 1;
    }
    if name.is_empty() {
        return (None, i + 1);
    }

    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) != Some(&'=') {
        return (Some((name, String::new())), i);
    }
    i += 1;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }

    let mut value = String::new();
    match chars.get(i) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            i += 1;
            while i < chars.len() && chars[i] != quote {
                value.push(chars[i]);
                i += 1;
            }
            i = (i + 1).min(chars.len());
        }
        _ => {
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
                value.push(chars[i]);
                i += 1;
            }
        }
    }

    (Some((name, decode_entities(&value))), i)
}

/// Decode the handful of entities that matter for round-tripping
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '&' {
            if let Some(semi) = chars[i..].iter().position(|c| *c == ';') {
                let entity: String = chars[i + 1..i + semi].iter().collect();
                if let Some(decoded) = decode_entity(&entity) {
                    out.push(decoded);
                    i += semi + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

// ============================================================================
// Sanitizing
// ============================================================================

fn sanitize_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::new();

    for node in nodes {
        match node {
            Node::Text(text) => out.push(Node::Text(text)),
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                let clean_children = sanitize_nodes(children);

                if !ALLOWED_TAGS.contains(&tag.as_str()) {
                    // Unwrap: the element goes away, its content stays
                    out.extend(clean_children);
                    continue;
                }

                let allowed = allowed_attrs(&tag);
                let mut clean_attrs: Vec<(String, String)> = attrs
                    .into_iter()
                    .filter(|(name, _)| allowed.contains(&name.as_str()))
                    .collect();

                if tag == "a" && clean_attrs.iter().any(|(n, _)| n == "href") {
                    clean_attrs.push(("target".to_string(), "_blank".to_string()));
                    clean_attrs.push(("rel".to_string(), "noopener noreferrer".to_string()));
                }

                out.push(Node::Element {
                    tag,
                    attrs: clean_attrs,
                    children: clean_children,
                });
            }
        }
    }

    out
}

// ============================================================================
// Serialization
// ============================================================================

fn serialize_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if !VOID_TAGS.contains(&tag.as_str()) {
                    serialize_nodes(children, out);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn flatten_nodes(nodes: &[Node], out: &mut String) {
    const BLOCK_TAGS: &[&str] = &[
        "p", "div", "li", "tr", "blockquote", "pre", "details", "summary", "h1", "h2", "h3", "h4",
        "h5", "h6", "ul", "ol", "table",
    ];

    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element { tag, children, .. } => {
                if tag == "br" || tag == "hr" {
                    out.push('\n');
                    continue;
                }
                flatten_nodes(children, out);
                if BLOCK_TAGS.contains(&tag.as_str()) && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collect every tag name appearing in a fragment
    fn collect_tags(nodes: &[Node], tags: &mut Vec<String>) {
        for node in nodes {
            if let Node::Element { tag, children, .. } = node {
                tags.push(tag.clone());
                collect_tags(children, tags);
            }
        }
    }

    fn tags_of(html: &str) -> Vec<String> {
        let mut tags = Vec::new();
        collect_tags(&parse_fragment(html), &mut tags);
        tags
    }

    fn attrs_of(nodes: &[Node], out: &mut Vec<(String, String, String)>) {
        for node in nodes {
            if let Node::Element {
                tag,
                attrs,
                children,
            } = node
            {
                for (name, value) in attrs {
                    out.push((tag.clone(), name.clone(), value.clone()));
                }
                attrs_of(children, out);
            }
        }
    }

    #[test]
    fn test_allowed_tags_survive() {
        let out = sanitize("<p>hello <strong>world</strong></p>");
        assert_eq!(out, "<p>hello <strong>world</strong></p>");
    }

    #[test]
    fn test_disallowed_tag_unwrapped_not_dropped() {
        let out = sanitize("<p>a <font color=\"red\">red</font> word</p>");
        assert_eq!(out, "<p>a red word</p>");
    }

    #[test]
    fn test_script_unwrapped_content_escaped_as_text() {
        let out = sanitize("<script>alert(1)</script>");
        assert_eq!(out, "alert(1)");
        assert!(tags_of(&out).is_empty());
    }

    #[test]
    fn test_output_tags_subset_of_allowlist() {
        let input = "<section><article><p onclick=\"x()\">a</p><video>v</video>\
                     <table><tr><td align=\"left\">c</td></tr></table></article></section>";
        let out = sanitize(input);
        for tag in tags_of(&out) {
            assert!(ALLOWED_TAGS.contains(&tag.as_str()), "leaked tag: {}", tag);
        }
    }

    #[test]
    fn test_output_attrs_subset_of_allowlist() {
        let input = "<a href=\"https://x\" onclick=\"evil()\" style=\"x\">l</a>\
                     <td colspan=\"2\" bgcolor=\"red\">c</td>\
                     <span class=\"k\" data-x=\"1\">s</span>";
        let out = sanitize(input);

        let mut attrs = Vec::new();
        attrs_of(&parse_fragment(&out), &mut attrs);
        for (tag, name, _) in attrs {
            let link_marker = tag == "a" && (name == "target" || name == "rel");
            assert!(
                link_marker || allowed_attrs(&tag).contains(&name.as_str()),
                "leaked attr {} on {}",
                name,
                tag
            );
        }
    }

    #[test]
    fn test_links_gain_markers() {
        let out = sanitize("<a href=\"https://example.com\">x</a>");
        assert!(out.contains("target=\"_blank\""));
        assert!(out.contains("rel=\"noopener noreferrer\""));
    }

    #[test]
    fn test_link_without_href_gets_no_markers() {
        let out = sanitize("<a title=\"t\">x</a>");
        assert!(!out.contains("target="));
        assert!(!out.contains("rel="));
    }

    #[test]
    fn test_comments_removed() {
        let out = sanitize("before<!-- secret -->after");
        assert_eq!(out, "beforeafter");
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "<p>hello <strong>world</strong></p>",
            "<a href=\"https://x\">link</a>",
            "<div class=\"c\"><ul><li>one</li><li>two &amp; three</li></ul></div>",
            "plain &lt;text&gt; only",
            "<p>unclosed <em>emphasis",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_malformed_input_recovers() {
        // None of these may panic or error
        let inputs = [
            "<p>unclosed",
            "</div></div>",
            "<<<>>>",
            "<a href=",
            "<p><b>cross</p></b>",
            "<!-- unterminated",
            "<details><summary>s",
            "",
        ];
        for input in inputs {
            let _ = sanitize(input);
        }
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let out = sanitize("a</div>b");
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_entities_round_trip() {
        let out = sanitize("a &amp; b &lt;c&gt;");
        assert_eq!(out, "a &amp; b &lt;c&gt;");
    }

    #[test]
    fn test_uppercase_tags_normalized() {
        let out = sanitize("<P>Hi <STRONG>there</STRONG></P>");
        assert_eq!(out, "<p>Hi <strong>there</strong></p>");
    }

    #[test]
    fn test_void_elements() {
        let out = sanitize("line<br>break<hr>");
        assert_eq!(out, "line<br>break<hr>");
    }

    #[test]
    fn test_nested_unwrap_preserves_order() {
        let out = sanitize("<center><p>one</p><p>two</p></center>");
        assert_eq!(out, "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_text_content_flattens_blocks() {
        let text = text_content("<p>first</p><p>second<br>third</p>");
        assert_eq!(text, "first\nsecond\nthird");
    }

    #[test]
    fn test_text_content_strips_markup() {
        let text = text_content("<div class=\"x\">a <code>b()</code> c</div>");
        assert_eq!(text, "a b() c");
    }
}
