//! Markup encoding: tags, attributes, styles and text escaping.
//!
//! The renderer only talks to [`MarkupEncoder`]; [`HtmlEncoder`] is the
//! default HTML5 implementation.

use serde_json::Value;

use crate::node::Props;

/// Host namespace an element is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    /// Namespace for the children of `tag` rendered in `self`.
    pub fn for_children(self, tag: &str) -> Namespace {
        match self {
            Namespace::Html => match tag {
                "svg" => Namespace::Svg,
                "math" => Namespace::MathMl,
                _ => Namespace::Html,
            },
            Namespace::Svg if tag == "foreignObject" => Namespace::Html,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),
    #[error("<{0}> is a void element and cannot have children or inner html")]
    VoidContent(String),
    #[error("<{0}> sets both children and dangerouslySetInnerHTML")]
    ConflictingContent(String),
}

/// Serializes host elements and text.
pub trait MarkupEncoder: Send + Sync {
    /// Opening tag including attributes. Void elements are self-closed here.
    fn open_tag(&self, tag: &str, props: &Props, namespace: Namespace)
        -> Result<String, MarkupError>;

    /// Closing tag, or `None` when the element has no closing tag.
    fn close_tag(&self, tag: &str, namespace: Namespace) -> Option<String>;

    fn escape_text(&self, text: &str) -> String;

    /// Raw markup replacing the element's children, if any.
    fn inner_html<'a>(&self, props: &'a Props) -> Option<&'a str>;
}

/// Elements without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Properties that never become attributes.
const RESERVED_PROPS: &[&str] = &[
    "children",
    "dangerouslySetInnerHTML",
    "suppressContentEditableWarning",
    "suppressHydrationWarning",
    "key",
    "ref",
];

/// Style properties that take plain numbers.
const UNITLESS_STYLES: &[&str] = &[
    "animationIterationCount",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "boxFlex",
    "boxFlexGroup",
    "boxOrdinalGroup",
    "columnCount",
    "columns",
    "flex",
    "flexGrow",
    "flexPositive",
    "flexShrink",
    "flexNegative",
    "flexOrder",
    "gridArea",
    "gridRow",
    "gridRowEnd",
    "gridRowSpan",
    "gridRowStart",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnSpan",
    "gridColumnStart",
    "fontWeight",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
    "fillOpacity",
    "floodOpacity",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
];

/// Escape text for use in HTML content or a quoted attribute value.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Number formatting as a browser would print it.
pub fn format_number(n: f64) -> String {
    if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else {
        n.to_string()
    }
}

/// `pre`, `textarea` and `listing` drop one leading newline when parsed,
/// so a leading newline in their content has to be doubled.
pub fn eats_leading_newline(tag: &str) -> bool {
    matches!(tag, "listing" | "pre" | "textarea")
}

pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '.' | '-'))
}

fn is_safe_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<'))
}

fn attribute_name(prop: &str) -> &str {
    match prop {
        "className" => "class",
        "htmlFor" => "for",
        "acceptCharset" => "accept-charset",
        "httpEquiv" => "http-equiv",
        other => other,
    }
}

/// `backgroundColor` → `background-color`, `msTransition` → `-ms-transition`.
fn hyphenate_style_name(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_owned();
    }
    let mut out = String::with_capacity(name.len() + 4);
    if name.starts_with("ms") && name[2..].starts_with(|c: char| c.is_ascii_uppercase()) {
        out.push('-');
    }
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn style_value(name: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(_) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(0.0);
            if f == 0.0 || name.starts_with("--") || UNITLESS_STYLES.contains(&name) {
                Some(n.to_string())
            } else {
                Some(format!("{n}px"))
            }
        }
        _ => None,
    }
}

/// Serialize a style object into a `style` attribute value.
pub fn style_markup(style: &Props) -> Option<String> {
    let mut out = String::new();
    for (name, value) in style {
        let Some(value) = style_value(name, value) else {
            continue;
        };
        if !out.is_empty() {
            out.push(';');
        }
        out.push_str(&hyphenate_style_name(name));
        out.push(':');
        out.push_str(&value);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn attribute_markup(name: &str, value: &Value) -> Option<String> {
    if name == "style" {
        let Value::Object(style) = value else {
            return None;
        };
        return style_markup(style).map(|s| format!(" style=\"{}\"", escape_html(&s)));
    }
    let attr = attribute_name(name);
    if !is_safe_attribute_name(attr) {
        return None;
    }
    match value {
        Value::Bool(true) => Some(format!(" {attr}=\"\"")),
        Value::String(s) => Some(format!(" {attr}=\"{}\"", escape_html(s))),
        Value::Number(n) => Some(format!(" {attr}=\"{n}\"")),
        Value::Null | Value::Bool(false) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// HTML5 encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlEncoder;

impl MarkupEncoder for HtmlEncoder {
    fn open_tag(
        &self,
        tag: &str,
        props: &Props,
        namespace: Namespace,
    ) -> Result<String, MarkupError> {
        if !is_valid_tag(tag) {
            return Err(MarkupError::InvalidTag(tag.to_owned()));
        }
        let mut out = format!("<{tag}");
        for (name, value) in props {
            if RESERVED_PROPS.contains(&name.as_str()) {
                continue;
            }
            if let Some(attr) = attribute_markup(name, value) {
                out.push_str(&attr);
            }
        }
        if namespace == Namespace::Html && VOID_TAGS.contains(&tag) {
            out.push_str("/>");
        } else {
            out.push('>');
        }
        Ok(out)
    }

    fn close_tag(&self, tag: &str, namespace: Namespace) -> Option<String> {
        if namespace == Namespace::Html && VOID_TAGS.contains(&tag) {
            None
        } else {
            Some(format!("</{tag}>"))
        }
    }

    fn escape_text(&self, text: &str) -> String {
        escape_html(text)
    }

    fn inner_html<'a>(&self, props: &'a Props) -> Option<&'a str> {
        props
            .get("dangerouslySetInnerHTML")
            .and_then(|v| v.get("__html"))
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::into_props;
    use serde_json::json;

    fn open(tag: &str, props: Value) -> String {
        HtmlEncoder
            .open_tag(tag, &into_props(props), Namespace::Html)
            .unwrap()
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn maps_aliases_and_skips_reserved() {
        let markup = open(
            "label",
            json!({ "className": "a", "htmlFor": "b", "key": "k", "children": "x" }),
        );
        assert_eq!(markup, r#"<label class="a" for="b">"#);
    }

    #[test]
    fn boolean_attributes() {
        let markup = open("input", json!({ "disabled": true, "hidden": false }));
        assert_eq!(markup, r#"<input disabled=""/>"#);
        assert_eq!(HtmlEncoder.close_tag("input", Namespace::Html), None);
    }

    #[test]
    fn style_objects_are_hyphenated_with_units() {
        let markup = open(
            "div",
            json!({ "style": { "position": "relative", "height": 200, "zIndex": 3, "msTransform": "none" } }),
        );
        assert_eq!(
            markup,
            r#"<div style="height:200px;-ms-transform:none;position:relative;z-index:3">"#
        );
    }

    #[test]
    fn rejects_invalid_tags() {
        let err = HtmlEncoder
            .open_tag("bad tag", &Props::new(), Namespace::Html)
            .unwrap_err();
        assert_eq!(err, MarkupError::InvalidTag("bad tag".into()));
        assert!(is_valid_tag("font-face"));
        assert!(!is_valid_tag("1div"));
    }

    #[test]
    fn void_tags_close_normally_outside_html() {
        assert_eq!(
            HtmlEncoder.close_tag("image", Namespace::Svg),
            Some("</image>".into())
        );
        assert_eq!(
            HtmlEncoder.close_tag("img", Namespace::Svg),
            Some("</img>".into())
        );
    }

    #[test]
    fn namespace_transitions() {
        assert_eq!(Namespace::Html.for_children("svg"), Namespace::Svg);
        assert_eq!(Namespace::Svg.for_children("g"), Namespace::Svg);
        assert_eq!(Namespace::Svg.for_children("foreignObject"), Namespace::Html);
        assert_eq!(Namespace::Html.for_children("math"), Namespace::MathMl);
    }

    #[test]
    fn inner_html_reads_dunder_html() {
        let props = into_props(json!({ "dangerouslySetInnerHTML": { "__html": "<b>x</b>" } }));
        assert_eq!(HtmlEncoder.inner_html(&props), Some("<b>x</b>"));
    }

    #[test]
    fn numbers_format_like_a_browser() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }
}
