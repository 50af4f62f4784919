//! XML generation helpers for the EPUB package, container and navigation
//! documents.

/// XML declaration for generated documents.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Simple indenting XML builder for OPF, nav and container.xml files.
pub struct XmlBuilder {
    content: String,
    indent_level: usize,
}

impl XmlBuilder {
    pub fn new() -> Self {
        let mut content = String::from(XML_DECLARATION);
        content.push('\n');
        Self {
            content,
            indent_level: 0,
        }
    }

    /// Builder without the XML declaration, for markup embedded in a
    /// larger document.
    pub fn fragment() -> Self {
        Self {
            content: String::new(),
            indent_level: 0,
        }
    }

    pub fn open_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.start(name, attrs);
        self.content.push_str(">\n");
        self.indent_level += 1;
        self
    }

    pub fn close_tag(&mut self, name: &str) -> &mut Self {
        self.indent_level = self.indent_level.saturating_sub(1);
        self.indent();
        self.content.push_str("</");
        self.content.push_str(name);
        self.content.push_str(">\n");
        self
    }

    pub fn empty_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.start(name, attrs);
        self.content.push_str("/>\n");
        self
    }

    pub fn text_element(&mut self, name: &str, text: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.start(name, attrs);
        self.content.push('>');
        self.content.push_str(&escape_xml_text(text));
        self.content.push_str("</");
        self.content.push_str(name);
        self.content.push_str(">\n");
        self
    }

    pub fn build(self) -> String {
        self.content
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.content.push('<');
        self.content.push_str(name);
        for (key, value) in attrs {
            self.content.push(' ');
            self.content.push_str(key);
            self.content.push_str("=\"");
            self.content.push_str(&escape_xml_attr(value));
            self.content.push('"');
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.indent_level {
            self.content.push_str("  ");
        }
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an EPUB 3 XHTML content document.
///
/// `style` is inlined into a `<style>` element in the head when given.
pub fn xhtml_document(title: &str, lang: &str, style: Option<&str>, body: &str) -> String {
    let mut s = String::with_capacity(512 + body.len());
    s.push_str(XML_DECLARATION);
    s.push_str("\n<!DOCTYPE html>\n");
    s.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"");
    s.push_str(&escape_xml_attr(lang));
    s.push_str("\" lang=\"");
    s.push_str(&escape_xml_attr(lang));
    s.push_str("\">\n<head>\n  <meta charset=\"utf-8\"/>\n  <title>");
    s.push_str(&escape_xml_text(title));
    s.push_str("</title>\n");
    if let Some(css) = style {
        s.push_str("  <style>");
        s.push_str(css);
        s.push_str("</style>\n");
    }
    s.push_str("</head>\n<body>\n");
    s.push_str(body);
    s.push_str("\n</body>\n</html>\n");
    s
}

/// Escape special characters in XML text content.
pub fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape special characters in XML attribute values.
pub fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
