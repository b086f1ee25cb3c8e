// Namespace-free XML element tree
//
// Tag and attribute names are reduced to their local part while parsing, so
// `cap:event`, `{urn:oasis:names:tc:emergency:cap:1.1}event` and `event` are
// all looked up as "event".

use crate::error::ExtractionError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<XmlNode, ExtractionError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                ExtractionError::Malformed(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(ref e) => stack.push(open_node(e)?),
                Event::Empty(ref e) => {
                    let node = open_node(e)?;
                    attach(&mut stack, &mut root, node)?;
                },
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| {
                        ExtractionError::Malformed("unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, node)?;
                },
                Event::Text(ref e) => {
                    if let Some(node) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map(|t| t.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                        node.text.push_str(&text);
                    }
                },
                Event::CData(ref e) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(e));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }

        if !stack.is_empty() {
            return Err(ExtractionError::Malformed(format!(
                "document ended with {} unclosed element(s)",
                stack.len()
            )));
        }

        root.ok_or_else(|| ExtractionError::Malformed("document has no root element".to_string()))
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a chain of direct children
    pub fn path<S: AsRef<str>>(&self, path: &[S]) -> Option<&XmlNode> {
        path.iter()
            .try_fold(self, |node, name| node.child(name.as_ref()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every element with the given local name, in document order
    ///
    /// The search does not descend into a match.
    pub fn find_all(&self, name: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            } else {
                found.extend(child.find_all(name));
            }
        }
        found
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    // `{namespace}name` as some serializers emit it
    match name.rfind('}') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name.into_owned(),
    }
}

fn open_node(start: &BytesStart<'_>) -> Result<XmlNode, ExtractionError> {
    let mut node = XmlNode {
        name: local_name(start.local_name().as_ref()),
        ..XmlNode::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ExtractionError::Malformed(format!("bad attribute: {}", e)))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        node.attributes
            .push((local_name(attr.key.local_name().as_ref()), value));
    }

    Ok(node)
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), ExtractionError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        },
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        },
        None => Err(ExtractionError::Malformed(
            "document has more than one root element".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_stripped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.1">
            <entry><cap:event>Flood Warning</cap:event><link href="http://x/1"/></entry>
        </feed>"#;
        let root = XmlNode::parse(xml).unwrap();

        assert_eq!(root.name, "feed");
        assert!(root.attributes.is_empty());
        let entry = root.child("entry").unwrap();
        assert_eq!(entry.child("event").unwrap().text, "Flood Warning");
        assert_eq!(entry.child("link").unwrap().attribute("href"), Some("http://x/1"));
    }

    #[test]
    fn test_escaped_text_is_unescaped() {
        let root = XmlNode::parse("<r>&lt;data&gt;&lt;record id=&quot;1&quot;/&gt;&lt;/data&gt;</r>").unwrap();
        assert_eq!(root.text, r#"<data><record id="1"/></data>"#);

        let inner = XmlNode::parse(&root.text).unwrap();
        assert_eq!(inner.find_all("record")[0].attribute("id"), Some("1"));
    }

    #[test]
    fn test_path_and_find_all() {
        let root =
            XmlNode::parse("<a><b><c>1</c></b><b><c>2</c><c>3</c></b></a>").unwrap();
        assert_eq!(root.path(&["b", "c"]).unwrap().text, "1");
        assert!(root.path(&["b", "x"]).is_none());
        assert_eq!(root.find_all("c").len(), 3);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            XmlNode::parse("<a><b></a>"),
            Err(ExtractionError::Malformed(_))
        ));
        assert!(matches!(XmlNode::parse("<a>"), Err(ExtractionError::Malformed(_))));
        assert!(matches!(XmlNode::parse(""), Err(ExtractionError::Malformed(_))));
    }
}
