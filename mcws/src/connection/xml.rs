//! Parsing of MCWS XML responses.
//!
//! MCWS answers most requests with a document of the form
//! ```xml
//! <Response Status="OK">
//!     <Item Name="...">...</Item>
//! </Response>
//! ```
//! The documents are small, so they are parsed eagerly into an owned [`Element`] tree, which the
//! connection then flattens into whichever shape the caller asked for.

use super::Items;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// A parsed XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Look up an attribute of this element.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Does this element carry `Status="OK"`?
    pub fn is_ok(&self) -> bool {
        self.attribute("Status") == Some("OK")
    }

    /// The first child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// The children of this element keyed by their `Name` attribute.
    ///
    /// Children without a `Name` are skipped. If a name repeats, the last value wins.
    pub fn items(&self) -> Items {
        self.children
            .iter()
            .filter_map(|child| {
                let Some(name) = child.attribute("Name") else {
                    tracing::debug!("skipping unnamed <{}> element", child.name);
                    return None;
                };
                Some((name.to_string(), child.text.clone()))
            })
            .collect()
    }

    /// The text of each child of this element.
    pub fn values(&self) -> Vec<String> {
        self.children
            .iter()
            .map(|child| child.text.clone())
            .collect()
    }

    fn open(start: &BytesStart) -> Result<Self, String> {
        let mut attributes = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| err.to_string())?;
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            attributes.insert(
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value.into_owned(),
            );
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }
}

/// Parse an XML document into its root element.
pub fn parse(content: &str) -> Result<Element, String> {
    // Item text is kept verbatim.
    let mut reader = Reader::from_str(content);

    // Elements which have been opened but not yet closed. Once the root closes we are done.
    let mut open: Vec<Element> = vec![];
    loop {
        let closed = match reader.read_event().map_err(|err| err.to_string())? {
            Event::Start(start) => {
                open.push(Element::open(&start)?);
                continue;
            }
            Event::Empty(start) => Element::open(&start)?,
            Event::End(_) => {
                let mut element = open
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                // Indentation between child elements is not content.
                if !element.children.is_empty() && element.text.trim().is_empty() {
                    element.text.clear();
                }
                element
            }
            Event::Text(text) => {
                if let Some(element) = open.last_mut() {
                    let text = text.unescape().map_err(|err| err.to_string())?;
                    element.text.push_str(&text);
                }
                continue;
            }
            Event::CData(data) => {
                if let Some(element) = open.last_mut() {
                    element
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
                continue;
            }
            Event::Eof => return Err("document has no root element".into()),
            _ => continue,
        };
        match open.last_mut() {
            Some(parent) => parent.children.push(closed),
            None => return Ok(closed),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_items() {
        let root = parse(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>
<Response Status="OK">
<Item Name="ZoneName0">Family &amp; Friends</Item>
<Item Name="ZoneID0">10081</Item>
<Item Name="Empty"></Item>
</Response>"#,
        )
        .unwrap();
        assert!(root.is_ok());
        assert_eq!(root.name, "Response");

        let items = root.items();
        assert_eq!(
            items.keys().collect::<Vec<_>>(),
            ["ZoneName0", "ZoneID0", "Empty"]
        );
        assert_eq!(items["ZoneName0"], "Family & Friends");
        assert_eq!(items["ZoneID0"], "10081");
        assert_eq!(items["Empty"], "");

        assert_eq!(root.values(), ["Family & Friends", "10081", ""]);
    }

    #[test]
    fn test_parse_preserves_whitespace() {
        let root = parse(
            r#"<Response Status="OK">
    <Item Name="Filename">  C:\a b.flac  </Item>
    <Item Name="Separator"> ; </Item>
    <Item Name="Blank">   </Item>
</Response>"#,
        )
        .unwrap();
        assert_eq!(root.text, "");
        let items = root.items();
        assert_eq!(items["Filename"], "  C:\\a b.flac  ");
        assert_eq!(items["Separator"], " ; ");
        assert_eq!(items["Blank"], "   ");
    }

    #[test]
    fn test_parse_empty_root() {
        let root = parse(r#"<Response Status="Failure"/>"#).unwrap();
        assert!(!root.is_ok());
        assert!(root.children.is_empty());
        assert!(root.items().is_empty());
    }

    #[test]
    fn test_parse_nested() {
        let root = parse(
            r#"<Response Status="OK">
<Fields>
<Field Name="Filename" DataType="Path" EditType="Filename" DisplayName="Filename"/>
<Field Name="Artist" DataType="List" EditType="Standard" DisplayName="Artist"/>
</Fields>
</Response>"#,
        )
        .unwrap();
        let fields = root.child("Fields").unwrap();
        assert_eq!(fields.children.len(), 2);
        assert_eq!(fields.children[1].attribute("DataType"), Some("List"));
        assert_eq!(fields.children[1].attribute("Missing"), None);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("").is_err());
        assert!(parse("not xml at all").is_err());
        assert!(parse(r#"<Response Status="OK"><Item>"#).is_err());
    }
}
