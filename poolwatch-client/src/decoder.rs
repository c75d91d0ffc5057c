//! Wire decoder for the scheduler's XML ad stream
//!
//! The query tools print zero or more banner lines followed by one or more
//! concatenated XML documents:
//!
//! ```text
//! <?xml version="1.0"?>
//! <!DOCTYPE classads SYSTEM "classads.dtd">
//! <classads>
//! <c>
//!    <a n="MyType"><s>Job</s></a>
//!    <a n="ClusterId"><i>100</i></a>
//!    <a n="ExitBySignal"><b v="f"/></a>
//!    <a n="TransferOutputRemaps"><un/></a>
//! </c>
//! </classads>
//! ```
//!
//! Everything from the first line starting with `<?xml` onwards is streamed
//! through a pull parser; all documents are flattened into a single list of
//! records. Input without any header decodes to an empty list.

use poolwatch_core::{Record, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;

/// Decode every ad in `input`
///
/// # Errors
/// Returns a [`ParseError`] for unknown elements, unparsable scalar text,
/// ill-formed XML, or a document that ends with elements still open.
pub fn decode(input: &str) -> Result<Vec<Record>, ParseError> {
    match find_document_start(input) {
        Some(start) => AdDecoder::default().run(&input[start..]),
        None => Ok(Vec::new()),
    }
}

/// Decode raw tool output, replacing invalid UTF-8
pub fn decode_bytes(input: &[u8]) -> Result<Vec<Record>, ParseError> {
    decode(&String::from_utf8_lossy(input))
}

/// Byte offset of the first line that starts an XML document
fn find_document_start(input: &str) -> Option<usize> {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if line.starts_with("<?xml") {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Scalar element kinds inside an `<a>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    String,
    Expression,
    Integer,
    Real,
    Bool,
    Undefined,
}

/// Elements of the ad grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Classads,
    Ad,
    Attribute,
    Scalar(ScalarKind),
}

impl Element {
    fn tag(&self) -> &'static str {
        match self {
            Element::Classads => "classads",
            Element::Ad => "c",
            Element::Attribute => "a",
            Element::Scalar(ScalarKind::String) => "s",
            Element::Scalar(ScalarKind::Expression) => "e",
            Element::Scalar(ScalarKind::Integer) => "i",
            Element::Scalar(ScalarKind::Real) => "r",
            Element::Scalar(ScalarKind::Bool) => "b",
            Element::Scalar(ScalarKind::Undefined) => "un",
        }
    }
}

/// Attribute being assembled
#[derive(Debug)]
struct PendingAttribute {
    name: String,
    kind: Option<ScalarKind>,
    text: String,
    inline_bool: Option<bool>,
}

impl PendingAttribute {
    fn into_value(self) -> Result<(String, Value), ParseError> {
        let value = match self.kind {
            None => Value::String(String::new()),
            Some(ScalarKind::String) | Some(ScalarKind::Expression) => {
                Value::String(self.text.replace("\\\"", "\""))
            }
            Some(ScalarKind::Integer) => {
                let text = self.text.trim();
                match text.parse::<i64>() {
                    Ok(i) => Value::Integer(i),
                    Err(_) => {
                        return Err(ParseError::InvalidInteger {
                            attribute: self.name,
                            text: text.to_string(),
                        });
                    }
                }
            }
            Some(ScalarKind::Real) => {
                let text = self.text.trim();
                match text.parse::<f64>() {
                    Ok(r) => Value::Real(r),
                    Err(_) => {
                        return Err(ParseError::InvalidReal {
                            attribute: self.name,
                            text: text.to_string(),
                        });
                    }
                }
            }
            Some(ScalarKind::Bool) => match self.inline_bool {
                Some(b) => Value::Bool(b),
                // Extended syntax: value is the first character of the text;
                // a bare `<b/>` is undefined
                None => match self.text.trim_start().chars().next() {
                    Some(c) => Value::Bool(is_true_char(c)),
                    None => Value::Undefined,
                },
            },
            Some(ScalarKind::Undefined) => Value::Undefined,
        };
        Ok((self.name, value))
    }
}

fn is_true_char(c: char) -> bool {
    matches!(c, 'T' | 't' | '1')
}

/// Streaming decoder state; one instance per `decode` call
#[derive(Debug, Default)]
struct AdDecoder {
    records: Vec<Record>,
    current: Option<Record>,
    attribute: Option<PendingAttribute>,
    open: Vec<Element>,
}

impl AdDecoder {
    fn run(mut self, document: &str) -> Result<Vec<Record>, ParseError> {
        let mut reader = Reader::from_str(document);

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| ParseError::Malformed {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => self.start(&e, position)?,
                Event::Empty(e) => {
                    self.start(&e, position)?;
                    self.end(position)?;
                }
                Event::End(_) => self.end(position)?,
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| ParseError::Malformed {
                        position,
                        message: err.to_string(),
                    })?;
                    self.text(&text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    self.text(&text);
                }
                Event::Eof => break,
                // Declarations, doctype, comments and processing instructions
                _ => {}
            }
        }

        if let Some(element) = self.open.last() {
            return Err(ParseError::Truncated(element.tag().to_string()));
        }

        Ok(self.records)
    }

    /// Handle an opening (or self-closing) tag
    fn start(&mut self, e: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        let element = match e.name().as_ref() {
            b"classads" => Element::Classads,
            b"c" => {
                self.current = Some(Record::new());
                Element::Ad
            }
            b"a" => {
                let name = attribute_value(e, b"n", position)?
                    .ok_or(ParseError::MissingName { position })?;
                self.attribute = Some(PendingAttribute {
                    name,
                    kind: None,
                    text: String::new(),
                    inline_bool: None,
                });
                Element::Attribute
            }
            b"s" => self.scalar(ScalarKind::String),
            b"e" => self.scalar(ScalarKind::Expression),
            b"i" => self.scalar(ScalarKind::Integer),
            b"r" => self.scalar(ScalarKind::Real),
            b"un" => self.scalar(ScalarKind::Undefined),
            b"b" => {
                let inline = attribute_value(e, b"v", position)?;
                if let Some(pending) = self.attribute.as_mut() {
                    pending.inline_bool = inline
                        .and_then(|v| v.chars().next())
                        .map(is_true_char);
                }
                self.scalar(ScalarKind::Bool)
            }
            other => {
                return Err(ParseError::UnknownElement(
                    String::from_utf8_lossy(other).into_owned(),
                ));
            }
        };

        self.open.push(element);
        Ok(())
    }

    fn scalar(&mut self, kind: ScalarKind) -> Element {
        if let Some(pending) = self.attribute.as_mut() {
            pending.kind = Some(kind);
        }
        Element::Scalar(kind)
    }

    /// Close the innermost open element
    fn end(&mut self, position: u64) -> Result<(), ParseError> {
        let element = self.open.pop().ok_or_else(|| ParseError::Malformed {
            position,
            message: "closing tag without matching opening tag".to_string(),
        })?;

        match element {
            Element::Ad => {
                if let Some(record) = self.current.take() {
                    self.records.push(record);
                }
            }
            Element::Attribute => {
                if let Some(pending) = self.attribute.take() {
                    let (name, value) = pending.into_value()?;
                    if let Some(record) = self.current.as_mut() {
                        record.insert(name, value);
                    }
                }
            }
            Element::Classads | Element::Scalar(_) => {}
        }

        Ok(())
    }

    fn text(&mut self, text: &str) {
        // Only text directly inside a scalar element carries a value
        if !matches!(self.open.last(), Some(Element::Scalar(_))) {
            return;
        }
        if let Some(pending) = self.attribute.as_mut() {
            pending.text.push_str(text);
        }
    }
}

fn attribute_value(
    e: &BytesStart<'_>,
    name: &[u8],
    position: u64,
) -> Result<Option<String>, ParseError> {
    let attr = e.try_get_attribute(name).map_err(|err| ParseError::Malformed {
        position,
        message: err.to_string(),
    })?;

    match attr {
        Some(attr) => {
            let value = attr.unescape_value().map_err(|err| ParseError::Malformed {
                position,
                message: err.to_string(),
            })?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_JOBS: &str = r#"<?xml version="1.0"?>
<!DOCTYPE classads SYSTEM "classads.dtd">
<classads>
<c>
    <a n="MyType"><s>Job</s></a>
    <a n="ClusterId"><i>100</i></a>
    <a n="ProcId"><i>0</i></a>
    <a n="ExitBySignal"><b v="f"/></a>
    <a n="TransferOutputRemaps"><un/></a>
    <a n="ImageSize"><r>1.500000E+01</r></a>
</c>
<c>
    <a n="MyType"><s>Job</s></a>
    <a n="ClusterId"><i>100</i></a>
    <a n="ProcId"><i>1</i></a>
    <a n="OnExitRemove"><b v="t"/></a>
    <a n="Args"><s>say \"hi\" &amp; exit</s></a>
</c>
</classads>
"#;

    #[test]
    fn test_decode_scalar_types() {
        let records = decode(TWO_JOBS).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first["MyType"], Value::from("Job"));
        assert_eq!(first["ClusterId"], Value::Integer(100));
        assert_eq!(first["ExitBySignal"], Value::Bool(false));
        assert_eq!(first["TransferOutputRemaps"], Value::Undefined);
        assert_eq!(first["ImageSize"], Value::Real(15.0));

        let second = &records[1];
        assert_eq!(second["OnExitRemove"], Value::Bool(true));
        assert_eq!(second["Args"], Value::from("say \"hi\" & exit"));
    }

    #[test]
    fn test_skips_banner_lines() {
        let input = format!("-- Schedd: schedd@node01 : <10.0.0.1:9618>\n\n{}", TWO_JOBS);
        let records = decode(&input).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_no_header_is_empty() {
        let records = decode("-- Failed to fetch ads\nAll queues are empty\n").unwrap();
        assert!(records.is_empty());
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_concatenated_documents_are_flattened() {
        let input = format!("{}{}", TWO_JOBS, TWO_JOBS);
        let records = decode(&input).unwrap();
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn test_bool_from_text() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="Flag"><b>true</b></a><a n="Other"><b>0</b></a></c></classads>"#;
        let records = decode(input).unwrap();
        assert_eq!(records[0]["Flag"], Value::Bool(true));
        assert_eq!(records[0]["Other"], Value::Bool(false));
    }

    #[test]
    fn test_bool_without_value_is_undefined() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="Flag"><b/></a><a n="Blank"><b> </b></a><a n="Set"><b v="t"/></a></c></classads>"#;
        let records = decode(input).unwrap();
        assert_eq!(records[0]["Flag"], Value::Undefined);
        assert_eq!(records[0]["Blank"], Value::Undefined);
        assert_eq!(records[0]["Set"], Value::Bool(true));
    }

    #[test]
    fn test_expression_kept_as_text() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="Requirements"><e>(Arch == "X86_64")</e></a></c></classads>"#;
        let records = decode(input).unwrap();
        assert_eq!(records[0]["Requirements"], Value::from("(Arch == \"X86_64\")"));
    }

    #[test]
    fn test_unknown_element_is_error() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="X"><list>1</list></a></c></classads>"#;
        let err = decode(input).unwrap_err();
        assert!(matches!(err, ParseError::UnknownElement(ref name) if name == "list"));
    }

    #[test]
    fn test_invalid_integer_is_error() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="ClusterId"><i>abc</i></a></c></classads>"#;
        let err = decode(input).unwrap_err();
        assert!(matches!(err, ParseError::InvalidInteger { .. }));
    }

    #[test]
    fn test_truncated_document_is_error() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="ClusterId"><i>1</i></a>"#;
        assert!(decode(input).is_err());
    }

    #[test]
    fn test_missing_attribute_name_is_error() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a><i>1</i></a></c></classads>"#;
        let err = decode(input).unwrap_err();
        assert!(matches!(err, ParseError::MissingName { .. }));
    }

    #[test]
    fn test_empty_string_value() {
        let input = r#"<?xml version="1.0"?>
<classads><c><a n="Empty"><s></s></a><a n="Short"><s/></a></c></classads>"#;
        let records = decode(input).unwrap();
        assert_eq!(records[0]["Empty"], Value::from(""));
        assert_eq!(records[0]["Short"], Value::from(""));
    }
}
