use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::errors::TransformError;
use crate::model::{ExtractedDocument, InstrumentField, InstrumentRecord, IssuerValue};

/// Namespace of the auth.036 financial instrument reporting schema.
pub const FIRDS_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:auth.036.001.02";

const ATTRIBUTES_ELEMENT: &[u8] = b"FinInstrmGnlAttrbts";
const ISSUER_ELEMENT: &[u8] = b"Issr";

pub fn extract_file(path: &Path) -> Result<ExtractedDocument, TransformError> {
    let file = File::open(path).map_err(|source| TransformError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    extract(BufReader::new(file), path)
}

pub fn extract_str(xml: &str) -> Result<ExtractedDocument, TransformError> {
    extract(xml.as_bytes(), Path::new("<inline>"))
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Other,
    Attributes { record: usize },
    Field { record: usize, field: InstrumentField },
    Issuer { issuer: usize },
}

#[derive(Debug)]
struct Frame {
    id: usize,
    name: String,
    kind: FrameKind,
    saw_child: bool,
    text: String,
}

impl Frame {
    fn captures_text(&self) -> bool {
        !self.saw_child && matches!(self.kind, FrameKind::Field { .. } | FrameKind::Issuer { .. })
    }
}

/// Single forward pass over the document. Elements are numbered in start-tag
/// order so records and issuers can later be matched by parent element.
#[derive(Debug, Default)]
struct Extractor {
    document: ExtractedDocument,
    stack: Vec<Frame>,
    next_id: usize,
    seen_root: bool,
}

impl Extractor {
    fn open(&mut self, in_namespace: bool, local: &[u8]) -> Result<(), String> {
        if self.stack.is_empty() && self.seen_root {
            return Err("content after the document element".into());
        }
        self.seen_root = true;

        self.next_id += 1;
        let id = self.next_id;
        let parent = self.stack.last_mut();
        let parent_id = parent.as_ref().map(|frame| frame.id).unwrap_or(0);
        let parent_kind = parent.as_ref().map(|frame| frame.kind);
        if let Some(frame) = parent {
            frame.saw_child = true;
        }

        let kind = match parent_kind {
            None => FrameKind::Other,
            Some(parent_kind) if in_namespace => self.classify(parent_kind, local, id, parent_id),
            Some(_) => FrameKind::Other,
        };

        self.stack.push(Frame {
            id,
            name: String::from_utf8_lossy(local).into_owned(),
            kind,
            saw_child: false,
            text: String::new(),
        });
        Ok(())
    }

    fn classify(&mut self, parent: FrameKind, local: &[u8], id: usize, parent_id: usize) -> FrameKind {
        if let FrameKind::Attributes { record } = parent {
            if let Some(field) = InstrumentField::from_element_name(local) {
                return FrameKind::Field { record, field };
            }
        }

        if local == ATTRIBUTES_ELEMENT {
            self.document.instruments.push(InstrumentRecord {
                element: id,
                parent: parent_id,
                ..InstrumentRecord::default()
            });
            return FrameKind::Attributes {
                record: self.document.instruments.len() - 1,
            };
        }

        if local == ISSUER_ELEMENT {
            self.document.issuers.push(IssuerValue {
                value: String::new(),
                parent: parent_id,
            });
            return FrameKind::Issuer {
                issuer: self.document.issuers.len() - 1,
            };
        }

        FrameKind::Other
    }

    fn text(&mut self, text: &str) -> Result<(), String> {
        match self.stack.last_mut() {
            Some(frame) if frame.captures_text() => frame.text.push_str(text),
            Some(_) => {}
            None if text.trim().is_empty() => {}
            None => return Err("text outside the document element".into()),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), String> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| "closing tag without matching opening tag".to_string())?;

        match frame.kind {
            FrameKind::Field { record, field } => {
                self.document.instruments[record].set_if_absent(field, frame.text.trim().to_string());
            }
            FrameKind::Issuer { issuer } => {
                self.document.issuers[issuer].value = frame.text.trim().to_string();
            }
            FrameKind::Attributes { .. } | FrameKind::Other => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<ExtractedDocument, String> {
        if let Some(frame) = self.stack.last() {
            return Err(format!("document ended inside <{}>", frame.name));
        }
        if !self.seen_root {
            return Err("no document element found".into());
        }
        Ok(self.document)
    }
}

fn extract<R: BufRead>(input: R, path: &Path) -> Result<ExtractedDocument, TransformError> {
    let mut reader = NsReader::from_reader(input);
    let mut extractor = Extractor::default();
    let mut buf = Vec::new();

    let structure = |message: String| TransformError::Structure {
        path: path.to_path_buf(),
        message,
    };

    loop {
        let event = match reader.read_resolved_event_into(&mut buf) {
            Ok((namespace, event)) => {
                let in_namespace = match namespace {
                    ResolveResult::Bound(Namespace(uri)) => uri == FIRDS_NAMESPACE.as_bytes(),
                    ResolveResult::Unbound => false,
                    ResolveResult::Unknown(prefix) => {
                        return Err(structure(format!(
                            "unbound namespace prefix '{}'",
                            String::from_utf8_lossy(&prefix)
                        )));
                    }
                };
                (in_namespace, event)
            }
            Err(source) => {
                return Err(TransformError::Xml {
                    path: path.to_path_buf(),
                    position: reader.error_position() as u64,
                    source,
                });
            }
        };

        match event {
            (in_namespace, Event::Start(start)) => {
                extractor
                    .open(in_namespace, start.local_name().as_ref())
                    .map_err(structure)?;
            }
            (in_namespace, Event::Empty(start)) => {
                extractor
                    .open(in_namespace, start.local_name().as_ref())
                    .map_err(structure)?;
                extractor.close().map_err(structure)?;
            }
            (_, Event::End(_)) => extractor.close().map_err(structure)?,
            (_, Event::Text(text)) => {
                let unescaped = text.unescape().map_err(|source| TransformError::Xml {
                    path: path.to_path_buf(),
                    position: reader.buffer_position() as u64,
                    source,
                })?;
                extractor.text(&unescaped).map_err(structure)?;
            }
            (_, Event::CData(data)) => {
                extractor
                    .text(&String::from_utf8_lossy(&data))
                    .map_err(structure)?;
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    extractor.finish().map_err(structure)
}
