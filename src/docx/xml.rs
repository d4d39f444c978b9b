use anyhow::Context;
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

/// Attribute values are held in their escaped form, as they appear in the
/// markup. The constructors take plain values and escape them.
impl XmlEvent {
    pub fn start(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Start {
            name: name.to_string(),
            attrs: owned_attrs(attrs),
        }
    }

    pub fn empty(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Empty {
            name: name.to_string(),
            attrs: owned_attrs(attrs),
        }
    }

    pub fn end(name: &str) -> Self {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        XmlEvent::Text {
            text: text.to_string(),
        }
    }
}

fn owned_attrs(attrs: &[(&str, &str)]) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|(k, v)| (k.to_string(), escape(*v).into_owned()))
        .collect()
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                let txt = bytes_to_string(t.into_inner());
                events.push(XmlEvent::Text { text: txt });
            }
            // Comments, processing instructions and doctypes carry no content.
            _ => {}
        }
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        // Raw (still escaped) bytes; write_xml_part emits them back untouched.
        let val = bytes_to_string(a.value.as_ref());
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Reads an OOXML on/off property such as `<w:b/>` or `<w:b w:val="0"/>`.
pub fn parse_w_bool(attrs: &[(String, String)]) -> bool {
    if let Some(v) = find_attr(attrs, "w:val") {
        let s = v.trim().to_ascii_lowercase();
        return !(s == "0" || s == "false" || s == "off" || s == "none");
    }
    true
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn escape_text_into(out: &mut Vec<u8>, text: &str) {
        for ch in text.chars() {
            match ch {
                '&' => out.extend_from_slice(b"&amp;"),
                '<' => out.extend_from_slice(b"&lt;"),
                '>' => out.extend_from_slice(b"&gt;"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.extend_from_slice(b"<");
        out.extend_from_slice(name.as_bytes());
        // Attribute values are stored as raw (already-escaped) XML bytes. Do NOT escape again.
        for (k, v) in attrs {
            out.extend_from_slice(b" ");
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.extend_from_slice(b">");
        }
    }

    for ev in &part.events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => {
                write_start_like(&mut out, name, attrs, false);
            }
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            XmlEvent::Empty { name, attrs } => {
                write_start_like(&mut out, name, attrs, true);
            }
            XmlEvent::Text { text } => {
                escape_text_into(&mut out, text);
            }
        }
    }

    Ok(out)
}
