pub mod builder;
pub mod document;
pub mod package;
pub mod xml;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
