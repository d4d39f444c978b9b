use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Default)]
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

#[derive(Debug)]
pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        let mut zip = ZipArchive::new(f).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Adds (or replaces) a deflated part.
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        if let Some(ent) = self.entries.iter_mut().find(|e| e.name == name) {
            ent.data = data;
            return;
        }
        self.entries.push(DocxEntry {
            name: name.to_string(),
            data,
            compression: CompressionMethod::Deflated,
        });
    }

    pub fn write(&self, output_path: &Path) -> anyhow::Result<()> {
        let f = File::create(output_path)
            .with_context(|| format!("create output docx: {}", output_path.display()))?;
        self.write_to(f)
    }

    pub fn write_to<W: Write + Seek>(&self, sink: W) -> anyhow::Result<()> {
        let mut zout = ZipWriter::new(sink);
        for ent in &self.entries {
            let opts = SimpleFileOptions::default().compression_method(ent.compression);
            zout.start_file(ent.name.as_str(), opts)
                .with_context(|| format!("start zip file: {}", ent.name))?;
            zout.write_all(&ent.data)
                .with_context(|| format!("write zip file: {}", ent.name))?;
        }
        zout.finish().context("finish zip")?;
        Ok(())
    }
}
