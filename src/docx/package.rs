use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// The single part the substitution engine edits.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// A DOCX package held fully in memory.
///
/// The template is read once and shared read-only across all rows; per-row
/// output is produced by re-serializing the package with the document part
/// swapped out. Every other entry is carried through byte-for-byte with its
/// original compression method, timestamp and permissions.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        let mut zip = ZipArchive::new(f).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entry_bytes(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Serializes the package to an in-memory `.docx`, substituting entry
    /// bytes by name. The row driver uses this to get `(filename, bytes)`
    /// artifacts without touching the filesystem.
    pub fn to_bytes_with_replacements(
        &self,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<Vec<u8>> {
        let cursor = self.write_entries(Cursor::new(Vec::new()), replacements)?;
        Ok(cursor.into_inner())
    }

    pub fn write_with_replacements(
        &self,
        output_path: &Path,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<()> {
        let f = File::create(output_path)
            .with_context(|| format!("create output docx: {}", output_path.display()))?;
        self.write_entries(f, replacements)?;
        Ok(())
    }

    fn write_entries<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<W> {
        let mut zout = ZipWriter::new(writer);
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        zout.finish().context("finish zip")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Read, Write};

    use zip::write::SimpleFileOptions;
    use zip::{ZipArchive, ZipWriter};

    use super::{DocxPackage, DOCUMENT_PART};

    fn minimal_docx(document_xml: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let mut zout = ZipWriter::new(file.reopen().expect("reopen"));
        zout.start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .expect("start file");
        zout.write_all(document_xml.as_bytes()).expect("write");
        zout.finish().expect("finish");
        file
    }

    #[test]
    fn roundtrip_with_replacement_swaps_only_named_entry() {
        let file = minimal_docx("<w:document/>");
        let pkg = DocxPackage::read(file.path()).expect("read docx");
        assert_eq!(pkg.entry_bytes(DOCUMENT_PART), Some("<w:document/>".as_bytes()));

        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), b"<w:other/>".to_vec());
        let bytes = pkg
            .to_bytes_with_replacements(&replacements)
            .expect("serialize");

        let mut zip = ZipArchive::new(Cursor::new(bytes)).expect("reopen zip");
        let mut out = String::new();
        zip.by_name(DOCUMENT_PART)
            .expect("document part")
            .read_to_string(&mut out)
            .expect("read part");
        assert_eq!(out, "<w:other/>");
    }
}
