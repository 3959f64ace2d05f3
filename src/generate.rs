use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::docx::package::{DocxPackage, DOCUMENT_PART};
use crate::docx::substitute::{substitute_in_part, SubstitutionReport};
use crate::docx::xml::{parse_xml_part, verify_structure_unchanged, write_xml_part};
use crate::mapping::{build_replacement_map, ReplacementMap};
use crate::progress::{GenerateEvent, ProgressSink};
use crate::table::Row;

static UNSAFE_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("filename chars"));

/// A loaded template, shared read-only across all rows. The package is read
/// from disk exactly once; each row re-parses the cached document part, since
/// substitution is destructive to the parsed events.
pub struct Template {
    pkg: DocxPackage,
    document_xml: Vec<u8>,
}

impl Template {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let pkg = DocxPackage::read(path)?;
        let document_xml = pkg
            .entry_bytes(DOCUMENT_PART)
            .with_context(|| format!("template has no {DOCUMENT_PART}: {}", path.display()))?
            .to_vec();
        // Surface a malformed template before any row work starts.
        parse_xml_part(DOCUMENT_PART, &document_xml).context("parse template document part")?;
        Ok(Self { pkg, document_xml })
    }

    /// Produces one populated `.docx` for a row's replacement map.
    pub fn render(&self, map: &ReplacementMap) -> anyhow::Result<(Vec<u8>, SubstitutionReport)> {
        let mut part = parse_xml_part(DOCUMENT_PART, &self.document_xml)?;
        let report = substitute_in_part(&mut part, map);
        verify_structure_unchanged(&part)?;

        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), write_xml_part(&part)?);
        let bytes = self.pkg.to_bytes_with_replacements(&replacements)?;
        Ok((bytes, report))
    }

    /// Parse + re-serialize without substitution, for `--roundtrip-only`.
    pub fn roundtrip_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let part = parse_xml_part(DOCUMENT_PART, &self.document_xml)?;
        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), write_xml_part(&part)?);
        self.pkg.to_bytes_with_replacements(&replacements)
    }
}

#[derive(Clone, Debug)]
pub struct GenerateOptions {
    /// Worker threads: 1 = sequential, 0 = one per core.
    pub jobs: usize,
    /// Filename prefix for rows with no learner name or registration number.
    pub fallback_prefix: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            fallback_prefix: "output".to_string(),
        }
    }
}

pub struct GeneratedDocument {
    pub index: usize,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub unresolved: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RowFailure {
    pub index: usize,
    pub error: String,
}

pub struct BatchOutcome {
    /// In input-row order; failed rows are absent here and listed below.
    pub documents: Vec<GeneratedDocument>,
    pub failures: Vec<RowFailure>,
    pub total_rows: usize,
}

/// Output filenames, assigned sequentially in input order before any fan-out
/// so the result is identical for every `jobs` value. A base name already
/// used in the run gets `_{index+1}` appended; row indexes make that unique.
pub fn assign_filenames(rows: &[Row], fallback_prefix: &str) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut filenames = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let name = row.field("Learner Name").trim();
        let reg = row.field("Learner Registration Number").trim();
        let mut base = sanitize_base_name(&format!("{name} {reg}"));
        if base.is_empty() {
            base = format!("{fallback_prefix}_{}", index + 1);
        }
        if !used.insert(base.clone()) {
            base = format!("{base}_{}", index + 1);
            used.insert(base.clone());
        }
        filenames.push(format!("{base}.docx"));
    }
    filenames
}

fn sanitize_base_name(raw: &str) -> String {
    UNSAFE_FILENAME_RE
        .replace_all(raw.trim(), "_")
        .into_owned()
}

/// Runs the batch: one populated document per row, per-row errors isolated
/// and reported through the sink, never aborting the remaining rows. Rows are
/// independent, so with `jobs != 1` they are fanned out across a bounded
/// worker pool; results keep their originating row index and are returned in
/// input order either way.
pub fn generate_documents(
    template: &Template,
    rows: &[Row],
    options: &GenerateOptions,
    sink: &dyn ProgressSink,
) -> anyhow::Result<BatchOutcome> {
    let filenames = assign_filenames(rows, &options.fallback_prefix);
    sink.event(GenerateEvent::Start {
        total_rows: rows.len(),
    });

    let process_row = |index: usize| -> Result<GeneratedDocument, RowFailure> {
        let row = &rows[index];
        sink.event(GenerateEvent::RowStart { index, row });
        let map = build_replacement_map(row);
        match template.render(&map) {
            Ok((bytes, report)) => {
                sink.event(GenerateEvent::RowDone {
                    index,
                    filename: &filenames[index],
                });
                Ok(GeneratedDocument {
                    index,
                    filename: filenames[index].clone(),
                    bytes,
                    unresolved: report.unresolved,
                })
            }
            Err(err) => {
                let error = format!("{err:#}");
                sink.event(GenerateEvent::RowError {
                    index,
                    error: &error,
                });
                Err(RowFailure { index, error })
            }
        }
    };

    let results: Vec<Result<GeneratedDocument, RowFailure>> = if options.jobs == 1 {
        (0..rows.len()).map(process_row).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
            .context("build worker pool")?;
        pool.install(|| (0..rows.len()).into_par_iter().map(process_row).collect())
    };

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(doc) => documents.push(doc),
            Err(failure) => failures.push(failure),
        }
    }

    sink.event(GenerateEvent::Complete {
        generated: documents.len(),
        total_rows: rows.len(),
    });
    Ok(BatchOutcome {
        documents,
        failures,
        total_rows: rows.len(),
    })
}

pub fn write_documents_to_dir(outcome: &BatchOutcome, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create output dir: {}", dir.display()))?;
    for doc in &outcome.documents {
        let path = dir.join(&doc.filename);
        fs::write(&path, &doc.bytes).with_context(|| format!("write: {}", path.display()))?;
    }
    Ok(())
}

pub fn write_zip_bundle(outcome: &BatchOutcome, path: &Path) -> anyhow::Result<()> {
    let f = fs::File::create(path).with_context(|| format!("create bundle: {}", path.display()))?;
    let mut zout = ZipWriter::new(f);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for doc in &outcome.documents {
        zout.start_file(doc.filename.as_str(), opts)
            .with_context(|| format!("start bundle entry: {}", doc.filename))?;
        zout.write_all(&doc.bytes)
            .with_context(|| format!("write bundle entry: {}", doc.filename))?;
    }
    zout.finish().context("finish bundle")?;
    Ok(())
}
