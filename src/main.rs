use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};

use marksheet_merge::config::{find_default_config, init_default_config, load_config, AppConfig};
use marksheet_merge::generate::{
    assign_filenames, generate_documents, write_documents_to_dir, write_zip_bundle,
    GenerateOptions, Template,
};
use marksheet_merge::mapping::build_replacement_map;
use marksheet_merge::progress::ConsoleProgress;
use marksheet_merge::table::read_table;

#[derive(Parser, Debug)]
#[command(name = "marksheet-merge")]
#[command(about = "Fill a DOCX assessment template from a marksheet table (.xlsx/.csv)", long_about = None)]
struct Args {
    /// Input marksheet table (.xlsx or .csv)
    #[arg(value_name = "TABLE")]
    input: Option<PathBuf>,

    /// Template .docx with bracketed placeholders in table cells
    #[arg(short, long, value_name = "DOCX")]
    template: Option<PathBuf>,

    /// Output directory for generated documents (default: <table_dir>/output)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Bundle generated documents into one zip instead of a directory.
    /// Without a path, the bundle lands next to the input table.
    #[arg(long, value_name = "ZIP", num_args = 0..=1)]
    zip: Option<Option<PathBuf>>,

    /// Worker threads for row processing (1 = sequential, 0 = one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Config file path (default: search for marksheet-merge.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Write per-row replacement maps as JSON, then exit (no documents)
    #[arg(long, value_name = "JSON")]
    dump_map_json: Option<PathBuf>,

    /// Only parse + re-serialize the template (no substitution)
    #[arg(long)]
    roundtrip_only: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(template_path) = args.template.clone() else {
        return print_usage();
    };

    if args.roundtrip_only {
        let template = Template::load(&template_path)?;
        let stem = template_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template");
        let out_path = template_path.with_file_name(format!("{stem}_roundtrip.docx"));
        std::fs::write(&out_path, template.roundtrip_bytes()?)
            .with_context(|| format!("write: {}", out_path.display()))?;
        progress.info(format!("roundtrip ok: {}", out_path.display()));
        return Ok(());
    }

    let Some(input) = args.input.clone() else {
        return print_usage();
    };

    let cfg = resolve_config(&args, &input)?;
    let options = GenerateOptions {
        jobs: args.jobs.or(cfg.generate.jobs).unwrap_or(1),
        fallback_prefix: cfg
            .naming
            .fallback_prefix
            .clone()
            .unwrap_or_else(|| "output".to_string()),
    };
    let warn_unresolved = cfg.generate.warn_unresolved.unwrap_or(true);

    let rows = read_table(&input)?;

    if let Some(json_path) = args.dump_map_json.clone() {
        let filenames = assign_filenames(&rows, &options.fallback_prefix);
        let dump: Vec<serde_json::Value> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                serde_json::json!({
                    "index": index,
                    "filename": filenames[index],
                    "map": build_replacement_map(row),
                })
            })
            .collect();
        let f = std::fs::File::create(&json_path)
            .with_context(|| format!("create: {}", json_path.display()))?;
        serde_json::to_writer_pretty(f, &dump).context("write map json")?;
        progress.info(format!("wrote replacement maps: {}", json_path.display()));
        return Ok(());
    }

    let template = Template::load(&template_path)?;
    let outcome = generate_documents(&template, &rows, &options, &progress)?;

    if warn_unresolved {
        for doc in &outcome.documents {
            if !doc.unresolved.is_empty() {
                progress.info(format!(
                    "warning: {} has unreplaced token(s): {}",
                    doc.filename,
                    doc.unresolved.join(", ")
                ));
            }
        }
    }

    match args.zip {
        Some(zip_arg) => {
            let zip_path = zip_arg.unwrap_or_else(|| {
                let name = cfg
                    .generate
                    .zip_name
                    .clone()
                    .unwrap_or_else(|| "generated_docs.zip".to_string());
                input.with_file_name(name)
            });
            write_zip_bundle(&outcome, &zip_path)?;
            progress.info(format!(
                "bundled {} document(s) into {}",
                outcome.documents.len(),
                zip_path.display()
            ));
        }
        None => {
            let out_dir = args.output_dir.clone().unwrap_or_else(|| {
                input
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join("output")
            });
            write_documents_to_dir(&outcome, &out_dir)?;
            progress.info(format!(
                "wrote {} document(s) to {}",
                outcome.documents.len(),
                out_dir.display()
            ));
        }
    }

    if !outcome.failures.is_empty() {
        progress.info(format!("{} row(s) failed; see errors above", outcome.failures.len()));
    }
    Ok(())
}

fn resolve_config(args: &Args, input: &Path) -> anyhow::Result<AppConfig> {
    if let Some(path) = args.config.as_ref() {
        return load_config(path);
    }
    let start_dir = input.parent().unwrap_or(Path::new("."));
    match find_default_config(start_dir) {
        Some(path) => load_config(&path),
        None => Ok(AppConfig::default()),
    }
}

fn print_usage() -> anyhow::Result<()> {
    let mut cmd = Args::command();
    cmd.print_help().context("print help")?;
    eprintln!(
        "\n\nUSAGE:\n  marksheet-merge <marksheet.xlsx|.csv> --template <template.docx>\n\nTIPS:\n  - Placeholders live in the template's table cells, e.g. [Learner Name].\n  - Default config search: marksheet-merge.toml (upwards from the table).\n"
    );
    Ok(())
}
