//! docstencil CLI - document template extraction and generation

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use docstencil::{
    extract_structure_with_options, parse_content, resolve_format, ExtractOptions,
    GenerateOptions, OutputFormat, ReadOptions, ServiceOptions, SourceFormat, TemplateExtractor,
    TemplateScope, TemplateService,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "docstencil")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract templates from PDF/DOCX files and generate documents that match them", long_about = None)]
struct Cli {
    /// Template store directory
    #[arg(long, global = true, env = "DOCSTENCIL_STORAGE_DIR", default_value = "./templates")]
    store: PathBuf,

    /// User scope (global scope when omitted)
    #[arg(long, global = true, env = "DOCSTENCIL_USER")]
    user: Option<String>,

    /// Top band of the page searched for running headers (fraction of height)
    #[arg(long, global = true, env = "DOCSTENCIL_HEADER_BAND", default_value_t = 0.10)]
    header_band: f32,

    /// Bottom band of the page searched for running footers (fraction of height)
    #[arg(long, global = true, env = "DOCSTENCIL_FOOTER_BAND", default_value_t = 0.10)]
    footer_band: f32,

    /// Size ratio to body text for heading 1
    #[arg(long, global = true, env = "DOCSTENCIL_HEADING1_RATIO", default_value_t = 1.3)]
    heading1_ratio: f32,

    /// Size ratio to body text for heading 2
    #[arg(long, global = true, env = "DOCSTENCIL_HEADING2_RATIO", default_value_t = 1.15)]
    heading2_ratio: f32,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a template from a PDF/DOCX file and store it
    Upload {
        /// Template file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Template name (file stem if not specified)
        #[arg(short, long)]
        name: Option<String>,

        /// Declared file type (taken from the extension if not specified)
        #[arg(long, value_enum)]
        format: Option<SourceArg>,

        /// Store in the global scope even when --user is set
        #[arg(long)]
        global: bool,
    },

    /// List templates visible to the scope
    #[command(alias = "ls")]
    List,

    /// Show a stored template's model summary
    Info {
        /// Template name
        name: String,
    },

    /// Delete a template from the scope
    #[command(alias = "rm")]
    Delete {
        /// Template name
        name: String,
    },

    /// Render content into a document that follows a template
    Generate {
        /// Template name
        name: String,

        /// Content file (stdin if not specified)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output file (<name>.<format> if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "pdf")]
        format: OutputArg,

        /// Document title
        #[arg(long)]
        title: Option<String>,

        /// Write base64 text instead of binary
        #[arg(long)]
        base64: bool,
    },

    /// Extract a file's template without storing it
    Inspect {
        /// Template file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show the content blocks parsed from text
    Parse {
        /// Content file (stdin if not specified)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    /// PDF document
    Pdf,
    /// Word document
    Docx,
}

impl From<SourceArg> for SourceFormat {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Pdf => SourceFormat::Pdf,
            SourceArg::Docx => SourceFormat::Docx,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputArg {
    /// PDF document
    Pdf,
    /// Word document (falls back to PDF if it cannot be written)
    Docx,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Pdf => OutputFormat::Pdf,
            OutputArg::Docx => OutputFormat::Docx,
        }
    }
}

impl Cli {
    fn scope(&self) -> TemplateScope {
        TemplateScope::from_user(self.user.as_deref())
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions::new()
            .with_header_band(self.header_band)
            .with_footer_band(self.footer_band)
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::new()
            .with_heading1_ratio(self.heading1_ratio)
            .with_heading2_ratio(self.heading2_ratio)
    }

    fn service(&self) -> Result<TemplateService, docstencil::Error> {
        let options = ServiceOptions::new()
            .with_read_options(self.read_options())
            .with_extract_options(self.extract_options());
        TemplateService::open_with_options(&self.store, options)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Upload {
            input,
            name,
            format,
            global,
        } => cmd_upload(&cli, input, name.as_deref(), *format, *global),
        Commands::List => cmd_list(&cli),
        Commands::Info { name } => cmd_info(&cli, name),
        Commands::Delete { name } => cmd_delete(&cli, name),
        Commands::Generate {
            name,
            input,
            output,
            format,
            title,
            base64,
        } => cmd_generate(
            &cli,
            name,
            input.as_deref(),
            output.as_deref(),
            (*format).into(),
            title.as_deref(),
            *base64,
        ),
        Commands::Inspect { input } => cmd_inspect(&cli, input),
        Commands::Parse { input } => cmd_parse(input.as_deref()),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

fn read_content(input: Option<&Path>) -> Result<String, std::io::Error> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn cmd_upload(
    cli: &Cli,
    input: &Path,
    name: Option<&str>,
    format: Option<SourceArg>,
    global: bool,
) -> CliResult {
    let service = cli.service()?;
    let data = fs::read(input)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or("cannot derive a template name from the file path")?,
    };
    let declared = format.map(SourceFormat::from).or_else(|| {
        input
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(SourceFormat::from_file_name)
    });
    let scope = if global {
        TemplateScope::Global
    } else {
        cli.scope()
    };

    let pb = spinner("Extracting template...");
    let result = service.upload_template(&name, &data, declared, &scope);
    pb.finish_and_clear();
    let result = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_warnings(&result.warnings);
        println!(
            "{} '{}' ({}, {}) as {}",
            "Saved".green().bold(),
            name,
            result.source_format,
            scope,
            result.template_id.dimmed()
        );
    }
    Ok(())
}

fn cmd_list(cli: &Cli) -> CliResult {
    let service = cli.service()?;
    let templates = service.list_templates(&cli.scope())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }
    if templates.is_empty() {
        println!("{}", "No templates".yellow());
        return Ok(());
    }
    for t in &templates {
        println!(
            "{:<24} {:<6} {:<16} {}",
            t.name.bold(),
            t.source_format,
            t.scope.to_string(),
            t.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
    Ok(())
}

fn cmd_info(cli: &Cli, name: &str) -> CliResult {
    let service = cli.service()?;
    let info = service.get_template_info(name, &cli.scope())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let s = &info.summary;
    println!("{}", "Template Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Name".bold(), info.name);
    println!("{}: {}", "Scope".bold(), info.scope);
    println!("{}: {}", "Id".bold(), info.template_id);
    println!("{}: {}", "Created".bold(), info.created_at.to_rfc3339());
    println!("{}: {}", "Source".bold(), info.source_format);
    println!(
        "{}: {:.1} x {:.1} pt ({:?})",
        "Page".bold(),
        s.page_width,
        s.page_height,
        s.orientation
    );
    println!(
        "{}: top {:.1}, bottom {:.1}, left {:.1}, right {:.1}",
        "Margins".bold(),
        s.margins.top,
        s.margins.bottom,
        s.margins.left,
        s.margins.right
    );
    println!("{}: {}", "Fonts".bold(), s.fonts.join(", "));
    let roles: Vec<String> = s.roles.iter().map(|r| r.to_string()).collect();
    println!("{}: {}", "Styles".bold(), roles.join(", "));
    println!(
        "{}: {}",
        "Header".bold(),
        if s.has_header { "Yes" } else { "No" }
    );
    println!(
        "{}: {}",
        "Footer".bold(),
        if s.has_footer { "Yes" } else { "No" }
    );
    println!("{}: {}", "Tables".bold(), s.table_count);
    println!("{}: {}", "Pages".bold(), s.page_count);
    println!("{}: {}", "Page breaks".bold(), s.page_break_count);
    Ok(())
}

fn cmd_delete(cli: &Cli, name: &str) -> CliResult {
    let service = cli.service()?;
    let scope = cli.scope();
    service.delete_template(name, &scope)?;
    println!("{} '{}' ({})", "Deleted".green().bold(), name, scope);
    Ok(())
}

fn cmd_generate(
    cli: &Cli,
    name: &str,
    input: Option<&Path>,
    output: Option<&Path>,
    format: OutputFormat,
    title: Option<&str>,
    base64: bool,
) -> CliResult {
    let mut generate = GenerateOptions::new();
    if let Some(title) = title {
        generate = generate.with_title(title);
    }
    let options = ServiceOptions::new()
        .with_read_options(cli.read_options())
        .with_extract_options(cli.extract_options())
        .with_generate_options(generate);
    let service = TemplateService::open_with_options(&cli.store, options)?;
    let content = read_content(input)?;
    let scope = cli.scope();

    let pb = spinner("Generating document...");
    let result = if base64 {
        service
            .generate_pdf(name, &scope, &content)
            .map(|response| {
                (
                    response.document_base64.into_bytes(),
                    response.format,
                    response.warnings,
                    response.degraded,
                )
            })
    } else {
        service
            .generate(name, &scope, &content, format)
            .map(|doc| (doc.bytes, doc.format, doc.warnings, doc.degraded))
    };
    pb.finish_and_clear();
    let (bytes, produced, warnings, degraded) = result?;

    print_warnings(&warnings);
    if degraded {
        eprintln!(
            "{} requested {} but produced {}",
            "note:".yellow().bold(),
            format,
            produced
        );
    }

    let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let ext = if base64 { "b64" } else { produced.extension() };
        PathBuf::from(format!("{}.{}", name, ext))
    });
    fs::write(&path, &bytes)?;
    println!(
        "{} {} ({} bytes)",
        "Saved to".green(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

fn cmd_inspect(cli: &Cli, input: &Path) -> CliResult {
    let data = fs::read(input)?;
    let declared = input
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(SourceFormat::from_file_name);
    let format = resolve_format(&data, declared)?;

    let raw = extract_structure_with_options(&data, format, &cli.read_options())?;
    let extraction = TemplateExtractor::new(cli.extract_options()).extract_with_warnings(&raw);

    print_warnings(&extraction.warnings);
    println!("{}", serde_json::to_string_pretty(&extraction.model)?);
    Ok(())
}

fn cmd_parse(input: Option<&Path>) -> CliResult {
    let content = read_content(input)?;
    let blocks = parse_content(&content);
    println!("{}", serde_json::to_string_pretty(blocks.as_slice())?);
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "docstencil".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Document template extraction and generation tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/docstencil".dimmed());
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_args() {
        let cli = Cli::try_parse_from([
            "docstencil",
            "--store",
            "/tmp/store",
            "--user",
            "42",
            "generate",
            "memo",
            "-i",
            "notes.md",
            "--format",
            "docx",
        ])
        .unwrap();

        assert_eq!(cli.store, PathBuf::from("/tmp/store"));
        assert_eq!(cli.scope(), TemplateScope::user("42"));
        match cli.command {
            Commands::Generate {
                name,
                input,
                format,
                base64,
                ..
            } => {
                assert_eq!(name, "memo");
                assert_eq!(input, Some(PathBuf::from("notes.md")));
                assert!(format == OutputArg::Docx);
                assert!(!base64);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_global_scope_without_user() {
        let cli = Cli::try_parse_from(["docstencil", "--user", " ", "ls"]).unwrap();
        assert_eq!(cli.scope(), TemplateScope::Global);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_read_content_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.md");
        fs::write(&path, "# Title\n\nBody").unwrap();
        assert_eq!(read_content(Some(&path)).unwrap(), "# Title\n\nBody");
    }
}
