use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use convos_docx::convert::{DEFAULT_IMAGE_DIR, DEFAULT_LOG_FILE};
use convos_docx::{convert_archive, format_size, ConversionReport, ConvertOptions};
use nu_ansi_term::{Color, Style as AnsiStyle};

const ACCENT_COLOR: Color = Color::Rgb(188, 205, 238);
const EDGE_COLOR: Color = Color::Rgb(217, 182, 203);
const DIM_COLOR: Color = Color::Rgb(125, 132, 140);
const WARN_COLOR: Color = Color::Rgb(238, 190, 140);

/// Turn a ChatGPT export archive into one Word document per conversation.
#[derive(Parser, Debug)]
#[command(name = "convos-docx", version, about)]
struct Cli {
    /// Exported archive (.zip) containing conversations.json
    archive: PathBuf,

    /// Where to write the resulting zip [default: conversations_output.zip beside the input]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the conversation log inside the archive
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: String,

    /// Image folder inside the archive, relative to the log
    #[arg(long, default_value = DEFAULT_IMAGE_DIR)]
    image_dir: String,

    /// Render conversations one at a time
    #[arg(long)]
    sequential: bool,
}

fn accent(text: &str) -> String {
    AnsiStyle::new().fg(ACCENT_COLOR).paint(text).to_string()
}

fn dim(text: &str) -> String {
    AnsiStyle::new().fg(DIM_COLOR).paint(text).to_string()
}

fn warn(text: &str) -> String {
    AnsiStyle::new().fg(WARN_COLOR).paint(text).to_string()
}

fn edge(text: &str) -> String {
    AnsiStyle::new().fg(EDGE_COLOR).paint(text).to_string()
}

fn accent_bullet() -> String {
    edge("⋆")
}

fn print_banner(archive: &Path) {
    println!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
    println!("{} {}", accent_bullet(), accent("convos-docx is warming up"));
    println!(
        "{} {}",
        accent_bullet(),
        dim(&format!("source {}", archive.display()))
    );
    println!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.archive.is_file() {
        eprintln!(
            "The provided path `{}` is not a file.",
            cli.archive.display()
        );
        std::process::exit(66);
    }

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    print_banner(&cli.archive);

    let options = ConvertOptions {
        log_file_name: cli.log_file,
        image_dir: cli.image_dir,
        output_path: cli.output,
        parallel: !cli.sequential,
    };
    let report = convert_archive(&cli.archive, &options)
        .with_context(|| format!("converting `{}`", cli.archive.display()))?;

    print_report(&report)
}

fn print_report(report: &ConversionReport) -> Result<()> {
    for document in &report.documents {
        println!("{} {}", accent_bullet(), accent(&document.file_name));
        for asset in &document.missing_images {
            println!("    {}", dim(&format!("image missing: {asset}")));
        }
        if document.failed_images > 0 {
            println!(
                "    {}",
                dim(&format!("{} image(s) could not be embedded", document.failed_images))
            );
        }
    }

    for failure in &report.failures {
        println!("{} {}", accent_bullet(), warn(&failure.to_string()));
    }

    let size = fs::metadata(&report.output)
        .with_context(|| format!("reading `{}`", report.output.display()))?
        .len();
    println!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
    println!(
        "{} {}",
        accent_bullet(),
        dim(&format!(
            "{} document(s), {} skipped, {} missing image(s)",
            report.documents.len(),
            report.failures.len(),
            report.missing_images().count()
        ))
    );
    println!(
        "{} {}",
        accent_bullet(),
        accent(&format!(
            "wrote {} ({})",
            report.output.display(),
            format_size(size)
        ))
    );
    Ok(())
}
