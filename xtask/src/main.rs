//! Build automation tasks for docdrop
//!
//! Currently generates the CLI reference from the clap definitions in
//! `docdrop_ingest::cli`.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for docdrop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<docdrop_ingest::cli::Cli>();

    let content = format!(
        r#"# docdrop CLI Reference

Generated from the CLI source code. Last updated: {}.

docdrop hands each dropped document to a processing command exactly once per
distinct content. Successful files are recorded in a SQLite ledger and
removed; files that exhaust their retries are left in place.

## Quick Start

```bash
export DOCDROP_PIPELINE_COMMAND="ocr-upload --lang eng"

# Process a couple of files
docdrop submit ./inbox/invoice.pdf ./inbox/receipt.pdf

# Process everything under a directory (e.g. files left behind earlier)
docdrop scan ./inbox --recursive

# Inspect what has been processed
docdrop ledger list --limit 10
docdrop ledger check ./inbox/maybe-seen.pdf
```

## Commands

{}

## Environment Variables

| Variable | Default | Meaning |
|---|---|---|
| `DOCDROP_LEDGER_PATH` | `./processed.db` | Ledger database, created on first run |
| `DOCDROP_MAX_WORKERS` | `4` | Concurrent processing jobs |
| `DOCDROP_MAX_ATTEMPTS` | `3` | Attempts per file before giving up |
| `DOCDROP_INITIAL_BACKOFF_MS` | `1000` | Wait before the first retry; doubles per retry |
| `DOCDROP_MAX_BACKOFF_MS` | unset | Cap on a single retry wait |
| `DOCDROP_PROCESSING_TIMEOUT_SECS` | `600` | Deadline per attempt; `0` disables it |
| `DOCDROP_ACCEPTED_EXTENSIONS` | `pdf` | Comma separated list of accepted extensions |
| `DOCDROP_PIPELINE_COMMAND` | none | Program run per attempt; the file path is appended |
| `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR` | `info`, `console`, `text`, `./logs` | Logging |

Values are also read from a `.env` file in the working directory.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
