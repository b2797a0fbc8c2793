//! Resource command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use sw_res::{
    FormatGrammar, RecordCodec, TranslationTable, dump_translation_template, verify_trailer,
};

#[derive(Subcommand)]
pub enum ResCommands {
    /// Rewrite a resource with a translation file
    Patch {
        /// Path to the original resource
        input: PathBuf,

        /// Record format, e.g. "0 4 4 len 2"
        #[arg(short, long)]
        format: String,

        /// Translation file
        #[arg(short, long)]
        translation: PathBuf,

        /// Output resource
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a translation template for a resource
    Dump {
        /// Path to the resource
        input: PathBuf,

        /// Record format, e.g. "0 4 4 len 2"
        #[arg(short, long)]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a resource's checksum trailer
    Verify {
        /// Path to the resource
        input: PathBuf,

        /// Record format, e.g. "0 4 4 len 2"
        #[arg(short, long)]
        format: String,
    },
}

pub fn execute(command: ResCommands) -> Result<()> {
    match command {
        ResCommands::Patch {
            input,
            format,
            translation,
            output,
        } => patch_command(&input, &format, &translation, &output),
        ResCommands::Dump {
            input,
            format,
            output,
        } => dump_command(&input, &format, output.as_deref()),
        ResCommands::Verify { input, format } => verify_command(&input, &format),
    }
}

fn parse_grammar(format: &str) -> Result<FormatGrammar> {
    FormatGrammar::parse(format).with_context(|| format!("Invalid format '{format}'"))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn patch_command(input: &Path, format: &str, translation: &Path, output: &Path) -> Result<()> {
    let grammar = parse_grammar(format)?;
    let table = TranslationTable::load(
        translation,
        grammar.text_field_count(),
        grammar.id_field_index(),
    )
    .with_context(|| format!("Failed to load translation {}", translation.display()))?;

    let reader = open(input)?;
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let stats = RecordCodec::new(&grammar, &table)
        .patch(reader, &mut writer)
        .with_context(|| format!("Failed to patch {}", input.display()))?;
    writer.flush()?;

    println!(
        "Patched {}: {} of {} records translated, {} texts replaced",
        output.display(),
        stats.translated_records,
        stats.records,
        stats.replaced_texts
    );
    println!(
        "Checksum: {}",
        String::from_utf8_lossy(stats.trailer.hash())
    );

    Ok(())
}

fn dump_command(input: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let grammar = parse_grammar(format)?;
    let reader = open(input)?;

    let blocks = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let blocks = dump_translation_template(reader, &grammar, &mut writer)?;
            writer.flush()?;
            blocks
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            dump_translation_template(reader, &grammar, &mut writer)?
        }
    };

    log::info!("Wrote {} translation blocks", blocks);
    Ok(())
}

fn verify_command(input: &Path, format: &str) -> Result<()> {
    let grammar = parse_grammar(format)?;
    let check = verify_trailer(open(input)?, &grammar)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("Records:  {}", check.records);
    println!("Stored:   {}", String::from_utf8_lossy(check.actual.hash()));
    println!("Computed: {}", String::from_utf8_lossy(check.expected.hash()));

    if !check.is_valid() {
        bail!("Checksum mismatch in {}", input.display());
    }
    println!("Checksum OK");
    Ok(())
}
