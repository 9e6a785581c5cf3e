//! ebxkit CLI - Command-line tool for inspecting EBX payloads.
//!
//! The inspection commands stop after the header and descriptor tables, so
//! they work without any schema metadata.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;

use ebxkit::prelude::*;

/// ebxkit - EBX payload inspection tool
#[derive(Parser)]
#[command(name = "ebxkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header summary for a Partition payload
    Info {
        /// Path to the EBX file
        input: PathBuf,
    },

    /// List the type descriptor table
    Types {
        /// Path to the EBX file
        input: PathBuf,

        /// Also list each type's field descriptors
        #[arg(short, long)]
        fields: bool,
    },

    /// List the import table and derived dependencies
    Imports {
        /// Path to the EBX file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Types { input, fields } => cmd_types(&input, fields),
        Commands::Imports { input } => cmd_imports(&input),
    }
}

fn open_payload(path: &PathBuf) -> Result<Mmap> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }.context("failed to map input file")?;
    Ok(mmap)
}

/// Table parsing needs no schema; an empty registry is enough.
fn open_reader<'a>(
    data: &'a [u8],
    schema: &'a SchemaRegistry,
    path: &PathBuf,
) -> Result<PartitionReader<'a>> {
    PartitionReader::new(data, schema)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn cmd_info(input: &PathBuf) -> Result<()> {
    let data = open_payload(input)?;
    let schema = SchemaRegistry::default();
    let reader = open_reader(&data, &schema, input)?;

    println!("partition:   {}", reader.file_guid());
    println!("version:     {}", reader.version());
    println!(
        "instances:   {} ({} exported)",
        reader.instance_total(),
        reader.exported_count()
    );
    println!("types:       {}", reader.resolver().type_count());
    println!("fields:      {}", reader.resolver().field_count());
    println!("imports:     {}", reader.imports().len());
    println!("arrays:      {}", reader.array_count());
    println!("boxed:       {}", reader.boxed_value_count());

    Ok(())
}

fn cmd_types(input: &PathBuf, with_fields: bool) -> Result<()> {
    let data = open_payload(input)?;
    let schema = SchemaRegistry::default();
    let reader = open_reader(&data, &schema, input)?;
    let resolver = reader.resolver();

    for (index, td) in resolver.types().iter().enumerate() {
        // Copy out of the packed rows before formatting.
        let (name_hash, size, align, field_count, field_index) = (
            td.name_hash,
            td.size,
            td.alignment,
            td.field_count,
            td.field_index,
        );
        let name = resolver.name_of(name_hash);
        let kind = td
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "[{:3}] {:<40} {:<8} size={:<5} align={} fields={}",
            index,
            if name.is_empty() { "<unnamed>" } else { name },
            kind,
            size,
            align,
            field_count
        );

        if with_fields {
            for j in 0..field_count as usize {
                let fd = resolver.field_at(field_index as usize + j)?;
                let (fname_hash, data_offset, type_ref) =
                    (fd.name_hash, fd.data_offset, fd.type_ref);
                let fname = resolver.name_of(fname_hash);
                let fkind = fd
                    .kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "      +{:<5} {:<34} {:<8} ref={}",
                    data_offset, fname, fkind, type_ref
                );
            }
        }
    }

    Ok(())
}

fn cmd_imports(input: &PathBuf) -> Result<()> {
    let data = open_payload(input)?;
    let schema = SchemaRegistry::default();
    let reader = open_reader(&data, &schema, input)?;

    let mut dependencies: Vec<EbxGuid> = Vec::new();
    for import in reader.imports() {
        println!("{} -> {}", import.file_guid, import.class_guid);
        if !dependencies.contains(&import.file_guid) {
            dependencies.push(import.file_guid);
        }
    }

    println!(
        "\n{} imports, {} dependencies",
        reader.imports().len(),
        dependencies.len()
    );
    for guid in dependencies {
        println!("  {}", guid);
    }

    Ok(())
}
