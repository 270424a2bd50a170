//! pmx - evaluate and edit price matrix snapshots

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pricematrix::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pmx")]
#[command(author, version, about = "Evaluate and edit price matrix snapshots")]
struct Cli {
    #[command(flatten)]
    limits: LimitArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LimitArgs {
    /// Maximum number of rows per matrix
    #[arg(long, global = true, default_value_t = MatrixLimits::default().max_rows)]
    max_rows: u32,

    /// Maximum number of columns per matrix
    #[arg(long, global = true, default_value_t = MatrixLimits::default().max_cols)]
    max_cols: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the computed values of a matrix as delimited text
    Eval {
        /// Snapshot file (JSON)
        input: PathBuf,

        /// Matrix to print (default: the first one)
        #[arg(short, long)]
        matrix: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Field delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Write one cell and save the snapshot
    Set {
        /// Snapshot file (JSON)
        input: PathBuf,

        /// Cell in A1 notation, e.g. B3
        cell: String,

        /// Raw text: a literal, or a formula starting with '='
        raw: String,

        /// Matrix to edit (default: the first one)
        #[arg(short, long)]
        matrix: Option<String>,

        /// Where to write the snapshot (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the matrices of a snapshot
    Info {
        /// Snapshot file (JSON)
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = EngineOptions::default()
        .with_limits(MatrixLimits::new(cli.limits.max_rows, cli.limits.max_cols));

    match cli.command {
        Commands::Eval {
            input,
            matrix,
            output,
            delimiter,
        } => eval(&input, options, matrix.as_deref(), output.as_deref(), delimiter),
        Commands::Set {
            input,
            cell,
            raw,
            matrix,
            output,
        } => set(&input, options, &cell, &raw, matrix.as_deref(), output.as_deref()),
        Commands::Info { input } => show_info(&input, options),
    }
}

fn load(input: &Path, options: EngineOptions) -> Result<Session> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read '{}'", input.display()))?;
    let snapshot = SessionSnapshot::from_json(&json)
        .with_context(|| format!("Failed to parse '{}'", input.display()))?;
    Session::from_snapshot(&snapshot, options)
        .with_context(|| format!("Failed to load '{}'", input.display()))
}

/// The named matrix, or the first one
fn pick_matrix(session: &Session, name: Option<&str>) -> Result<String> {
    match name {
        Some(name) => {
            session
                .sheet(name)
                .with_context(|| format!("Matrix '{}' not found", name))?;
            Ok(name.to_string())
        }
        None => match session.matrix_names().first() {
            Some(first) => Ok(first.to_string()),
            None => bail!("Snapshot contains no matrices"),
        },
    }
}

fn eval(
    input: &Path,
    options: EngineOptions,
    matrix: Option<&str>,
    output: Option<&Path>,
    delimiter: char,
) -> Result<()> {
    let session = load(input, options)?;
    let name = pick_matrix(&session, matrix)?;
    let sheet = session.sheet(&name)?;

    let (rows, cols) = sheet.matrix().dimensions();
    if rows == 0 || cols == 0 {
        eprintln!("Warning: matrix '{}' is empty", name);
        return Ok(());
    }

    let mut text = String::new();
    for row in 0..rows {
        for col in 0..cols {
            if col > 0 {
                text.push(delimiter);
            }
            let view = sheet.view(row, col);
            text.push_str(&quote_field(&view.display_value, delimiter));
        }
        text.push('\n');
    }

    if let Some(output_path) = output {
        std::fs::write(output_path, &text)
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote {} rows to '{}'", rows, output_path.display());
    } else {
        io::stdout()
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    Ok(())
}

/// Quote a field if it contains the delimiter, quotes or line breaks
fn quote_field(text: &str, delimiter: char) -> String {
    if text.contains(delimiter) || text.contains('"') || text.contains('\n') || text.contains('\r')
    {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn set(
    input: &Path,
    options: EngineOptions,
    cell: &str,
    raw: &str,
    matrix: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let mut session = load(input, options)?;
    let name = pick_matrix(&session, matrix)?;
    let addr =
        CellAddress::parse(cell).with_context(|| format!("Invalid cell reference '{}'", cell))?;

    let result = session
        .set_cell(&name, addr.row, addr.col, raw)
        .with_context(|| format!("Failed to set {}!{}", name, cell))?;

    let view = &result.cell;
    match &view.diagnostic {
        Some(diagnostic) => eprintln!("{}!{} = {} ({})", name, addr, view.display_value, diagnostic),
        None => eprintln!("{}!{} = {}", name, addr, view.display_value),
    }
    eprintln!(
        "Recalculated {} cells ({} errors)",
        result.stats.cells_evaluated, result.stats.errors
    );

    let json = session.serialize().to_json()?;
    let output_path = output.unwrap_or(input);
    std::fs::write(output_path, json + "\n")
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;

    Ok(())
}

fn show_info(input: &Path, options: EngineOptions) -> Result<()> {
    let session = load(input, options)?;
    let names = session.matrix_names();

    println!("File: {}", input.display());
    println!("Matrices: {}", names.len());

    for (i, name) in names.iter().enumerate() {
        let sheet = session.sheet(name)?;
        let (rows, cols) = sheet.matrix().dimensions();

        println!();
        println!("  Matrix {}: \"{}\"", i, name);
        println!("    Dimensions: {} rows x {} columns", rows, cols);
        println!("    Formulas: {}", sheet.matrix().formula_count());
        println!("    Errors: {}", sheet.error_count());
        let circular = sheet.circular_cells();
        if !circular.is_empty() {
            let cells: Vec<String> = circular.iter().map(ToString::to_string).collect();
            println!("    Circular: {}", cells.join(", "));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("12.5", ','), "12.5");
        assert_eq!(quote_field("Widget, large", ','), "\"Widget, large\"");
        assert_eq!(quote_field("say \"hi\"", ';'), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_pick_matrix_defaults_to_first() {
        let mut session = Session::default();
        session.add_matrix("Prices").unwrap();
        session.add_matrix("Discounts").unwrap();

        assert_eq!(pick_matrix(&session, None).unwrap(), "Prices");
        assert_eq!(pick_matrix(&session, Some("Discounts")).unwrap(), "Discounts");
        assert!(pick_matrix(&session, Some("Tiers")).is_err());
        assert!(pick_matrix(&Session::default(), None).is_err());
    }
}
