use crate::error::{CompilerError, Result};
use crate::oracle::StaticOracle;
use crate::{BatchOutput, Compiler, CompilerOptions, DocumentInput};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MARKUP_EXTENSION: &str = "fxml";

// --- COMPILE ---
pub fn handle_compile_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let inputs: Vec<&String> = matches.get_many::<String>("input").unwrap().collect();
    let options = cli.build_compiler_options(matches);
    let oracle = load_oracle(cli.types_path(matches))?;

    let mut files = Vec::new();
    for input in inputs {
        collect_markup_files(Path::new(input), true, &mut files)?;
    }
    let documents = read_documents(&files)?;

    println!("Compiling {} document(s)...", documents.len());
    let compiler = Compiler::with_options(&oracle, options);
    let batch = compiler.compile_batch(&documents);

    report_diagnostics(&batch);

    let out_dir = cli.output_directory(matches);
    for output in &batch.outputs {
        let Some(unit) = &output.unit else { continue };
        let target = output_path(&output.file, out_dir.as_deref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &unit.source)?;
        println!("  {} -> {}", output.file, target.display());
    }

    if matches.get_flag("stats") {
        let rendered =
            serde_json::to_string_pretty(&batch.stats).map_err(|e| CompilerError::InvalidFormat {
                message: format!("Failed to serialize statistics: {}", e),
            })?;
        println!("{}", rendered);
    }

    if batch.has_errors() {
        return Err(CompilerError::include(format!(
            "{} document(s) failed to compile",
            batch.stats.failed
        )));
    }

    println!(
        "Done: {} unit(s), {} warning(s), {}ms",
        batch.stats.succeeded, batch.stats.warnings, batch.stats.compile_time_ms
    );
    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input = matches.get_one::<String>("input").unwrap();
    let recursive = matches.get_flag("recursive");
    let oracle = load_oracle(cli.types_path(matches))?;

    let mut files = Vec::new();
    collect_markup_files(Path::new(input), recursive, &mut files)?;
    if files.is_empty() {
        return Err(CompilerError::FileNotFound {
            path: format!("No .{} files under {}", MARKUP_EXTENSION, input),
        });
    }
    let documents = read_documents(&files)?;

    let options = CompilerOptions {
        check_only: true,
        ..CompilerOptions::default()
    };
    let compiler = Compiler::with_options(&oracle, options);
    let batch = compiler.compile_batch(&documents);

    report_diagnostics(&batch);
    println!(
        "Checked {} document(s): {} error(s), {} warning(s)",
        batch.stats.documents, batch.stats.errors, batch.stats.warnings
    );

    if batch.has_errors() {
        return Err(CompilerError::include("check failed".to_string()));
    }
    Ok(())
}

fn load_oracle(types_path: Option<String>) -> Result<StaticOracle> {
    let Some(path) = types_path else {
        return Err(CompilerError::InvalidFormat {
            message: "No type table given; pass --types or set it in the config file".to_string(),
        });
    };
    let oracle = StaticOracle::load(Path::new(&path))?;
    log::info!("Loaded {} type(s) from {}", oracle.type_count(), path);
    Ok(oracle)
}

fn collect_markup_files(input: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    if input.is_file() {
        files.push(input.to_path_buf());
        return Ok(());
    }
    if !input.is_dir() {
        return Err(CompilerError::FileNotFound {
            path: input.display().to_string(),
        });
    }

    let walker = if recursive {
        WalkDir::new(input)
    } else {
        WalkDir::new(input).max_depth(1)
    };
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .map_or(false, |ext| ext == MARKUP_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(())
}

fn read_documents(files: &[PathBuf]) -> Result<Vec<DocumentInput>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let source = fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
            path: format!("{}: {}", path.display(), e),
        })?;
        documents.push(DocumentInput {
            file: path.to_string_lossy().into_owned(),
            source,
        });
    }
    Ok(documents)
}

fn report_diagnostics(batch: &BatchOutput) {
    for output in &batch.outputs {
        for diagnostic in output.diagnostics.iter() {
            eprintln!("{}", diagnostic);
        }
    }
}

/// Generated file path: module name with `.rs`, either under the output
/// directory or alongside the source document.
fn output_path(input: &str, out_dir: Option<&str>) -> PathBuf {
    let module = crate::codegen::module_name(input);
    let file_name = format!("{}.rs", module);
    match out_dir {
        Some(dir) => Path::new(dir).join(file_name),
        None => Path::new(input)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_alongside_input() {
        assert_eq!(
            output_path("ui/MainView.fxml", None),
            PathBuf::from("ui/main_view.rs")
        );
    }

    #[test]
    fn test_output_path_in_out_dir() {
        assert_eq!(
            output_path("ui/MainView.fxml", Some("gen")),
            PathBuf::from("gen/main_view.rs")
        );
    }
}
