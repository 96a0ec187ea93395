use crate::{OutputMode, emit_success};
use grammarlens::config::{GrammarlensConfig, write_config};
use grammarlens::edit::apply_edits;
use grammarlens::transform::SortParserRules;
use grammarlens::ui::{self, Icons};
use grammarlens::watcher::Watcher;
use grammarlens::{EditOperation, Error, Session};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    write_config(path, &GrammarlensConfig::default(), force)?;
    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "path": path }))?;
    }
    Ok(())
}

/// Load the grammar directory `dir` into a fresh session
fn open_directory(config: GrammarlensConfig, dir: &Path) -> anyhow::Result<(Session, PathBuf)> {
    let root = dir.canonicalize()?;
    let session = Session::with_defaults(config);
    let files = session.load_directory(&root)?;
    tracing::debug!(root = %root.display(), files = files.len(), "workspace bound");
    Ok((session, root))
}

/// Load the directory of `file`; returns the session and the file's canonical path
fn open_file(config: GrammarlensConfig, file: &Path) -> anyhow::Result<(Session, PathBuf)> {
    let file = file.canonicalize()?;
    let dir = file.parent().unwrap_or(Path::new("."));
    let (session, _) = open_directory(config, dir)?;
    if session.lock().store().find_document(&file).is_none() {
        anyhow::bail!("{} is not a grammar file of a known dialect", file.display());
    }
    Ok((session, file))
}

pub fn run_check(config: GrammarlensConfig, path: &Path, output_mode: OutputMode) -> anyhow::Result<()> {
    let (session, root) = open_directory(config, path)?;
    let files: Vec<PathBuf> = session.lock().store().documents().iter().map(|d| d.path.clone()).collect();

    let mut errors = 0usize;
    let mut warnings = 0usize;
    let mut report = BTreeMap::new();
    for file in &files {
        let diagnostics = session.diagnostics(file)?;
        for d in &diagnostics {
            match d.severity {
                grammarlens::engine::Severity::Error => errors += 1,
                grammarlens::engine::Severity::Warning => warnings += 1,
            }
        }
        report.insert(file.clone(), diagnostics);
    }

    if output_mode.is_human() {
        ui::header(&format!("Checking {}", root.display()));
        for (file, diagnostics) in &report {
            for d in diagnostics {
                ui::diagnostic(file, d);
            }
        }
        let (symbols, graph) = {
            let engine = session.lock();
            let symbols: usize = engine
                .index()
                .files
                .values()
                .map(|f| f.record.defs.len())
                .sum();
            (symbols, engine.index().graph.stats())
        };
        println!();
        println!(
            "{}",
            ui::stats_table(&[
                ("Files", files.len().to_string()),
                ("Definitions", symbols.to_string()),
                ("Dependencies", graph.to_string()),
                ("Errors", errors.to_string()),
                ("Warnings", warnings.to_string()),
            ])
        );
    } else {
        emit_success(output_mode, "check", serde_json::to_value(&report)?)?;
    }

    if errors > 0 {
        anyhow::bail!("{errors} syntax error(s)");
    }
    if output_mode.is_human() {
        ui::success("No syntax errors");
    }
    Ok(())
}

pub fn run_symbols(config: GrammarlensConfig, file: &Path, output_mode: OutputMode) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let symbols = session.document_symbols(&file)?;
    if output_mode.is_human() {
        ui::section(&file.display().to_string());
        if symbols.is_empty() {
            println!("∅ No definitions found.");
        } else {
            println!("{}", ui::symbols_table(&symbols));
        }
    } else {
        emit_success(output_mode, "symbols", serde_json::to_value(&symbols)?)?;
    }
    Ok(())
}

pub fn run_defs(
    config: GrammarlensConfig,
    file: &Path,
    offset: usize,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let locations = session.find_definitions(&file, offset)?;
    if output_mode.is_human() {
        println!("{} Definition at {}", Icons::MAG, ui::position(&file, offset));
        if locations.is_empty() {
            println!("∅ No definition found.");
        }
        for location in &locations {
            ui::location(location);
        }
    } else {
        emit_success(output_mode, "defs", serde_json::to_value(&locations)?)?;
    }
    Ok(())
}

pub fn run_refs(
    config: GrammarlensConfig,
    file: &Path,
    offset: usize,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let locations = session.find_references_and_definitions(&file, offset)?;
    if output_mode.is_human() {
        println!("{} References at {}", Icons::MAG, ui::position(&file, offset));
        if locations.is_empty() {
            println!("∅ No references found.");
        }
        for location in &locations {
            ui::location(location);
        }
    } else {
        emit_success(output_mode, "refs", serde_json::to_value(&locations)?)?;
    }
    Ok(())
}

pub fn run_hover(
    config: GrammarlensConfig,
    file: &Path,
    offset: usize,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let info = session.get_quick_info(&file, offset)?;
    if output_mode.is_human() {
        match &info {
            Some(info) => {
                let mut lines = info.display_text.lines();
                println!("{}", lines.next().unwrap_or_default().style(ui::theme().header.clone()));
                for line in lines {
                    println!("{}", ui::dim(line));
                }
            }
            None => println!("∅ Nothing to show."),
        }
    } else {
        emit_success(output_mode, "hover", serde_json::to_value(&info)?)?;
    }
    Ok(())
}

fn print_edits(edits: &BTreeMap<PathBuf, Vec<EditOperation>>) {
    for (file, ops) in edits {
        ui::file_modified(&file.display().to_string());
        for op in ops {
            let at = ui::position(file, op.start);
            if op.text.is_empty() {
                ui::summary_row(&at, &format!("{:?} {}", op.kind, op.length));
            } else {
                ui::summary_row(&at, &format!("{:?} {:?}", op.kind, op.text));
            }
        }
    }
}

pub fn run_rename(
    config: GrammarlensConfig,
    file: &Path,
    offset: usize,
    new_name: &str,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let edits = session.rename(&file, offset, new_name)?;
    if output_mode.is_human() {
        if edits.is_empty() {
            println!("∅ Nothing to rename at {}.", ui::position(&file, offset));
        } else {
            ui::header(&format!("Rename to '{new_name}'"));
            print_edits(&edits);
        }
    } else {
        emit_success(output_mode, "rename", serde_json::to_value(&edits)?)?;
    }
    Ok(())
}

pub fn run_reformat(config: GrammarlensConfig, file: &Path, output_mode: OutputMode) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let ops = session.reformat(&file)?;
    if output_mode.is_human() {
        if ops.is_empty() {
            ui::success("Already formatted");
        } else {
            print_edits(&BTreeMap::from([(file, ops)]));
        }
    } else {
        emit_success(output_mode, "reformat", serde_json::to_value(&ops)?)?;
    }
    Ok(())
}

pub fn run_sort_rules(
    config: GrammarlensConfig,
    file: &Path,
    write: bool,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let (session, file) = open_file(config, file)?;
    let edits = match session.refactor(&SortParserRules, &file, 0) {
        Ok(edits) => edits,
        Err(Error::NoChanges) => {
            if output_mode.is_human() {
                ui::success(&Error::NoChanges.to_string());
            } else {
                emit_success(output_mode, "sort-rules", serde_json::json!({}))?;
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if write {
        for path in edits.keys() {
            let original = std::fs::read_to_string(path)?;
            let updated = apply_edits(&original, &edits[path]);
            std::fs::write(path, updated)?;
        }
    }

    if output_mode.is_human() {
        print_edits(&edits);
        if write {
            ui::success(&format!("Updated {} file(s)", edits.len()));
        } else {
            println!("{}", ui::muted("Dry run; pass --write to update the files"));
        }
    } else {
        emit_success(output_mode, "sort-rules", serde_json::to_value(&edits)?)?;
    }
    Ok(())
}

pub fn run_watch(config: GrammarlensConfig, path: &Path) -> anyhow::Result<()> {
    let (session, root) = open_directory(config, path)?;
    println!("{} Watching for changes in {}...", Icons::EYE, root.display());
    Watcher::new(root, &session).run()
}
