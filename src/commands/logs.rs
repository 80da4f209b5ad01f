use super::{Context, interrupted};

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use subbrain_core::{LogExport, LogSource, LogTailer};

pub async fn run(
    ctx: &Context,
    source: &str,
    filter: Option<&str>,
    follow: bool,
    export: Option<&Path>,
) -> Result<()> {
    let source: LogSource = source.parse()?;
    let tailer = LogTailer::start(
        &ctx.runtime,
        ctx.session.clone(),
        ctx.client.clone(),
        ctx.config.log_interval(),
        ctx.config.log_lines,
    );
    tailer.set_source(source);
    if let Some(term) = filter {
        tailer.set_filter(term);
    }

    let mut rx = tailer.subscribe();
    tailer
        .refresh_now()
        .await
        .context("Logs need an active Subgen instance; run `subbrain discover` first")?;
    // A restart of the poll loop can supersede the manual fetch; its own
    // first tick fills the buffer instead.
    while tailer.buffer().is_none() {
        if rx.changed().await.is_err() {
            break;
        }
    }
    print_view(&tailer);

    if let Some(dir) = export {
        let path = write_export(dir, &tailer.export())?;
        println!("\nExported {} line(s) to {}", tailer.filtered_line_count(), path.display());
    }

    if !follow {
        return Ok(());
    }

    let mut last = tailer.buffer();
    loop {
        tokio::select! {
            _ = interrupted() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = tailer.buffer();
                if current.is_some() && current != last {
                    println!("\n--- {} ---", source.as_str());
                    print_view(&tailer);
                    last = current;
                }
            }
        }
    }
    Ok(())
}

fn print_view(tailer: &LogTailer) {
    for line in tailer.filtered_view() {
        println!("{}", line);
    }
    if !tailer.filter().is_empty() {
        println!(
            "({} of {} lines match {:?})",
            tailer.filtered_line_count(),
            tailer.line_count(),
            tailer.filter()
        );
    }
}

fn write_export(dir: &Path, export: &LogExport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(&export.file_name);
    std::fs::write(&path, &export.contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_lands_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let export = LogExport {
            file_name: "local-logs-2026-10-18T10-00-00Z.txt".into(),
            contents: "a\nb\n".into(),
        };
        let path = write_export(&dir.path().join("nested"), &export).unwrap();
        assert!(path.ends_with("nested/local-logs-2026-10-18T10-00-00Z.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a\nb\n");
    }
}
