use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam::channel::{RecvTimeoutError, unbounded};
use tracing::{debug, info, warn};

use crate::ignore::IgnoreFilter;
use crate::session::Session;

/// What happened to a path during one debounce window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Changed,
    Removed,
}

/// Feeds file-system changes under `root` into a session
pub struct Watcher<'a> {
    root: PathBuf,
    session: &'a Session,
    filter: IgnoreFilter,
    debounce: Duration,
}

impl<'a> Watcher<'a> {
    /// `root` should be the same (canonical) path the session loaded, so
    /// event paths match document keys
    pub fn new(root: PathBuf, session: &'a Session) -> Self {
        let (filter, debounce) = {
            let engine = session.lock();
            let config = engine.config();
            (
                IgnoreFilter::new(&root, Some(config.exclude.as_slice())),
                Duration::from_millis(config.watch.debounce_ms),
            )
        };
        Self { root, session, filter, debounce }
    }

    /// Block, applying batched changes until the watcher shuts down
    pub fn run(&self) -> anyhow::Result<()> {
        let (tx, rx) = unbounded();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = %self.root.display(), "watching for changes");

        let mut pending: BTreeMap<PathBuf, FileChange> = BTreeMap::new();
        loop {
            match rx.recv_timeout(self.debounce) {
                Ok(Ok(event)) => self.collect(event, &mut pending),
                Ok(Err(e)) => warn!(error = %e, "watch error"),
                Err(RecvTimeoutError::Timeout) => {
                    if !pending.is_empty() {
                        self.apply(std::mem::take(&mut pending));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }

    fn collect(&self, event: notify::Event, pending: &mut BTreeMap<PathBuf, FileChange>) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
            return;
        }
        for path in event.paths {
            if !self.is_tracked(&path) {
                continue;
            }
            let change = if path.is_file() { FileChange::Changed } else { FileChange::Removed };
            pending.insert(path, change);
        }
    }

    fn is_tracked(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && !self.filter.is_ignored_recursive(path, false)
            && self.session.lock().registry().find_dialect(path).is_some()
    }

    /// Apply one batch and re-bind; returns the files that were re-bound
    pub fn apply(&self, changes: BTreeMap<PathBuf, FileChange>) -> Vec<PathBuf> {
        for (path, change) in changes {
            match change {
                FileChange::Changed => match self.session.did_change_file(&path) {
                    Ok(Some(outcome)) => debug!(file = %path.display(), ?outcome, "file changed"),
                    Ok(None) => {}
                    Err(e) => warn!(file = %path.display(), error = %e, "failed to read changed file"),
                },
                FileChange::Removed => {
                    if self.session.did_close(&path).is_some() {
                        debug!(file = %path.display(), "file removed");
                    }
                }
            }
        }
        match self.session.compile() {
            Ok(files) => {
                if !files.is_empty() {
                    info!(files = files.len(), "re-bound after file changes");
                }
                files
            }
            Err(e) => {
                warn!(error = %e, "compile after file changes failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrammarlensConfig;

    #[test]
    fn test_apply_batch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let lexer = root.join("Lex.g4");
        let parser = root.join("Expr.g4");
        std::fs::write(&lexer, "ID : [a-z]+ ;\n").unwrap();
        std::fs::write(&parser, "expr : ID ;\n").unwrap();

        let session = Session::with_defaults(GrammarlensConfig::default());
        session.load_directory(&root).unwrap();
        let watcher = Watcher::new(root.clone(), &session);

        assert!(watcher.is_tracked(&lexer));
        assert!(!watcher.is_tracked(&root.join("notes.txt")));
        assert!(!watcher.is_tracked(&root.join("gen").join("Expr.g4")));

        std::fs::write(&lexer, "ID : [a-zA-Z]+ ;\n").unwrap();
        let rebound = watcher.apply(BTreeMap::from([(lexer.clone(), FileChange::Changed)]));
        assert_eq!(rebound, vec![parser.clone(), lexer.clone()]);

        std::fs::remove_file(&lexer).unwrap();
        let rebound = watcher.apply(BTreeMap::from([(lexer.clone(), FileChange::Removed)]));
        assert_eq!(rebound, vec![parser.clone()]);
        assert!(session.find_definitions(&parser, 7).unwrap().is_empty());
    }
}
