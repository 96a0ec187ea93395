//! Session - the single entry point for editors, watchers and the CLI
//!
//! Every operation takes the engine lock for its whole duration, so the
//! scope store, dependency graph, dirty flags and suppression markers are
//! only ever touched by one request at a time. There is no timeout: a long
//! compile holds the lock until it finishes.
//!
//! Queries compile first if any document is stale. Compiles and refactor
//! transforms run under `catch_unwind`; a panic while compiling discards the
//! index so the next request rebuilds it from scratch.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use ::ignore::WalkBuilder;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::adapter::default_registry;
use crate::config::GrammarlensConfig;
use crate::edit::{EchoState, EditOperation, Notification};
use crate::engine::{ClassifiedSpan, Diagnostic, Engine, Location, QuickInfo};
use crate::ignore::IgnoreFilter;
use crate::symbol::DocumentSymbol;
use crate::transform::Transform;
use crate::workspace::Document;
use crate::{Error, Result};

pub struct Session {
    engine: Mutex<Engine>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run `op`; on panic, throw the index away and report an internal error
fn guarded<T>(engine: &mut Engine, op: impl FnOnce(&mut Engine) -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(|| op(engine))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, "panic while updating the workspace model, rebuilding index");
            engine.reset_index();
            Err(Error::Internal(message))
        }
    }
}

fn ensure_compiled(engine: &mut Engine) -> Result<()> {
    if engine.needs_compile() {
        guarded(engine, Engine::compile)?;
    }
    Ok(())
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        Self { engine: Mutex::new(engine) }
    }

    /// Session over the built-in dialects
    pub fn with_defaults(config: GrammarlensConfig) -> Self {
        Self::new(Engine::new(default_registry(), config))
    }

    /// Exclusive access to the engine
    pub fn lock(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock()
    }

    pub fn did_open(&self, path: &Path, text: impl Into<String>) {
        self.lock().open_document(path, text);
    }

    /// Editor buffer change
    pub fn did_change(&self, path: &Path, text: impl Into<String>) -> Notification {
        self.lock().notify_change(path, text)
    }

    /// File-system change; reads the file and skips it if the content is unchanged.
    ///
    /// Returns `None` when the notification was skipped.
    pub fn did_change_file(&self, path: &Path) -> Result<Option<Notification>> {
        let text = std::fs::read_to_string(path)?;
        let mut engine = self.lock();
        let unchanged = engine
            .store()
            .find_document(path)
            .is_some_and(|doc| doc.hash() == blake3::hash(text.as_bytes()));
        if unchanged && engine.suppression().state(path) == EchoState::Clean {
            debug!(file = %path.display(), "content unchanged, skipping");
            return Ok(None);
        }
        Ok(Some(engine.notify_change(path, text)))
    }

    pub fn did_close(&self, path: &Path) -> Option<Document> {
        self.lock().close_document(path)
    }

    /// Open every grammar file under `root` and compile
    pub fn load_directory(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut engine = self.lock();
        let filter = IgnoreFilter::new(root, Some(engine.config().exclude.as_slice()));

        let mut loaded = 0usize;
        for entry in WalkBuilder::new(root).build().flatten() {
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file())
                || filter.is_ignored_recursive(path, false)
                || engine.registry().find_dialect(path).is_none()
            {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            engine.open_document(path, text);
            loaded += 1;
        }
        info!(root = %root.display(), files = loaded, "loaded grammar directory");

        guarded(&mut engine, Engine::compile)
    }

    pub fn compile(&self) -> Result<Vec<PathBuf>> {
        guarded(&mut self.lock(), Engine::compile)
    }

    /// Run a transform and apply what it proposes
    pub fn refactor(
        &self,
        transform: &dyn Transform,
        path: &Path,
        offset: usize,
    ) -> Result<BTreeMap<PathBuf, Vec<EditOperation>>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;

        let proposed = catch_unwind(AssertUnwindSafe(|| transform.apply(&engine, path, offset)))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!(transform = transform.name(), %message, "refactoring transform panicked");
                Error::Refactor(message)
            })??;
        guarded(&mut engine, |e| e.apply_refactor_result(proposed))
    }

    pub fn apply_refactor_result(
        &self,
        result: BTreeMap<PathBuf, String>,
    ) -> Result<BTreeMap<PathBuf, Vec<EditOperation>>> {
        guarded(&mut self.lock(), |e| e.apply_refactor_result(result))
    }

    pub fn find_definitions(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.find_definitions(path, offset)
    }

    pub fn find_references_and_definitions(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.find_references_and_definitions(path, offset)
    }

    pub fn highlights(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.highlights(path, offset)
    }

    pub fn get_quick_info(&self, path: &Path, offset: usize) -> Result<Option<QuickInfo>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.get_quick_info(path, offset)
    }

    pub fn completion(&self, path: &Path, offset: usize) -> Result<Vec<String>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.completion(path, offset)
    }

    pub fn rename(
        &self,
        path: &Path,
        offset: usize,
        new_name: &str,
    ) -> Result<BTreeMap<PathBuf, Vec<EditOperation>>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.rename(path, offset, new_name)
    }

    pub fn reformat(&self, path: &Path) -> Result<Vec<EditOperation>> {
        self.lock().reformat(path)
    }

    pub fn diagnostics(&self, path: &Path) -> Result<Vec<Diagnostic>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.diagnostics(path)
    }

    pub fn document_symbols(&self, path: &Path) -> Result<Vec<DocumentSymbol>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.document_symbols(path)
    }

    pub fn classify_range(&self, path: &Path, start: usize, end: usize) -> Result<Vec<ClassifiedSpan>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.classify_range(path, start, end)
    }

    pub fn next_definition(&self, path: &Path, offset: usize, forward: bool) -> Result<Option<usize>> {
        let mut engine = self.lock();
        ensure_compiled(&mut engine)?;
        engine.next_definition(path, offset, forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Dialect, DialectRegistry, RuleSet, antlr4::Antlr4Dialect};
    use crate::edit::apply_edits;
    use crate::syntax::{ParseBackend, ParseOutput};
    use crate::transform::SortParserRules;
    use pretty_assertions::assert_eq;

    fn session_with(files: &[(&str, &str)]) -> Session {
        let session = Session::with_defaults(GrammarlensConfig::default());
        for (path, text) in files {
            session.did_open(Path::new(path), *text);
        }
        session
    }

    fn p(path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    #[test]
    fn test_second_compile_is_empty() {
        let session = session_with(&[("/g/a.g4", "a : b ;"), ("/g/b.g4", "b : 'x' ;")]);
        assert_eq!(session.compile().unwrap().len(), 2);
        assert!(session.compile().unwrap().is_empty());
    }

    #[test]
    fn test_visibility_is_per_directory() {
        let session = session_with(&[
            ("/g/a.g4", "x : 'x' ;"),
            ("/g/b.g4", "r : x ;"),
            ("/h/c.g4", "r : x ;"),
        ]);

        assert_eq!(session.find_definitions(&p("/g/b.g4"), 4).unwrap().len(), 1);
        assert!(session.find_definitions(&p("/h/c.g4"), 4).unwrap().is_empty());
        let engine = session.lock();
        assert!(engine.index().graph.dependents_of(&p("/g/a.g4")).contains(&p("/g/b.g4")));
        assert!(!engine.index().graph.dependents_of(&p("/g/a.g4")).contains(&p("/h/c.g4")));
    }

    #[test]
    fn test_first_definition_wins_regardless_of_open_order() {
        let session = session_with(&[
            ("/g/c.g4", "r : y ;"),
            ("/g/b.g4", "y : 'b' ;"),
            ("/g/a.g4", "y : 'a' ;"),
        ]);
        let defs = session.find_definitions(&p("/g/c.g4"), 4).unwrap();
        assert_eq!(defs, vec![Location { file: p("/g/a.g4"), start: 0, end: 1 }]);
    }

    #[test]
    fn test_editing_definition_rebinds_referencing_file() {
        let session = session_with(&[("/g/a.g4", "z : 'x' ;"), ("/g/b.g4", "r : z ;")]);
        session.compile().unwrap();

        session.did_change(&p("/g/a.g4"), "z : 'y' | 'w' ;");
        assert_eq!(session.compile().unwrap(), vec![p("/g/a.g4"), p("/g/b.g4")]);
    }

    #[test]
    fn test_rename_scenario() {
        let session = session_with(&[("/g/g1.g4", "a: b c ;"), ("/g/g2.g4", "b: 'x' ;")]);

        let defs = session.find_definitions(&p("/g/g1.g4"), 3).unwrap();
        assert_eq!(defs, vec![Location { file: p("/g/g2.g4"), start: 0, end: 1 }]);

        let edits = session.rename(&p("/g/g1.g4"), 3, "bb").unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(
            edits[&p("/g/g1.g4")],
            vec![EditOperation::delete(3, 1), EditOperation::insert(4, "bb")]
        );
        assert_eq!(edits[&p("/g/g2.g4")], EditOperation::substitute(0, 1, "bb").to_vec());
        assert_eq!(apply_edits("a: b c ;", &edits[&p("/g/g1.g4")]), "a: bb c ;");
    }

    #[test]
    fn test_refactor_echo_is_suppressed_once() {
        let session = session_with(&[("/g/a.g4", "b : 'b' ;\na : b ;\n")]);
        let edits = session.refactor(&SortParserRules, &p("/g/a.g4"), 0).unwrap();
        assert!(edits.contains_key(&p("/g/a.g4")));

        let text = session.lock().store().find_document(&p("/g/a.g4")).unwrap().text.clone();
        assert_eq!(text, "a : b ;\nb : 'b' ;\n");
        assert_eq!(session.did_change(&p("/g/a.g4"), text.clone()), Notification::Suppressed);
        assert!(session.compile().unwrap().is_empty());
        assert_eq!(session.did_change(&p("/g/a.g4"), text), Notification::Fresh);
        assert_eq!(session.compile().unwrap(), vec![p("/g/a.g4")]);
    }

    #[test]
    fn test_refactor_with_nothing_to_do() {
        let session = session_with(&[("/g/a.g4", "a : b ;\nb : 'b' ;\n")]);
        let err = session.refactor(&SortParserRules, &p("/g/a.g4"), 0).unwrap_err();
        assert_eq!(err.to_string(), "No changes were needed, none made.");
    }

    struct Exploding;

    impl Transform for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn apply(&self, _: &Engine, _: &Path, _: usize) -> Result<BTreeMap<PathBuf, String>> {
            panic!("transform blew up")
        }
    }

    #[test]
    fn test_panicking_transform_leaves_model_intact() {
        let session = session_with(&[("/g/a.g4", "a : 'x' ;")]);
        session.compile().unwrap();

        let err = session.refactor(&Exploding, &p("/g/a.g4"), 0).unwrap_err();
        assert!(matches!(err, Error::Refactor(message) if message == "transform blew up"));
        let engine = session.lock();
        assert!(engine.index().file(&p("/g/a.g4")).is_some());
        assert!(!engine.needs_compile());
    }

    struct PanickingBackend;

    impl ParseBackend for PanickingBackend {
        fn parse(&self, _text: &str) -> ParseOutput {
            panic!("backend crashed")
        }
    }

    struct Fragile;

    impl Dialect for Fragile {
        fn name(&self) -> &str {
            "fragile"
        }

        fn file_extensions(&self) -> &[&str] {
            &["boom"]
        }

        fn backend(&self) -> &dyn ParseBackend {
            &PanickingBackend
        }

        fn definition_rules(&self) -> RuleSet {
            RuleSet(&[])
        }

        fn reference_rules(&self) -> RuleSet {
            RuleSet(&[])
        }
    }

    #[test]
    fn test_panicking_compile_resets_index() {
        let mut registry = DialectRegistry::new();
        registry.register(Antlr4Dialect::new());
        registry.register(Fragile);
        let session = Session::new(Engine::new(registry, GrammarlensConfig::default()));
        session.did_open(&p("/g/a.g4"), "a : 'x' ;");
        session.compile().unwrap();

        session.did_open(&p("/g/x.boom"), "anything");
        let err = session.compile().unwrap_err();
        assert!(matches!(err, Error::Internal(message) if message == "backend crashed"));
        {
            let engine = session.lock();
            assert!(engine.index().files.is_empty());
            assert!(engine.store().find_document(&p("/g/a.g4")).unwrap().dirty);
        }

        session.did_close(&p("/g/x.boom"));
        assert_eq!(session.compile().unwrap(), vec![p("/g/a.g4")]);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("gen")).unwrap();
        std::fs::create_dir_all(root.join("legacy")).unwrap();
        std::fs::write(root.join("Expr.g4"), "expr : ID ;\n").unwrap();
        std::fs::write(root.join("Lex.g4"), "ID : [a-z]+ ;\n").unwrap();
        std::fs::write(root.join("README.md"), "# grammars\n").unwrap();
        std::fs::write(root.join("gen").join("Expr.g4"), "expr : OTHER ;\n").unwrap();
        std::fs::write(root.join("legacy").join("Old.g4"), "old : 'o' ;\n").unwrap();

        let config = GrammarlensConfig { exclude: vec!["legacy/".to_string()], ..Default::default() };
        let session = Session::with_defaults(config);
        let compiled = session.load_directory(root).unwrap();
        assert_eq!(compiled, vec![root.join("Expr.g4"), root.join("Lex.g4")]);

        let defs = session.find_definitions(&root.join("Expr.g4"), 7).unwrap();
        assert_eq!(defs, vec![Location { file: root.join("Lex.g4"), start: 0, end: 2 }]);
    }

    #[test]
    fn test_did_change_file_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.g4");
        std::fs::write(&path, "a : 'x' ;").unwrap();

        let session = Session::with_defaults(GrammarlensConfig::default());
        session.load_directory(dir.path()).unwrap();
        assert_eq!(session.did_change_file(&path).unwrap(), None);

        std::fs::write(&path, "a : 'y' ;").unwrap();
        assert_eq!(session.did_change_file(&path).unwrap(), Some(Notification::Fresh));
        assert_eq!(session.compile().unwrap(), vec![path]);
    }
}
