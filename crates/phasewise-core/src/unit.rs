//! Compilation units: one source file and its declaration arena.

use parking_lot::RwLockWriteGuard;

use crate::{
    DeclId, DeclKind, DeclSlots, Declaration, ImportDirective, LockableCache, Phase, SymbolRef,
    SyntaxTree, UnitId, UnitLock, UnitLockGuard,
};

/// One source file: its syntax, its declarations and its lock.
///
/// The declaration at [`DeclId::ROOT`] is always the file declaration.
#[derive(Debug)]
pub struct CompilationUnit {
    id: UnitId,
    path: String,
    package: String,
    syntax: SyntaxTree,
    declarations: Vec<Declaration>,
    imports: Vec<ImportDirective>,
    cache: LockableCache,
}

impl CompilationUnit {
    pub(crate) fn new(
        id: UnitId,
        path: String,
        package: String,
        syntax: SyntaxTree,
        declarations: Vec<Declaration>,
        imports: Vec<ImportDirective>,
        cache: LockableCache,
    ) -> Self {
        debug_assert!(
            declarations
                .first()
                .is_some_and(|root| root.kind == DeclKind::File),
            "the first declaration of a unit must be the file"
        );
        Self {
            id,
            path,
            package,
            syntax,
            declarations,
            imports,
            cache,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn syntax(&self) -> &SyntaxTree {
        &self.syntax
    }

    pub fn imports(&self) -> &[ImportDirective] {
        &self.imports
    }

    pub fn cache(&self) -> &LockableCache {
        &self.cache
    }

    pub fn lock(&self) -> &UnitLock {
        self.cache.lock()
    }

    pub fn root(&self) -> &Declaration {
        &self.declarations[DeclId::ROOT.index()]
    }

    pub fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.index())
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this unit.
    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.declarations[id.index()]
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn symbol(&self, id: DeclId) -> SymbolRef {
        SymbolRef::new(self.id, id)
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: DeclId) -> impl Iterator<Item = DeclId> + '_ {
        std::iter::successors(self.get(id).parent, move |decl| self.get(*decl).parent)
    }

    /// `id` and all of its descendants, pre-order.
    pub fn subtree(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(decl) = stack.pop() {
            out.push(decl);
            stack.extend(self.get(decl).children.iter().rev().copied());
        }
        out
    }

    /// Nested classifier named `name` directly inside `owner`.
    pub fn nested_classifier(&self, owner: DeclId, name: &str) -> Option<DeclId> {
        self.get(owner).children.iter().copied().find(|child| {
            let decl = self.get(*child);
            matches!(decl.kind, DeclKind::Class | DeclKind::TypeAlias)
                && decl.name.as_deref() == Some(name)
        })
    }

    /// Write access to the slots of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `guard` is not a guard of this unit's lock.
    pub fn slots_mut<'a>(
        &'a self,
        id: DeclId,
        guard: &UnitLockGuard<'_>,
    ) -> RwLockWriteGuard<'a, DeclSlots> {
        self.assert_guard(guard);
        self.get(id).slots_lock().write()
    }

    /// Raise the own phase of `id`. Returns the previous value.
    pub fn raise_phase(&self, id: DeclId, phase: Phase, guard: &UnitLockGuard<'_>) -> Phase {
        self.assert_guard(guard);
        self.get(id).phase_cell().raise(phase)
    }

    /// Raise the subtree phase of `id`. Returns the previous value.
    pub fn raise_subtree_phase(
        &self,
        id: DeclId,
        phase: Phase,
        guard: &UnitLockGuard<'_>,
    ) -> Phase {
        self.assert_guard(guard);
        self.get(id).subtree_phase_cell().raise(phase)
    }

    fn assert_guard(&self, guard: &UnitLockGuard<'_>) {
        assert!(
            guard.is_for(self.cache.lock()),
            "{} mutated under the lock of {}",
            self.id,
            guard.unit()
        );
    }
}
