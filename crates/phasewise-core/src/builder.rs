//! Construction of compilation units.
//!
//! Parsing happens elsewhere; a front end (or a test) describes each
//! declaration with a [`DeclSpec`] and hands it to a [`UnitBuilder`], which
//! creates the matching syntax node, the declaration and its initial slots.
//!
//! ```
//! use phasewise_core::{DeclId, DeclSpec, TypeExpr, UnitBuilder, UnitId};
//!
//! let mut builder = UnitBuilder::new("shapes.kt", "geo");
//! let shape = builder.add(DeclId::ROOT, DeclSpec::interface("Shape"));
//! let square = builder.add(
//!     DeclId::ROOT,
//!     DeclSpec::class("Square").with_supertype(TypeExpr::named("Shape")),
//! );
//! builder.add(square, DeclSpec::property("side").with_type(TypeExpr::named("Int")));
//!
//! let unit = builder.build(UnitId::new(0));
//! assert_eq!(unit.get(shape).fq_name.as_ref().unwrap().to_string(), "geo.Shape");
//! assert_eq!(unit.get(DeclId::ROOT).children, vec![shape, square]);
//! ```

use rustc_hash::FxHashMap;

use crate::{
    ClassKind, CompilationUnit, DeclFlags, DeclId, DeclKind, DeclSlots, Declaration, FqName,
    ImportDirective, LockableCache, NodeKind, Origin, RawEffect, SourceElement, Span,
    SyntaxNodeId, SyntaxTree, TypeExpr, TypeSlot, UnitId,
};

/// Description of one declaration to add to a unit.
#[derive(Debug, Clone)]
pub struct DeclSpec {
    pub kind: DeclKind,
    /// Syntax node kind created for the declaration.
    pub node: NodeKind,
    pub name: Option<String>,
    pub class_kind: Option<ClassKind>,
    pub flags: DeclFlags,
    pub origin: Origin,
    pub supertypes: Vec<TypeExpr>,
    /// Return type, property type, parameter type.
    pub declared_type: Option<TypeExpr>,
    pub receiver: Option<TypeExpr>,
    /// Right-hand side of a type alias.
    pub expansion: Option<TypeExpr>,
    pub bounds: Vec<TypeExpr>,
    pub annotations: Vec<TypeExpr>,
    pub initializer: Option<TypeExpr>,
    pub contract: Vec<RawEffect>,
    /// Borrow the syntax node of another declaration instead of creating one.
    pub fake_source: Option<DeclId>,
    pub span: Span,
}

impl DeclSpec {
    pub fn new(kind: DeclKind, node: NodeKind, name: Option<&str>) -> Self {
        Self {
            kind,
            node,
            name: name.map(str::to_string),
            class_kind: None,
            flags: DeclFlags::empty(),
            origin: Origin::Source,
            supertypes: Vec::new(),
            declared_type: None,
            receiver: None,
            expansion: None,
            bounds: Vec::new(),
            annotations: Vec::new(),
            initializer: None,
            contract: Vec::new(),
            fake_source: None,
            span: Span::default(),
        }
    }

    fn classifier(name: &str, class_kind: ClassKind) -> Self {
        let mut spec = Self::new(DeclKind::Class, NodeKind::Class, Some(name));
        spec.class_kind = Some(class_kind);
        spec
    }

    pub fn class(name: &str) -> Self {
        Self::classifier(name, ClassKind::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::classifier(name, ClassKind::Interface)
    }

    pub fn enum_class(name: &str) -> Self {
        Self::classifier(name, ClassKind::Enum)
    }

    pub fn annotation_class(name: &str) -> Self {
        Self::classifier(name, ClassKind::Annotation)
    }

    /// A named `object` declaration.
    pub fn object(name: &str) -> Self {
        Self::classifier(name, ClassKind::Object)
    }

    /// An `object : T { }` expression.
    pub fn anonymous_object() -> Self {
        let mut spec = Self::new(DeclKind::AnonymousObject, NodeKind::Object, None);
        spec.class_kind = Some(ClassKind::Object);
        spec
    }

    pub fn type_alias(name: &str, expansion: TypeExpr) -> Self {
        let mut spec = Self::new(DeclKind::TypeAlias, NodeKind::TypeAlias, Some(name));
        spec.expansion = Some(expansion);
        spec
    }

    pub fn function(name: &str) -> Self {
        Self::new(DeclKind::Function, NodeKind::Function, Some(name))
    }

    /// A lambda or anonymous function literal.
    pub fn anonymous_function() -> Self {
        Self::new(DeclKind::AnonymousFunction, NodeKind::FunctionLiteral, None)
    }

    pub fn primary_constructor() -> Self {
        Self::new(DeclKind::Constructor, NodeKind::PrimaryConstructor, None)
    }

    pub fn constructor() -> Self {
        Self::new(DeclKind::Constructor, NodeKind::SecondaryConstructor, None)
    }

    pub fn property(name: &str) -> Self {
        Self::new(DeclKind::Property, NodeKind::Property, Some(name))
    }

    pub fn getter() -> Self {
        Self::new(DeclKind::Accessor, NodeKind::Accessor, Some("<get>"))
    }

    pub fn setter() -> Self {
        Self::new(DeclKind::Accessor, NodeKind::Accessor, Some("<set>"))
    }

    pub fn parameter(name: &str, ty: TypeExpr) -> Self {
        Self::new(
            DeclKind::Parameter,
            NodeKind::Parameter { val_or_var: false },
            Some(name),
        )
        .with_type(ty)
    }

    /// A `val`/`var` parameter of a primary constructor.
    pub fn property_parameter(name: &str, ty: TypeExpr) -> Self {
        Self::new(
            DeclKind::Parameter,
            NodeKind::Parameter { val_or_var: true },
            Some(name),
        )
        .with_type(ty)
    }

    pub fn type_parameter(name: &str) -> Self {
        Self::new(DeclKind::TypeParameter, NodeKind::TypeParameter, Some(name))
    }

    pub fn enum_entry(name: &str) -> Self {
        Self::new(DeclKind::EnumEntry, NodeKind::EnumEntry, Some(name))
    }

    /// A synthetic backing field. Fields have no syntax of their own, so a
    /// fake source is expected.
    pub fn field(name: &str, ty: TypeExpr) -> Self {
        Self::new(DeclKind::Field, NodeKind::Property, Some(name))
            .with_type(ty)
            .with_origin(Origin::Synthetic)
    }

    /// An anonymous `init { }` block.
    pub fn initializer() -> Self {
        Self::new(DeclKind::Initializer, NodeKind::Initializer, None)
    }

    pub fn local_variable(name: &str) -> Self {
        Self::new(DeclKind::LocalVariable, NodeKind::Property, Some(name))
    }

    /// One entry of `val (a, b) = ...`.
    pub fn destructuring_entry(name: &str) -> Self {
        Self::new(
            DeclKind::LocalVariable,
            NodeKind::DestructuringEntry,
            Some(name),
        )
    }

    pub fn with_supertype(mut self, ty: TypeExpr) -> Self {
        self.supertypes.push(ty);
        self
    }

    pub fn with_type(mut self, ty: TypeExpr) -> Self {
        self.declared_type = Some(ty);
        self
    }

    pub fn with_receiver(mut self, ty: TypeExpr) -> Self {
        self.receiver = Some(ty);
        self
    }

    pub fn with_bound(mut self, ty: TypeExpr) -> Self {
        self.bounds.push(ty);
        self
    }

    pub fn with_annotation(mut self, ty: TypeExpr) -> Self {
        self.annotations.push(ty);
        self
    }

    /// Type of a property initializer, as far as syntax can tell.
    pub fn with_initializer(mut self, hint: TypeExpr) -> Self {
        self.initializer = Some(hint);
        self
    }

    /// `fun f() = expr` where `expr` is known to have type `hint`.
    pub fn with_expression_body(mut self, hint: TypeExpr) -> Self {
        self.flags |= DeclFlags::HAS_BODY | DeclFlags::EXPRESSION_BODY;
        self.initializer = Some(hint);
        self
    }

    /// `fun f() { ... }`
    pub fn with_block_body(mut self) -> Self {
        self.flags |= DeclFlags::HAS_BODY;
        self
    }

    pub fn with_flags(mut self, flags: DeclFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_effect(mut self, effect: RawEffect) -> Self {
        self.contract.push(effect);
        self
    }

    pub fn with_fake_source(mut self, of: DeclId) -> Self {
        self.fake_source = Some(of);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Incrementally builds one [`CompilationUnit`].
#[derive(Debug)]
pub struct UnitBuilder {
    path: String,
    package: String,
    syntax: SyntaxTree,
    declarations: Vec<Declaration>,
    imports: Vec<ImportDirective>,
    /// Body block node of each declaration that received locals.
    bodies: FxHashMap<DeclId, SyntaxNodeId>,
}

impl UnitBuilder {
    pub fn new(path: impl Into<String>, package: impl Into<String>) -> Self {
        let path = path.into();
        let root = Declaration::new(
            DeclId::ROOT,
            DeclKind::File,
            Some(path.clone()),
            None,
            Origin::Source,
            DeclFlags::empty(),
            None,
            SourceElement {
                node: SyntaxNodeId::ROOT,
                fake: false,
            },
            None,
            false,
            None,
            Vec::new(),
            DeclSlots::default(),
        );
        Self {
            path,
            package: package.into(),
            syntax: SyntaxTree::new(),
            declarations: vec![root],
            imports: Vec::new(),
            bodies: FxHashMap::default(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn import(&mut self, directive: ImportDirective) -> &mut Self {
        self.imports.push(directive);
        self
    }

    pub fn file_annotation(&mut self, annotation: TypeExpr) -> &mut Self {
        self.declarations[DeclId::ROOT.index()]
            .slots_get_mut()
            .annotations
            .push(TypeSlot::Unresolved(annotation));
        self
    }

    /// Add a declaration in member (or header) position of `parent`.
    pub fn add(&mut self, parent: DeclId, spec: DeclSpec) -> DeclId {
        let anchor = self.declarations[parent.index()].source.node;
        self.insert(parent, anchor, spec)
    }

    /// Add a declaration inside the executable body of `owner`.
    pub fn add_local(&mut self, owner: DeclId, spec: DeclSpec) -> DeclId {
        let owner_decl = &self.declarations[owner.index()];
        let owner_node = owner_decl.source.node;
        let span = spec.span;
        let body = *self
            .bodies
            .entry(owner)
            .or_insert_with(|| self.syntax.push(NodeKind::Block, owner_node, span));
        let owner_decl = &mut self.declarations[owner.index()];
        if owner_decl.kind != DeclKind::Property {
            owner_decl.flags |= DeclFlags::HAS_BODY;
        }
        self.insert(owner, body, spec)
    }

    fn insert(&mut self, parent: DeclId, anchor: SyntaxNodeId, spec: DeclSpec) -> DeclId {
        let id = DeclId::new(self.declarations.len() as u32);
        let source = match spec.fake_source {
            Some(of) => SourceElement {
                node: self.declarations[of.index()].source.node,
                fake: true,
            },
            None => SourceElement {
                node: self.syntax.push(spec.node, anchor, spec.span),
                fake: false,
            },
        };
        let is_local = self.syntax.is_local(source.node);
        let fq_name = self.fq_name_for(parent, &spec, is_local);

        let slots = DeclSlots {
            supertypes: spec
                .supertypes
                .into_iter()
                .map(TypeSlot::Unresolved)
                .collect(),
            return_type: TypeSlot::from_written(spec.declared_type),
            receiver_type: spec.receiver.map(TypeSlot::Unresolved),
            expanded_type: spec.expansion.map(TypeSlot::Unresolved),
            bounds: spec.bounds.into_iter().map(TypeSlot::Unresolved).collect(),
            annotations: spec
                .annotations
                .into_iter()
                .map(TypeSlot::Unresolved)
                .collect(),
            ..DeclSlots::default()
        };

        let decl = Declaration::new(
            id,
            spec.kind,
            spec.name,
            Some(parent),
            spec.origin,
            spec.flags,
            spec.class_kind,
            source,
            fq_name,
            is_local,
            spec.initializer,
            spec.contract,
            slots,
        );
        self.declarations.push(decl);
        self.declarations[parent.index()].children.push(id);
        id
    }

    fn fq_name_for(&self, parent: DeclId, spec: &DeclSpec, is_local: bool) -> Option<FqName> {
        if is_local || !matches!(spec.kind, DeclKind::Class | DeclKind::TypeAlias) {
            return None;
        }
        let name = spec.name.as_deref()?;
        let parent = &self.declarations[parent.index()];
        if parent.is_file() {
            Some(FqName::top_level(self.package.clone(), name))
        } else {
            parent.fq_name.as_ref().map(|outer| outer.child(name))
        }
    }

    /// Finish the unit under the given id.
    pub fn build(self, id: UnitId) -> CompilationUnit {
        let index: FxHashMap<SyntaxNodeId, DeclId> = self
            .declarations
            .iter()
            .filter(|decl| !decl.source.fake)
            .map(|decl| (decl.source.node, decl.id))
            .collect();
        let cache = LockableCache::new(id, index);
        CompilationUnit::new(
            id,
            self.path,
            self.package,
            self.syntax,
            self.declarations,
            self.imports,
            cache,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Phase;

    #[test]
    fn nested_classes_get_qualified_names() {
        let mut builder = UnitBuilder::new("a.kt", "p");
        let outer = builder.add(DeclId::ROOT, DeclSpec::class("Outer"));
        let inner = builder.add(outer, DeclSpec::class("Inner"));
        let unit = builder.build(UnitId::new(1));

        assert_eq!(unit.get(inner).fq_name, Some(FqName::top_level("p", "Outer").child("Inner")));
        assert_eq!(unit.get(inner).parent, Some(outer));
        assert_eq!(unit.ancestors(inner).collect::<Vec<_>>(), vec![outer, DeclId::ROOT]);
    }

    #[test]
    fn locals_live_in_a_body_block() {
        let mut builder = UnitBuilder::new("a.kt", "p");
        let f = builder.add(DeclId::ROOT, DeclSpec::function("f"));
        let x = builder.add_local(f, DeclSpec::local_variable("x"));
        let local_class = builder.add_local(f, DeclSpec::class("L"));
        let unit = builder.build(UnitId::new(1));

        assert!(unit.get(f).flags.contains(DeclFlags::HAS_BODY));
        assert!(!unit.get(f).is_local);
        assert!(unit.get(x).is_local);
        assert!(unit.get(local_class).is_local);
        assert_eq!(unit.get(local_class).fq_name, None);

        // Both locals share the same body block.
        let block_x = unit.syntax().parent(unit.get(x).source.node);
        let block_l = unit.syntax().parent(unit.get(local_class).source.node);
        assert_eq!(block_x, block_l);
        assert_eq!(unit.syntax().kind(block_x.unwrap()), NodeKind::Block);
    }

    #[test]
    fn fake_sources_are_not_indexed() {
        let mut builder = UnitBuilder::new("a.kt", "p");
        let prop = builder.add(DeclId::ROOT, DeclSpec::property("x"));
        let getter = builder.add(
            prop,
            DeclSpec::getter()
                .with_origin(Origin::Synthetic)
                .with_fake_source(prop),
        );
        let unit = builder.build(UnitId::new(1));

        let node = unit.get(getter).source.node;
        assert!(unit.get(getter).source.fake);
        assert_eq!(node, unit.get(prop).source.node);
        assert_eq!(unit.cache().declaration_for(node), Some(prop));
    }

    #[test]
    fn ineligible_origins_start_resolved() {
        let mut builder = UnitBuilder::new("a.kt", "p");
        let lib = builder.add(
            DeclId::ROOT,
            DeclSpec::class("Lib").with_origin(Origin::Library),
        );
        let src = builder.add(DeclId::ROOT, DeclSpec::class("Src"));
        let unit = builder.build(UnitId::new(1));

        assert_eq!(unit.get(lib).phase(), Phase::BodyResolve);
        assert_eq!(unit.get(src).phase(), Phase::Raw);
    }

    #[test]
    fn written_types_start_unresolved() {
        let mut builder = UnitBuilder::new("a.kt", "p");
        builder.file_annotation(TypeExpr::named("Suppress"));
        let f = builder.add(
            DeclId::ROOT,
            DeclSpec::function("f").with_type(TypeExpr::named("Int")),
        );
        let g = builder.add(DeclId::ROOT, DeclSpec::function("g"));
        let unit = builder.build(UnitId::new(1));

        assert!(!unit.get(f).slots().return_type.is_settled());
        assert!(unit.get(g).slots().return_type.is_implicit());
        assert_eq!(unit.root().slots().annotations.len(), 1);
    }
}
