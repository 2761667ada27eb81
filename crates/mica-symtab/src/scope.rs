//! Lexical scopes and local slot allocation.

use std::fmt::Write;

use indexmap::IndexMap;
use log::{debug, trace};
use mica_syntax::ast::Node;
use mica_syntax::error::{Error, Result};

/// Index of a scope inside its [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// One lexical nesting level.
#[derive(Debug)]
pub struct Scope {
    /// name -> declaration, in declaration order
    bindings: IndexMap<String, Node>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    slot_counter: u16,
    is_global: bool,
}

impl Scope {
    fn new(parent: Option<ScopeId>, slot_counter: u16, is_global: bool) -> Self {
        Self { bindings: IndexMap::new(), parent, children: Vec::new(), slot_counter, is_global }
    }

    pub fn parent(&self) -> Option<ScopeId> { self.parent }
    pub fn children(&self) -> &[ScopeId] { &self.children }
    pub fn is_global(&self) -> bool { self.is_global }
    /// Next free local slot.
    pub fn slot_counter(&self) -> u16 { self.slot_counter }

    pub fn get(&self, name: &str) -> Option<&Node> { self.bindings.get(name) }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.bindings.len() }
    pub fn is_empty(&self) -> bool { self.bindings.is_empty() }
}

/// A tree of scopes rooted at the global scope.
///
/// The table owns every scope it ever created; leaving a scope only moves the
/// cursor back to the parent so the finished child can still be dumped.
/// Dropping the table releases the whole tree.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable { fn default() -> Self { Self::new() } }

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::new(None, 0, true)], current: ScopeId(0) }
    }

    pub fn root(&self) -> ScopeId { ScopeId(0) }
    pub fn current(&self) -> ScopeId { self.current }
    pub fn scope(&self, id: ScopeId) -> &Scope { &self.scopes[id.0] }

    /// Opens a child of the current scope and makes it current.
    ///
    /// Function scopes start allocating slots at 0; nested blocks continue
    /// from the enclosing scope's counter so their locals never alias it.
    pub fn enter_scope(&mut self) -> ScopeId {
        let parent = self.scope(self.current);
        let start = if parent.is_global { 0 } else { parent.slot_counter };
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(Some(self.current), start, false));
        self.scopes[self.current.0].children.push(id);
        trace!("enter scope {:?} (parent {:?}, first slot {})", id, self.current, start);
        self.current = id;
        id
    }

    /// Returns to the parent scope. Returns `None` at the root.
    pub fn exit_scope(&mut self) -> Option<ScopeId> {
        let parent = self.scope(self.current).parent?;
        trace!("exit scope {:?}", self.current);
        self.current = parent;
        Some(parent)
    }

    /// Nearest binding of `name`, searching outward from the current scope.
    pub fn lookup(&self, name: &str) -> Option<&Node> {
        self.lookup_from(self.current, name)
    }

    pub fn lookup_from(&self, start: ScopeId, name: &str) -> Option<&Node> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if let Some(node) = scope.get(name) { return Some(node); }
            cursor = scope.parent;
        }
        None
    }

    /// Declares `node` in the current scope.
    ///
    /// Plain locals receive the next slot, which is also written back onto
    /// `node`. Non-function bindings of the global scope are marked global
    /// and never take a slot. Returns the assigned slot, if any.
    pub fn insert(&mut self, node: &mut Node) -> Result<Option<u16>> {
        let scope = &mut self.scopes[self.current.0];
        if scope.bindings.contains_key(&node.name) {
            return Err(Error::Redeclared { name: node.name.clone() });
        }
        if scope.is_global && !node.is_func {
            node.is_global = true;
        }
        if node.is_plain_local() {
            let slot = scope.slot_counter;
            scope.slot_counter = slot
                .checked_add(1)
                .ok_or_else(|| Error::SlotOverflow { name: node.name.clone() })?;
            node.slot = Some(slot);
        }
        debug!("declare '{}' ({}) in {:?} -> slot {:?}", node.name, node.data_type, self.current, node.slot);
        scope.bindings.insert(node.name.clone(), node.clone());
        Ok(node.slot)
    }

    /// Listing of the current scope.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_table(&mut out, self.current, 0);
        out
    }

    /// Listing of `id` and every scope nested under it, indented by depth.
    pub fn dump_recursive(&self, id: ScopeId, depth: usize) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, id, depth);
        out
    }

    fn write_tree(&self, out: &mut String, id: ScopeId, depth: usize) {
        self.write_table(out, id, depth);
        for &child in &self.scope(id).children {
            self.write_tree(out, child, depth + 1);
        }
    }

    fn write_table(&self, out: &mut String, id: ScopeId, depth: usize) {
        let pad = "    ".repeat(depth);
        let rule = 84;
        let _ = writeln!(out, "{pad}{}", "=".repeat(rule));
        let _ = writeln!(
            out,
            "{pad}{:<30}{:<15}{:<10}{:<10}{:<10}{:<10}{:<10}",
            "Symbol Name", "Data Type", "isConst", "isArray", "isFunc", "isGlobal", "slot"
        );
        let _ = writeln!(out, "{pad}{}", "-".repeat(rule));
        for (name, node) in self.scope(id).bindings() {
            let slot = node.slot.map_or_else(|| "-".to_string(), |s| s.to_string());
            let _ = writeln!(
                out,
                "{pad}{:<30}{:<15}{:<10}{:<10}{:<10}{:<10}{:<10}",
                name, node.data_type.name(), node.is_const, node.is_array, node.is_func, node.is_global, slot
            );
        }
        let _ = writeln!(out, "{pad}{}", "=".repeat(rule));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_syntax::ast::{DataType, Literal};

    fn local(name: &str) -> Node { Node::variable(name, DataType::Int, None) }

    #[test]
    fn slots_increase_in_declaration_order() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let slots: Vec<_> = ["a", "b", "c"].iter().map(|n| table.insert(&mut local(n)).unwrap()).collect();
        assert_eq!(slots, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(table.scope(table.current()).slot_counter(), 3);
    }

    #[test]
    fn special_bindings_take_no_slot() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let mut k = Node::constant("K", DataType::Int, Literal::Int(7));
        let mut arr = local("arr");
        arr.is_array = true;
        let mut f = Node::function("f", DataType::Void, vec![]);
        let mut g = local("g");
        g.is_global = true;
        for n in [&mut k, &mut arr, &mut f, &mut g] {
            assert_eq!(table.insert(n).unwrap(), None);
            assert_eq!(n.slot, None);
        }
        assert_eq!(table.insert(&mut local("x")).unwrap(), Some(0));
    }

    #[test]
    fn globals_are_marked_and_never_slotted() {
        let mut table = SymbolTable::new();
        let mut x = local("x");
        assert_eq!(table.insert(&mut x).unwrap(), None);
        assert!(x.is_global);
        let mut f = Node::function("main", DataType::Void, vec![]);
        table.insert(&mut f).unwrap();
        assert!(!f.is_global);
        assert!(table.lookup("x").unwrap().is_global);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.insert(&mut local("x")).unwrap();
        let err = table.insert(&mut local("x")).unwrap_err();
        assert!(matches!(err, Error::Redeclared { ref name } if name == "x"));
        assert_eq!(table.scope(table.current()).len(), 1);
    }

    #[test]
    fn exhausted_slot_range_is_reported() {
        let mut table = SymbolTable::new();
        let id = table.enter_scope();
        table.scopes[id.0].slot_counter = u16::MAX;
        let err = table.insert(&mut local("last")).unwrap_err();
        assert!(matches!(err, Error::SlotOverflow { ref name } if name == "last"));
        assert_eq!(err.to_string(), "no local slot left for 'last'");
        assert!(table.lookup("last").is_none());
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut table = SymbolTable::new();
        table.insert(&mut Node::variable("x", DataType::Bool, None)).unwrap();
        table.enter_scope();
        table.insert(&mut local("x")).unwrap();
        assert_eq!(table.lookup("x").unwrap().data_type, DataType::Int);
        table.exit_scope();
        assert_eq!(table.lookup("x").unwrap().data_type, DataType::Bool);
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn nested_block_continues_parent_slots() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.insert(&mut local("a")).unwrap();
        table.enter_scope();
        assert_eq!(table.insert(&mut local("b")).unwrap(), Some(1));
        table.exit_scope();
        table.exit_scope();
        // a second function starts over
        table.enter_scope();
        assert_eq!(table.insert(&mut local("c")).unwrap(), Some(0));
        assert_eq!(table.exit_scope(), Some(table.root()));
        assert_eq!(table.exit_scope(), None);
    }

    #[test]
    fn dump_lists_bindings_in_order_with_indentation() {
        let mut table = SymbolTable::new();
        table.insert(&mut local("zeta")).unwrap();
        table.insert(&mut local("alpha")).unwrap();
        table.enter_scope();
        table.insert(&mut local("inner")).unwrap();
        table.exit_scope();

        let top = table.dump();
        let zeta = top.find("zeta").unwrap();
        let alpha = top.find("alpha").unwrap();
        assert!(zeta < alpha);
        assert!(!top.contains("inner"));

        let all = table.dump_recursive(table.root(), 0);
        let inner_line = all.lines().find(|l| l.contains("inner")).unwrap();
        assert!(inner_line.starts_with("    inner"));
    }
}
