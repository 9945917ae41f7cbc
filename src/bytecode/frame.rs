use std::fmt;

/// Index of a frame in the [`FrameArena`]. Also the frame id the VM sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a subroutine in the registry. Doubles as the provisional `Call`
/// operand until the program is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutineId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Type,
    /// Template parameter of a generic declaration.
    TypeVariable,
}

/// Stable handle to a symbol: owning frame plus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub frame: FrameId,
    pub slot: u32,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Position within the owning frame.
    pub slot: u32,
    pub pos: u32,
    pub declarations: u32,
    /// Hoisted declarations the walker has not visited yet.
    pub pending: u32,
    pub routine: Option<RoutineId>,
    pub frame: FrameId,
}

#[derive(Debug)]
pub struct Frame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub symbols: Vec<Symbol>,
}

/// All frames of one compilation, addressed by id. Frames are never removed,
/// so a popped scope can still be inspected after compilation.
#[derive(Debug)]
pub struct FrameArena {
    frames: Vec<Frame>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                id: FrameId::ROOT,
                parent: None,
                symbols: Vec::new(),
            }],
        }
    }

    /// Create a child of `parent` with the next free id.
    pub fn push_child(&mut self, parent: FrameId) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            id,
            parent: Some(parent),
            symbols: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.get(id).parent
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn symbol(&self, r: SymbolRef) -> &Symbol {
        &self.get(r.frame).symbols[r.slot as usize]
    }

    pub fn symbol_mut(&mut self, r: SymbolRef) -> &mut Symbol {
        &mut self.frames[r.frame.0 as usize].symbols[r.slot as usize]
    }

    /// Search `frame` only.
    pub fn lookup_local(&self, frame: FrameId, name: &str) -> Option<SymbolRef> {
        self.get(frame)
            .symbols
            .iter()
            .position(|s| s.name == name)
            .map(|slot| SymbolRef {
                frame,
                slot: slot as u32,
            })
    }

    /// Search `frame`, then every enclosing frame up to the root.
    pub fn resolve(&self, frame: FrameId, name: &str) -> Option<SymbolRef> {
        let mut current = Some(frame);
        while let Some(id) = current {
            if let Some(found) = self.lookup_local(id, name) {
                return Some(found);
            }
            current = self.parent(id);
        }
        None
    }

    /// Declare `name` in `frame`. A name already present in that frame is
    /// counted as a redeclaration and keeps its slot.
    pub fn declare(&mut self, frame: FrameId, name: &str, kind: SymbolKind, pos: u32) -> SymbolRef {
        match self.lookup_local(frame, name) {
            Some(existing) => {
                let symbol = self.symbol_mut(existing);
                if symbol.pending > 0 {
                    // the walker reached a declaration that was hoisted earlier
                    symbol.pending -= 1;
                } else {
                    symbol.declarations += 1;
                }
                existing
            }
            None => self.append(frame, name, kind, pos, 0),
        }
    }

    /// Register a declaration ahead of the walker so that earlier code can
    /// reference it. The later [`Self::declare`] for it is absorbed.
    pub fn hoist(&mut self, frame: FrameId, name: &str, kind: SymbolKind, pos: u32) -> SymbolRef {
        match self.lookup_local(frame, name) {
            Some(existing) => {
                let symbol = self.symbol_mut(existing);
                symbol.declarations += 1;
                symbol.pending += 1;
                existing
            }
            None => self.append(frame, name, kind, pos, 1),
        }
    }

    fn append(&mut self, frame: FrameId, name: &str, kind: SymbolKind, pos: u32, pending: u32) -> SymbolRef {
        let symbols = &mut self.frames[frame.0 as usize].symbols;
        let slot = symbols.len() as u32;
        symbols.push(Symbol {
            name: name.to_string(),
            kind,
            slot,
            pos,
            declarations: 1,
            pending,
            routine: None,
            frame,
        });
        SymbolRef { frame, slot }
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_ids_increase() {
        let mut arena = FrameArena::new();
        let a = arena.push_child(FrameId::ROOT);
        let b = arena.push_child(a);
        let c = arena.push_child(FrameId::ROOT);
        assert!(a > FrameId::ROOT);
        assert!(b > a);
        assert!(c > b);
        assert_eq!(arena.parent(c), Some(FrameId::ROOT));
        assert_eq!(arena.parent(FrameId::ROOT), None);
    }

    #[test]
    fn test_slots_follow_declaration_order() {
        let mut arena = FrameArena::new();
        let a = arena.declare(FrameId::ROOT, "A", SymbolKind::Type, 0);
        let b = arena.declare(FrameId::ROOT, "B", SymbolKind::Type, 10);
        assert_eq!(a.slot, 0);
        assert_eq!(b.slot, 1);
        assert_eq!(arena.symbol(b).pos, 10);
    }

    #[test]
    fn test_redeclaration_reuses_symbol() {
        let mut arena = FrameArena::new();
        let first = arena.declare(FrameId::ROOT, "A", SymbolKind::Type, 0);
        let second = arena.declare(FrameId::ROOT, "A", SymbolKind::Type, 20);
        assert_eq!(first, second);
        assert_eq!(arena.symbol(first).declarations, 2);
        assert_eq!(arena.get(FrameId::ROOT).symbols.len(), 1);
    }

    #[test]
    fn test_hoisted_declaration_is_claimed_once() {
        let mut arena = FrameArena::new();
        let s = arena.hoist(FrameId::ROOT, "A", SymbolKind::Type, 0);
        arena.hoist(FrameId::ROOT, "A", SymbolKind::Type, 30);
        assert_eq!(arena.symbol(s).declarations, 2);

        arena.declare(FrameId::ROOT, "A", SymbolKind::Type, 0);
        arena.declare(FrameId::ROOT, "A", SymbolKind::Type, 30);
        assert_eq!(arena.symbol(s).declarations, 2);
        assert_eq!(arena.symbol(s).pending, 0);
    }

    #[test]
    fn test_resolve_walks_outward() {
        let mut arena = FrameArena::new();
        arena.declare(FrameId::ROOT, "Outer", SymbolKind::Type, 0);
        let child = arena.push_child(FrameId::ROOT);
        arena.declare(child, "T", SymbolKind::TypeVariable, 5);

        let outer = arena.resolve(child, "Outer").unwrap();
        assert_eq!(outer.frame, FrameId::ROOT);
        assert_eq!(arena.resolve(child, "T").unwrap().frame, child);
        assert_eq!(arena.resolve(FrameId::ROOT, "T"), None);
    }

    #[test]
    fn test_inner_declaration_shadows_outer() {
        let mut arena = FrameArena::new();
        arena.declare(FrameId::ROOT, "T", SymbolKind::Type, 0);
        let child = arena.push_child(FrameId::ROOT);
        arena.declare(child, "T", SymbolKind::TypeVariable, 5);

        let found = arena.resolve(child, "T").unwrap();
        assert_eq!(arena.symbol(found).kind, SymbolKind::TypeVariable);
    }
}
