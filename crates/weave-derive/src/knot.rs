//! Lazily tied references between derived instances.
//!
//! Every type that enters derivation is given a [`Binding`]: an indirection
//! cell allocated before the instance is computed. Fields that refer back
//! to a type still being derived receive a weak view of that binding instead
//! of a recursive derivation. Once the enclosing type is assembled the cell
//! is filled and every placeholder sees the finished instance. This is what
//! lets a `Node { children: List<Node> }` derive in finite time.
//!
//! Placeholders only ever point up the stack, at a type whose own instance
//! (directly or through its fields) holds the placeholder. Holding them
//! weakly keeps the instance graph free of reference cycles; the root of the
//! graph is owned by the [`Derived`] handle returned to the caller.

use std::cell::OnceCell;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::ty::Ty;

/// Unique name of a binding within one derivation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingName(pub u32);

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

type Cell<I> = OnceCell<Rc<I>>;

enum Slot<I> {
    Owned(Rc<Cell<I>>),
    Deferred(Weak<Cell<I>>),
}

/// A shared, write-once slot for a derived instance.
pub struct Binding<I> {
    name: BindingName,
    slot: Slot<I>,
}

impl<I> Clone for Binding<I> {
    fn clone(&self) -> Self {
        let slot = match &self.slot {
            Slot::Owned(cell) => Slot::Owned(Rc::clone(cell)),
            Slot::Deferred(cell) => Slot::Deferred(Weak::clone(cell)),
        };
        Binding {
            name: self.name,
            slot,
        }
    }
}

impl<I> fmt::Debug for Binding<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("deferred", &self.is_deferred())
            .field("filled", &self.is_filled())
            .finish()
    }
}

impl<I> Binding<I> {
    pub fn new(name: BindingName) -> Self {
        Binding {
            name,
            slot: Slot::Owned(Rc::new(OnceCell::new())),
        }
    }

    /// A binding that is already filled, for instances built outside a
    /// derivation request.
    pub fn ready(name: BindingName, instance: I) -> Self {
        let binding = Binding::new(name);
        binding.fill(instance);
        binding
    }

    pub fn name(&self) -> BindingName {
        self.name
    }

    /// Whether this is a placeholder for a binding further up the stack.
    pub fn is_deferred(&self) -> bool {
        matches!(self.slot, Slot::Deferred(_))
    }

    /// A placeholder sharing this binding's cell without owning it.
    pub(crate) fn deferred(&self) -> Binding<I> {
        let slot = match &self.slot {
            Slot::Owned(cell) => Slot::Deferred(Rc::downgrade(cell)),
            Slot::Deferred(cell) => Slot::Deferred(Weak::clone(cell)),
        };
        Binding {
            name: self.name,
            slot,
        }
    }

    fn cell(&self) -> Option<Rc<Cell<I>>> {
        match &self.slot {
            Slot::Owned(cell) => Some(Rc::clone(cell)),
            Slot::Deferred(cell) => cell.upgrade(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.try_get().is_some()
    }

    /// Fill the slot. Returns `false` if it was already filled (the first
    /// instance is kept) or its owner is gone.
    pub(crate) fn fill(&self, instance: I) -> bool {
        match self.cell() {
            Some(cell) => cell.set(Rc::new(instance)).is_ok(),
            None => false,
        }
    }

    pub fn try_get(&self) -> Option<Rc<I>> {
        self.cell().and_then(|cell| cell.get().cloned())
    }

    /// The bound instance.
    ///
    /// A successful derivation fills every reachable binding before
    /// returning, so this only panics when an instance is exercised from
    /// inside a `combine`/`dispatch` hook, before assembly has finished, or
    /// after the [`Derived`] that owns the graph has been dropped.
    pub fn get(&self) -> Rc<I> {
        match self.try_get() {
            Some(instance) => instance,
            None if self.cell().is_none() => panic!(
                "binding {} outlived the derivation that owned it",
                self.name
            ),
            None => panic!(
                "binding {} was used before its derivation completed",
                self.name
            ),
        }
    }
}

/// A derived instance, together with ownership of the instance graph it
/// belongs to. Dereferences to the instance.
pub struct Derived<I> {
    instance: Rc<I>,
    root: Binding<I>,
}

impl<I> Derived<I> {
    /// `None` unless `root` is an owning, filled binding.
    pub(crate) fn new(root: Binding<I>) -> Option<Self> {
        if root.is_deferred() {
            return None;
        }
        let instance = root.try_get()?;
        Some(Derived { instance, root })
    }

    pub fn binding(&self) -> &Binding<I> {
        &self.root
    }
}

impl<I> Clone for Derived<I> {
    fn clone(&self) -> Self {
        Derived {
            instance: Rc::clone(&self.instance),
            root: self.root.clone(),
        }
    }
}

impl<I> Deref for Derived<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.instance
    }
}

impl<I: fmt::Debug> fmt::Debug for Derived<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.instance, f)
    }
}

impl<I: fmt::Display> fmt::Display for Derived<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.instance, f)
    }
}

/// The outcome of resolving one capability reference.
#[derive(Debug)]
pub enum Resolution<I> {
    /// Derived, looked up, or taken from the cache.
    Found(Binding<I>),
    /// The type is already being derived further up the stack; this is a
    /// placeholder for that enclosing binding.
    Deferred(Binding<I>),
    /// Could not be resolved; the leaf has been recorded on the stack.
    NotFound,
}

impl<I> Resolution<I> {
    pub fn binding(&self) -> Option<&Binding<I>> {
        match self {
            Resolution::Found(b) | Resolution::Deferred(b) => Some(b),
            Resolution::NotFound => None,
        }
    }

    pub fn into_binding(self) -> Option<Binding<I>> {
        match self {
            Resolution::Found(b) | Resolution::Deferred(b) => Some(b),
            Resolution::NotFound => None,
        }
    }
}

/// Outcome of tying every deferred placeholder of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnotSummary {
    /// Placeholders whose target was filled.
    pub tied: usize,
    /// Placeholders whose target derivation failed. The engine evicts every
    /// cached result that could have captured one, so these are unreachable
    /// from a successful instance and are dropped.
    pub dangling: Vec<(BindingName, Ty)>,
}

/// Deferred placeholders emitted during one derivation request.
pub struct DeferredRefs<I> {
    pending: Vec<(Ty, Binding<I>)>,
}

impl<I> Default for DeferredRefs<I> {
    fn default() -> Self {
        DeferredRefs {
            pending: Vec::new(),
        }
    }
}

impl<I> DeferredRefs<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placeholder pointing at `target`'s binding and return it.
    pub fn defer(&mut self, ty: &Ty, target: &Binding<I>) -> Binding<I> {
        let placeholder = target.deferred();
        self.pending.push((ty.clone(), placeholder.clone()));
        placeholder
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Tie every placeholder to its binding. Consumes the set, so it can
    /// only happen once, at the outermost call.
    pub fn tie(self) -> KnotSummary {
        let mut summary = KnotSummary::default();
        for (ty, binding) in self.pending {
            if binding.is_filled() {
                summary.tied += 1;
            } else {
                summary.dangling.push((binding.name(), ty));
            }
        }
        summary
    }
}
