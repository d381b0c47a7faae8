//! Change-notification plumbing shared by every tracked container.
//!
//! Each container lives in a [`Node`]: the container data plus a non-owning
//! link to whoever must hear about mutations. For a nested child that is the
//! container holding it; for a root it is the external [`ChangeListener`].
//! Ownership runs strictly downwards (parents own children through their
//! data), so every upward link is a `Weak`.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Receives the "changed" signal from a root tracked container.
///
/// The persistence layer implements this on the attribute slot that holds
/// the root value and reacts by scheduling the column for the next flush.
pub trait ChangeListener {
    /// Mark the owning attribute as modified.
    fn changed(&self);
}

/// Where a node forwards its change notifications.
#[derive(Clone, Default)]
pub(crate) enum Parent {
    /// Not reachable from any root; notifications go nowhere.
    #[default]
    Detached,
    /// Held by another tracked container.
    Container(Weak<dyn Notify>),
    /// Root bound to an attribute slot.
    Listener(Weak<dyn ChangeListener>),
}

impl Parent {
    /// Does the link still point at something alive?
    pub(crate) fn is_live(&self) -> bool {
        match self {
            Parent::Detached => false,
            Parent::Container(parent) => parent.strong_count() > 0,
            Parent::Listener(listener) => listener.strong_count() > 0,
        }
    }

    fn notify(&self) {
        match self {
            Parent::Detached => {}
            Parent::Container(parent) => {
                if let Some(parent) = parent.upgrade() {
                    parent.changed();
                }
            }
            Parent::Listener(listener) => {
                if let Some(listener) = listener.upgrade() {
                    listener.changed();
                }
            }
        }
    }
}

/// The capability every tracked node shares: it can be told it changed and
/// it knows where to pass that on.
pub(crate) trait Notify {
    fn changed(&self);
    fn parent(&self) -> Parent;
}

/// Container data together with its upward link.
pub(crate) struct Node<C> {
    kind: &'static str,
    parent: RefCell<Parent>,
    data: RefCell<C>,
}

impl<C: 'static> Node<C> {
    pub(crate) fn new(kind: &'static str, data: C) -> Rc<Self> {
        Rc::new(Self {
            kind,
            parent: RefCell::new(Parent::Detached),
            data: RefCell::new(data),
        })
    }

    pub(crate) fn read(&self) -> Ref<'_, C> {
        self.data.borrow()
    }

    /// Direct access without notification, for building fresh nodes.
    pub(crate) fn write(&self) -> RefMut<'_, C> {
        self.data.borrow_mut()
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        *self.parent.borrow_mut() = parent;
    }

    /// Apply `f` to the data, then propagate the change upwards.
    ///
    /// The data borrow is released before notifying, so listeners may touch
    /// the tree again.
    pub(crate) fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut C) -> R) -> R {
        let out = {
            let mut data = self.data.borrow_mut();
            f(&mut data)
        };
        self.signal(op);
        out
    }

    pub(crate) fn signal(&self, op: &'static str) {
        tracing::trace!(container = self.kind, op, "Tracked container changed");
        self.changed();
    }
}

impl<C> Notify for Node<C> {
    fn changed(&self) {
        // Clone the link first; the borrow must not be held across the call.
        let parent = self.parent.borrow().clone();
        parent.notify();
    }

    fn parent(&self) -> Parent {
        self.parent.borrow().clone()
    }
}

/// A container that is about to take ownership of inserted values.
pub(crate) struct Owner {
    addr: *const (),
    link: Weak<dyn Notify>,
}

impl Owner {
    pub(crate) fn of<C: 'static>(node: &Rc<Node<C>>) -> Self {
        let link: Weak<dyn Notify> = Rc::downgrade(node) as Weak<_>;
        Self {
            addr: Rc::as_ptr(node).cast(),
            link,
        }
    }

    /// The parent link children of this owner receive.
    pub(crate) fn link(&self) -> Parent {
        Parent::Container(self.link.clone())
    }

    /// True if the node at `addr` is this owner or one of its ancestors.
    pub(crate) fn is_within(&self, addr: *const ()) -> bool {
        if self.addr == addr {
            return true;
        }
        let mut parent = self.link.upgrade().map(|owner| owner.parent());
        while let Some(Parent::Container(link)) = parent {
            let Some(node) = link.upgrade() else {
                return false;
            };
            if Rc::as_ptr(&node).cast::<()>() == addr {
                return true;
            }
            parent = Some(node.parent());
        }
        false
    }
}
