use std::{fmt, rc::Rc};

use crate::runtime::{
    container::{Container, ContentRef},
    path::{Component, Path},
};

/// Resolved location in the tree: a container and an index into its
/// content. Index `-1` means the container itself; no container is the null
/// pointer.
#[derive(Clone)]
pub struct Pointer {
    pub container: Option<Rc<Container>>,
    pub index: i32,
}

impl Pointer {
    pub fn null() -> Self {
        Self {
            container: None,
            index: -1,
        }
    }

    pub fn new(container: Rc<Container>, index: i32) -> Self {
        Self {
            container: Some(container),
            index,
        }
    }

    pub fn start_of(container: Rc<Container>) -> Self {
        Self::new(container, 0)
    }

    pub fn is_null(&self) -> bool {
        self.container.is_none()
    }

    /// The object pointed at. An index past the end resolves to nothing.
    pub fn resolve(&self) -> Option<ContentRef> {
        let container = self.container.as_ref()?;
        if self.index < 0 || container.content().is_empty() {
            return Some(ContentRef::Container(container.clone()));
        }
        container.child(self.index as usize)
    }

    pub fn path(&self) -> Option<Path> {
        let container = self.container.as_ref()?;
        if self.index >= 0 {
            Some(
                container
                    .path()
                    .by_appending_component(Component::Index(self.index as usize)),
            )
        } else {
            Some(container.path().clone())
        }
    }
}

impl Default for Pointer {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && match (&self.container, &other.container) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            None => f.write_str("Pointer(null)"),
            Some(container) => write!(f, "Pointer(-> {}, index {})", container.path(), self.index),
        }
    }
}
