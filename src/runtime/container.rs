use std::{
    cell::OnceCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use crate::runtime::{
    debug_metadata::DebugMetadata,
    error::StoryError,
    object::Content,
    path::{Component, Path},
};

/// Visit/turn counting flags of a container (`#f` in JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountFlags(u8);

impl CountFlags {
    pub const VISITS: u8 = 1;
    pub const TURNS: u8 = 2;
    pub const COUNT_START_ONLY: u8 = 4;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7)
    }

    /// Flags as written out. A lone start-only flag means nothing without
    /// one of the counters, so it is dropped.
    pub fn bits(self) -> u8 {
        if self.0 == Self::COUNT_START_ONLY {
            0
        } else {
            self.0
        }
    }

    pub fn visits(self) -> bool {
        self.0 & Self::VISITS != 0
    }

    pub fn turns(self) -> bool {
        self.0 & Self::TURNS != 0
    }

    pub fn start_only(self) -> bool {
        self.0 & Self::COUNT_START_ONLY != 0
    }
}

/// Node of the content tree.
///
/// Children are owned through `content` (executed in order) and
/// `named_only` (reachable by name only, e.g. knots and stitches). The
/// parent link is weak and can be set exactly once, when the parent is
/// built.
pub struct Container {
    name: Option<Rc<str>>,
    content: Vec<Content>,
    named: HashMap<Rc<str>, Rc<Container>>,
    named_only: Vec<Rc<Container>>,
    count_flags: CountFlags,
    debug_metadata: Option<DebugMetadata>,
    parent: OnceCell<Weak<Container>>,
    path: OnceCell<Path>,
}

/// Something a path or pointer resolved to.
#[derive(Clone)]
pub enum ContentRef {
    Container(Rc<Container>),
    /// A leaf, addressed by its owning container and index.
    Item {
        container: Rc<Container>,
        index: usize,
    },
}

impl ContentRef {
    pub fn as_container(&self) -> Option<&Rc<Container>> {
        match self {
            ContentRef::Container(container) => Some(container),
            ContentRef::Item { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            ContentRef::Container(_) => None,
            ContentRef::Item { container, index } => container.content().get(*index),
        }
    }

    pub fn path(&self) -> Path {
        match self {
            ContentRef::Container(container) => container.path().clone(),
            ContentRef::Item { container, index } => container
                .path()
                .by_appending_component(Component::Index(*index)),
        }
    }

    /// Container to resolve relative paths from: the container itself, or
    /// the owner of a leaf.
    pub fn nearest_container(&self) -> &Rc<Container> {
        match self {
            ContentRef::Container(container) => container,
            ContentRef::Item { container, .. } => container,
        }
    }

    pub fn same_as(&self, other: &ContentRef) -> bool {
        match (self, other) {
            (ContentRef::Container(a), ContentRef::Container(b)) => Rc::ptr_eq(a, b),
            (
                ContentRef::Item {
                    container: a,
                    index: i,
                },
                ContentRef::Item {
                    container: b,
                    index: j,
                },
            ) => Rc::ptr_eq(a, b) && i == j,
            _ => false,
        }
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentRef({})", self.path())
    }
}

/// Outcome of a path lookup. `approximate` is set when the lookup stopped
/// early and `obj` is the deepest object reached.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub obj: ContentRef,
    pub approximate: bool,
}

impl SearchResult {
    pub fn container(&self) -> Option<&Rc<Container>> {
        self.obj.as_container()
    }

    /// The resolved object, only when the lookup was exact.
    pub fn correct_obj(&self) -> Option<&ContentRef> {
        (!self.approximate).then_some(&self.obj)
    }
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content(&self) -> &[Content] {
        &self.content
    }

    pub fn named_only(&self) -> &[Rc<Container>] {
        &self.named_only
    }

    pub fn named_content(&self, name: &str) -> Option<&Rc<Container>> {
        self.named.get(name)
    }

    pub fn count_flags(&self) -> CountFlags {
        self.count_flags
    }

    pub fn visits_should_be_counted(&self) -> bool {
        self.count_flags.visits()
    }

    pub fn turn_index_should_be_counted(&self) -> bool {
        self.count_flags.turns()
    }

    pub fn counting_at_start_only(&self) -> bool {
        self.count_flags.start_only()
    }

    pub fn debug_metadata(&self) -> Option<&DebugMetadata> {
        self.debug_metadata.as_ref()
    }

    pub fn parent(&self) -> Option<Rc<Container>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// Path from the root: the parent's path plus this container's name,
    /// or its index in the parent's content when it has no name.
    pub fn path(&self) -> &Path {
        self.path.get_or_init(|| match self.parent() {
            None => Path::default(),
            Some(parent) => {
                let component = match &self.name {
                    Some(name) => Component::Name(name.clone()),
                    None => Component::Index(parent.index_of(self).unwrap_or_default()),
                };
                parent.path().by_appending_component(component)
            }
        })
    }

    pub fn root(self: &Rc<Self>) -> Rc<Container> {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Index of `child` in the ordered content; `None` for named-only
    /// children.
    pub fn index_of(&self, child: &Container) -> Option<usize> {
        self.content.iter().position(|content| {
            matches!(content, Content::Container(c) if std::ptr::eq(Rc::as_ptr(c), child))
        })
    }

    pub fn child(self: &Rc<Self>, index: usize) -> Option<ContentRef> {
        match self.content.get(index)? {
            Content::Container(container) => Some(ContentRef::Container(container.clone())),
            _ => Some(ContentRef::Item {
                container: self.clone(),
                index,
            }),
        }
    }

    pub fn content_with_component(self: &Rc<Self>, component: &Component) -> Option<ContentRef> {
        match component {
            Component::Index(index) => self.child(*index),
            Component::Parent => self.parent().map(ContentRef::Container),
            Component::Name(name) => self
                .named
                .get(name)
                .map(|container| ContentRef::Container(container.clone())),
        }
    }

    /// Walks `path[start..end]` one component at a time from this container.
    pub fn content_at_path(self: &Rc<Self>, path: &Path, start: usize, end: usize) -> SearchResult {
        let mut approximate = false;
        let mut current_obj = ContentRef::Container(self.clone());
        let mut current_container = Some(self.clone());

        for i in start..end {
            let Some(container) = current_container.as_ref() else {
                approximate = true;
                break;
            };
            let found = path
                .component(i)
                .and_then(|component| container.content_with_component(component));
            let Some(found) = found else {
                approximate = true;
                break;
            };
            let next_container = found.as_container().cloned();
            if i + 1 < end && next_container.is_none() {
                approximate = true;
                break;
            }
            current_obj = found;
            current_container = next_container;
        }

        SearchResult {
            obj: current_obj,
            approximate,
        }
    }

    /// Resolves `path` as seen from this container: absolute paths from the
    /// root, relative ones from here.
    pub fn resolve_path(self: &Rc<Self>, path: &Path) -> SearchResult {
        if path.is_relative() {
            self.content_at_path(path, 0, path.len())
        } else {
            self.root().content_at_path(path, 0, path.len())
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.count_flags.bits() == other.count_flags.bits()
            && self.content == other.content
            && self.named_only == other.named_only
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("flags", &self.count_flags.bits())
            .field("content", &self.content)
            .field("named_only", &self.named_only)
            .finish()
    }
}

/// Collects a container's pieces and links children to their new parent.
#[derive(Default)]
pub struct ContainerBuilder {
    name: Option<Rc<str>>,
    content: Vec<Content>,
    named_only: Vec<Rc<Container>>,
    count_flags: CountFlags,
    debug_metadata: Option<DebugMetadata>,
}

impl ContainerBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.into());
    }

    pub fn flags(mut self, flags: CountFlags) -> Self {
        self.count_flags = flags;
        self
    }

    pub fn set_flags(&mut self, flags: CountFlags) {
        self.count_flags = flags;
    }

    pub fn debug_metadata(mut self, metadata: DebugMetadata) -> Self {
        self.debug_metadata = Some(metadata);
        self
    }

    pub fn push(mut self, content: Content) -> Self {
        self.content.push(content);
        self
    }

    pub fn add_content(&mut self, content: Content) {
        self.content.push(content);
    }

    /// Adds a child reachable only by name.
    pub fn named(mut self, container: Rc<Container>) -> Self {
        self.named_only.push(container);
        self
    }

    pub fn add_named_only(&mut self, container: Rc<Container>) {
        self.named_only.push(container);
    }

    pub fn build(self) -> Result<Rc<Container>, StoryError> {
        let mut named: HashMap<Rc<str>, Rc<Container>> = HashMap::new();
        let in_content = self.content.iter().filter_map(Content::as_container);
        for child in in_content.chain(self.named_only.iter()) {
            let Some(name) = &child.name else {
                continue;
            };
            if named.insert(name.clone(), child.clone()).is_some() {
                return Err(StoryError::format(format!(
                    "duplicate named content '{name}' in container {}",
                    self.name.as_deref().unwrap_or("<unnamed>")
                )));
            }
        }
        if let Some(unnamed) = self.named_only.iter().find(|c| c.name.is_none()) {
            return Err(StoryError::format(format!(
                "named-only content must have a name (found {:?})",
                unnamed
            )));
        }

        let container = Rc::new(Container {
            name: self.name,
            content: self.content,
            named,
            named_only: self.named_only,
            count_flags: self.count_flags,
            debug_metadata: self.debug_metadata,
            parent: OnceCell::new(),
            path: OnceCell::new(),
        });

        let children = container
            .content
            .iter()
            .filter_map(Content::as_container)
            .chain(container.named_only.iter());
        for child in children {
            child
                .parent
                .set(Rc::downgrade(&container))
                .map_err(|_| {
                    StoryError::format(format!(
                        "content {} already has a parent",
                        child.name().unwrap_or("<unnamed container>")
                    ))
                })?;
        }

        Ok(container)
    }
}
