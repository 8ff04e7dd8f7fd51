use std::{fmt, rc::Rc, str::FromStr};

/// Token used in path strings for "move to the parent container".
pub const PARENT_ID: &str = "^";

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Index(usize),
    Name(Rc<str>),
    Parent,
}

impl Component {
    pub fn name(name: &str) -> Self {
        if name == PARENT_ID {
            Component::Parent
        } else {
            Component::Name(name.into())
        }
    }

    fn parse(text: &str) -> Self {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = text.parse::<usize>() {
                return Component::Index(index);
            }
        }
        Component::name(text)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(_))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Component::Parent)
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Component::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Component::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Index(index) => write!(f, "{index}"),
            Component::Name(name) => f.write_str(name),
            Component::Parent => f.write_str(PARENT_ID),
        }
    }
}

/// Symbolic address into the content tree.
///
/// Absolute paths start at the root container. Relative paths start at the
/// object holding the path and usually begin with one or more
/// [`Component::Parent`] steps. The string form joins components with `.`;
/// a leading `.` marks a relative path (`.^.^.knot.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    components: Vec<Component>,
    relative: bool,
}

impl Path {
    pub fn new(components: Vec<Component>, relative: bool) -> Self {
        Self {
            components,
            relative,
        }
    }

    pub fn absolute(components: Vec<Component>) -> Self {
        Self::new(components, false)
    }

    /// The relative path with no components: "this object".
    pub fn this() -> Self {
        Self::new(Vec::new(), true)
    }

    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let (relative, body) = match text.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let components = if body.is_empty() {
            Vec::new()
        } else {
            body.split('.').map(Component::parse).collect()
        };
        Self::new(components, relative)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn head(&self) -> Option<&Component> {
        self.components.first()
    }

    pub fn last_component(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn contains_named_component(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::Name(_)))
    }

    /// Everything but the first component.
    pub fn tail(&self) -> Path {
        if self.components.len() >= 2 {
            Path::absolute(self.components[1..].to_vec())
        } else {
            Path::this()
        }
    }

    pub fn by_appending_component(&self, component: Component) -> Path {
        let mut components = self.components.clone();
        components.push(component);
        Path::new(components, self.relative)
    }

    /// Joins `other` onto this path, letting its leading parent steps eat
    /// trailing components. The result is absolute.
    pub fn by_appending_path(&self, other: &Path) -> Path {
        let upward_moves = other
            .components
            .iter()
            .take_while(|c| c.is_parent())
            .count();
        let keep = self.components.len().saturating_sub(upward_moves);
        let mut components: Vec<Component> = self.components[..keep].to_vec();
        components.extend(other.components[upward_moves..].iter().cloned());
        Path::absolute(components)
    }

    /// Expresses the absolute path `target` relative to `self`, the path of
    /// the object that will hold it. Returns `target` unchanged when the two
    /// share no leading components.
    pub fn relative_to(&self, target: &Path) -> Path {
        let shared = self
            .components
            .iter()
            .zip(target.components.iter())
            .take_while(|(own, other)| own == other)
            .count();
        if shared == 0 {
            return target.clone();
        }
        let upward_moves = self.components.len() - shared;
        let mut components = vec![Component::Parent; upward_moves];
        components.extend(target.components[shared..].iter().cloned());
        Path::new(components, true)
    }

    /// Shortest string form of `target` as seen from `self`. The absolute form
    /// wins when both are the same length.
    pub fn compact_string(&self, target: &Path) -> String {
        let (relative, global) = if target.relative {
            (target.to_string(), self.by_appending_path(target).to_string())
        } else {
            (self.relative_to(target).to_string(), target.to_string())
        };
        if relative.len() < global.len() {
            relative
        } else {
            global
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            f.write_str(".")?;
        }
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}
