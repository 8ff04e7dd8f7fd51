//! List values and the story-wide list definitions they draw items from.
use std::{collections::HashMap, fmt, rc::Rc};

/// One item of a list definition, qualified by the list it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListItem {
    origin_name: Option<Rc<str>>,
    item_name: Rc<str>,
}

impl ListItem {
    pub fn new(origin_name: &str, item_name: &str) -> Self {
        Self {
            origin_name: Some(origin_name.into()),
            item_name: item_name.into(),
        }
    }

    /// Parses `origin.item`. A name without a dot has no origin.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((origin, item)) => Self::new(origin, item),
            None => Self {
                origin_name: None,
                item_name: full_name.into(),
            },
        }
    }

    pub fn origin_name(&self) -> Option<&str> {
        self.origin_name.as_deref()
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.origin_name().unwrap_or("?"), self.item_name)
    }
}

/// A set of list items with their integer values.
///
/// Items keep insertion order, which is the order random selection and
/// serialization see. Empty lists remember the names of the lists they were
/// declared from so `LIST_ALL`/`LIST_INVERT` still work on them.
#[derive(Debug, Clone, Default)]
pub struct InkList {
    items: Vec<(ListItem, i32)>,
    origin_names: Vec<Rc<str>>,
}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin_name: &str) -> Self {
        Self {
            items: Vec::new(),
            origin_names: vec![origin_name.into()],
        }
    }

    pub fn from_item(item: ListItem, value: i32) -> Self {
        let mut list = Self::new();
        list.insert(item, value);
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ListItem, i32)> {
        self.items.iter().map(|(item, value)| (item, *value))
    }

    pub fn insert(&mut self, item: ListItem, value: i32) {
        match self.items.iter_mut().find(|(existing, _)| *existing == item) {
            Some(slot) => slot.1 = value,
            None => self.items.push((item, value)),
        }
    }

    pub fn remove(&mut self, item: &ListItem) -> bool {
        let before = self.items.len();
        self.items.retain(|(existing, _)| existing != item);
        before != self.items.len()
    }

    pub fn contains_item(&self, item: &ListItem) -> bool {
        self.items.iter().any(|(existing, _)| existing == item)
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items
            .iter()
            .any(|(existing, _)| existing.item_name() == item_name)
    }

    /// Names of the lists the items come from. For an empty list these are
    /// the names it was declared with.
    pub fn origin_names(&self) -> Vec<Rc<str>> {
        if self.items.is_empty() {
            return self.origin_names.clone();
        }
        let mut names: Vec<Rc<str>> = Vec::new();
        for (item, _) in &self.items {
            if let Some(origin) = &item.origin_name {
                if !names.contains(origin) {
                    names.push(origin.clone());
                }
            }
        }
        names
    }

    pub fn set_initial_origin_names(&mut self, names: Vec<Rc<str>>) {
        self.origin_names = names;
    }

    pub fn max_item(&self) -> Option<(&ListItem, i32)> {
        let mut max: Option<(&ListItem, i32)> = None;
        for (item, value) in &self.items {
            if max.is_none_or(|(_, current)| *value > current) {
                max = Some((item, *value));
            }
        }
        max
    }

    pub fn min_item(&self) -> Option<(&ListItem, i32)> {
        let mut min: Option<(&ListItem, i32)> = None;
        for (item, value) in &self.items {
            if min.is_none_or(|(_, current)| *value < current) {
                min = Some((item, *value));
            }
        }
        min
    }

    /// Items sorted by value, ties broken by origin name.
    pub fn ordered_items(&self) -> Vec<(&ListItem, i32)> {
        let mut ordered: Vec<(&ListItem, i32)> = self.iter().collect();
        ordered.sort_by(|(a, av), (b, bv)| {
            av.cmp(bv)
                .then_with(|| a.origin_name().cmp(&b.origin_name()))
        });
        ordered
    }

    pub fn union(&self, other: &InkList) -> InkList {
        let mut result = self.clone();
        for (item, value) in &other.items {
            result.insert(item.clone(), *value);
        }
        result
    }

    pub fn intersect(&self, other: &InkList) -> InkList {
        let mut result = InkList::new();
        for (item, value) in &self.items {
            if other.contains_item(item) {
                result.insert(item.clone(), *value);
            }
        }
        result
    }

    pub fn without(&self, other: &InkList) -> InkList {
        let mut result = self.clone();
        for (item, _) in &other.items {
            result.remove(item);
        }
        result
    }

    /// True when every item of `other` is in this list. Empty lists contain
    /// nothing and are contained by nothing.
    pub fn contains(&self, other: &InkList) -> bool {
        if other.is_empty() || self.is_empty() {
            return false;
        }
        other.items.iter().all(|(item, _)| self.contains_item(item))
    }

    pub fn greater_than(&self, other: &InkList) -> bool {
        match (self.min_item(), other.max_item()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some((_, min)), Some((_, other_max))) => min > other_max,
        }
    }

    pub fn greater_than_or_equals(&self, other: &InkList) -> bool {
        match (self.bounds(), other.bounds()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some((min, max)), Some((other_min, other_max))) => {
                min >= other_min && max >= other_max
            }
        }
    }

    pub fn less_than(&self, other: &InkList) -> bool {
        match (self.max_item(), other.min_item()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some((_, max)), Some((_, other_min))) => max < other_min,
        }
    }

    pub fn less_than_or_equals(&self, other: &InkList) -> bool {
        match (self.bounds(), other.bounds()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some((min, max)), Some((other_min, other_max))) => {
                max <= other_max && min <= other_min
            }
        }
    }

    fn bounds(&self) -> Option<(i32, i32)> {
        let (_, min) = self.min_item()?;
        let (_, max) = self.max_item()?;
        Some((min, max))
    }

    pub fn max_as_list(&self) -> InkList {
        match self.max_item() {
            Some((item, value)) => InkList::from_item(item.clone(), value),
            None => InkList::new(),
        }
    }

    pub fn min_as_list(&self) -> InkList {
        match self.min_item() {
            Some((item, value)) => InkList::from_item(item.clone(), value),
            None => InkList::new(),
        }
    }

    /// Every item of the origin lists.
    pub fn all(&self, definitions: &ListDefinitions) -> InkList {
        let mut result = InkList::new();
        for origin in self.origin_names() {
            if let Some(definition) = definitions.get(&origin) {
                for (item, value) in definition.items() {
                    result.insert(item, value);
                }
            }
        }
        result.set_initial_origin_names(self.origin_names());
        result
    }

    /// Items of the origin lists that are not in this list.
    pub fn inverse(&self, definitions: &ListDefinitions) -> InkList {
        let mut result = InkList::new();
        for origin in self.origin_names() {
            if let Some(definition) = definitions.get(&origin) {
                for (item, value) in definition.items() {
                    if !self.contains_item(&item) {
                        result.insert(item, value);
                    }
                }
            }
        }
        result.set_initial_origin_names(self.origin_names());
        result
    }

    /// Items whose values lie in `min..=max`.
    pub fn sub_range(&self, min: i32, max: i32) -> InkList {
        let mut result = InkList::new();
        for (item, value) in self.ordered_items() {
            if value >= min && value <= max {
                result.insert(item.clone(), value);
            }
        }
        result.set_initial_origin_names(self.origin_names());
        result
    }
}

impl PartialEq for InkList {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.iter().all(|(item, _)| other.contains_item(item))
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (item, _)) in self.ordered_items().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(item.item_name())?;
        }
        Ok(())
    }
}

/// A `LIST` declaration: its name and the values of its items.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDefinition {
    name: Rc<str>,
    items: Vec<(Rc<str>, i32)>,
}

impl ListDefinition {
    pub fn new(name: &str, items: Vec<(String, i32)>) -> Self {
        Self {
            name: name.into(),
            items: items
                .into_iter()
                .map(|(item, value)| (item.into(), value))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> impl Iterator<Item = (ListItem, i32)> + '_ {
        self.items
            .iter()
            .map(|(item, value)| (ListItem::new(&self.name, item), *value))
    }

    pub fn raw_items(&self) -> &[(Rc<str>, i32)] {
        &self.items
    }

    pub fn value_for_item(&self, item: &ListItem) -> Option<i32> {
        if item.origin_name() != Some(self.name()) {
            return None;
        }
        self.items
            .iter()
            .find(|(name, _)| **name == *item.item_name())
            .map(|(_, value)| *value)
    }

    pub fn item_with_value(&self, value: i32) -> Option<ListItem> {
        self.items
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| ListItem::new(&self.name, name))
    }
}

/// All list definitions of a story, with a lookup from bare or qualified
/// item names to single-item lists.
#[derive(Debug, Clone, Default)]
pub struct ListDefinitions {
    lists: Vec<ListDefinition>,
    single_items: HashMap<String, (ListItem, i32)>,
}

impl ListDefinitions {
    pub fn new(lists: Vec<ListDefinition>) -> Self {
        let mut single_items = HashMap::new();
        for list in &lists {
            for (item, value) in list.items() {
                single_items.insert(item.item_name().to_string(), (item.clone(), value));
                single_items.insert(item.full_name(), (item, value));
            }
        }
        Self {
            lists,
            single_items,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ListDefinition> {
        self.lists.iter().find(|list| list.name() == name)
    }

    pub fn lists(&self) -> &[ListDefinition] {
        &self.lists
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Resolves `item` or `list.item` to a list holding just that item.
    pub fn single_item_list(&self, name: &str) -> Option<InkList> {
        self.single_items
            .get(name)
            .map(|(item, value)| InkList::from_item(item.clone(), *value))
    }

    pub fn value_for_item(&self, item: &ListItem) -> Option<i32> {
        self.get(item.origin_name()?)?.value_for_item(item)
    }
}
