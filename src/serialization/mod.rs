//! JSON codecs for compiled story documents and saved state.
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::warn;

use crate::runtime::{
    container::Container,
    error::StoryError,
    list::{ListDefinition, ListDefinitions},
};

pub mod content;
pub mod save_state;

/// Story format version this engine writes.
pub const INK_VERSION_CURRENT: u32 = 21;
/// Oldest story format that still loads.
pub const INK_VERSION_MINIMUM_COMPATIBLE: u32 = 18;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ink_version: Option<i64>,
    #[serde(default)]
    root: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list_defs: Option<Map<String, Json>>,
}

/// Decodes a compiled story into its root container and list definitions.
pub fn read_story(json: &str) -> Result<(Rc<Container>, ListDefinitions), StoryError> {
    let document: StoryDocument = serde_json::from_str(json)?;

    let version = document
        .ink_version
        .ok_or_else(|| StoryError::format("ink version number not found. Are you sure it's a valid .ink.json file?"))?;
    if version > i64::from(INK_VERSION_CURRENT) || version < i64::from(INK_VERSION_MINIMUM_COMPATIBLE) {
        return Err(StoryError::IncompatibleVersion {
            kind: "ink",
            found: version,
            minimum: INK_VERSION_MINIMUM_COMPATIBLE,
            current: INK_VERSION_CURRENT,
        });
    }
    if version != i64::from(INK_VERSION_CURRENT) {
        warn!(
            version,
            current = INK_VERSION_CURRENT,
            "story was compiled by an older version of ink; it may not run as expected"
        );
    }

    let root = match document.root {
        Some(Json::Array(items)) => content::read_container(&items, None)?,
        Some(other) => {
            return Err(StoryError::format(format!(
                "root node must be a container, found {other}"
            )));
        }
        None => return Err(StoryError::format("root node for ink not found")),
    };

    let list_definitions = match document.list_defs {
        Some(definitions) => read_list_definitions(&definitions)?,
        None => ListDefinitions::default(),
    };
    Ok((root, list_definitions))
}

/// Encodes a content tree and its list definitions as a story document.
pub fn write_story(root: &Container, lists: &ListDefinitions) -> Result<String, StoryError> {
    let document = StoryDocument {
        ink_version: Some(i64::from(INK_VERSION_CURRENT)),
        root: Some(content::write_container(root, false)),
        list_defs: Some(write_list_definitions(lists)),
    };
    Ok(serde_json::to_string(&document)?)
}

fn read_list_definitions(definitions: &Map<String, Json>) -> Result<ListDefinitions, StoryError> {
    let mut lists = Vec::with_capacity(definitions.len());
    for (name, items) in definitions {
        let items = items
            .as_object()
            .ok_or_else(|| StoryError::format(format!("list definition '{name}' must be an object")))?;
        let items = items
            .iter()
            .map(|(item, value)| {
                content::int_token(value, "list item value").map(|value| (item.clone(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        lists.push(ListDefinition::new(name, items));
    }
    Ok(ListDefinitions::new(lists))
}

fn write_list_definitions(lists: &ListDefinitions) -> Map<String, Json> {
    lists
        .lists()
        .iter()
        .map(|list| {
            let items = list
                .raw_items()
                .iter()
                .map(|(item, value)| (item.to_string(), Json::from(*value)))
                .collect();
            (list.name().to_string(), Json::Object(items))
        })
        .collect()
}
