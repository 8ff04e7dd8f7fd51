use crate::runtime::list::{InkList, ListDefinition, ListDefinitions, ListItem};

fn definitions() -> ListDefinitions {
    ListDefinitions::new(vec![
        ListDefinition::new(
            "colours",
            vec![("red".into(), 1), ("green".into(), 2), ("blue".into(), 3)],
        ),
        ListDefinition::new("sizes", vec![("small".into(), 1), ("large".into(), 2)]),
    ])
}

fn colours(names: &[&str]) -> InkList {
    let lists = definitions();
    let mut list = InkList::new();
    for name in names {
        let item = ListItem::new("colours", name);
        let value = lists.value_for_item(&item).unwrap();
        list.insert(item, value);
    }
    list
}

#[test]
fn items_parse_from_full_names() {
    let item = ListItem::from_full_name("colours.red");
    assert_eq!(item.origin_name(), Some("colours"));
    assert_eq!(item.item_name(), "red");
    assert_eq!(item.full_name(), "colours.red");

    let bare = ListItem::from_full_name("red");
    assert_eq!(bare.origin_name(), None);
    assert_eq!(bare.full_name(), "?.red");
}

#[test]
fn display_orders_by_value() {
    assert_eq!(colours(&["blue", "red"]).to_string(), "red, blue");
    assert_eq!(InkList::new().to_string(), "");
}

#[test]
fn set_operations() {
    let warm = colours(&["red", "green"]);
    let cool = colours(&["green", "blue"]);

    assert_eq!(warm.union(&cool), colours(&["red", "green", "blue"]));
    assert_eq!(warm.intersect(&cool), colours(&["green"]));
    assert_eq!(warm.without(&cool), colours(&["red"]));
}

#[test]
fn containment_is_false_for_empty_lists() {
    let all = colours(&["red", "green", "blue"]);

    assert!(all.contains(&colours(&["red", "blue"])));
    assert!(!colours(&["red"]).contains(&colours(&["blue"])));
    assert!(!all.contains(&InkList::new()));
    assert!(!InkList::new().contains(&all));
}

#[test]
fn comparisons_use_bounds() {
    let low = colours(&["red"]);
    let high = colours(&["green", "blue"]);

    assert!(high.greater_than(&low));
    assert!(low.less_than(&high));
    assert!(!low.greater_than(&high));
    assert!(high.greater_than_or_equals(&colours(&["green"])));
    assert!(low.less_than_or_equals(&low));
}

#[test]
fn min_and_max() {
    let list = colours(&["green", "blue", "red"]);

    assert_eq!(list.max_as_list(), colours(&["blue"]));
    assert_eq!(list.min_as_list(), colours(&["red"]));
    assert_eq!(InkList::new().max_item(), None);
}

#[test]
fn all_and_inverse_use_origin_lists() {
    let lists = definitions();
    let list = colours(&["green"]);

    assert_eq!(list.all(&lists), colours(&["red", "green", "blue"]));
    assert_eq!(list.inverse(&lists), colours(&["red", "blue"]));
}

#[test]
fn empty_list_remembers_its_origin() {
    let lists = definitions();
    let empty = InkList::with_origin("colours");

    assert_eq!(empty.all(&lists).len(), 3);
    assert_eq!(empty.inverse(&lists).len(), 3);
    assert_eq!(empty.origin_names().len(), 1);
}

#[test]
fn sub_range_is_inclusive() {
    let list = colours(&["red", "green", "blue"]);

    assert_eq!(list.sub_range(2, 3), colours(&["green", "blue"]));
    assert!(list.sub_range(4, 9).is_empty());
}

#[test]
fn single_item_lookup_accepts_bare_and_qualified_names() {
    let lists = definitions();

    assert_eq!(lists.single_item_list("large").unwrap().to_string(), "large");
    assert_eq!(lists.single_item_list("colours.blue"), Some(colours(&["blue"])));
    assert!(lists.single_item_list("purple").is_none());
}

#[test]
fn definitions_look_up_values_both_ways() {
    let lists = definitions();
    let sizes = lists.get("sizes").unwrap();

    assert_eq!(sizes.item_with_value(2), Some(ListItem::new("sizes", "large")));
    assert_eq!(sizes.value_for_item(&ListItem::new("colours", "red")), None);
    assert_eq!(lists.value_for_item(&ListItem::new("colours", "blue")), Some(3));
}
