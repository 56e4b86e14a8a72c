//! Path operations on an in-memory JSON tree

use serde_json::{Map, Value};

/// A validated change to apply at a path.
#[derive(Clone, Debug)]
pub(crate) enum Mutation {
    Set(Value),
    Merge(Map<String, Value>),
    Remove,
}

impl Mutation {
    pub(crate) fn apply(self, root: &mut Value, path: &[String]) {
        match self {
            Mutation::Set(value) => set(root, path, value),
            Mutation::Merge(partial) => merge(root, path, partial),
            Mutation::Remove => remove(root, path),
        }
    }
}

pub(crate) fn get<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() { None } else { Some(node) }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was replaced with an object"),
    }
}

/// Walks to `path`, creating objects along the way (and replacing scalars in the way).
fn node_mut<'a>(root: &'a mut Value, path: &[String]) -> &'a mut Value {
    path.iter().fold(root, |node, segment| ensure_object(node).entry(segment.clone()).or_insert(Value::Null))
}

fn set(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    if value.is_null() {
        remove(root, path);
        return;
    }
    ensure_object(node_mut(root, parents)).insert(last.clone(), value);
}

fn merge(root: &mut Value, path: &[String], partial: Map<String, Value>) {
    let target = ensure_object(node_mut(root, path));
    for (key, value) in partial {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

fn remove(root: &mut Value, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        *root = Value::Null;
        return;
    };
    let parent = parents.iter().try_fold(root, |node, segment| node.get_mut(segment.as_str()));
    if let Some(map) = parent.and_then(Value::as_object_mut) {
        map.remove(last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('/').filter(|s| !s.is_empty()).map(String::from).collect()
    }

    #[test]
    fn test_set_creates_parents() {
        let mut root = Value::Null;
        Mutation::Set(json!({ "name": "Šator" })).apply(&mut root, &path("products/p1"));
        assert_eq!(get(&root, &path("products/p1/name")), Some(&json!("Šator")));
    }

    #[test]
    fn test_merge_only_touches_listed_keys() {
        let mut root = json!({ "orders": { "o1": { "status": "new", "seen": false } } });
        let mut partial = Map::new();
        partial.insert("seen".into(), json!(true));
        Mutation::Merge(partial).apply(&mut root, &path("orders/o1"));
        assert_eq!(root, json!({ "orders": { "o1": { "status": "new", "seen": true } } }));
    }

    #[test]
    fn test_merge_null_deletes_key() {
        let mut root = json!({ "o1": { "trackingNote": "sent", "seen": true } });
        let mut partial = Map::new();
        partial.insert("trackingNote".into(), Value::Null);
        Mutation::Merge(partial).apply(&mut root, &path("o1"));
        assert_eq!(root, json!({ "o1": { "seen": true } }));
    }

    #[test]
    fn test_remove_missing_path_is_noop() {
        let mut root = json!({ "a": 1 });
        Mutation::Remove.apply(&mut root, &path("b/c"));
        assert_eq!(root, json!({ "a": 1 }));
        Mutation::Remove.apply(&mut root, &path("a"));
        assert_eq!(root, json!({}));
        assert_eq!(get(&root, &path("a")), None);
    }
}
