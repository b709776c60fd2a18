use citeweave::utils::json_ext::{deep_merge, get_by_path, has_structure, merge_multiple, MergeStrategy};
use serde_json::json;

#[test]
fn deep_merge_combines_nested_objects() {
    let left = json!({"a": 1, "b": {"x": 10}});
    let right = json!({"b": {"y": 20}, "c": 3});
    let merged = deep_merge(&left, &right, MergeStrategy::DeepMerge).unwrap();
    assert_eq!(merged, json!({"a": 1, "b": {"x": 10, "y": 20}, "c": 3}));
}

#[test]
fn deep_merge_fails_on_conflict_when_asked_to() {
    let left = json!({"a": 1});
    let right = json!({"a": "one"});
    assert!(deep_merge(&left, &right, MergeStrategy::FailOnConflict).is_err());
}

#[test]
fn prefer_left_and_prefer_right_pick_the_expected_side() {
    let left = json!({"a": 1});
    let right = json!({"a": 2});
    assert_eq!(deep_merge(&left, &right, MergeStrategy::PreferLeft).unwrap(), json!({"a": 1}));
    assert_eq!(deep_merge(&left, &right, MergeStrategy::PreferRight).unwrap(), json!({"a": 2}));
}

#[test]
fn merge_multiple_folds_across_a_sequence() {
    let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})];
    let merged = merge_multiple(values.iter(), MergeStrategy::DeepMerge).unwrap();
    assert_eq!(merged, json!({"a": 1, "b": 2, "c": 3}));
}

#[test]
fn get_by_path_navigates_nested_objects() {
    let value = json!({"b": {"x": 10, "y": 20}});
    assert_eq!(get_by_path(&value, "b.x"), Some(&json!(10)));
    assert_eq!(get_by_path(&value, "b.missing"), None);
}

#[test]
fn has_structure_checks_every_key_is_present() {
    let value = json!({"a": 1, "b": 2, "c": 3});
    assert!(has_structure(&value, &["a", "b", "c"]));
    assert!(!has_structure(&value, &["a", "missing"]));
}
