use linkdoc_path::Path;
use proptest::prelude::*;
use serde_json::json;

fn literal() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z0-9_]{0,4}", 0..6).prop_map(|segments| segments.join("."))
}

proptest! {
    #[test]
    fn string_form_round_trips(lit in literal()) {
        let path = Path::parse(&lit);
        let again = Path::parse(&path.to_string());
        prop_assert!(again.equals(&path));
    }

    #[test]
    fn parent_plus_leaf_is_identity(lit in literal()) {
        let path = Path::parse(&lit);
        if let Some(leaf) = path.leaf() {
            prop_assert_eq!(path.parent().child(leaf), path.clone());
        }
    }

    #[test]
    fn every_path_is_sub_path_of_its_prefixes(lit in literal(), cut in 0usize..8) {
        let path = Path::parse(&lit);
        prop_assert!(path.is_sub_path_of(&path.slice(..cut)));
    }
}

#[test]
fn lookup_walks_mixed_containers() {
    let doc = json!({
        "pages": [
            {"title": "intro", "tags": ["a", "b"]},
            {"title": "usage", "tags": []}
        ]
    });
    let title = Path::parse("pages.1.title");
    assert_eq!(title.lookup(&doc).as_deref(), Some(&json!("usage")));
    let tag = Path::concat([Path::parse("pages.0"), Path::from(vec!["tags", "1"])]);
    assert_eq!(tag.lookup(&doc).as_deref(), Some(&json!("b")));
    assert!(Path::parse("pages.1.tags.0").lookup(&doc).is_none());
}
