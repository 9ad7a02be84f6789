//! Property tests for keyed loop reconciliation.
//!
//! For any sequence of key lists, after each update:
//! 1. Rendered rows follow the new list's order exactly.
//! 2. A key present before and after keeps its element.
//! 3. A key that disappeared has its element detached and its scope disposed.

mod common;

use std::collections::HashMap;

use alpen_dom::NodeId;
use alpen_reactive::ScopeId;
use proptest::prelude::*;

use common::{all, one, page, run, texts};

const KEYS: &[&str] = &["a", "b", "c", "d", "e", "f", "g"];

fn key_list() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(KEYS.to_vec(), 0..=KEYS.len()).prop_shuffle()
}

fn literal(keys: &[&str]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
    format!("[{}]", quoted.join(", "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn keyed_updates_preserve_identity(
        initial in key_list(),
        updates in prop::collection::vec(key_list(), 1..6),
    ) {
        let rt = page(&format!(
            r#"
            <ul x-data="{{ items: {} }}">
                <template x-for="item in items" :key="item">
                    <li x-text="item"></li>
                </template>
            </ul>
            "#,
            literal(&initial)
        ));
        let list = one(&rt, "ul");

        let snapshot = |keys: &[&str]| -> HashMap<String, (NodeId, ScopeId)> {
            let rows = all(&rt, "li");
            keys.iter()
                .zip(rows)
                .map(|(k, row)| ((*k).to_string(), (row, rt.scope_of(row).expect("row scope"))))
                .collect()
        };
        prop_assert_eq!(texts(&rt, "li"), initial.clone());
        let mut previous = snapshot(&initial);

        for keys in updates {
            run(&rt, list, &format!("items = {}", literal(&keys)));
            prop_assert_eq!(texts(&rt, "li"), keys.clone());

            let current = snapshot(&keys);
            for (key, (row, scope)) in &previous {
                match current.get(key) {
                    Some((now, _)) => prop_assert_eq!(now, row, "row for {} was recreated", key),
                    None => {
                        prop_assert!(!rt.document().is_connected(*row));
                        prop_assert!(!rt.is_scope_alive(*scope));
                    }
                }
            }
            previous = current;
        }
    }

    #[test]
    fn range_length_tracks_the_count(counts in prop::collection::vec(0u32..12, 1..6)) {
        let rt = page(
            r#"
            <div x-data="{ count: 0 }">
                <template x-for="i in count"><b x-text="i"></b></template>
            </div>
            "#,
        );
        let div = one(&rt, "div");
        for count in counts {
            run(&rt, div, &format!("count = {count}"));
            let expected: Vec<String> = (1..=count).map(|i| i.to_string()).collect();
            prop_assert_eq!(texts(&rt, "b"), expected);
        }
    }
}
