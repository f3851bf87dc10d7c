use super::*;
use crate::{
    test_support::{blog_schema, comment, comment_builder, post_with_comments},
    value::Value,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// Input ids: `Some(id)` addresses a record, `None` is a brand new entry.
// Repeated ids are folded into new entries so every id appears at most once.
fn arb_input() -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::of(0i64..24), 0..10).prop_map(|ids| {
        let mut seen = BTreeSet::new();
        ids.into_iter()
            .map(|id| id.filter(|id| seen.insert(*id)))
            .collect()
    })
}

fn input_params(ids: &[Option<i64>]) -> Vec<ParamMap> {
    ids.iter()
        .map(|id| {
            let params = ParamMap::new().with("title", "t");
            match id {
                Some(id) => params.with("id", *id),
                None => params,
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn many_output_partitions_current_and_keeps_input_order(
        current in prop::collection::btree_set(0i64..16, 0..8),
        input in arb_input(),
    ) {
        let schema = blog_schema();
        let owner = post_with_comments(current.iter().map(|id| comment(*id, "t")).collect());
        let reconciler = Reconciler::new(
            &schema,
            &owner,
            "comments",
            CastOptions::default().with(&comment_builder),
        )
        .expect("reconciler");

        let outcome = reconciler
            .put_many(input_params(&input).into_iter().map(Into::into).collect())
            .expect("reconcile");
        let items = outcome.reconciled.as_many();

        let addressed: BTreeSet<i64> = input.iter().flatten().copied().collect();
        let dropped: Vec<i64> = current.difference(&addressed).copied().collect();

        prop_assert_eq!(items.len(), dropped.len() + input.len());

        // displaced entries lead, in current order
        for (changeset, id) in items.iter().zip(&dropped) {
            prop_assert_eq!(changeset.action(), Some(Action::Delete));
            prop_assert_eq!(changeset.data().get("id"), &Value::Int(*id));
        }

        // then one entry per input element, in input order
        for (changeset, id) in items[dropped.len()..].iter().zip(&input) {
            match id {
                Some(id) if current.contains(id) => {
                    prop_assert_eq!(changeset.action(), Some(Action::Update));
                    prop_assert_eq!(changeset.data().get("id"), &Value::Int(*id));
                    prop_assert!(!changeset.has_changes());
                }
                _ => prop_assert_eq!(changeset.action(), Some(Action::Insert)),
            }
        }

        let touched = !dropped.is_empty() || input.iter().any(|id| !id.is_some_and(|id| current.contains(&id)));
        prop_assert_eq!(outcome.changed, touched);
    }
}
