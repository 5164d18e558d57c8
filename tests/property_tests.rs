//! Property-based tests: whatever the sequence of edits and steps, a finished model
//! shows its source stably sorted, and its notifications replay to what it shows.

use proptest::prelude::*;
use sortlist::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

type Item = (u8, u16);

#[derive(Debug, Clone)]
enum Op {
    Splice { at: usize, removed: usize, added: Vec<u8> },
    Steps(usize),
    Reverse,
    Incremental(bool),
    Finish,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (any::<usize>(), 0..6usize, prop::collection::vec(0..16u8, 0..6))
                .prop_map(|(at, removed, added)| Op::Splice { at, removed, added }),
            3 => (1..8usize).prop_map(Op::Steps),
            1 => Just(Op::Reverse),
            1 => any::<bool>().prop_map(Op::Incremental),
            1 => Just(Op::Finish),
        ],
        0..60,
    )
}

fn items<M: ListModel>(model: &M) -> Vec<M::Item> {
    (0..model.n_items()).filter_map(|i| model.item(i)).collect()
}

proptest! {
    #[test]
    fn prop_finished_model_matches_stable_sort(
        initial in prop::collection::vec(0..16u8, 0..200),
        merge_cap in 1..32usize,
        ops in ops_strategy(),
    ) {
        let mut next_tag = 0u16;
        let mut tagged = |values: Vec<u8>| -> Vec<Item> {
            values
                .into_iter()
                .map(|value| {
                    next_tag += 1;
                    (value, next_tag)
                })
                .collect()
        };

        let store = Rc::new(ListStore::from(tagged(initial)));
        let idle = IdleLoop::new();
        let ascending = KeySorter::new(|item: &Item| item.0);
        let mut descending = false;
        let model = Rc::new(SortListModel::with_config(
            Some(Rc::clone(&store)),
            Some(ascending.clone()),
            SortConfig::default()
                .with_incremental(true)
                .with_step_budget(Duration::ZERO)
                .with_max_merge_size(merge_cap),
            Rc::new(idle.clone()),
        ));

        let mirror = Rc::new(RefCell::new(items(&*model)));
        let (reader, sink) = (Rc::downgrade(&model), Rc::clone(&mirror));
        model.connect_items_changed(move |change| {
            if let Some(model) = reader.upgrade() {
                let added: Vec<Item> = (change.position..change.position + change.added)
                    .filter_map(|i| model.item(i))
                    .collect();
                sink.borrow_mut()
                    .splice(change.position..change.position + change.removed, added);
            }
        });

        for op in ops {
            match op {
                Op::Splice { at, removed, added } => {
                    let len = store.len();
                    let at = at % (len + 1);
                    let removed = removed.min(len - at);
                    store.splice(at, removed, tagged(added)).unwrap();
                }
                Op::Steps(n) => {
                    for _ in 0..n {
                        idle.run_once();
                    }
                }
                Op::Reverse => {
                    descending = !descending;
                    let sorter = if descending { ascending.reversed() } else { ascending.clone() };
                    model.set_sorter(Some(sorter));
                }
                Op::Incremental(incremental) => model.set_incremental(incremental),
                Op::Finish => model.finish(),
            }
            prop_assert_eq!(model.n_items(), store.len());
            let replayed = mirror.borrow().clone();
            prop_assert_eq!(replayed, items(&*model));
            prop_assert_eq!(model.pending_estimate() == 0, idle.is_idle());
        }

        model.finish();
        let mut expected = store.to_vec();
        if descending {
            expected.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            expected.sort_by(|a, b| a.0.cmp(&b.0));
        }
        prop_assert_eq!(items(&*model), expected.clone());
        let replayed = mirror.borrow().clone();
        prop_assert_eq!(replayed, expected);
        prop_assert_eq!(model.pending_estimate(), 0);
    }

    #[test]
    fn prop_sections_tile_while_sorting(
        values in prop::collection::vec(0..64u8, 1..300),
        steps in 0..20usize,
    ) {
        let idle = IdleLoop::new();
        let model = SortListModel::with_sorters(
            Some(Rc::new(values)),
            Some(KeySorter::new(|v: &u8| *v)),
            Some(KeySorter::new(|v: &u8| v / 8)),
            SortConfig::default()
                .with_incremental(true)
                .with_step_budget(Duration::ZERO)
                .with_max_merge_size(4),
            Rc::new(idle.clone()),
        );
        for _ in 0..steps {
            idle.run_once();
        }

        let n = model.n_items();
        let mut position = 0;
        while position < n {
            let (start, end) = model.get_section(position);
            prop_assert_eq!(start, position);
            prop_assert!(end > start && end <= n);
            let section = model.item(start).map(|v| v / 8);
            for i in start..end {
                prop_assert_eq!(model.item(i).map(|v| v / 8), section);
            }
            // Maximal: the next item belongs to another section.
            if end < n {
                prop_assert_ne!(model.item(end).map(|v| v / 8), section);
            }
            position = end;
        }
    }
}
