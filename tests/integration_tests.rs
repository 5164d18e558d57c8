use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sortlist::prelude::*;
use sortlist::{ItemsChanged, SectionsChanged};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

type Store = ListStore<u32>;
type Model = SortListModel<Store, KeySorter<u32, u32>>;

fn items<M: ListModel>(model: &M) -> Vec<M::Item> {
    (0..model.n_items()).filter_map(|i| model.item(i)).collect()
}

fn by_value() -> KeySorter<u32, u32> {
    KeySorter::new(|v: &u32| *v)
}

fn incremental_model(store: &Rc<Store>, idle: &IdleLoop, budget: Duration, merge: usize) -> Model {
    SortListModel::with_config(
        Some(Rc::clone(store)),
        Some(by_value()),
        SortConfig::default()
            .with_incremental(true)
            .with_step_budget(budget)
            .with_max_merge_size(merge),
        Rc::new(idle.clone()),
    )
}

fn record_changes<M: ObservableList>(model: &M) -> Rc<RefCell<Vec<ItemsChanged>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    model.connect_items_changed(move |change| sink.borrow_mut().push(change));
    log
}

#[test]
fn test_duplicates_keep_source_order() {
    // (value, source index)
    let input: Vec<(u32, usize)> = [5, 3, 1, 4, 1, 2]
        .into_iter()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect();
    let model = SortListModel::new(
        Some(Rc::new(input)),
        Some(KeySorter::new(|item: &(u32, usize)| item.0)),
    );

    let sorted = items(&model);
    let values: Vec<u32> = sorted.iter().map(|item| item.0).collect();
    assert_eq!(values, vec![1, 1, 2, 3, 4, 5]);
    // The `1` at index 2 stays before the one at index 4.
    assert_eq!(sorted[0], (1, 2));
    assert_eq!(sorted[1], (1, 4));
}

#[test]
fn test_zero_budget_step_leaves_work_pending() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((1..=1000).collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::ZERO, 1024);

    assert!(model.pending_estimate() > 0);
    assert_eq!(idle.run_once(), 1);
    assert!(model.pending_estimate() > 0);

    model.finish();
    assert_eq!(model.pending_estimate(), 0);
    assert_eq!(items(&model), (1..=1000).collect::<Vec<_>>());
    assert!(idle.is_idle());
}

#[test]
fn test_removal_between_steps() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from(vec![5, 4, 3, 2, 1]));
    let model = incremental_model(&store, &idle, Duration::ZERO, 1);

    idle.run_once();
    assert_eq!(store.remove(2), Ok(3));
    model.finish();

    assert_eq!(items(&model), vec![1, 2, 4, 5]);
    assert_eq!(model.pending_estimate(), 0);
}

#[test]
fn test_removal_after_keys_are_computed() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from(vec![5, 4, 3, 2, 1]));
    let model = incremental_model(&store, &idle, Duration::ZERO, 1);

    // One pass per key, then one pass of sorting.
    for _ in 0..6 {
        idle.run_once();
    }
    store.remove(2).unwrap();
    idle.run_until_idle();

    assert_eq!(items(&model), vec![1, 2, 4, 5]);
}

#[test]
fn test_stability_with_many_duplicates() {
    let mut rng = rand::rng();
    let input: Vec<(u8, u32)> = (0..5000).map(|i| (rng.random_range(0..8), i)).collect();
    let model = SortListModel::new(
        Some(Rc::new(input.clone())),
        Some(KeySorter::new(|item: &(u8, u32)| item.0)),
    );

    let mut expected = input;
    expected.sort_by_key(|item| item.0);
    assert_eq!(items(&model), expected);
}

#[test]
fn test_finish_is_idempotent() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((0..300).rev().collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::ZERO, 4);
    idle.run_once();

    model.finish();
    let first = items(&model);
    let log = record_changes(&model);
    model.finish();

    assert_eq!(items(&model), first);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_pending_is_zero_iff_idle() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((0..2000).map(|i| (i * 7919) % 2000).collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::ZERO, 16);

    let mut passes = 0;
    while !idle.is_idle() {
        assert!(model.pending_estimate() > 0);
        idle.run_once();
        passes += 1;
    }
    assert!(passes > 1);
    assert_eq!(model.pending_estimate(), 0);
    assert_eq!(items(&model), (0..2000).collect::<Vec<_>>());
}

#[test]
fn test_pending_never_rises_without_edits() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let store = Rc::new(Store::from((0..20_000).map(|_| rng.random()).collect::<Vec<u32>>()));
    let idle = IdleLoop::new();
    let model = incremental_model(&store, &idle, Duration::ZERO, 64);

    let reported = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reported);
    model.connect_pending_changed(move |pending| sink.borrow_mut().push(pending));

    let mut last = model.pending_estimate();
    while !idle.is_idle() {
        idle.run_once();
        let pending = model.pending_estimate();
        assert!(pending <= last, "pending rose from {last} to {pending}");
        last = pending;
    }
    assert_eq!(last, 0);

    let reported = reported.borrow();
    assert!(reported.windows(2).all(|pair| pair[1] <= pair[0]), "{reported:?}");
    assert_eq!(reported.last(), Some(&0));
}

#[test]
fn test_pending_changed_reaches_zero() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((0..500).rev().collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::from_micros(50), 8);

    let last = Rc::new(Cell::new(usize::MAX));
    let sink = Rc::clone(&last);
    model.connect_pending_changed(move |pending| sink.set(pending));

    idle.run_until_idle();
    assert_eq!(last.get(), 0);
}

#[test]
fn test_sections_tile_the_list() {
    let mut rng = rand::rng();
    let input: Vec<u32> = (0..1000).map(|_| rng.random_range(0..100)).collect();

    let check_tiling = |model: &SortListModel<Vec<u32>, KeySorter<u32, u32>>| {
        let n = model.n_items();
        let mut position = 0;
        while position < n {
            let (start, end) = model.get_section(position);
            assert_eq!(start, position);
            assert!(end > start && end <= n);
            let section = model.item(start).map(|v| v / 10);
            for i in start..end {
                assert_eq!(model.item(i).map(|v| v / 10), section);
            }
            position = end;
        }
        assert_eq!(model.get_section(n), (n, usize::MAX));
    };

    // Sorted: one section per tens digit.
    let model = SortListModel::with_sorters(
        Some(Rc::new(input.clone())),
        Some(by_value()),
        Some(KeySorter::new(|v: &u32| v / 10)),
        SortConfig::default(),
        Rc::new(IdleLoop::new()),
    );
    check_tiling(&model);
    let mut sections = 0;
    let mut position = 0;
    while position < model.n_items() {
        position = model.get_section(position).1;
        sections += 1;
    }
    assert_eq!(sections, 10);

    // Still sorting: sections are whatever is adjacent right now, but still tile.
    let idle = IdleLoop::new();
    let model = SortListModel::with_sorters(
        Some(Rc::new(input)),
        Some(by_value()),
        Some(KeySorter::new(|v: &u32| v / 10)),
        SortConfig::default()
            .with_incremental(true)
            .with_step_budget(Duration::ZERO),
        Rc::new(idle.clone()),
    );
    check_tiling(&model);
    idle.run_once();
    check_tiling(&model);
}

#[test]
fn test_no_section_sorter_means_one_section() {
    let store = Rc::new(Store::from(vec![3, 1, 2]));
    let model = SortListModel::new(Some(store), Some(by_value()));

    assert_eq!(model.get_section(1), (0, 3));
    assert_eq!(model.get_section(3), (3, usize::MAX));
}

#[test]
fn test_section_sorter_without_primary() {
    let input = vec![21u32, 13, 25, 11, 30];
    let model: SortListModel<Vec<u32>, KeySorter<u32, u32>> =
        SortListModel::new(Some(Rc::new(input)), None);
    model.set_section_sorter(Some(KeySorter::new(|v: &u32| v / 10)));

    // Sections in order, source order inside each.
    assert_eq!(items(&model), vec![13, 11, 21, 25, 30]);
    assert_eq!(model.get_section(3), (2, 4));
}

#[test]
fn test_sections_changed_when_order_is_kept() {
    let store = Rc::new(Store::from(vec![1, 2, 3, 11, 12]));
    let model = SortListModel::new(Some(store), Some(by_value()));
    let log = record_changes(&model);
    let sections = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&sections);
    model.connect_sections_changed(move |change| sink.borrow_mut().push(change));

    model.set_section_sorter(Some(KeySorter::new(|v: &u32| v / 10)));

    assert!(log.borrow().is_empty());
    assert_eq!(
        *sections.borrow(),
        vec![SectionsChanged {
            position: 0,
            n_items: 5
        }]
    );
    assert_eq!(model.get_section(0), (0, 3));
}

#[test]
fn test_set_comparator_replaces_both_sorters() {
    let store = Rc::new(Store::from(vec![15, 3, 27, 21, 9]));
    let model = SortListModel::new(Some(Rc::clone(&store)), Some(by_value()));
    let log = record_changes(&model);

    model.set_comparator(
        Some(KeySorter::descending(|v: &u32| *v)),
        Some(KeySorter::new(|v: &u32| v / 10)),
    );

    assert_eq!(items(&model), vec![9, 3, 15, 27, 21]);
    assert_eq!(*log.borrow(), vec![ItemsChanged::new(0, 5, 5)]);
    assert_eq!(model.get_section(3), (3, 5));
}

#[test]
fn test_removing_sorter_restores_source_order() {
    let store = Rc::new(Store::from(vec![1, 4, 3, 2, 5]));
    let model = SortListModel::new(Some(Rc::clone(&store)), Some(by_value()));
    assert_eq!(items(&model), vec![1, 2, 3, 4, 5]);
    let log = record_changes(&model);

    model.set_sorter(None);

    assert_eq!(items(&model), vec![1, 4, 3, 2, 5]);
    assert_eq!(*log.borrow(), vec![ItemsChanged::new(1, 3, 3)]);

    // Unsorted models forward source changes as they are.
    log.borrow_mut().clear();
    store.splice(1, 2, [7, 8, 9]).unwrap();
    assert_eq!(*log.borrow(), vec![ItemsChanged::new(1, 2, 3)]);
    assert_eq!(items(&model), store.to_vec());
}

#[test]
fn test_reversed_sorter_reuses_keys() {
    let extracted = Rc::new(Cell::new(0));
    let counter = Rc::clone(&extracted);
    let sorter = KeySorter::new(move |v: &u32| {
        counter.set(counter.get() + 1);
        *v
    });

    let store = Rc::new(Store::from(vec![2, 3, 1]));
    let model = SortListModel::new(Some(store), Some(sorter.clone()));
    assert_eq!(extracted.get(), 3);

    model.set_sorter(Some(sorter.reversed()));
    assert_eq!(items(&model), vec![3, 2, 1]);
    assert_eq!(extracted.get(), 3);

    model.set_sorter(Some(KeySorter::new(|v: &u32| *v)));
    assert_eq!(items(&model), vec![1, 2, 3]);
}

#[test]
fn test_set_model_reports_full_replacement() {
    let model = SortListModel::new(Some(Rc::new(Store::from(vec![3, 1, 2]))), Some(by_value()));
    let log = record_changes(&model);

    let other = Rc::new(Store::from(vec![9, 8]));
    model.set_model(Some(Rc::clone(&other)));
    assert_eq!(items(&model), vec![8, 9]);
    assert!(model.model().is_some_and(|m| Rc::ptr_eq(&m, &other)));

    // Same model again: nothing happens.
    model.set_model(Some(Rc::clone(&other)));
    model.set_model(None);
    assert_eq!(model.n_items(), 0);
    assert_eq!(model.item(0), None);

    assert_eq!(
        *log.borrow(),
        vec![ItemsChanged::new(0, 3, 2), ItemsChanged::new(0, 2, 0)]
    );
}

#[test]
fn test_old_source_is_disconnected() {
    let first = Rc::new(Store::from(vec![1, 2]));
    let model = SortListModel::new(Some(Rc::clone(&first)), Some(by_value()));
    model.set_model(Some(Rc::new(Store::from(vec![5]))));
    let log = record_changes(&model);

    first.append(0);
    assert!(log.borrow().is_empty());
    assert_eq!(items(&model), vec![5]);
}

#[test]
fn test_turning_incremental_off_finishes() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((0..200).rev().collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::ZERO, 4);
    assert!(model.incremental());
    assert!(model.pending_estimate() > 0);

    model.set_incremental(false);

    assert!(!model.incremental());
    assert_eq!(model.pending_estimate(), 0);
    assert_eq!(items(&model), (0..200).collect::<Vec<_>>());
    assert!(idle.is_idle());

    // Later edits are sorted right away.
    store.append(1000);
    store.insert(0, 500).unwrap();
    assert!(idle.is_idle());
    assert_eq!(model.item(200), Some(500));
    assert_eq!(model.item(201), Some(1000));
}

#[test]
fn test_notifications_replay_to_visible_order() {
    let mut rng = rand::rng();
    for incremental in [false, true] {
        let idle = IdleLoop::new();
        let store = Rc::new(Store::from(
            (0..200).map(|_| rng.random_range(0..50)).collect::<Vec<_>>(),
        ));
        let model = Rc::new(SortListModel::with_config(
            Some(Rc::clone(&store)),
            Some(by_value()),
            SortConfig::default()
                .with_incremental(incremental)
                .with_step_budget(Duration::ZERO)
                .with_max_merge_size(8),
            Rc::new(idle.clone()),
        ));

        let mirror = Rc::new(RefCell::new(items(&*model)));
        let (reader, sink) = (Rc::downgrade(&model), Rc::clone(&mirror));
        model.connect_items_changed(move |change| {
            let Some(model) = reader.upgrade() else {
                return;
            };
            let added: Vec<u32> = (change.position..change.position + change.added)
                .filter_map(|i| model.item(i))
                .collect();
            sink.borrow_mut()
                .splice(change.position..change.position + change.removed, added);
        });

        for _ in 0..100 {
            let len = store.len();
            let position = rng.random_range(0..=len);
            let removed = rng.random_range(0..=(len - position).min(5));
            let added: Vec<u32> = (0..rng.random_range(0..5))
                .map(|_| rng.random_range(0..50))
                .collect();
            store.splice(position, removed, added).unwrap();
            for _ in 0..rng.random_range(0..3) {
                idle.run_once();
            }
            assert_eq!(*mirror.borrow(), items(&*model));
        }

        model.finish();
        let mut expected = store.to_vec();
        expected.sort();
        assert_eq!(*mirror.borrow(), expected);
        assert_eq!(items(&*model), expected);
    }
}

#[test]
fn test_chained_models() {
    let store = Rc::new(Store::from(vec![4, 1, 3]));
    let ascending = Rc::new(SortListModel::new(Some(Rc::clone(&store)), Some(by_value())));
    let descending = SortListModel::new(
        Some(Rc::clone(&ascending)),
        Some(KeySorter::descending(|v: &u32| *v)),
    );

    assert_eq!(items(&descending), vec![4, 3, 1]);
    store.extend([2, 5]);
    store.remove(0).unwrap();
    assert_eq!(items(&*ascending), vec![1, 2, 3, 5]);
    assert_eq!(items(&descending), vec![5, 3, 2, 1]);
}

#[test]
fn test_dropping_model_cancels_sorting() {
    let idle = IdleLoop::new();
    let store = Rc::new(Store::from((0..100).rev().collect::<Vec<_>>()));
    let model = incremental_model(&store, &idle, Duration::ZERO, 4);
    assert!(!idle.is_idle());

    drop(model);
    assert!(idle.is_idle());
    // The store no longer reaches the dropped model.
    store.append(7);
}

#[test]
fn test_disconnected_handlers_stay_quiet() {
    let store = Rc::new(Store::from(vec![2, 1]));
    let model = SortListModel::new(Some(Rc::clone(&store)), Some(by_value()));
    let calls = Rc::new(Cell::new(0));

    let counter = Rc::clone(&calls);
    let items_id = model.connect_items_changed(move |_| counter.set(counter.get() + 1));
    let counter = Rc::clone(&calls);
    let pending_id = model.connect_pending_changed(move |_| counter.set(counter.get() + 1));
    model.disconnect(items_id);
    model.disconnect(pending_id);

    store.append(0);
    model.set_sorter(None);
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_handlers_may_reenter_the_model() {
    let store = Rc::new(Store::from(vec![3, 1, 2]));
    let model = Rc::new(SortListModel::new(Some(Rc::clone(&store)), Some(by_value())));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (reader, sink) = (Rc::downgrade(&model), Rc::clone(&seen));
    model.connect_items_changed(move |_| {
        if let Some(model) = reader.upgrade() {
            sink.borrow_mut().push((model.get_section(0), model.pending_estimate(), items(&*model)));
        }
    });

    store.append(0);
    assert_eq!(*seen.borrow(), vec![((0, 4), 0, vec![0, 1, 2, 3])]);
}
