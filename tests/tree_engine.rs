use std::collections::{BTreeMap, BTreeSet};

use nested_set::algorithm::{create_node, delete_subtree, insert_node, move_subtree};
use nested_set::consistency::{self, SiblingOrder};
use nested_set::query;
use nested_set::{
    CoordinateStore, Coordinates, MemoryStore, NestedSetError, NodeId, Page, ProblemKind,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn add(store: &MemoryStore, parent: Option<NodeId>) -> Result<NodeId, NestedSetError> {
    let node = insert_node(store, NodeId::new_v4(), parent, 1).await?;
    Ok(node.id)
}

/// root -> (a, b -> b1)
async fn sample(store: &MemoryStore) -> Result<[NodeId; 4], NestedSetError> {
    let root = add(store, None).await?;
    let a = add(store, Some(root)).await?;
    let b = add(store, Some(root)).await?;
    let b1 = add(store, Some(b)).await?;
    Ok([root, a, b, b1])
}

async fn coords(store: &MemoryStore, id: NodeId) -> Result<(i64, i64, i64), NestedSetError> {
    let c = store.get_coordinates(id).await?;
    Ok((c.left, c.right, c.depth))
}

/// Parent edge, ordered children and ancestors of every live node.
async fn shape(
    store: &MemoryStore,
) -> Result<BTreeMap<NodeId, (Option<NodeId>, Vec<NodeId>, Vec<NodeId>)>, NestedSetError> {
    let mut shape = BTreeMap::new();
    for node in store.snapshot() {
        let children = query::children(store, node.id, Page::all()).await?;
        let ancestors = query::ancestors(store, node.id, Page::all()).await?;
        shape.insert(node.id, (node.parent_id, children, ancestors));
    }
    Ok(shape)
}

#[tokio::test]
async fn first_root_starts_at_one() -> TestResult {
    let store = MemoryStore::new();
    let coordinates = create_node(&store, None, 1).await?;
    assert_eq!(coordinates, Coordinates::new(1, 2, 0, 1));
    Ok(())
}

#[tokio::test]
async fn single_child_grows_the_root() -> TestResult {
    let store = MemoryStore::new();
    let root = add(&store, None).await?;
    let child = add(&store, Some(root)).await?;

    assert_eq!(coords(&store, child).await?, (2, 3, 1));
    assert_eq!(coords(&store, root).await?, (1, 4, 0));
    Ok(())
}

#[tokio::test]
async fn children_are_appended_right_most() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;

    assert_eq!(coords(&store, root).await?, (1, 8, 0));
    assert_eq!(coords(&store, a).await?, (2, 3, 1));
    assert_eq!(coords(&store, b).await?, (4, 7, 1));
    assert_eq!(coords(&store, b1).await?, (5, 6, 2));

    let second_root = add(&store, None).await?;
    assert_eq!(coords(&store, second_root).await?, (9, 10, 0));
    assert!(consistency::validate(&store.snapshot()).is_consistent());
    Ok(())
}

#[tokio::test]
async fn sibling_ordering_never_decreases() -> TestResult {
    let store = MemoryStore::new();
    let root = add(&store, None).await?;
    let first = insert_node(&store, NodeId::new_v4(), Some(root), 10).await?;
    let second = insert_node(&store, NodeId::new_v4(), Some(root), 1).await?;
    let third = insert_node(&store, NodeId::new_v4(), Some(root), 40).await?;

    assert_eq!(first.coordinates.ordering, 10);
    assert_eq!(second.coordinates.ordering, 11);
    assert_eq!(third.coordinates.ordering, 40);
    Ok(())
}

#[tokio::test]
async fn missing_parent_is_not_found() -> TestResult {
    let store = MemoryStore::new();
    let ghost = NodeId::new_v4();
    let err = create_node(&store, Some(ghost), 1).await.unwrap_err();
    assert!(matches!(err, NestedSetError::NotFound(id) if id == ghost));
    assert_eq!(store.max_right().await?, 0);
    Ok(())
}

#[tokio::test]
async fn deleting_a_leaf_leaves_a_valid_gap() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;
    assert_eq!(coords(&store, b1).await?, (5, 6, 2));

    assert_eq!(delete_subtree(&store, b1).await?, 1);
    assert!(store.is_deleted(b1));
    assert!(consistency::validate(&store.snapshot()).is_consistent());
    assert!(matches!(
        store.get_node(b1).await,
        Err(NestedSetError::NotFound(_))
    ));
    assert_eq!(query::subtree_size(&store, b).await?, 1);

    consistency::renumber(&store, SiblingOrder::Ordering).await?;
    assert_eq!(coords(&store, root).await?, (1, 6, 0));
    assert_eq!(coords(&store, a).await?, (2, 3, 1));
    assert_eq!(coords(&store, b).await?, (4, 5, 1));

    let boundaries: BTreeSet<i64> = store
        .snapshot()
        .iter()
        .flat_map(|node| [node.coordinates.left, node.coordinates.right])
        .collect();
    assert_eq!(boundaries, (1..=6).collect());
    Ok(())
}

#[tokio::test]
async fn deleting_a_subtree_removes_descendants() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;

    assert_eq!(delete_subtree(&store, b).await?, 2);
    assert!(store.is_deleted(b1));
    assert_eq!(query::descendants(&store, root, Page::all()).await?, vec![a]);
    assert!(delete_subtree(&store, b).await.is_err());
    Ok(())
}

#[tokio::test]
async fn moved_subtree_follows_its_new_parent() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;
    let a1 = add(&store, Some(a)).await?;

    move_subtree(&store, b, Some(a)).await?;

    assert!(consistency::validate(&store.snapshot()).is_consistent());
    assert_eq!(query::ancestors(&store, b, Page::all()).await?, vec![root, a]);
    assert_eq!(
        query::descendants(&store, a, Page::all()).await?,
        vec![a1, b, b1]
    );
    assert_eq!(coords(&store, b1).await?.2, 3);
    assert_eq!(store.get_node(b).await?.parent_id, Some(a));
    assert_eq!(query::children(&store, root, Page::all()).await?, vec![a]);
    Ok(())
}

#[tokio::test]
async fn moving_left_and_right_keeps_the_tree_valid() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;
    let c = add(&store, Some(root)).await?;

    // b1 moves to a later sibling, then a moves under it.
    move_subtree(&store, b1, Some(c)).await?;
    move_subtree(&store, a, Some(b1)).await?;

    assert!(consistency::validate(&store.snapshot()).is_consistent());
    assert_eq!(query::path(&store, a, Page::all()).await?, vec![root, c, b1, a]);
    assert_eq!(query::subtree_size(&store, root).await?, 5);
    assert_eq!(query::subtree_size(&store, b).await?, 1);
    Ok(())
}

#[tokio::test]
async fn moving_under_own_descendant_is_rejected() -> TestResult {
    let store = MemoryStore::new();
    let [root, _a, b, b1] = sample(&store).await?;
    let before = store.snapshot();

    let err = move_subtree(&store, root, Some(b1)).await.unwrap_err();
    assert!(matches!(err, NestedSetError::InvalidMove(_)));
    let err = move_subtree(&store, b, Some(b)).await.unwrap_err();
    assert!(matches!(err, NestedSetError::InvalidMove(_)));

    assert_eq!(store.snapshot(), before);
    Ok(())
}

#[tokio::test]
async fn moving_to_the_root_level() -> TestResult {
    let store = MemoryStore::new();
    let [root, _a, b, b1] = sample(&store).await?;

    move_subtree(&store, b, None).await?;

    assert!(consistency::validate(&store.snapshot()).is_consistent());
    assert_eq!(query::roots(&store, Page::all()).await?, vec![root, b]);
    assert_eq!(coords(&store, b).await?, (5, 8, 0));
    assert_eq!(coords(&store, b1).await?, (6, 7, 1));
    assert_eq!(query::siblings(&store, b, Page::all()).await?, vec![root]);
    Ok(())
}

#[tokio::test]
async fn moving_the_only_tree_to_the_root_level() -> TestResult {
    let store = MemoryStore::new();
    let root = add(&store, None).await?;
    let child = add(&store, Some(root)).await?;

    move_subtree(&store, root, None).await?;

    assert_eq!(coords(&store, root).await?, (1, 4, 0));
    assert_eq!(coords(&store, child).await?, (2, 3, 1));
    assert!(consistency::validate(&store.snapshot()).is_consistent());

    let x = add(&store, None).await?;
    let y = add(&store, None).await?;
    move_subtree(&store, root, None).await?;

    assert_eq!(coords(&store, x).await?, (1, 2, 0));
    assert_eq!(coords(&store, y).await?, (3, 4, 0));
    assert_eq!(coords(&store, root).await?, (5, 8, 0));
    assert_eq!(coords(&store, child).await?, (6, 7, 1));
    assert_eq!(query::roots(&store, Page::all()).await?, vec![x, y, root]);
    assert!(consistency::validate(&store.snapshot()).is_consistent());
    Ok(())
}

#[tokio::test]
async fn reads_are_range_scans() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, b1] = sample(&store).await?;

    assert_eq!(query::subtree(&store, b, Page::all()).await?, vec![b, b1]);
    assert_eq!(query::siblings(&store, a, Page::all()).await?, vec![b]);
    assert_eq!(query::path(&store, b1, Page::all()).await?, vec![root, b, b1]);
    assert_eq!(query::tree(&store, Page::new(2, 1)).await?, vec![a, b]);
    assert_eq!(query::descendants(&store, root, Page::new(1, 2)).await?, vec![b1]);
    assert_eq!(query::tree_height(&store).await?, 2);
    assert_eq!(query::level_width(&store, 1).await?, 2);
    assert_eq!(query::level_width(&store, 5).await?, 0);
    assert_eq!(query::subtree_size(&store, root).await?, 4);
    assert_eq!(
        store.get_coordinates(root).await?.descendant_capacity(),
        3
    );

    let stats = query::tree_statistics(&store).await?;
    assert_eq!(stats.total_nodes, 4);
    assert_eq!(stats.root_count, 1);
    assert_eq!(stats.leaf_count, 2);
    assert_eq!(stats.height, 2);
    assert_eq!(stats.max_right, 8);
    assert_eq!(stats.levels.len(), 3);

    let json = serde_json::to_value(&stats)?;
    assert_eq!(json["leaf_count"], 2);
    assert_eq!(json["levels"][1]["width"], 2);
    Ok(())
}

#[tokio::test]
async fn empty_table_reads() -> TestResult {
    let store = MemoryStore::new();
    assert_eq!(query::tree_height(&store).await?, 0);
    assert!(query::roots(&store, Page::all()).await?.is_empty());
    let stats = query::tree_statistics(&store).await?;
    assert_eq!(stats.total_nodes, 0);
    assert!(stats.levels.is_empty());
    Ok(())
}

#[tokio::test]
async fn rebuild_restores_scrambled_coordinates() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, _b1] = sample(&store).await?;
    let a1 = add(&store, Some(a)).await?;
    add(&store, Some(a1)).await?;
    add(&store, None).await?;
    move_subtree(&store, a, Some(b)).await?;
    let before = shape(&store).await?;

    for (index, node) in store.snapshot().into_iter().enumerate() {
        let mut scrambled = node.coordinates;
        scrambled.left = 1000 - index as i64 * 7;
        scrambled.right = scrambled.left - 3;
        scrambled.depth = 9;
        store.write_coordinates(node.id, &scrambled).await?;
    }
    let report = consistency::validate(&store.snapshot());
    assert!(report.count(ProblemKind::InvalidRange) > 0);

    consistency::renumber(&store, SiblingOrder::Ordering).await?;

    assert!(consistency::validate(&store.snapshot()).is_consistent());
    assert_eq!(shape(&store).await?, before);
    assert_eq!(coords(&store, root).await?.0, 1);
    Ok(())
}

#[tokio::test]
async fn optimize_keeps_positions_and_closes_gaps() -> TestResult {
    let store = MemoryStore::new();
    let [root, a, b, _b1] = sample(&store).await?;
    let c = add(&store, Some(root)).await?;
    delete_subtree(&store, a).await?;
    let before = shape(&store).await?;

    let renumbered = consistency::renumber(&store, SiblingOrder::Position).await?;

    assert_eq!(renumbered, 4);
    assert_eq!(shape(&store).await?, before);
    assert_eq!(query::children(&store, root, Page::all()).await?, vec![b, c]);
    assert_eq!(coords(&store, root).await?, (1, 8, 0));
    Ok(())
}

#[tokio::test]
async fn orphans_are_reported_and_renumbered_as_roots() -> TestResult {
    let store = MemoryStore::new();
    let [root, _a, b, b1] = sample(&store).await?;
    store.set_parent(b1, Some(NodeId::new_v4())).await?;

    let report = consistency::validate(&store.snapshot());
    assert_eq!(report.count(ProblemKind::Orphan), 1);

    consistency::renumber(&store, SiblingOrder::Ordering).await?;
    assert_eq!(coords(&store, b1).await?.2, 0);
    assert_eq!(coords(&store, root).await?.1 - coords(&store, root).await?.0, 5);
    assert_eq!(query::subtree_size(&store, b).await?, 1);
    assert!(query::roots(&store, Page::all()).await?.contains(&b1));

    let report = consistency::validate(&store.snapshot());
    assert_eq!(report.count(ProblemKind::Overlap), 0);
    assert_eq!(report.count(ProblemKind::ParentRange), 0);
    Ok(())
}
