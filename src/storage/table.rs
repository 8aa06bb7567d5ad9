//! The table: a B+ tree of rows keyed by id, rooted at page 0.

use super::cursor::Cursor;
use super::node::{
    NodeType, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::Error;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct Table {
    pub pager: Pager,
    pub root_page_num: u32,
}

impl Table {
    /// Opens the database file at `path`. A brand-new file gets page 0
    /// initialized as an empty root leaf.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let page = pager.get(0)?;
            let mut node = page.borrow_mut();
            node.initialize_leaf();
            node.set_root(true);
        }
        info!(path = %path.display(), "Opened table");
        Ok(Table {
            pager,
            root_page_num: 0,
        })
    }

    /// Flushes every loaded page and releases the file. Mutations are
    /// durable only after this returns.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()
    }
}

/// Inserts a row at its key-ordered position. A key the tree already
/// holds is rejected before anything is mutated.
pub fn insert_row(table: &mut Table, row: &Row) -> Result<(), Error> {
    let key = row.id;
    let row_bytes = row.serialize();
    debug!(key, "Inserting row");

    let cursor = Cursor::find(table, key)?;
    let page = cursor.table.pager.get(cursor.page_num)?;
    let num_cells = page.borrow().leaf_num_cells();

    if cursor.cell_num < num_cells {
        let key_at_index = page.borrow().leaf_key(cursor.cell_num as usize)?;
        if key_at_index == key {
            return Err(Error::DuplicateKey);
        }
    }

    if num_cells as usize >= LEAF_NODE_MAX_CELLS {
        warn!(
            page_num = cursor.page_num,
            num_cells, "Leaf full, splitting"
        );
        return leaf_node_split_and_insert(cursor, key, &row_bytes);
    }

    let mut node = page.borrow_mut();
    if cursor.cell_num < num_cells {
        // Make room: shift cells right one slot, high end first.
        for i in (cursor.cell_num + 1..=num_cells).rev() {
            let prev = node.leaf_cell(i as usize - 1)?.to_vec();
            node.leaf_cell_mut(i as usize)?.copy_from_slice(&prev);
        }
    }
    node.set_leaf_num_cells(num_cells + 1);
    node.set_leaf_key(cursor.cell_num as usize, key)?;
    node.set_leaf_value(cursor.cell_num as usize, &row_bytes)?;
    Ok(())
}

/// Splits a full leaf around the incoming cell. The old node keeps the low
/// half of the virtual (max + 1)-cell array, a freshly allocated sibling
/// takes the high half, and the root grows a level if the split reached it.
fn leaf_node_split_and_insert(cursor: Cursor, key: u32, row_bytes: &[u8]) -> Result<(), Error> {
    let new_page_num = cursor.table.pager.allocate_page();
    debug!(
        old_page = cursor.page_num,
        new_page = new_page_num,
        "Splitting leaf node"
    );
    let old_page = cursor.table.pager.get(cursor.page_num)?;
    let new_page = cursor.table.pager.get(new_page_num)?;

    let mut old_node = old_page.borrow_mut();
    let mut new_node = new_page.borrow_mut();

    new_node.initialize_leaf();
    new_node.set_parent(old_node.parent());

    // The sibling chain stays sorted: the new leaf inherits the old leaf's
    // sibling, and the old leaf points at the new one.
    new_node.set_leaf_next_leaf(old_node.leaf_next_leaf());
    old_node.set_leaf_next_leaf(new_page_num);

    // Walk the virtual array of old cells plus the new one from the high
    // end, dropping each cell into its post-split node and slot.
    let old = old_node.clone();
    for i in (0..=LEAF_NODE_MAX_CELLS).rev() {
        let dest_node = if i >= LEAF_NODE_LEFT_SPLIT_COUNT {
            &mut new_node
        } else {
            &mut old_node
        };
        let cell_index = i % LEAF_NODE_LEFT_SPLIT_COUNT;

        if i == cursor.cell_num as usize {
            dest_node.set_leaf_key(cell_index, key)?;
            dest_node.set_leaf_value(cell_index, row_bytes)?;
        } else if i > cursor.cell_num as usize {
            dest_node
                .leaf_cell_mut(cell_index)?
                .copy_from_slice(old.leaf_cell(i - 1)?);
        } else {
            dest_node
                .leaf_cell_mut(cell_index)?
                .copy_from_slice(old.leaf_cell(i)?);
        }
    }
    old_node.set_leaf_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32);
    new_node.set_leaf_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);

    let was_root = old_node.is_root();
    drop(old_node);
    drop(new_node);

    if was_root {
        create_new_root(cursor.table, new_page_num)
    } else {
        Err(err!(
            Unsupported,
            "need to implement updating parent after split"
        ))
    }
}

/// Grows the tree by one level after the root leaf splits. Page 0 stays
/// the root: its old bytes move to a fresh left-child page, and page 0 is
/// rebuilt as an internal node over the two leaves.
fn create_new_root(table: &mut Table, right_child_page_num: u32) -> Result<(), Error> {
    let left_child_page_num = table.pager.allocate_page();
    debug!(
        left_child_page_num,
        right_child_page_num, "Creating new root"
    );

    let root_page = table.pager.get(table.root_page_num)?;
    let left_page = table.pager.get(left_child_page_num)?;

    let mut root = root_page.borrow_mut();
    let mut left_child = left_page.borrow_mut();

    left_child.copy_from(&root);
    left_child.set_root(false);
    left_child.set_parent(table.root_page_num);
    let left_child_max_key = left_child.max_key()?;

    root.initialize_internal();
    root.set_root(true);
    root.set_internal_num_keys(1);
    root.set_internal_child(0, left_child_page_num)?;
    root.set_internal_key(0, left_child_max_key)?;
    root.set_internal_right_child(right_child_page_num);

    drop(root);
    drop(left_child);

    let right_page = table.pager.get(right_child_page_num)?;
    right_page.borrow_mut().set_parent(table.root_page_num);
    Ok(())
}

/// Reads every row in ascending key order.
pub fn select_rows(table: &mut Table) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::new();
    let mut buf = Vec::with_capacity(ROW_SIZE);

    let mut cursor = Cursor::start(table)?;
    while !cursor.end_of_table {
        cursor.read_value(&mut buf)?;
        rows.push(Row::deserialize(&buf)?);
        cursor.advance()?;
    }
    Ok(rows)
}

/// Renders the tree structure, one node per `- kind (size n)` line with
/// leaf keys and routing keys indented beneath their node.
pub fn dump_tree(table: &mut Table) -> Result<String, Error> {
    let mut out = String::new();
    dump_node(table, table.root_page_num, 0, &mut out)?;
    Ok(out)
}

enum NodeSummary {
    Leaf(Vec<u32>),
    Internal {
        children: Vec<u32>,
        keys: Vec<u32>,
        right_child: u32,
    },
}

fn dump_node(
    table: &mut Table,
    page_num: u32,
    depth: usize,
    out: &mut String,
) -> Result<(), Error> {
    let summary = {
        let page = table.pager.get(page_num)?;
        let node = page.borrow();
        match node.node_type()? {
            NodeType::Leaf => {
                let mut keys = Vec::new();
                for i in 0..node.leaf_num_cells() {
                    keys.push(node.leaf_key(i as usize)?);
                }
                NodeSummary::Leaf(keys)
            }
            NodeType::Internal => {
                let num_keys = node.internal_num_keys();
                let mut children = Vec::new();
                let mut keys = Vec::new();
                for i in 0..num_keys {
                    children.push(node.internal_child(i)?);
                    keys.push(node.internal_key(i)?);
                }
                NodeSummary::Internal {
                    children,
                    keys,
                    right_child: node.internal_right_child(),
                }
            }
        }
    };

    let pad = "  ".repeat(depth);
    match summary {
        NodeSummary::Leaf(keys) => {
            out.push_str(&format!("{}- leaf (size {})\n", pad, keys.len()));
            for key in keys {
                out.push_str(&format!("{}  - {}\n", pad, key));
            }
        }
        NodeSummary::Internal {
            children,
            keys,
            right_child,
        } => {
            out.push_str(&format!("{}- internal (size {})\n", pad, keys.len()));
            for (child, key) in children.into_iter().zip(keys) {
                dump_node(table, child, depth + 1, out)?;
                out.push_str(&format!("{}  - key {}\n", pad, key));
            }
            dump_node(table, right_child, depth + 1, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_table(dir: &TempDir) -> Table {
        Table::open(&dir.path().join("table.db")).unwrap()
    }

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("person{}@example.com", id)).unwrap()
    }

    #[test]
    fn single_insert_then_select() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        insert_row(&mut table, &row(1)).unwrap();
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows, vec![row(1)]);
    }

    #[test]
    fn select_on_an_empty_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        assert!(select_rows(&mut table).unwrap().is_empty());
    }

    #[test]
    fn rows_come_back_in_key_order() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in [5, 1, 9, 3, 13, 2, 8, 11, 4, 12, 6, 10, 7] {
            insert_row(&mut table, &row(id)).unwrap();
        }
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=13).collect::<Vec<u32>>());
    }

    #[test]
    fn duplicate_key_is_rejected_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        insert_row(&mut table, &Row::new(1, "a", "a").unwrap()).unwrap();
        let before = table.pager.get(0).unwrap().borrow().as_bytes().to_vec();

        let err = insert_row(&mut table, &Row::new(1, "b", "b").unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey));

        let after = table.pager.get(0).unwrap().borrow().as_bytes().to_vec();
        assert_eq!(before, after);
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username, "a");
    }

    #[test]
    fn fourteenth_insert_splits_the_root_leaf() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=14 {
            insert_row(&mut table, &row(id)).unwrap();
        }

        let mut expected = String::from("- internal (size 1)\n");
        expected.push_str("  - leaf (size 7)\n");
        for id in 1..=7 {
            expected.push_str(&format!("    - {}\n", id));
        }
        expected.push_str("  - key 7\n");
        expected.push_str("  - leaf (size 7)\n");
        for id in 8..=14 {
            expected.push_str(&format!("    - {}\n", id));
        }
        assert_eq!(dump_tree(&mut table).unwrap(), expected);

        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=14).collect::<Vec<u32>>());
    }

    #[test]
    fn split_handles_out_of_order_inserts() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in [8, 3, 14, 1, 12, 6, 10, 2, 13, 5, 9, 4, 11, 7] {
            insert_row(&mut table, &row(id)).unwrap();
        }
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=14).collect::<Vec<u32>>());
    }

    #[test]
    fn root_key_is_the_left_child_max() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=14 {
            insert_row(&mut table, &row(id)).unwrap();
        }

        let root_page = table.pager.get(0).unwrap();
        let (left_page_num, root_key, right_page_num) = {
            let root = root_page.borrow();
            assert_eq!(root.node_type().unwrap(), NodeType::Internal);
            assert!(root.is_root());
            assert_eq!(root.internal_num_keys(), 1);
            (
                root.internal_child(0).unwrap(),
                root.internal_key(0).unwrap(),
                root.internal_right_child(),
            )
        };

        let left_page = table.pager.get(left_page_num).unwrap();
        let left_max = left_page.borrow().max_key().unwrap();
        assert_eq!(root_key, left_max);

        // the sibling chain runs left leaf -> right leaf -> end
        assert_eq!(left_page.borrow().leaf_next_leaf(), right_page_num);
        let right_page = table.pager.get(right_page_num).unwrap();
        assert_eq!(right_page.borrow().leaf_next_leaf(), 0);
    }

    #[test]
    fn scan_crosses_leaves_as_the_right_leaf_fills() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=20 {
            insert_row(&mut table, &row(id)).unwrap();
        }
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<u32>>());
    }

    #[test]
    fn leaf_keys_stay_strictly_increasing() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in [8, 3, 14, 1, 12, 6, 10, 2, 13, 5, 9, 4, 11, 7] {
            insert_row(&mut table, &row(id)).unwrap();
        }

        for page_num in 0..table.pager.num_pages() {
            let page = table.pager.get(page_num).unwrap();
            let node = page.borrow();
            if node.node_type().unwrap() != NodeType::Leaf {
                continue;
            }
            let num_cells = node.leaf_num_cells();
            assert!(num_cells as usize <= LEAF_NODE_MAX_CELLS);
            for i in 1..num_cells {
                assert!(
                    node.leaf_key(i as usize - 1).unwrap() < node.leaf_key(i as usize).unwrap()
                );
            }
        }
    }

    #[test]
    fn rows_survive_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("persist.db");
        {
            let mut table = Table::open(&path).unwrap();
            for id in 1..=14 {
                insert_row(&mut table, &row(id)).unwrap();
            }
            table.close().unwrap();
        }
        let mut table = Table::open(&path).unwrap();
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=14).collect::<Vec<u32>>());
    }
}
