//! Positional access into the table.
//!
//! A cursor names one cell of one leaf, or the position one past the last
//! cell (`end_of_table`). High-level operations create a cursor, use it,
//! and discard it; a cursor is not expected to survive tree mutation.

use super::node::NodeType;
use super::table::Table;
use crate::errors::Error;
use tracing::trace;

pub struct Cursor<'a> {
    pub table: &'a mut Table,

    /// Leaf page the cursor points into.
    pub page_num: u32,

    /// Cell index within that leaf.
    pub cell_num: u32,

    /// Position one past the last row of the table.
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at the row with the smallest key.
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        // The smallest key sits where key 0 would be inserted.
        let mut cursor = Cursor::find(table, 0)?;
        let page = cursor.table.pager.get(cursor.page_num)?;
        cursor.end_of_table = page.borrow().leaf_num_cells() == 0;
        Ok(cursor)
    }

    /// Positions a cursor at `key`, or at the slot where `key` would be
    /// inserted. Descends from the root through internal nodes until it
    /// reaches a leaf.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let mut page_num = table.root_page_num;
        loop {
            let next = {
                let page = table.pager.get(page_num)?;
                let node = page.borrow();
                match node.node_type()? {
                    NodeType::Leaf => None,
                    NodeType::Internal => {
                        let child_index = node.find_child(key)?;
                        let child = node.internal_child(child_index)?;
                        trace!(page_num, child_index, child, "Descending internal node");
                        Some(child)
                    }
                }
            };
            match next {
                Some(child) => page_num = child,
                None => return Cursor::leaf_find(table, page_num, key),
            }
        }
    }

    /// Binary search within one leaf: converges on the smallest index
    /// whose key is `>=` the target, which is also the insertion slot.
    fn leaf_find(table: &'a mut Table, page_num: u32, key: u32) -> Result<Self, Error> {
        let cell_num = {
            let page = table.pager.get(page_num)?;
            let node = page.borrow();

            let mut min_index = 0;
            let mut one_past_max_index = node.leaf_num_cells();
            let mut found = None;
            while one_past_max_index != min_index {
                let index = (min_index + one_past_max_index) / 2;
                let key_at_index = node.leaf_key(index as usize)?;
                if key == key_at_index {
                    found = Some(index);
                    break;
                }
                if key < key_at_index {
                    one_past_max_index = index;
                } else {
                    min_index = index + 1;
                }
            }
            found.unwrap_or(min_index)
        };

        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// Copies the serialized row under the cursor into `buf`.
    pub fn read_value(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let page = self.table.pager.get(self.page_num)?;
        let node = page.borrow();
        let value = node.leaf_value(self.cell_num as usize)?;
        buf.clear();
        buf.extend_from_slice(value);
        Ok(())
    }

    /// Moves to the next row, hopping to the right sibling when the
    /// current leaf runs out. The rightmost leaf has no sibling (0), which
    /// ends the table.
    pub fn advance(&mut self) -> Result<(), Error> {
        let (num_cells, next_leaf) = {
            let page = self.table.pager.get(self.page_num)?;
            let node = page.borrow();
            (node.leaf_num_cells(), node.leaf_next_leaf())
        };
        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
