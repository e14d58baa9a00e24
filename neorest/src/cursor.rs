// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cursor over decoded results

use crate::data::Data;
use crate::error::Result;
use crate::transform::{Decoded, Item, Row};
use serde_json::Value;

/// One cursor position
#[derive(Debug, Clone)]
pub enum Record {
    Row(Row),
    Item(Item),
}

impl Record {
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Record::Row(row) => Some(row),
            Record::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Record::Item(item) => Some(item),
            Record::Row(_) => None,
        }
    }

    pub async fn resolve(&self) -> Result<Value> {
        match self {
            Record::Row(row) => row.resolve().await,
            Record::Item(item) => item.resolve().await,
        }
    }

    /// Graph fragments expand into their nodes and relationships
    fn expand(&self) -> Vec<Item> {
        match self {
            Record::Row(row) => match &row.graph {
                Some(graph) => graph
                    .nodes
                    .iter()
                    .cloned()
                    .map(Item::Node)
                    .chain(graph.relationships.iter().cloned().map(Item::Relationship))
                    .collect(),
                None => Vec::new(),
            },
            Record::Item(_) => Vec::new(),
        }
    }
}

/// Ordered, navigable result rows
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    records: Vec<Record>,
    position: usize,
    has_next: bool,
    has_previous: bool,
}

impl Cursor {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            has_next: records.len() > 1,
            records,
            position: 0,
            has_previous: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Rewinds to the first row
    pub fn first(&mut self) -> Option<&Record> {
        self.position = 0;
        self.has_next = self.records.len() > 1;
        self.has_previous = false;
        self.records.first()
    }

    pub fn current(&self) -> Option<&Record> {
        self.records.get(self.position)
    }

    /// Advances one row; at the end nothing is returned and the position holds
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Record> {
        if !self.has_next || self.position + 1 >= self.records.len() {
            return None;
        }
        self.position += 1;
        self.has_previous = true;
        self.has_next = self.position + 1 < self.records.len();
        self.records.get(self.position)
    }

    pub fn previous(&mut self) -> Option<&Record> {
        if !self.has_previous || self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.has_next = true;
        self.has_previous = self.position > 0;
        self.records.get(self.position)
    }

    /// Resolves rows in order, or only the first one
    pub async fn fetch(&self, first_only: bool) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        self.for_each(|value, _| values.push(value), first_only).await?;
        Ok(values)
    }

    /// Calls `callback` with every resolved row and its index.
    ///
    /// Rows carrying a graph fragment yield its nodes and relationships one
    /// by one instead of the row itself.
    pub async fn for_each<F>(&self, mut callback: F, first_only: bool) -> Result<()>
    where
        F: FnMut(Value, usize),
    {
        let mut index = 0;
        for record in &self.records {
            let expanded = record.expand();
            if expanded.is_empty() {
                callback(record.resolve().await?, index);
                index += 1;
                if first_only {
                    return Ok(());
                }
            } else {
                for item in &expanded {
                    callback(item.resolve().await?, index);
                    index += 1;
                    if first_only {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Walks every row from the first, moving the cursor along
    pub fn each<F>(&mut self, mut callback: F)
    where
        F: FnMut(&Record, usize),
    {
        if self.first().is_none() {
            return;
        }
        callback(&self.records[self.position], self.position);
        while self.next().is_some() {
            callback(&self.records[self.position], self.position);
        }
    }
}

impl From<Decoded> for Cursor {
    fn from(decoded: Decoded) -> Self {
        let records = match decoded {
            Decoded::Rows(rows) => rows.into_iter().map(Record::Row).collect(),
            Decoded::Entity(item) => vec![Record::Item(item)],
            Decoded::Entities(items) => items.into_iter().map(Record::Item).collect(),
            Decoded::Scalar(data) => match data.peek() {
                Value::Null => Vec::new(),
                Value::Array(values) => values
                    .into_iter()
                    .map(|value| Record::Item(Item::Data(Data::new(value))))
                    .collect(),
                _ => vec![Record::Item(Item::Data(data))],
            },
        };
        Cursor::new(records)
    }
}
