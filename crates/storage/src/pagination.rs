// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Cursor-based pagination over lists ordered by ULID.
//!
//! Backends fetch one item more than asked for, so that [`Pagination::process`]
//! can tell whether another page follows.

use uaa_data_model::{Client, IdentityZone, User};
use ulid::Ulid;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination<Cursor = Ulid> {
    /// Only return items strictly before this cursor
    pub before: Option<Cursor>,

    /// Only return items strictly after this cursor
    pub after: Option<Cursor>,

    /// The maximum number of items to return
    pub count: usize,

    /// In which direction to paginate
    pub direction: PaginationDirection,
}

/// The direction to paginate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationDirection {
    /// Paginate forward, from the oldest items
    Forward,

    /// Paginate backward, from the newest items
    Backward,
}

/// A node in a page, with a cursor
pub trait Node<C = Ulid> {
    /// The cursor of that particular node
    fn cursor(&self) -> C;
}

impl Node for User {
    fn cursor(&self) -> Ulid {
        self.id
    }
}

impl Node for Client {
    fn cursor(&self) -> Ulid {
        self.id
    }
}

impl Node for IdentityZone {
    fn cursor(&self) -> Ulid {
        self.id
    }
}

impl<C> Pagination<C> {
    /// Creates a [`Pagination`] which gets the first N items
    #[must_use]
    pub const fn first(first: usize) -> Self {
        Self {
            before: None,
            after: None,
            count: first,
            direction: PaginationDirection::Forward,
        }
    }

    /// Creates a [`Pagination`] which gets the last N items
    #[must_use]
    pub const fn last(last: usize) -> Self {
        Self {
            before: None,
            after: None,
            count: last,
            direction: PaginationDirection::Backward,
        }
    }

    /// Get items before the given cursor
    #[must_use]
    pub fn before(mut self, cursor: C) -> Self {
        self.before = Some(cursor);
        self
    }

    /// Get items after the given cursor
    #[must_use]
    pub fn after(mut self, cursor: C) -> Self {
        self.after = Some(cursor);
        self
    }
}

impl<C: Ord + Copy> Pagination<C> {
    /// Apply the pagination to a list of nodes sorted by ascending cursor,
    /// as an in-memory backend would hold them.
    ///
    /// Returns at most `count + 1` nodes, in the order
    /// [`Pagination::process`] expects them.
    #[must_use]
    pub fn window<T: Node<C>>(&self, sorted: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
        let in_range = |node: &T| {
            let cursor = node.cursor();
            self.after.is_none_or(|after| cursor > after)
                && self.before.is_none_or(|before| cursor < before)
        };

        match self.direction {
            PaginationDirection::Forward => {
                sorted.filter(in_range).take(self.count.saturating_add(1)).collect()
            }
            PaginationDirection::Backward => {
                sorted.rev().filter(in_range).take(self.count.saturating_add(1)).collect()
            }
        }
    }

    /// Process a page returned by a paginated query
    ///
    /// `nodes` must hold at most `count + 1` items, in ascending order when
    /// paginating forward and descending order when paginating backward.
    #[must_use]
    pub fn process<T: Node<C>>(&self, mut nodes: Vec<T>) -> Page<T, C> {
        let is_full = nodes.len() > self.count;
        nodes.truncate(self.count);

        let (has_previous_page, has_next_page) = match self.direction {
            PaginationDirection::Forward => (false, is_full),
            PaginationDirection::Backward => {
                // Pages are always returned oldest first
                nodes.reverse();
                (is_full, false)
            }
        };

        let edges = nodes
            .into_iter()
            .map(|node| Edge {
                cursor: node.cursor(),
                node,
            })
            .collect();

        Page {
            has_next_page,
            has_previous_page,
            edges,
        }
    }
}

/// An edge in a paginated result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<T, C = Ulid> {
    /// The cursor of the edge
    pub cursor: C,
    /// The node of the edge
    pub node: T,
}

/// A page of results returned by a paginated query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C = Ulid> {
    /// When paginating forwards, this is true if there are more items after
    pub has_next_page: bool,

    /// When paginating backwards, this is true if there are more items before
    pub has_previous_page: bool,

    /// The items in the page
    pub edges: Vec<Edge<T, C>>,
}

impl<T, C> Page<T, C> {
    /// Map the items in this page with the given function
    #[must_use]
    pub fn map<F, T2>(self, mut f: F) -> Page<T2, C>
    where
        F: FnMut(T) -> T2,
    {
        let edges = self
            .edges
            .into_iter()
            .map(|edge| Edge {
                cursor: edge.cursor,
                node: f(edge.node),
            })
            .collect();
        Page {
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
            edges,
        }
    }

    /// The cursor of the last item, to continue paginating forward
    #[must_use]
    pub fn end_cursor(&self) -> Option<&C> {
        self.edges.last().map(|edge| &edge.cursor)
    }

    /// Drop the cursors, keeping the items
    #[must_use]
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }
}
