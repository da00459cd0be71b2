//! # Board Harness Core
//!
//! The board aggregation engine: coordinate frame translation, payload
//! normalization, paginated fetching, and reconstruction of a board's
//! containment, tagging, and connector graph from a flat item feed.
//!
//! This crate contains no HTTP client, configuration, or runtime. It reads
//! the remote board through the [`source::BoardSource`] trait; the
//! application crate supplies the REST implementation and tests use
//! [`source::memory::InMemoryBoard`].
//!
//! | Module | Role |
//! |--------|------|
//! | [`coords`] | Reference-frame translation to and from the store's frame |
//! | [`normalize`] | Numeric coercion and style vocabulary narrowing |
//! | [`fetch`] | Cursor-paginated listing drain and detail hydration |
//! | [`summary`] | Plain-text item synopses |
//! | [`graph`] | Parent, tag, and connector relationships |
//! | [`analysis`] | Duplicate, orphaned, and hot-spot connector findings |
//! | [`hierarchy`] | Depth-bounded containment trees |
//! | [`snapshot`] | Top-level board snapshot composition |
//! | [`history`] | Bounded ledger of recently written items |

pub mod analysis;
pub mod coords;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod hierarchy;
pub mod history;
pub mod models;
pub mod normalize;
pub mod snapshot;
pub mod source;
pub mod summary;
