//! Shared block and identity types for Blockyard.
//!
//! This crate is the leaf of the workspace: typed block ids, the nested
//! `Block` record used for hydration and persistence, and the small enums
//! carried on every block. It has **no internal blockyard dependencies**.
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`BlockId`]       | Tree-wide unique block address               |
//! | [`Block`]         | Nested, serializable block record            |
//! | [`Attributes`]    | Open, ordered attribute map                  |
//! | [`Status`]        | Open / close state of a block                |
//! | [`Align`]         | Layout alignment option                      |
//! | [`Position`]      | Insertion point `(index, parent?)`           |
//! |-------------------|----------------------------------------------|

pub mod block;
pub mod ids;
pub mod position;

pub use block::{Align, Attributes, Block, Status};
pub use ids::BlockId;
pub use position::Position;
