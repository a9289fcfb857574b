//! Utility Module
//!
//! - [`interner`]: String interning for property names
//!
//! # String Interning
//!
//! Property tables on nodes and materials are keyed by interned symbols, so a
//! resolved binding writes through an integer key instead of hashing the
//! property name every frame.
//!
//! ```rust,ignore
//! use myth_animation::utils::interner;
//!
//! let sym1 = interner::intern("opacity");
//! let sym2 = interner::intern("opacity");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;

pub use interner::Symbol;
