//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestWorld, EDITOR_LOGIN};
//!
//! #[test]
//! fn test_edit_contact() {
//!     let world = TestWorld::create();
//!     let contact_id = world.create_contact("Ada", "Lovelace");
//!     let editor = world.user(EDITOR_LOGIN);
//!     world.change(contact_id, &editor, Some("hello"), |_| {});
//! }
//! ```

mod constants;
mod fixtures;

// Public API - this is what tests import
pub use constants::*;
pub use fixtures::TestWorld;
