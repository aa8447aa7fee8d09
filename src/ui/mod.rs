//! Inspector terminal UI built on [ratatui](https://github.com/ratatui-org/ratatui).
//!
//! - **[`app`]**: inspector state over a recorded history, key handling, pane focus
//! - **[`panes`]**: stateless render functions for each pane
//! - **[`theme`]**: the shared color palette
//!
//! Construct an [`App`] from the [`SnapshotManager`] of a recorded run and
//! call [`App::run`].
//!
//! [`SnapshotManager`]: crate::snapshot::SnapshotManager
//! [`App::run`]: app::App::run

pub mod app;
pub mod panes;
pub mod theme;

pub use app::App;
