//! # SmartStore Shell
//!
//! Page-side coordinators bridging worker lifecycle and platform install
//! events to user-visible decision points. Both coordinators are plain
//! state containers with transition functions: they return typed actions
//! for the embedding page to execute and never touch the rendering layer.

pub mod install;
pub mod update;

pub use install::{
    DeferredPrompt, DismissalStore, FileDismissalStore, InstallOutcome, InstallPromptCoordinator,
    MemoryDismissalStore,
};
pub use update::{UpdateAction, UpdateCoordinator};
