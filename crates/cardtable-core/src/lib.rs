// Library root: the synchronous reconciliation core shared by the async
// orchestrator and the terminal renderer.

pub mod action_log;
pub mod card;
pub mod config;
pub mod error;
pub mod popup;
pub mod protocol;
pub mod reconciler;
pub mod selection;
pub mod store;
pub mod turn_lock;
pub mod view;
