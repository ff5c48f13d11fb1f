// Async side of the card table client: talking to the authority, polling,
// submitting intents and driving reconciliation from a single session loop.

pub mod authority;
pub mod fetcher;
pub mod intents;
pub mod poller;
pub mod protocol;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
