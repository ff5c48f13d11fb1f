// Library root for the terminal client, so tests and the binary share the
// same TUI code.

pub mod tui;
