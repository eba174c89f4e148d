pub mod dispatcher;
pub mod poll_watcher;
