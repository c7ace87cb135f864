// src/lib.rs

#![doc = r#"
# Dirbeat

Dirbeat is a polling directory monitor. It rescans a directory tree on a fixed
interval, tracks content digests for an explicit watch list, and pushes the
complete current state as newline-delimited JSON frames to every connected TCP
client. The same binary run with `--listen` consumes the feed.

## Modules

- [`config`]: Configuration loading and merging from CLI, file, and environment.
- [`event`]: Status frame and watched-file events.
- [`scanner`]: Directory enumeration and content digesting.
- [`monitor`]: Change detection state and the periodic poll task.
- [`network`]: TCP status server and listener client.

See the README for usage examples and more details.
"#]

pub mod config;
pub mod event;
pub mod monitor;
pub mod network;
pub mod scanner;
