//! Executable extraction from cargo's `--message-format=json` stream.

use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

/// Ordered executables produced by one workspace build.
pub type ArtifactSet = Vec<PathBuf>;

/// The only part of a cargo message the pipeline cares about. Every other
/// key is ignored.
#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    executable: Option<PathBuf>,
}

/// Collect the non-null `executable` values in emission order.
///
/// Each line is parsed on its own. Lines that are not JSON objects are
/// skipped.
pub fn extract_artifacts(stdout: &str) -> ArtifactSet {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Message>(line) {
            Ok(message) => message.executable,
            Err(err) => {
                debug!("skipping non-message line ({}): {}", err, line);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_order_and_skips_null() {
        let stream = r#"{"executable":"/w/a"}
{"reason":"compiler-message"}
{"executable":null}
{"executable":"/w/b"}"#;

        assert_eq!(
            extract_artifacts(stream),
            [PathBuf::from("/w/a"), PathBuf::from("/w/b")]
        );
    }

    #[test]
    fn test_realistic_cargo_records() {
        let stream = concat!(
            r#"{"reason":"compiler-artifact","package_id":"init 0.1.0","target":{"kind":["bin"],"name":"init"},"filenames":["/u/target/release/init"],"executable":"/u/target/release/init","fresh":false}"#,
            "\n",
            r#"{"reason":"compiler-artifact","package_id":"aero_syscall 0.1.0","target":{"kind":["lib"],"name":"aero_syscall"},"filenames":["/u/target/release/libaero_syscall.rlib"],"executable":null,"fresh":true}"#,
            "\n",
            r#"{"reason":"build-finished","success":true}"#,
            "\n",
        );

        assert_eq!(
            extract_artifacts(stream),
            [PathBuf::from("/u/target/release/init")]
        );
    }

    #[test]
    fn test_ignores_blank_and_garbage_lines() {
        let stream = "\n   Compiling aero_kernel\n{\"executable\":\"/k\"}\n[1,2]\n";
        assert_eq!(extract_artifacts(stream), [PathBuf::from("/k")]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(extract_artifacts("").is_empty());
    }
}
