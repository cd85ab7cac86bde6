//! Internal implementation of identifier services.
//!
//! This module contains the implementation details for UUID and storage-name generation.

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Longest storage name the generator will produce, in bytes.
///
/// Matches `NAME_MAX` on the common Linux and macOS filesystems.
pub const MAX_STORAGE_NAME_LEN: usize = 255;

/// Depot's canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in canonical
/// form, so it can be embedded in a filename without further checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UuidService(Uuid);

impl Default for UuidService {
    fn default() -> Self {
        Self::new()
    }
}

impl UuidService {
    /// Generates a new UUID in canonical form.
    ///
    /// The generated UUID is random and follows RFC 4122 version 4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `true` if `input` is in canonical form.
    ///
    /// Canonical means exactly 32 characters of lowercase hexadecimal.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for UuidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
///
/// A `.` directly after another `.` is also replaced, so the result never contains `..`.
pub fn sanitise_filename(original: &str) -> String {
    let mut sanitised = String::with_capacity(original.len());
    let mut previous_dot = false;

    for c in original.chars() {
        let mapped = match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' => c,
            '.' if !previous_dot => '.',
            _ => '_',
        };
        previous_dot = mapped == '.';
        sanitised.push(mapped);
    }

    sanitised
}

/// A generated storage name.
///
/// Format:
/// `<unix_millis>-<canonical_uuid>-<sanitised_original>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageName {
    timestamp_millis: i64,
    value: String,
}

impl StorageName {
    fn new(timestamp_millis: i64, uuid: &UuidService, original_name: &str) -> Self {
        let prefix = format!("{}-{}-", timestamp_millis, uuid);
        let sanitised = sanitise_filename(original_name);

        // Sanitised text is pure ASCII, so byte offsets are char boundaries. Keep the tail so
        // the extension survives truncation.
        let budget = MAX_STORAGE_NAME_LEN.saturating_sub(prefix.len());
        let tail = if sanitised.len() > budget {
            &sanitised[sanitised.len() - budget..]
        } else {
            sanitised.as_str()
        };

        Self {
            timestamp_millis,
            value: format!("{}{}", prefix, tail),
        }
    }

    /// Returns the millisecond token embedded at the start of the name.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for StorageName {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Produces collision-resistant storage names.
///
/// # Monotonicity Guarantee
///
/// The millisecond token handed out by one generator is strictly greater than the previous
/// one (incremented by 1 ms if the clock has not advanced or went backwards). Together with
/// the random UUID this keeps names unique even for identical inputs generated in a tight loop.
///
/// The generator is `Sync` and is shared by all concurrent uploads.
#[derive(Debug, Default)]
pub struct StorageNameGenerator {
    last_millis: AtomicI64,
}

impl StorageNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a new storage name for a client-supplied filename.
    ///
    /// Never fails: any input, including empty or symbol-only names, yields a valid name.
    pub fn generate(&self, original_name: &str) -> StorageName {
        StorageName::new(self.next_millis(), &UuidService::new(), original_name)
    }

    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);

        now.max(previous + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let uuid_service = UuidService::new();
        let canonical = uuid_service.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(UuidService::is_canonical(&canonical));
    }

    #[test]
    fn test_is_canonical_invalid() {
        // Uppercase
        assert!(!UuidService::is_canonical(
            "550E8400E29B41D4A716446655440000"
        ));

        // Hyphenated
        assert!(!UuidService::is_canonical(
            "550e8400-e29b-41d4-a716-446655440000"
        ));

        // Too short
        assert!(!UuidService::is_canonical("550e8400e29b41d4a71644665544000"));

        // Empty string
        assert!(!UuidService::is_canonical(""));
    }

    #[test]
    fn test_sanitise_keeps_safe_characters() {
        assert_eq!(sanitise_filename("report-2024.v2.pdf"), "report-2024.v2.pdf");
    }

    #[test]
    fn test_sanitise_replaces_unsafe_characters() {
        assert_eq!(sanitise_filename("my file (1).txt"), "my_file__1_.txt");
        assert_eq!(sanitise_filename("../../etc/passwd"), ".__.__etc_passwd");
        assert_eq!(sanitise_filename("a\\b/c"), "a_b_c");
        assert_eq!(sanitise_filename("naïve.txt"), "na_ve.txt");
    }

    #[test]
    fn test_sanitise_never_produces_parent_segment() {
        for input in ["..", "...", "a..b", "....txt", ". . ..", "x.\u{0}..y"] {
            let sanitised = sanitise_filename(input);
            assert!(!sanitised.contains(".."), "{:?} -> {:?}", input, sanitised);
        }
    }

    #[test]
    fn test_storage_name_layout() {
        let generator = StorageNameGenerator::new();
        let name = generator.generate("report.pdf");

        let (millis, rest) = name.as_str().split_once('-').unwrap();
        let (uuid, stem) = rest.split_once('-').unwrap();

        assert_eq!(millis.parse::<i64>().unwrap(), name.timestamp_millis());
        assert!(UuidService::is_canonical(uuid));
        assert_eq!(stem, "report.pdf");
    }

    #[test]
    fn test_storage_name_for_empty_original() {
        let name = StorageNameGenerator::new().generate("");

        assert!(name.as_str().ends_with('-'));
        assert!(!name.as_str().is_empty());
    }

    #[test]
    fn test_storage_name_is_filesystem_safe() {
        let generator = StorageNameGenerator::new();
        let hostile = "..\\..//\u{0}<script>alert(1)</script>|*?:\"'.pdf";
        let name = generator.generate(hostile);

        assert!(!name.as_str().contains(".."));
        assert!(!name.as_str().contains('/'));
        assert!(!name.as_str().contains('\\'));
        assert!(name
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_'));
    }

    #[test]
    fn test_storage_name_truncates_long_originals_keeping_extension() {
        let generator = StorageNameGenerator::new();
        let original = format!("{}.tar.gz", "x".repeat(400));
        let name = generator.generate(&original);

        assert!(name.as_str().len() <= MAX_STORAGE_NAME_LEN);
        assert!(name.as_str().ends_with(".tar.gz"));
    }

    #[test]
    fn test_generate_never_repeats() {
        let generator = StorageNameGenerator::new();
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let name = generator.generate("same.txt").into_string();
            assert!(seen.insert(name), "duplicate storage name generated");
        }
    }

    #[test]
    fn test_generate_is_monotonic() {
        let generator = StorageNameGenerator::new();
        let mut previous = generator.generate("a").timestamp_millis();

        for _ in 0..1_000 {
            let next = generator.generate("a").timestamp_millis();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_generate_concurrently_never_repeats() {
        let generator = std::sync::Arc::new(StorageNameGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    (0..1_000)
                        .map(|_| generator.generate("x").into_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(seen.insert(name));
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
