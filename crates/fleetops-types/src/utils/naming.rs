//! Canonical engine keys.
//!
//! Engines are looked up by a key that ignores case and separators, so
//! "Google Maps", "google-maps", "google_maps" and "GOOGLE MAPS" all name the
//! same engine.

/// Normalizes an engine name into its registry key.
///
/// Letters are lowercased and every run of non-alphanumeric characters
/// collapses into a single `-`. Leading and trailing separators are dropped,
/// so a name made only of separators yields an empty key. Two names that
/// differ only in case always share a key.
pub fn normalize_key(name: &str) -> String {
	let mut key = String::with_capacity(name.len());
	let mut pending_separator = false;

	for ch in name.chars() {
		if !ch.is_alphanumeric() {
			pending_separator = true;
			continue;
		}
		if pending_separator && !key.is_empty() {
			key.push('-');
		}
		pending_separator = false;
		key.extend(ch.to_lowercase());
	}

	key
}
