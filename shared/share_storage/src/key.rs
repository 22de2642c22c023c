//! Object key generation

use rand::{distributions::Alphanumeric, Rng};

/// Length of the random identifier embedded in every key
pub const KEY_ID_LEN: usize = 12;

/// Generates unique object keys under a fixed prefix
#[derive(Debug, Clone)]
pub struct ObjectKeyGenerator {
    prefix: String,
}

impl ObjectKeyGenerator {
    /// Creates a generator for keys under `prefix`
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// The prefix every generated key lives under
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `<prefix>/<id><extension>` with a fresh random identifier
    ///
    /// The identifier is drawn from the thread-local CSPRNG, so concurrent
    /// callers never need to coordinate.
    #[must_use]
    pub fn new_key(&self, extension: &str) -> String {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(KEY_ID_LEN)
            .map(char::from)
            .collect();

        format!("{}/{id}{extension}", self.prefix)
    }
}

/// Returns the extension of `filename` including the leading dot
///
/// Everything from the last `.` of the final path element is returned, or an
/// empty string when there is none.
#[must_use]
pub fn file_extension(filename: &str) -> &str {
    let name = filename.rsplit(&['/', '\\'][..]).next().unwrap_or(filename);
    name.rfind('.').map_or("", |index| &name[index..])
}
