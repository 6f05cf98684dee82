//! Configuration access port.

/// Raw string lookup over a sectioned key/value store. Typed parsing and
/// validation live in `domain::config_validation`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, sorted. Empty if the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
