/// Identification of the SDK built on top of the core, reported to the server and attached to
/// delivered event batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdkMetadata {
    /// SDK name. Usually, language name.
    pub name: &'static str,
    /// Version of SDK.
    pub version: &'static str,
}
