use thiserror::Error;

use super::types::PluginKind;

/// Errors raised while loading plugins or while a plugin does its work.
///
/// Load-time variants (`Config`, `MissingField`, `Load`, `Ambiguous`,
/// `NoOutputs`, `InvalidField`) are fatal: the agent refuses to start rather
/// than run with a gap in its configuration. Run-time variants only affect
/// the cycle in which they occur.
#[derive(Error, Debug)]
pub enum PluginError {
    /// A section does not name its implementation.
    #[error("no filename config option found for {kind} plugin {plugin}")]
    Config { kind: PluginKind, plugin: String },

    /// A declared required field is absent from the plugin's section.
    #[error(
        "Missing required field '{field}' for {kind} plugin {plugin}. \
         This should be found in file: {file}"
    )]
    MissingField {
        kind: PluginKind,
        field: String,
        plugin: String,
        file: String,
    },

    /// The implementation id cannot be resolved to a registered plugin of
    /// the requested capability.
    #[error("could not load {kind} plugin {plugin} from module '{implementation}': {reason}")]
    Load {
        kind: PluginKind,
        plugin: String,
        implementation: String,
        reason: String,
    },

    /// Several registrations claim the same implementation id and capability.
    #[error("{count} {kind} implementations are registered as '{implementation}'")]
    Ambiguous {
        kind: PluginKind,
        implementation: String,
        count: usize,
    },

    /// Loading finished without a single active output.
    #[error(
        "There are no output plugins enabled! Please enable at least one in the \
         [[outputs]] configuration and try again."
    )]
    NoOutputs,

    /// A field is present but its value is unusable.
    #[error("invalid value '{value}' for field '{field}' of plugin {plugin}: {reason}")]
    InvalidField {
        plugin: String,
        field: String,
        value: String,
        reason: String,
    },

    /// A device or service answered with something that is not a value.
    #[error("Failed to parse {what} from {location}: {reason}")]
    Parse {
        what: String,
        location: String,
        reason: String,
    },

    /// Filesystem or socket failure while reading or writing.
    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PluginError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PluginError::Io {
            context: context.into(),
            source,
        }
    }
}
