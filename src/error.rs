use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

/// Errors surfaced by the application host.
///
/// User components return `anyhow::Result` from their entry points; the host
/// wraps whatever comes back in `Component` (or `Function` for closure steps)
/// so every failure names the component that produced it. The underlying
/// error stays reachable through `source()` for downcasting.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("error: {source}, component: {component}")]
    Component {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error: {source}, function: {function}, location: {location}")]
    Function {
        function: String,
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("the dependency type '{type_name}' was not registered")]
    TypeNotRegistered { type_name: String },

    #[error("the name '{name}' is not registered for the dependency type '{type_name}'")]
    NameNotRegistered { type_name: String, name: String },

    #[error("a value is already registered for type '{type_name}' under name '{name}'")]
    AlreadyRegistered { type_name: String, name: String },

    #[error("the configuration key '{key}' is not set")]
    NotSet { key: String },

    /// Aggregate failure of a composite provider: one `<label>: <error>`
    /// line per inner provider, joined by newlines.
    #[error("{0}")]
    Provider(String),

    #[error("no parser registered for type '{type_name}'")]
    NoParserForType { type_name: String },

    #[error("failed to parse '{value}' as {type_name}: {message}")]
    ParseFailed {
        type_name: String,
        value: String,
        message: String,
    },

    #[error("error getting value for field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<HostError>,
    },

    #[error("readiness deadline exceeded")]
    ReadinessDeadline,

    #[error("scope cancelled")]
    Cancelled,
}

impl HostError {
    /// Wrap an underlying error with the producing component's type name.
    pub fn for_component(component: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Component {
            component: component.into(),
            source,
        }
    }

    /// Wrap an underlying error with a function name and its source location.
    pub fn for_function(
        function: impl Into<String>,
        location: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Function {
            function: function.into(),
            location: location.into(),
            source,
        }
    }

    pub(crate) fn for_field(field: impl Into<String>, source: HostError) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_wrapper_format() {
        let err = HostError::for_component("server::HttpServer", anyhow::anyhow!("bind refused"));
        assert_eq!(
            err.to_string(),
            "error: bind refused, component: server::HttpServer"
        );
    }

    #[test]
    fn function_wrapper_format() {
        let err =
            HostError::for_function("boot::prepare", "boot/mod.rs:41", anyhow::anyhow!("nope"));
        assert_eq!(
            err.to_string(),
            "error: nope, function: boot::prepare, location: boot/mod.rs:41"
        );
    }

    #[test]
    fn underlying_error_is_downcastable() {
        #[derive(Debug, thiserror::Error)]
        #[error("inner")]
        struct Inner;

        let err = HostError::for_component("X", anyhow::Error::new(Inner));
        let source = std::error::Error::source(&err).expect("source present");
        assert!(source.downcast_ref::<Inner>().is_some());
    }

    #[test]
    fn field_wrapper_chains() {
        let err = HostError::for_field(
            "Cfg",
            HostError::NotSet {
                key: "cfgKey".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "error getting value for field 'Cfg': the configuration key 'cfgKey' is not set"
        );
    }
}
