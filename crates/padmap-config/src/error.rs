use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(padmap::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(padmap::config::invalid))]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    #[diagnostic(code(padmap::config::missing_field))]
    MissingField { field: String },

    #[error("Pin {pin} is mapped more than once")]
    #[diagnostic(code(padmap::config::duplicate_pin))]
    DuplicatePin { pin: u8 },

    #[error("Pin {pin} is out of range (the expander has pins 0-15)")]
    #[diagnostic(code(padmap::config::pin_out_of_range))]
    PinOutOfRange { pin: i64 },

    #[error("Combo '{combo}' watches pin {pin}, which has no button mapping")]
    #[diagnostic(code(padmap::config::unmapped_combo_pin))]
    UnmappedComboPin { combo: String, pin: u8 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
