//! Mapping of node-reported failures onto [`UdfError`].

use crate::content::decode_from_wire;
use crate::error::UdfError;
use crate::protocol::constants::*;
use crate::udf::UdfType;

/// A failure reported by a node inside an info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReport {
    /// `ERROR:<code>:<message>` or `FAIL:<code>:<message>`.
    Status {
        /// Status code.
        code: i32,
        /// Message text.
        message: String,
    },
    /// `error=<token>;file=<file>;line=<line>;message=<base64>` from the UDF engine.
    Udf {
        /// Short error token, such as `not_found` or `compile_error`.
        token: String,
        /// Source file the engine complained about, if given.
        file: Option<String>,
        /// Line number, if given.
        line: Option<u32>,
        /// Decoded message, if given.
        message: Option<String>,
    },
}

impl ServerReport {
    /// Parses the text following `ERROR:` or `FAIL:`.
    ///
    /// A missing separator or a zero/unparsable code yields
    /// [`STATUS_UNKNOWN`] with the whole text as message.
    pub fn parse_status(text: &str) -> Self {
        let text = text.trim_end_matches(['\n', '\r']);
        match text.split_once(':') {
            Some((code, message)) => match code.trim().parse::<i32>() {
                Ok(code) if code != 0 => ServerReport::Status {
                    code,
                    message: message.to_string(),
                },
                _ => ServerReport::Status {
                    code: STATUS_UNKNOWN,
                    message: text.to_string(),
                },
            },
            None => ServerReport::Status {
                code: STATUS_UNKNOWN,
                message: text.to_string(),
            },
        }
    }

    /// Parses the text following `error=`.
    pub fn parse_udf(text: &str) -> Self {
        let text = text.trim_end_matches(['\n', '\r']);
        let mut parts = text.split(FIELD_SEPARATOR);
        let token = parts.next().unwrap_or_default().to_string();

        let mut file = None;
        let mut line = None;
        let mut message = None;
        for part in parts {
            match part.split_once('=') {
                Some(("file", value)) => file = Some(value.to_string()),
                Some(("line", value)) => line = value.trim().parse().ok(),
                Some(("message", value)) => {
                    message = Some(match decode_from_wire(value) {
                        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                        Err(_) => value.to_string(),
                    })
                }
                _ => {}
            }
        }

        ServerReport::Udf {
            token,
            file,
            line,
            message,
        }
    }

    /// Returns the status code this report maps to.
    pub fn code(&self) -> i32 {
        match self {
            ServerReport::Status { code, .. } => *code,
            ServerReport::Udf { .. } if self.is_not_found() => STATUS_UDF_FILE_NOT_FOUND,
            ServerReport::Udf { .. } => STATUS_UDF,
        }
    }

    /// Returns a human-readable message.
    pub fn message(&self) -> String {
        match self {
            ServerReport::Status { message, .. } => message.clone(),
            ServerReport::Udf {
                token,
                file,
                line,
                message,
            } => {
                let mut out = token.clone();
                if let Some(file) = file {
                    out.push_str(&format!(" in {}", file));
                    if let Some(line) = line {
                        out.push_str(&format!(":{}", line));
                    }
                }
                if let Some(message) = message {
                    out.push_str(": ");
                    out.push_str(message);
                }
                out
            }
        }
    }

    /// Returns `true` if the node reported that the module does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            ServerReport::Status { code, .. } => {
                *code == STATUS_NOT_FOUND || *code == STATUS_UDF_FILE_NOT_FOUND
            }
            ServerReport::Udf { token, .. } => {
                token.eq_ignore_ascii_case("not_found")
                    || token.eq_ignore_ascii_case("file_not_found")
            }
        }
    }

    /// Converts the report into an error.
    ///
    /// Not-found reports become [`UdfError::NotFound`] when the command's
    /// subject is known; everything else is [`UdfError::Server`].
    pub fn into_error(self, subject: Option<(&str, UdfType)>) -> UdfError {
        if self.is_not_found() {
            if let Some((name, udf_type)) = subject {
                return UdfError::NotFound {
                    name: name.to_string(),
                    udf_type,
                };
            }
        }

        UdfError::Server {
            code: self.code(),
            message: self.message(),
        }
    }
}
