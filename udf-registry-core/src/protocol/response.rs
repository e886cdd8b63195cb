//! Extraction of the value from a raw info response.

use super::constants::RESPONSE_SEPARATOR;
use crate::status::ServerReport;

const ERROR_PREFIX: &str = "ERROR:";
const FAIL_PREFIX: &str = "FAIL:";
const UDF_ERROR_PREFIX: &str = "error=";

/// Returns the value of a raw info response, or the failure it embeds.
///
/// Nodes answer `<command>\t<value>\n`. The echoed command and the trailing
/// newline are stripped; a bare value without the echo is accepted as is.
/// A failure is recognised when the response starts with `ERROR:`, or when
/// a tab-separated segment starts with `ERROR:`, `FAIL:` or `error=`.
pub fn parse_response(raw: &str) -> Result<&str, ServerReport> {
    if let Some(rest) = raw.strip_prefix(ERROR_PREFIX) {
        return Err(ServerReport::parse_status(rest));
    }

    for segment in raw.split(RESPONSE_SEPARATOR).skip(1) {
        check_segment(segment)?;
    }

    let value = match raw.split_once(RESPONSE_SEPARATOR) {
        Some((_, value)) => value,
        None => raw,
    };
    let value = value.trim_end_matches(['\n', '\r']);

    // test doubles and proxies may omit the echoed command
    check_segment(value)?;
    Ok(value)
}

fn check_segment(segment: &str) -> Result<(), ServerReport> {
    if let Some(rest) = segment.strip_prefix(ERROR_PREFIX) {
        return Err(ServerReport::parse_status(rest));
    }
    if let Some(rest) = segment.strip_prefix(FAIL_PREFIX) {
        return Err(ServerReport::parse_status(rest));
    }
    if let Some(rest) = segment.strip_prefix(UDF_ERROR_PREFIX) {
        return Err(ServerReport::parse_udf(rest));
    }
    Ok(())
}
