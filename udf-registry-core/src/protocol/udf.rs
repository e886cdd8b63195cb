//! The UDF registry commands and their responses.
//!
//! ```text
//! udf-list
//!   -> filename=a.lua,hash=<hex>,type=LUA,size=842;filename=b.lua,...;
//! udf-get:filename=a.lua;type=LUA;offset=0;max-size=1048576;
//!   -> filename=a.lua;type=LUA;hash=<hex>;size=842;offset=0;content-len=842;content=<base64>;
//! udf-put:filename=a.lua;type=LUA;hash=<hex>;size=842;offset=0;content-len=842;content=<base64>;
//!   -> ok
//! udf-remove:filename=a.lua;type=LUA;
//!   -> ok
//! ```

use super::command::{Fields, InfoCommand};
use super::constants::*;
use crate::content::{decode_from_wire, encode_for_wire};
use crate::error::{Result, UdfError};
use crate::transfer::TransferChunk;
use crate::udf::{UdfDescriptor, UdfType};

/// Builds the enumeration command.
pub fn list_command() -> InfoCommand {
    InfoCommand::new(UDF_LIST)
}

/// Builds a request for the chunk of a module starting at `offset`.
pub fn get_command(name: &str, udf_type: UdfType, offset: u64, max_size: usize) -> InfoCommand {
    InfoCommand::new(UDF_GET)
        .param(FIELD_FILENAME, name)
        .param(FIELD_TYPE, udf_type)
        .param(FIELD_OFFSET, offset)
        .param(FIELD_MAX_SIZE, max_size)
        .subject(name, udf_type)
}

/// Builds the upload command for one chunk of a module.
pub fn put_command(name: &str, udf_type: UdfType, hash: &str, chunk: &TransferChunk) -> InfoCommand {
    InfoCommand::new(UDF_PUT)
        .param(FIELD_FILENAME, name)
        .param(FIELD_TYPE, udf_type)
        .param(FIELD_HASH, hash)
        .param(FIELD_SIZE, chunk.total_size())
        .param(FIELD_OFFSET, chunk.offset())
        .param(FIELD_CONTENT_LEN, chunk.len())
        .param(FIELD_CONTENT, encode_for_wire(chunk.payload()))
        .subject(name, udf_type)
}

/// Builds the removal command.
pub fn remove_command(name: &str, udf_type: UdfType) -> InfoCommand {
    InfoCommand::new(UDF_REMOVE)
        .param(FIELD_FILENAME, name)
        .param(FIELD_TYPE, udf_type)
        .subject(name, udf_type)
}

fn parse_type(fields: &Fields<'_>) -> Result<UdfType> {
    let token = fields.require(FIELD_TYPE)?;
    token
        .parse()
        .map_err(|_| UdfError::Transport(format!("response carries unsupported UDF type '{}'", token)))
}

fn parse_hash<'a>(fields: &Fields<'a>) -> Result<&'a str> {
    let hash = fields.require(FIELD_HASH)?;
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UdfError::Transport(format!("response carries invalid hash '{}'", hash)));
    }
    Ok(hash)
}

/// Parses one `filename=..,hash=..,type=..,size=..` record of a list response.
pub fn parse_descriptor(record: &str) -> Result<UdfDescriptor> {
    let fields = Fields::parse(record, RECORD_FIELD_SEPARATOR)?;
    let name = fields.require(FIELD_FILENAME)?;
    if name.is_empty() {
        return Err(UdfError::Transport("list record has an empty filename".to_string()));
    }

    Ok(UdfDescriptor::new(
        name,
        parse_type(&fields)?,
        parse_hash(&fields)?.to_ascii_lowercase(),
        fields.require_u64(FIELD_SIZE)?,
    ))
}

/// One chunk of a module as returned by `udf-get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    descriptor: UdfDescriptor,
    chunk: TransferChunk,
}

impl GetResponse {
    /// Returns the module metadata repeated in every chunk response.
    pub fn descriptor(&self) -> &UdfDescriptor {
        &self.descriptor
    }

    /// Returns the chunk.
    pub fn chunk(&self) -> &TransferChunk {
        &self.chunk
    }

    /// Splits the response into its parts.
    pub fn into_parts(self) -> (UdfDescriptor, TransferChunk) {
        (self.descriptor, self.chunk)
    }
}

/// Parses the value of a `udf-get` response.
///
/// # Errors
///
/// Returns `UdfError::Transport` for missing or malformed fields and
/// `UdfError::TransferIntegrity` if the decoded payload length disagrees
/// with the declared `content-len`.
pub fn parse_get_response(value: &str) -> Result<GetResponse> {
    let fields = Fields::parse(value, FIELD_SEPARATOR)?;
    let name = fields.require(FIELD_FILENAME)?;
    let udf_type = parse_type(&fields)?;
    let hash = parse_hash(&fields)?.to_ascii_lowercase();
    let size = fields.require_u64(FIELD_SIZE)?;
    let offset = fields.require_u64(FIELD_OFFSET)?;
    let content_len = fields.require_u64(FIELD_CONTENT_LEN)?;
    let payload = decode_from_wire(fields.get(FIELD_CONTENT).unwrap_or_default())?;

    if payload.len() as u64 != content_len {
        return Err(UdfError::TransferIntegrity(format!(
            "chunk at offset {} declares {} bytes but carries {}",
            offset,
            content_len,
            payload.len()
        )));
    }

    Ok(GetResponse {
        descriptor: UdfDescriptor::new(name, udf_type, hash, size),
        chunk: TransferChunk::new(offset, size, payload),
    })
}

/// Checks that a mutation was acknowledged.
pub fn expect_ok(value: &str) -> Result<()> {
    if value.trim().eq_ignore_ascii_case(OK_RESPONSE) {
        Ok(())
    } else {
        Err(UdfError::Transport(format!(
            "unexpected acknowledgement '{}'",
            value.trim()
        )))
    }
}

/// Lazy, forward-only sequence of descriptors from one `udf-list` response.
///
/// Records are parsed only as they are pulled. After an error the
/// iterator yields nothing further. Enumerating again requires a new call.
#[derive(Debug, Clone)]
pub struct UdfListing {
    body: String,
    pos: usize,
    done: bool,
}

impl UdfListing {
    /// Wraps the value of a `udf-list` response.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            pos: 0,
            done: false,
        }
    }

    /// Returns `true` once the sequence is exhausted or failed.
    pub fn is_exhausted(&self) -> bool {
        self.done || self.body[self.pos..].trim_matches(FIELD_SEPARATOR).trim().is_empty()
    }

    fn next_record(&mut self) -> Option<&str> {
        while self.pos < self.body.len() {
            let rest = &self.body[self.pos..];
            let (record, advance) = match rest.find(FIELD_SEPARATOR) {
                Some(i) => (&rest[..i], i + 1),
                None => (rest, rest.len()),
            };
            self.pos += advance;
            let record = record.trim();
            if !record.is_empty() {
                return Some(record);
            }
        }
        None
    }
}

impl Iterator for UdfListing {
    type Item = Result<UdfDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let parsed = self.next_record().map(parse_descriptor);
        if !matches!(parsed, Some(Ok(_))) {
            self.done = true;
        }
        parsed
    }
}

impl std::iter::FusedIterator for UdfListing {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fingerprint;

    const HASH: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    #[test]
    fn test_list_command() {
        assert_eq!(list_command().render(), "udf-list");
    }

    #[test]
    fn test_get_command() {
        let cmd = get_command("a.lua", UdfType::Lua, 1024, 512);
        assert_eq!(
            cmd.render(),
            "udf-get:filename=a.lua;type=LUA;offset=1024;max-size=512;"
        );
        assert_eq!(cmd.target(), Some(("a.lua", UdfType::Lua)));
    }

    #[test]
    fn test_put_command() {
        let chunk = TransferChunk::new(0, 3, b"abc".to_vec());
        let cmd = put_command("a.lua", UdfType::Lua, HASH, &chunk);
        assert_eq!(
            cmd.render(),
            format!(
                "udf-put:filename=a.lua;type=LUA;hash={};size=3;offset=0;content-len=3;content=YWJj;",
                HASH
            )
        );
    }

    #[test]
    fn test_put_command_empty_chunk() {
        let chunk = TransferChunk::new(0, 0, Vec::new());
        let cmd = put_command("e.lua", UdfType::Lua, &fingerprint(b""), &chunk);
        assert_eq!(cmd.get(FIELD_CONTENT), Some(""));
        assert_eq!(cmd.get(FIELD_SIZE), Some("0"));
    }

    #[test]
    fn test_remove_command() {
        assert_eq!(
            remove_command("a.lua", UdfType::Lua).render(),
            "udf-remove:filename=a.lua;type=LUA;"
        );
    }

    #[test]
    fn test_parse_descriptor() {
        let desc = parse_descriptor(&format!("filename=a.lua,hash={},type=LUA,size=842", HASH)).unwrap();
        assert_eq!(desc.name(), "a.lua");
        assert_eq!(desc.udf_type(), UdfType::Lua);
        assert_eq!(desc.hash(), HASH);
        assert_eq!(desc.size(), 842);
    }

    #[test]
    fn test_parse_descriptor_normalises_hash_case() {
        let desc = parse_descriptor("filename=a.lua,hash=ABCDEF,type=0,size=1").unwrap();
        assert_eq!(desc.hash(), "abcdef");
    }

    #[test]
    fn test_parse_descriptor_errors() {
        assert!(parse_descriptor("hash=ab,type=LUA,size=1").is_err());
        assert!(parse_descriptor("filename=a.lua,hash=xyz,type=LUA,size=1").is_err());
        assert!(parse_descriptor("filename=a.lua,hash=ab,type=JS,size=1").is_err());
        assert!(parse_descriptor("filename=a.lua,hash=ab,type=LUA").is_err());
        assert!(matches!(
            parse_descriptor("filename=,hash=ab,type=LUA,size=1"),
            Err(UdfError::Transport(_))
        ));
    }

    #[test]
    fn test_parse_get_response() {
        let value = format!(
            "filename=a.lua;type=LUA;hash={};size=10;offset=4;content-len=3;content=YWJj;",
            HASH
        );
        let response = parse_get_response(&value).unwrap();
        assert_eq!(response.descriptor().name(), "a.lua");
        assert_eq!(response.descriptor().size(), 10);
        assert_eq!(response.chunk().offset(), 4);
        assert_eq!(response.chunk().total_size(), 10);
        assert_eq!(&response.chunk().payload()[..], b"abc");
    }

    #[test]
    fn test_parse_get_response_content_len_mismatch() {
        let value = format!(
            "filename=a.lua;type=LUA;hash={};size=3;offset=0;content-len=4;content=YWJj;",
            HASH
        );
        assert!(matches!(
            parse_get_response(&value),
            Err(UdfError::TransferIntegrity(_))
        ));
    }

    #[test]
    fn test_parse_get_response_empty_module() {
        let value = format!(
            "filename=e.lua;type=LUA;hash={};size=0;offset=0;content-len=0;content=;",
            fingerprint(b"")
        );
        let response = parse_get_response(&value).unwrap();
        assert!(response.chunk().is_empty());
        assert_eq!(response.chunk().total_size(), 0);
    }

    #[test]
    fn test_parse_get_response_missing_field() {
        let value = "filename=a.lua;type=LUA;size=3;offset=0;content-len=3;content=YWJj;";
        let err = parse_get_response(value).unwrap_err();
        assert!(err.to_string().contains("missing field 'hash'"));
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok("ok").is_ok());
        assert!(expect_ok("OK\n").is_ok());
        assert!(matches!(expect_ok("maybe"), Err(UdfError::Transport(_))));
    }

    #[test]
    fn test_listing_yields_records_in_order() {
        let body = format!(
            "filename=a.lua,hash={h},type=LUA,size=1;filename=b.lua,hash={h},type=LUA,size=2;",
            h = HASH
        );
        let names: Vec<String> = UdfListing::new(body)
            .map(|r| r.unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a.lua", "b.lua"]);
    }

    #[test]
    fn test_listing_empty_body() {
        let mut listing = UdfListing::new("");
        assert!(listing.is_exhausted());
        assert!(listing.next().is_none());
    }

    #[test]
    fn test_listing_without_trailing_separator() {
        let listing = UdfListing::new("filename=a.lua,hash=ab,type=LUA,size=1");
        assert_eq!(listing.count(), 1);
    }

    #[test]
    fn test_listing_fuses_after_error() {
        let mut listing = UdfListing::new(
            "filename=a.lua,hash=ab,type=LUA,size=1;garbage;filename=c.lua,hash=ab,type=LUA,size=1;",
        );
        assert!(listing.next().unwrap().is_ok());
        assert!(listing.next().unwrap().is_err());
        assert!(listing.next().is_none());
        assert!(listing.is_exhausted());
    }

    #[test]
    fn test_listing_is_lazy() {
        // the malformed second record is never parsed if iteration stops early
        let mut listing = UdfListing::new("filename=a.lua,hash=ab,type=LUA,size=1;garbage;");
        assert!(listing.next().unwrap().is_ok());
        assert!(!listing.is_exhausted());
    }
}
