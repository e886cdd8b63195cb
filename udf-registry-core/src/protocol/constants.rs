//! Protocol constants for the info channel and the UDF commands carried on it.

/// Protocol version in the info frame header.
pub const INFO_PROTO_VERSION: u8 = 2;

/// Message type of an info frame.
pub const INFO_MESSAGE_TYPE: u8 = 1;

/// Size of the info frame header in bytes.
pub const INFO_HEADER_SIZE: usize = 8;

/// Largest info body accepted from a node (128 MiB).
pub const MAX_INFO_BODY: usize = 128 * 1024 * 1024;

/// Mask selecting the 48-bit body length from the header.
pub const INFO_SIZE_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Separator between a command name and its parameters.
pub const COMMAND_SEPARATOR: char = ':';

/// Separator between `key=value` parameters.
pub const FIELD_SEPARATOR: char = ';';

/// Separator between fields of one record in a list response.
pub const RECORD_FIELD_SEPARATOR: char = ',';

/// Separator between the echoed command and its value in a response.
pub const RESPONSE_SEPARATOR: char = '\t';

/// Acknowledgement body returned by successful mutations.
pub const OK_RESPONSE: &str = "ok";

/// Enumerates registered modules.
pub const UDF_LIST: &str = "udf-list";

/// Fetches one chunk of a module.
pub const UDF_GET: &str = "udf-get";

/// Uploads one chunk of a module.
pub const UDF_PUT: &str = "udf-put";

/// Removes a module.
pub const UDF_REMOVE: &str = "udf-remove";

/// Module name field.
pub const FIELD_FILENAME: &str = "filename";

/// Module type field.
pub const FIELD_TYPE: &str = "type";

/// Content fingerprint field.
pub const FIELD_HASH: &str = "hash";

/// Total content size field.
pub const FIELD_SIZE: &str = "size";

/// Chunk offset field.
pub const FIELD_OFFSET: &str = "offset";

/// Requested maximum chunk size field.
pub const FIELD_MAX_SIZE: &str = "max-size";

/// Decoded length of the chunk payload.
pub const FIELD_CONTENT_LEN: &str = "content-len";

/// Base64 chunk payload field.
pub const FIELD_CONTENT: &str = "content";

/// Status code: generic server failure.
pub const STATUS_UNKNOWN: i32 = 1;

/// Status code: record or module not found.
pub const STATUS_NOT_FOUND: i32 = 2;

/// Status code: invalid request parameter.
pub const STATUS_PARAMETER: i32 = 4;

/// Status code: server storage full.
pub const STATUS_SERVER_FULL: i32 = 8;

/// Status code: server-side timeout.
pub const STATUS_TIMEOUT: i32 = 9;

/// Status code: UDF engine error (compile or registration failure).
pub const STATUS_UDF: i32 = 100;

/// Status code: UDF file not found.
pub const STATUS_UDF_FILE_NOT_FOUND: i32 = 1302;
