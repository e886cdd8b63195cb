//! Info channel framing and the UDF registry commands.

mod codec;
mod command;
pub mod constants;
mod response;
mod udf;

pub use codec::InfoCodec;
pub use command::{Fields, InfoCommand};
pub use response::parse_response;
pub use udf::{
    expect_ok, get_command, list_command, parse_descriptor, parse_get_response, put_command,
    remove_command, GetResponse, UdfListing,
};
