//! tinys3 - Small blocking S3 client with SigV4 signing and STS role support
//!
//! ```no_run
//! use tinys3::Session;
//!
//! # fn main() -> tinys3::Result<()> {
//! let mut session = Session::new("access", "secret", "us-east-1", None)?;
//! session.put("bucket", "hello.txt", b"hello world")?;
//! for entry in session.list("bucket", Some("hel"))? {
//!     println!("{} ({} bytes)", entry.key, entry.length);
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod list;
mod request;
pub mod response;
pub mod role;
pub mod session;
pub mod signer;
pub mod transport;

pub use config::{Addressing, SessionConfig};
pub use error::{Result, S3Error};
pub use list::{ObjectEntry, ObjectList, ObjectStatus};
pub use response::ListVersion;
pub use role::RoleCredentials;
pub use session::{Session, SessionOption};
pub use transport::{HttpTransport, ResponseSink, Transport, TransportRequest};
