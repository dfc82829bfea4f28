//! Make AWS signature V4 signed HTTP requests from the command line.
//!
//! The pipeline of a run:
//!
//! 1. [`canonicalize`] re-encodes the query of the url.
//! 2. [`assemble`] builds headers and body.
//! 3. [`Resolver`] picks the region and the credential provider, assuming a
//!    role when the profile asks for it.
//! 4. [`RequestSigner`](awscurl_aws_v4::RequestSigner) signs the request.
//! 5. The request is sent and [`write_response`] prints the result.
//!
//! [`Awscurl::run`] chains all of them.

mod assemble;
pub use assemble::assemble;
pub use assemble::BodySpec;

mod cli;
pub use cli::Args;
pub use cli::Method;

mod error;
pub use error::Error;
pub use error::Result;

mod header;
pub use header::HeaderEntry;
pub use header::ParseHeaderError;

mod resolve;
pub use resolve::Resolution;
pub use resolve::Resolver;

mod run;
pub use run::write_response;
pub use run::Awscurl;

mod canonical;
pub use canonical::canonicalize;
