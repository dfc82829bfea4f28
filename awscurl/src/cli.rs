use crate::HeaderEntry;
use clap::{Parser, ValueEnum};

/// Make AWS signature V4 http requests
#[derive(Debug, Clone, Parser)]
#[command(name = "awscurl", version)]
pub struct Args {
    /// Specify request method to use (default: GET, or POST with --data)
    #[arg(short = 'X', long = "request", value_enum, ignore_case = true)]
    pub request: Option<Method>,

    /// Data to POST, @file to read from 'file'
    #[arg(short = 'd', long = "data", value_name = "DATA")]
    pub data: Option<String>,

    /// Read POST data file as binary, keep line breaks
    #[arg(long = "data-binary")]
    pub data_binary: bool,

    /// Request header to add ("<header>: <value>")
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<HeaderEntry>,

    /// Include response headers in output
    #[arg(short = 'i', long = "include")]
    pub include: bool,

    /// Allow insecure server connections when using https
    #[arg(short = 'k', long = "insecure")]
    pub insecure: bool,

    /// AWS profile
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// AWS region (default: region of the profile)
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// AWS service
    #[arg(long, value_name = "SERVICE", default_value = "execute-api")]
    pub service: String,

    /// Log every step of the request to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// URL to make request to
    pub url: String,
}

/// Request methods accepted by `-X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Method {
    Get,
    Post,
    Delete,
    Put,
    Head,
    Patch,
}

impl From<Method> for http::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Delete => http::Method::DELETE,
            Method::Put => http::Method::PUT,
            Method::Head => http::Method::HEAD,
            Method::Patch => http::Method::PATCH,
        }
    }
}
